//! Rolls normalized cost rows up into milestone and project profit and loss.
use crate::core::budget::ResolvedBudget;
use crate::core::model::{BillingModel, Milestone, MilestoneStatus};
use crate::core::money::{Money, ratio};
use crate::core::normalize::CostRow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Costs and hours attributed to one bucket (a milestone, the unallocated
/// bucket, or the whole project).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub labor: Money,
    pub expense: Money,
    pub total: Money,
    /// Labor cost of every logged entry, approved or not.
    pub logged_labor: Money,
    pub logged_hours: f64,
    pub approved_hours: f64,
    pub non_billable_hours: f64,
}

impl CostBreakdown {
    pub fn new(currency: &str) -> Self {
        Self {
            labor: Money::zero(currency),
            expense: Money::zero(currency),
            total: Money::zero(currency),
            logged_labor: Money::zero(currency),
            logged_hours: 0.0,
            approved_hours: 0.0,
            non_billable_hours: 0.0,
        }
    }

    fn add_row(&mut self, row: &CostRow) {
        let cost = row.cost().amount;
        match row {
            CostRow::Labor(labor) => {
                self.labor.add_amount(cost);
                self.logged_labor.add_amount(labor.logged_cost.amount);
                self.logged_hours += labor.logged_hours;
                self.approved_hours += labor.approved_hours;
                self.non_billable_hours += labor.non_billable_hours;
            }
            CostRow::Expense(_) => self.expense.add_amount(cost),
        }
        self.total.add_amount(cost);
    }

    fn absorb(&mut self, other: &CostBreakdown) {
        self.labor.add_amount(other.labor.amount);
        self.expense.add_amount(other.expense.amount);
        self.total.add_amount(other.total.amount);
        self.logged_labor.add_amount(other.logged_labor.amount);
        self.logged_hours += other.logged_hours;
        self.approved_hours += other.approved_hours;
        self.non_billable_hours += other.non_billable_hours;
    }

    /// Hours logged as billable, approved or not.
    pub fn billable_hours(&self) -> f64 {
        (self.logged_hours - self.non_billable_hours).max(0.0)
    }

    /// Share of logged hours that were billable. `None` when nothing was logged.
    pub fn billable_efficiency(&self) -> Option<f64> {
        ratio(self.billable_hours(), self.logged_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestonePnl {
    pub milestone_id: String,
    pub name: String,
    pub status: MilestoneStatus,
    pub due_date: Option<NaiveDate>,
    pub budget: Money,
    pub expense_budget: Money,
    pub costs: CostBreakdown,
    pub phase_profit: Money,
    pub margin_percent: Option<f64>,
    pub expense_budget_used_percent: Option<f64>,
}

impl MilestonePnl {
    pub fn total_phase_cost(&self) -> &Money {
        &self.costs.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlTotals {
    pub budget: Money,
    pub model: BillingModel,
    pub costs: CostBreakdown,
    pub net_profit: Money,
    pub margin_percent: Option<f64>,
    /// Logged labor cost that never became approved cost.
    pub labor_leakage: Money,
    /// Leakage under the budget's billing model.
    pub leakage: Money,
    /// `None` when the budget is zero.
    pub leakage_percent: Option<f64>,
}

impl PnlTotals {
    pub fn total_cost(&self) -> &Money {
        &self.costs.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitAndLoss {
    pub milestones: Vec<MilestonePnl>,
    pub unallocated: CostBreakdown,
    pub totals: PnlTotals,
}

/// Aggregates `rows` into per-milestone figures plus an unallocated bucket.
/// Project totals are the sum of those parts, so the milestone table always
/// reconciles with the summary.
pub fn aggregate(
    rows: &[CostRow],
    milestones: &[Milestone],
    budget: &ResolvedBudget,
) -> ProfitAndLoss {
    let currency = budget.total.currency.as_str();

    let positions: HashMap<&str, usize> = milestones
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();
    let mut phase_costs: Vec<CostBreakdown> =
        milestones.iter().map(|_| CostBreakdown::new(currency)).collect();
    let mut unallocated = CostBreakdown::new(currency);

    for row in rows {
        match row.milestone_id().and_then(|id| positions.get(id)) {
            Some(&i) => phase_costs[i].add_row(row),
            None => unallocated.add_row(row),
        }
    }

    let mut project_costs = CostBreakdown::new(currency);
    for costs in &phase_costs {
        project_costs.absorb(costs);
    }
    project_costs.absorb(&unallocated);

    let milestone_pnls: Vec<MilestonePnl> = milestones
        .iter()
        .zip(phase_costs)
        .map(|(milestone, costs)| {
            let budget_value = milestone.budget_value;
            let profit = budget_value - costs.total.amount;
            MilestonePnl {
                milestone_id: milestone.id.clone(),
                name: milestone.name.clone(),
                status: milestone.status,
                due_date: milestone.due_date,
                budget: Money::new(budget_value, currency),
                expense_budget: Money::new(milestone.expense_budget, currency),
                phase_profit: Money::new(profit, currency),
                margin_percent: ratio(profit, budget_value).map(|r| r * 100.0),
                expense_budget_used_percent: ratio(costs.expense.amount, milestone.expense_budget)
                    .map(|r| r * 100.0),
                costs,
            }
        })
        .collect();

    let totals = totals(project_costs, budget);
    debug!(
        "Aggregated {} rows: total cost {}, leakage {}",
        rows.len(),
        totals.costs.total,
        totals.leakage
    );

    ProfitAndLoss {
        milestones: milestone_pnls,
        unallocated,
        totals,
    }
}

fn totals(costs: CostBreakdown, budget: &ResolvedBudget) -> PnlTotals {
    let currency = budget.total.currency.as_str();
    let budget_amount = budget.total.amount;
    let total_cost = costs.total.amount;

    let labor_leakage = (costs.logged_labor.amount - costs.labor.amount).max(0.0);
    let overrun = (total_cost - budget_amount).max(0.0);
    let leakage = match budget.model {
        BillingModel::FixedPrice => overrun + labor_leakage,
        BillingModel::Retainer => overrun,
        BillingModel::TimeAndMaterials => labor_leakage,
        BillingModel::NonBillable => total_cost.max(0.0),
    };
    let net_profit = budget_amount - total_cost;

    PnlTotals {
        budget: budget.total.clone(),
        model: budget.model,
        net_profit: Money::new(net_profit, currency),
        margin_percent: ratio(net_profit, budget_amount).map(|r| r * 100.0),
        labor_leakage: Money::new(labor_leakage, currency),
        leakage: Money::new(leakage, currency),
        leakage_percent: ratio(leakage, budget_amount).map(|r| r * 100.0),
        costs,
    }
}
