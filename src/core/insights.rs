//! Advisory profit-leakage signals. They never feed back into the score.
use crate::core::budget::ResolvedBudget;
use crate::core::model::BillingModel;
use crate::core::money::{Money, ratio};
use crate::core::normalize::CostRow;
use crate::core::pnl::PnlTotals;
use crate::core::signals::is_adjustment;
use serde::Serialize;
use std::fmt::Display;

const EXPENSE_DOMINANCE_SHARE: f64 = 0.8;
const LOW_EFFICIENCY: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    /// Cost exceeds the retainer value. `multiple` is cost over retainer value.
    RetainerOverServicing { cost: Money, multiple: Option<f64> },
    ExpenseDominance { share_percent: f64 },
    AdjustmentDetected { count: usize },
    BudgetCapExceeded { overrun: Money },
    LowBillableEfficiency { efficiency_percent: f64 },
}

impl Display for Insight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Insight::RetainerOverServicing {
                cost,
                multiple: Some(multiple),
            } => write!(
                f,
                "Over-servicing: cost of {cost} is {multiple:.2}x the retainer value"
            ),
            Insight::RetainerOverServicing { cost, multiple: None } => write!(
                f,
                "Over-servicing: cost of {cost} against a retainer with no value"
            ),
            Insight::ExpenseDominance { share_percent } => write!(
                f,
                "Expense dominance: non-labor costs are {share_percent:.1}% of total cost"
            ),
            Insight::AdjustmentDetected { count } => write!(
                f,
                "Adjustment detected: {count} expense(s) recorded as adjustments"
            ),
            Insight::BudgetCapExceeded { overrun } => write!(
                f,
                "Budget cap exceeded: cost is {overrun} over the time-and-materials estimate"
            ),
            Insight::LowBillableEfficiency { efficiency_percent } => write!(
                f,
                "Low billable efficiency: only {efficiency_percent:.1}% of logged hours are billable"
            ),
        }
    }
}

/// Runs every check independently. All that apply are returned.
pub fn detect_leakage(
    rows: &[CostRow],
    totals: &PnlTotals,
    budget: &ResolvedBudget,
) -> Vec<Insight> {
    let mut insights = Vec::new();
    let total_cost = totals.costs.total.amount;

    if budget.model == BillingModel::Retainer && total_cost > budget.total.amount {
        insights.push(Insight::RetainerOverServicing {
            cost: totals.costs.total.clone(),
            multiple: ratio(total_cost, budget.total.amount),
        });
    }

    if let Some(share) = ratio(totals.costs.expense.amount, total_cost) {
        if share > EXPENSE_DOMINANCE_SHARE {
            insights.push(Insight::ExpenseDominance {
                share_percent: share * 100.0,
            });
        }
    }

    let adjustments = rows
        .iter()
        .filter(|row| matches!(row, CostRow::Expense(expense) if is_adjustment(expense)))
        .count();
    if adjustments > 0 {
        insights.push(Insight::AdjustmentDetected { count: adjustments });
    }

    if budget.model == BillingModel::TimeAndMaterials {
        if totals.net_profit.amount < 0.0 {
            insights.push(Insight::BudgetCapExceeded {
                overrun: Money::new(-totals.net_profit.amount, &totals.net_profit.currency),
            });
        }
        if let Some(efficiency) = totals.costs.billable_efficiency() {
            if efficiency < LOW_EFFICIENCY {
                insights.push(Insight::LowBillableEfficiency {
                    efficiency_percent: efficiency * 100.0,
                });
            }
        }
    }

    insights
}
