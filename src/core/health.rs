//! Composite 0-100 health score.
//!
//! Retainers are scored on revenue realization, cost control, utilization
//! and quality. Every other engagement starts from a base of 70 and is moved
//! by progress, task completion, schedule, budget use and status flags.
use crate::core::budget::ResolvedBudget;
use crate::core::model::{
    BillingModel, Milestone, MilestoneStatus, Project, ProjectStatus, RiskLevel, Task, TaskStatus,
};
use crate::core::money::{finite_or_zero, ratio};
use crate::core::pnl::PnlTotals;
use crate::core::signals::is_rework;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Critical,
    HighRisk,
    AtRisk,
    Healthy,
}

impl Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RiskTier::Critical => "Critical",
                RiskTier::HighRisk => "High Risk",
                RiskTier::AtRisk => "At Risk",
                RiskTier::Healthy => "Healthy",
            }
        )
    }
}

/// Upper bounds (exclusive) for each tier, checked in order.
type TierTable = [(f64, RiskTier); 3];

const RETAINER_TIERS: TierTable = [
    (40.0, RiskTier::Critical),
    (60.0, RiskTier::HighRisk),
    (80.0, RiskTier::AtRisk),
];

const STANDARD_TIERS: TierTable = [
    (40.0, RiskTier::Critical),
    (60.0, RiskTier::HighRisk),
    (80.0, RiskTier::AtRisk),
];

fn tier_for(score: f64, table: &TierTable) -> RiskTier {
    table
        .iter()
        .find(|(bound, _)| score < *bound)
        .map_or(RiskTier::Healthy, |(_, tier)| *tier)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthFormula {
    Retainer,
    Standard,
}

/// One labelled contribution to the score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthFactor {
    pub label: String,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScore {
    pub score: u8,
    pub tier: RiskTier,
    pub formula: HealthFormula,
    pub factors: Vec<HealthFactor>,
}

pub struct HealthInputs<'a> {
    pub project: &'a Project,
    /// Set when the report is scoped to one milestone.
    pub milestone: Option<&'a Milestone>,
    /// Tasks within the report's scope.
    pub tasks: &'a [Task],
    pub budget: &'a ResolvedBudget,
    pub totals: &'a PnlTotals,
    pub today: NaiveDate,
}

pub fn score(inputs: &HealthInputs<'_>) -> HealthScore {
    match inputs.budget.model {
        BillingModel::Retainer => retainer_score(inputs),
        _ => standard_score(inputs),
    }
}

fn factor(factors: &mut Vec<HealthFactor>, label: &str, points: f64) {
    factors.push(HealthFactor {
        label: label.to_string(),
        points,
    });
}

fn clamp_score(raw: f64) -> f64 {
    finite_or_zero(raw).clamp(0.0, 100.0)
}

fn retainer_score(inputs: &HealthInputs<'_>) -> HealthScore {
    let retainer_value = inputs.budget.total.amount;
    let costs = &inputs.totals.costs;
    let mut factors = Vec::new();

    let bill_rate = inputs.project.default_bill_rate_per_hour.map_or(0.0, finite_or_zero);
    let billable_value = if bill_rate > 0.0 {
        costs.approved_hours * bill_rate
    } else {
        costs.labor.amount
    };
    let realization = ratio(billable_value, retainer_value).unwrap_or(0.0);
    let realization_points = if (0.7..=1.1).contains(&realization) {
        25.0
    } else if realization > 0.4 {
        15.0
    } else {
        5.0
    };
    factor(&mut factors, "Revenue realization", realization_points);

    let cost_points = match ratio(costs.total.amount, retainer_value) {
        Some(r) if r <= 0.8 => 25.0,
        Some(r) if r <= 1.0 => 15.0,
        Some(r) if r <= 1.2 => 5.0,
        Some(_) => 0.0,
        None if costs.total.amount > 0.0 => 0.0,
        None => 25.0,
    };
    factor(&mut factors, "Cost control", cost_points);

    let efficiency = costs.billable_efficiency().unwrap_or(0.0);
    let utilization_points = if efficiency >= 0.85 {
        25.0
    } else if efficiency >= 0.70 {
        15.0
    } else {
        5.0
    };
    factor(&mut factors, "Utilization balance", utilization_points);

    let quality_points = if inputs.tasks.iter().any(is_rework) {
        10.0
    } else {
        25.0
    };
    factor(&mut factors, "Quality", quality_points);

    let raw: f64 = factors.iter().map(|f| f.points).sum();
    finish(raw, HealthFormula::Retainer, factors)
}

/// Rounds the clamped score and derives the tier from the rounded value.
fn finish(raw: f64, formula: HealthFormula, factors: Vec<HealthFactor>) -> HealthScore {
    let final_score = clamp_score(raw).round();
    let table = match formula {
        HealthFormula::Retainer => &RETAINER_TIERS,
        HealthFormula::Standard => &STANDARD_TIERS,
    };
    HealthScore {
        score: final_score as u8,
        tier: tier_for(final_score, table),
        formula,
        factors,
    }
}

fn task_completion_rate(tasks: &[Task]) -> f64 {
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    ratio(done as f64, tasks.len() as f64).unwrap_or(0.0)
}

fn standard_score(inputs: &HealthInputs<'_>) -> HealthScore {
    let mut factors = Vec::new();
    factor(&mut factors, "Base", 70.0);

    let completion_rate = task_completion_rate(inputs.tasks);
    let progress = match inputs.milestone {
        Some(milestone) if inputs.tasks.is_empty() => {
            if milestone.status == MilestoneStatus::Completed {
                100.0
            } else {
                0.0
            }
        }
        Some(_) => completion_rate * 100.0,
        None => finite_or_zero(inputs.project.progress).clamp(0.0, 100.0),
    };
    factor(&mut factors, "Progress", progress * 0.3);
    factor(&mut factors, "Task completion", completion_rate * 20.0);

    let deadline = match inputs.milestone {
        Some(milestone) => milestone.due_date,
        None => inputs.project.deadline,
    };
    if let Some(deadline) = deadline {
        let days_left = (deadline - inputs.today).num_days();
        if days_left < 0 {
            factor(&mut factors, "Overdue", -20.0);
        } else if days_left <= 7 {
            factor(&mut factors, "Due within a week", -10.0);
        }
    }

    match ratio(inputs.totals.costs.total.amount, inputs.budget.total.amount) {
        Some(used) if used > 1.0 => factor(&mut factors, "Over budget", -40.0),
        Some(used) if used > 0.9 => factor(&mut factors, "Budget above 90%", -20.0),
        Some(used) if used > 0.75 => factor(&mut factors, "Budget above 75%", -10.0),
        _ => {}
    }

    if inputs.project.status == ProjectStatus::OnHold {
        factor(&mut factors, "On hold", -15.0);
    }
    match inputs.project.risk_level {
        Some(RiskLevel::Critical) => factor(&mut factors, "Critical risk flag", -20.0),
        Some(RiskLevel::High) => factor(&mut factors, "High risk flag", -15.0),
        Some(RiskLevel::Medium) => factor(&mut factors, "Medium risk flag", -5.0),
        _ => {}
    }

    let completed = match inputs.milestone {
        Some(milestone) => milestone.status == MilestoneStatus::Completed,
        None => inputs.project.status == ProjectStatus::Completed,
    };
    if completed {
        factors.clear();
        factor(&mut factors, "Completed", 100.0);
    }
    let raw: f64 = factors.iter().map(|f| f.points).sum();
    finish(raw, HealthFormula::Standard, factors)
}
