//! Resolves the contract value a project (or one milestone) is measured against.
use crate::core::model::{BillingModel, Milestone, Project, RetainerPeriod};
use crate::core::money::{Money, finite_or_zero};
use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

/// Contract value in the project's own currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBudget {
    pub total: Money,
    /// Billing model the value was resolved under. A scoped milestone is
    /// always fixed price.
    pub model: BillingModel,
    /// Number of retainer periods billed, for retainer contracts.
    pub periods: Option<u32>,
    pub milestone_id: Option<String>,
}

/// Resolves the budget for the whole project, or for `scope` when a
/// milestone id is given. Open-ended retainers run until `today`.
pub fn resolve_budget(
    project: &Project,
    milestones: &[Milestone],
    scope: Option<&str>,
    today: NaiveDate,
) -> Result<ResolvedBudget> {
    let currency = project.currency.as_str();

    if let Some(milestone_id) = scope {
        let milestone = milestones
            .iter()
            .find(|m| m.id == milestone_id)
            .ok_or_else(|| {
                anyhow!("Milestone {} not found in project {}", milestone_id, project.id)
            })?;
        return Ok(ResolvedBudget {
            total: Money::new(finite_or_zero(milestone.budget_value), currency),
            model: BillingModel::FixedPrice,
            periods: None,
            milestone_id: Some(milestone.id.clone()),
        });
    }

    let positive = |v: Option<f64>| v.map(finite_or_zero).filter(|v| *v > 0.0);
    let (amount, periods) = match project.billing_model {
        BillingModel::FixedPrice => (
            positive(project.contract_amount)
                .or_else(|| positive(project.budget))
                .unwrap_or(0.0),
            None,
        ),
        BillingModel::Retainer => {
            let start = project.contract_start_date.or(project.start_date);
            let end = project.contract_end_date.unwrap_or(today);
            let periods = retainer_periods(project.retainer_period, start, end);
            (
                positive(project.retainer_amount).unwrap_or(0.0) * f64::from(periods),
                Some(periods),
            )
        }
        BillingModel::TimeAndMaterials => (
            positive(project.estimated_duration).unwrap_or(0.0)
                * positive(project.default_bill_rate_per_hour).unwrap_or(0.0),
            None,
        ),
        BillingModel::NonBillable => (0.0, None),
    };

    debug!(
        "Resolved {} budget for project {}: {:.2} {}",
        project.billing_model, project.id, amount, currency
    );
    Ok(ResolvedBudget {
        total: Money::new(amount, currency),
        model: project.billing_model,
        periods,
        milestone_id: None,
    })
}

/// Number of retainer periods between `start` and `end`, never less than one.
pub fn retainer_periods(period: RetainerPeriod, start: Option<NaiveDate>, end: NaiveDate) -> u32 {
    let Some(start) = start else {
        return 1;
    };

    let months = {
        let whole = i64::from(end.year() - start.year()) * 12 + i64::from(end.month())
            - i64::from(start.month());
        whole + i64::from(end.day() > start.day())
    };
    let ceil_div = |value: i64, by: f64| (value as f64 / by).ceil() as i64;

    let periods = match period {
        RetainerPeriod::Week => ceil_div((end - start).num_days(), 7.0),
        RetainerPeriod::Month => months,
        RetainerPeriod::Quarter => ceil_div(months, 3.0),
        RetainerPeriod::Year => ceil_div(months, 12.0),
    };
    u32::try_from(periods.max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn today() -> NaiveDate {
        date(2024, 6, 30)
    }

    #[test]
    fn test_monthly_retainer_counts_partial_month() {
        let project = Project {
            id: "p1".to_string(),
            currency: "USD".to_string(),
            billing_model: BillingModel::Retainer,
            retainer_amount: Some(1000.0),
            retainer_period: RetainerPeriod::Month,
            contract_start_date: Some(date(2024, 1, 1)),
            contract_end_date: Some(date(2024, 3, 15)),
            ..Default::default()
        };
        let budget = resolve_budget(&project, &[], None, today()).unwrap();
        assert_eq!(budget.periods, Some(3));
        assert_eq!(budget.total, Money::new(3000.0, "USD"));
        assert_eq!(budget.model, BillingModel::Retainer);
    }

    #[test]
    fn test_open_ended_retainer_runs_until_today() {
        let project = Project {
            id: "p1".to_string(),
            billing_model: BillingModel::Retainer,
            retainer_amount: Some(500.0),
            contract_start_date: Some(date(2024, 1, 10)),
            ..Default::default()
        };
        // Jan 10 to Jun 30: 5 whole months plus a partial one.
        let budget = resolve_budget(&project, &[], None, today()).unwrap();
        assert_eq!(budget.periods, Some(6));
        assert_eq!(budget.total.amount, 3000.0);
    }

    #[test]
    fn test_period_arithmetic() {
        let start = Some(date(2024, 1, 1));
        assert_eq!(retainer_periods(RetainerPeriod::Week, start, date(2024, 1, 15)), 2);
        assert_eq!(retainer_periods(RetainerPeriod::Week, start, date(2024, 1, 16)), 3);
        assert_eq!(retainer_periods(RetainerPeriod::Quarter, start, date(2024, 3, 15)), 1);
        assert_eq!(retainer_periods(RetainerPeriod::Quarter, start, date(2024, 4, 2)), 2);
        assert_eq!(retainer_periods(RetainerPeriod::Year, start, date(2025, 2, 2)), 2);
        assert_eq!(retainer_periods(RetainerPeriod::Month, start, date(2023, 6, 1)), 1);
        assert_eq!(retainer_periods(RetainerPeriod::Month, None, date(2024, 6, 1)), 1);
    }

    #[test]
    fn test_time_and_materials_budget() {
        let project = Project {
            id: "p1".to_string(),
            billing_model: BillingModel::TimeAndMaterials,
            estimated_duration: Some(100.0),
            default_bill_rate_per_hour: Some(50.0),
            ..Default::default()
        };
        let budget = resolve_budget(&project, &[], None, today()).unwrap();
        assert_eq!(budget.total.amount, 5000.0);
        assert_eq!(budget.periods, None);
    }

    #[test]
    fn test_fixed_price_falls_back_to_budget_field() {
        let project = Project {
            id: "p1".to_string(),
            contract_amount: Some(0.0),
            budget: Some(7500.0),
            ..Default::default()
        };
        let budget = resolve_budget(&project, &[], None, today()).unwrap();
        assert_eq!(budget.total.amount, 7500.0);
        assert_eq!(budget.model, BillingModel::FixedPrice);
    }

    #[test]
    fn test_milestone_scope_is_fixed_price() {
        let project = Project {
            id: "p1".to_string(),
            currency: "EUR".to_string(),
            billing_model: BillingModel::Retainer,
            retainer_amount: Some(1000.0),
            ..Default::default()
        };
        let milestones = vec![Milestone {
            id: "m1".to_string(),
            project_id: "p1".to_string(),
            budget_value: 4200.0,
            ..Default::default()
        }];

        let budget = resolve_budget(&project, &milestones, Some("m1"), today()).unwrap();
        assert_eq!(budget.total, Money::new(4200.0, "EUR"));
        assert_eq!(budget.model, BillingModel::FixedPrice);
        assert_eq!(budget.milestone_id.as_deref(), Some("m1"));

        let missing = resolve_budget(&project, &milestones, Some("m9"), today());
        assert_eq!(
            missing.unwrap_err().to_string(),
            "Milestone m9 not found in project p1"
        );
    }
}
