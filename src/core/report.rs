//! Builds a profitability report for a project or a single milestone.
use crate::core::budget::{ResolvedBudget, resolve_budget};
use crate::core::health::{HealthInputs, HealthScore, score};
use crate::core::insights::{Insight, detect_leakage};
use crate::core::money::Money;
use crate::core::normalize::{CostRow, NormalizeInput, normalize};
use crate::core::pnl::{ProfitAndLoss, aggregate};
use crate::core::rates::{RateBook, RateLookup, RateStatus};
use crate::core::snapshot::ProjectSnapshot;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

/// Headline figures converted into the display currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySummary {
    pub currency: String,
    pub rate: f64,
    pub budget: Money,
    pub total_cost: Money,
    pub net_profit: Money,
    pub leakage: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityReport {
    pub project_id: String,
    pub project_name: String,
    /// The project's own currency. Every figure outside `display` uses it.
    pub currency: String,
    pub milestone_scope: Option<String>,
    pub budget: ResolvedBudget,
    pub rows: Vec<CostRow>,
    pub pnl: ProfitAndLoss,
    pub health: HealthScore,
    pub insights: Vec<Insight>,
    pub display: DisplaySummary,
    /// Incomplete when any figure used the 1.0 fallback rate.
    pub rates: RateStatus,
}

impl ProfitabilityReport {
    /// Computes the report from whatever rates `rates` holds right now.
    /// Calling it again after more rates arrive gives the refined figures.
    pub fn build(
        snapshot: &ProjectSnapshot,
        scope: Option<&str>,
        rates: &RateBook,
        today: NaiveDate,
    ) -> Result<Self> {
        let project = &snapshot.project;
        let budget = resolve_budget(project, &snapshot.milestones, scope, today)?;

        let mut rows = normalize(
            &NormalizeInput {
                timesheets: &snapshot.timesheets,
                expenses: &snapshot.expenses,
                users: &snapshot.users,
                tasks: &snapshot.tasks,
                milestones: &snapshot.milestones,
                project_currency: &project.currency,
            },
            rates,
        );

        let (milestones, tasks) = match scope {
            Some(id) => {
                rows.retain(|row| row.milestone_id() == Some(id));
                (
                    snapshot
                        .milestones
                        .iter()
                        .filter(|m| m.id == id)
                        .cloned()
                        .collect::<Vec<_>>(),
                    snapshot
                        .tasks
                        .iter()
                        .filter(|t| t.milestone_id.as_deref() == Some(id))
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            }
            None => (snapshot.milestones.clone(), snapshot.tasks.clone()),
        };
        debug!(
            "Report scope {:?}: {} rows, {} milestones, {} tasks",
            scope,
            rows.len(),
            milestones.len(),
            tasks.len()
        );

        let pnl = aggregate(&rows, &milestones, &budget);
        let health = score(&HealthInputs {
            project,
            milestone: milestones.first().filter(|_| scope.is_some()),
            tasks: &tasks,
            budget: &budget,
            totals: &pnl.totals,
            today,
        });
        let insights = detect_leakage(&rows, &pnl.totals, &budget);

        let target = rates.target();
        let display_rate = rates.rate(&project.currency, &target);
        let display = DisplaySummary {
            rate: display_rate,
            budget: budget.total.convert(display_rate, &target),
            total_cost: pnl.totals.costs.total.convert(display_rate, &target),
            net_profit: pnl.totals.net_profit.convert(display_rate, &target),
            leakage: pnl.totals.leakage.convert(display_rate, &target),
            currency: target,
        };

        let rate_status = rates.status();
        info!(
            project = %project.id,
            score = health.score,
            tier = %health.tier,
            rates_complete = rate_status.is_complete(),
            "Built profitability report"
        );

        Ok(ProfitabilityReport {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            currency: project.currency.clone(),
            milestone_scope: scope.map(str::to_string),
            budget,
            rows,
            pnl,
            health,
            insights,
            display,
            rates: rate_status,
        })
    }

    /// Insight messages as plain strings.
    pub fn insight_messages(&self) -> Vec<String> {
        self.insights.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyRateProvider;
    use crate::core::model::{
        BillingModel, ExpenseRecord, Milestone, Project, TimesheetEntry, TimesheetStatus,
        UserProfile,
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MockCurrencyProvider;

    #[async_trait]
    impl CurrencyRateProvider for MockCurrencyProvider {
        async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
            match (from, to) {
                ("INR", "USD") => Ok(0.015625),
                ("EUR", "USD") => Ok(1.25),
                _ => Err(anyhow!("Rate not found for {} to {}", from, to)),
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    fn entry(minutes: f64, billable: bool, milestone: Option<&str>) -> TimesheetEntry {
        TimesheetEntry {
            user_email: "dev@x.io".to_string(),
            project_id: "p1".to_string(),
            task_id: Some("t1".to_string()),
            milestone_id: milestone.map(str::to_string),
            total_minutes: minutes,
            is_billable: billable,
            status: TimesheetStatus::Approved,
            ..Default::default()
        }
    }

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            project: Project {
                id: "p1".to_string(),
                name: "Website".to_string(),
                currency: "USD".to_string(),
                billing_model: BillingModel::FixedPrice,
                contract_amount: Some(10_000.0),
                progress: 40.0,
                ..Default::default()
            },
            milestones: vec![Milestone {
                id: "m1".to_string(),
                project_id: "p1".to_string(),
                name: "Design".to_string(),
                budget_value: 4000.0,
                ..Default::default()
            }],
            timesheets: vec![
                entry(600.0, true, Some("m1")),
                entry(120.0, false, Some("m1")),
                entry(60.0, true, None),
            ],
            expenses: vec![ExpenseRecord {
                project_id: "p1".to_string(),
                milestone_id: Some("m1".to_string()),
                amount: 8000.0,
                currency: Some("INR".to_string()),
                description: "Fonts".to_string(),
                ..Default::default()
            }],
            users: vec![UserProfile {
                email: "dev@x.io".to_string(),
                hourly_rate: 100.0,
                ctc_currency: Some("USD".to_string()),
            }],
            ..Default::default()
        }
    }

    fn book(target: &str) -> RateBook {
        RateBook::new(target, Arc::new(MockCurrencyProvider))
    }

    #[tokio::test]
    async fn test_report_before_and_after_rates_arrive() {
        let snapshot = snapshot();
        let rates = book("USD");

        let pending = ProfitabilityReport::build(&snapshot, None, &rates, today()).unwrap();
        assert!(!pending.rates.is_complete());
        assert_eq!(pending.rates.pending, vec!["INR".to_string()]);
        // INR expense counted at the 1.0 fallback
        assert_eq!(pending.pnl.totals.costs.total.amount, 1100.0 + 8000.0);

        rates.warm(snapshot.currencies(), &|_| ()).await;
        let report = ProfitabilityReport::build(&snapshot, None, &rates, today()).unwrap();
        assert!(report.rates.is_complete());
        assert_eq!(report.pnl.totals.costs.labor.amount, 1100.0);
        assert_eq!(report.pnl.totals.costs.expense.amount, 125.0);
        assert_eq!(report.pnl.milestones[0].costs.total.amount, 1125.0);
        assert_eq!(report.pnl.unallocated.total.amount, 100.0);
        assert_eq!(report.pnl.totals.labor_leakage.amount, 200.0);
        assert_eq!(report.pnl.totals.leakage.amount, 200.0);

        let again = ProfitabilityReport::build(&snapshot, None, &rates, today()).unwrap();
        assert_eq!(report, again);
    }

    #[tokio::test]
    async fn test_milestone_scope_report() {
        let snapshot = snapshot();
        let rates = book("USD");
        rates.warm(snapshot.currencies(), &|_| ()).await;

        let report = ProfitabilityReport::build(&snapshot, Some("m1"), &rates, today()).unwrap();
        assert_eq!(report.milestone_scope.as_deref(), Some("m1"));
        assert_eq!(report.budget.total.amount, 4000.0);
        assert_eq!(report.pnl.totals.costs.total.amount, 1125.0);
        assert_eq!(report.pnl.unallocated.total.amount, 0.0);
        assert_eq!(report.pnl.milestones[0].phase_profit.amount, 2875.0);

        assert!(ProfitabilityReport::build(&snapshot, Some("nope"), &rates, today()).is_err());
    }

    #[tokio::test]
    async fn test_display_currency_conversion() {
        let mut snapshot = snapshot();
        snapshot.project.currency = "EUR".to_string();
        snapshot.users[0].ctc_currency = Some("EUR".to_string());
        snapshot.expenses.clear();

        let rates = book("USD");
        rates.warm(snapshot.currencies(), &|_| ()).await;
        let report = ProfitabilityReport::build(&snapshot, None, &rates, today()).unwrap();

        assert_eq!(report.currency, "EUR");
        assert_eq!(report.budget.total, Money::new(10_000.0, "EUR"));
        assert_eq!(report.display.budget, Money::new(12_500.0, "USD"));
        assert_eq!(report.display.rate, 1.25);
        assert!(report.rates.is_complete());
    }
}
