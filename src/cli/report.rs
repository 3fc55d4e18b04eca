use super::ui;
use crate::core::normalize::CostRow;
use crate::core::pnl::CostBreakdown;
use crate::core::{ProfitabilityReport, ProjectSnapshot, RateBook};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use tracing::debug;

/// Builds the report, fetches the missing rates with a progress bar and
/// rebuilds once they have settled.
pub async fn prepare(
    snapshot: &ProjectSnapshot,
    scope: Option<&str>,
    rates: &RateBook,
    today: NaiveDate,
) -> Result<ProfitabilityReport> {
    // An unknown scope fails here, before any network traffic.
    let first = ProfitabilityReport::build(snapshot, scope, rates, today)?;
    if first.rates.is_complete() {
        rates.close();
        return Ok(first);
    }

    let currencies = snapshot.currencies();
    let pb = ui::new_progress_bar(currencies.len() as u64, true);
    pb.set_message("Fetching exchange rates...");
    rates
        .warm(&currencies, &|code| {
            debug!("Rate settled for {}", code);
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();
    rates.close();

    ProfitabilityReport::build(snapshot, scope, rates, today)
}

/// Prints the report as a table, or as pretty JSON.
pub fn run(report: &ProfitabilityReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("{}", report.display_as_table());
    Ok(())
}

fn breakdown_row(label: &str, costs: &CostBreakdown) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new("-"),
        ui::amount_cell(costs.labor.amount),
        ui::amount_cell(costs.expense.amount),
        ui::amount_cell(costs.total.amount),
        Cell::new("-"),
        Cell::new("-"),
    ]
}

impl ProfitabilityReport {
    pub fn display_as_table(&self) -> String {
        let mut output = String::new();
        let title = match &self.milestone_scope {
            Some(id) => format!("{} ({}) / milestone {}", self.project_name, self.project_id, id),
            None => format!("{} ({})", self.project_name, self.project_id),
        };
        output.push_str(&format!("{}\n", ui::style_text(&title, ui::StyleType::Title)));
        output.push_str(&format!(
            "Billing model: {}    Budget: {}",
            self.budget.model, self.budget.total
        ));
        if let Some(periods) = self.budget.periods {
            output.push_str(&format!(" ({periods} period(s))"));
        }
        output.push('\n');

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Milestone"),
            ui::header_cell(&format!("Budget ({})", self.currency)),
            ui::header_cell("Labor"),
            ui::header_cell("Expenses"),
            ui::header_cell("Total cost"),
            ui::header_cell("Profit"),
            ui::header_cell("Margin"),
        ]);
        for milestone in &self.pnl.milestones {
            table.add_row(vec![
                Cell::new(format!("{} [{:?}]", milestone.name, milestone.status)),
                ui::amount_cell(milestone.budget.amount),
                ui::amount_cell(milestone.costs.labor.amount),
                ui::amount_cell(milestone.costs.expense.amount),
                ui::amount_cell(milestone.total_phase_cost().amount),
                ui::profit_cell(milestone.phase_profit.amount),
                ui::format_optional_cell(milestone.margin_percent, |m| format!("{m:.1}%")),
            ]);
        }
        if self.milestone_scope.is_none() {
            table.add_row(breakdown_row("Unallocated", &self.pnl.unallocated));
        }
        output.push_str(&format!("{table}\n"));

        let totals = &self.pnl.totals;
        let summary = [
            ("Total cost", totals.total_cost().to_string()),
            (
                "Net profit",
                ui::style_text(
                    &totals.net_profit.to_string(),
                    if totals.net_profit.amount >= 0.0 {
                        ui::StyleType::TotalValue
                    } else {
                        ui::StyleType::Error
                    },
                ),
            ),
            ("Margin", ui::percent_text(totals.margin_percent)),
            ("Labor leakage", totals.labor_leakage.to_string()),
            (
                "Leakage",
                format!(
                    "{} ({})",
                    totals.leakage,
                    ui::percent_text(totals.leakage_percent)
                ),
            ),
            (
                "Billable efficiency",
                ui::percent_text(totals.costs.billable_efficiency().map(|e| e * 100.0)),
            ),
        ];
        for (label, value) in summary {
            output.push_str(&format!(
                "{}: {}\n",
                ui::style_text(label, ui::StyleType::TotalLabel),
                value
            ));
        }

        if self.display.currency != self.currency {
            output.push_str(&format!(
                "{}\n",
                ui::style_text(
                    &format!(
                        "In {} at {:.4}: budget {}, cost {}, profit {}, leakage {}",
                        self.display.currency,
                        self.display.rate,
                        self.display.budget,
                        self.display.total_cost,
                        self.display.net_profit,
                        self.display.leakage
                    ),
                    ui::StyleType::Subtle
                )
            ));
        }

        let labor: Vec<_> = self
            .rows
            .iter()
            .filter_map(|row| match row {
                CostRow::Labor(labor) => Some(labor),
                CostRow::Expense(_) => None,
            })
            .collect();
        if !labor.is_empty() {
            let mut people = ui::new_styled_table();
            people.set_header(vec![
                ui::header_cell("Person"),
                ui::header_cell("Task"),
                ui::header_cell("Logged (h)"),
                ui::header_cell("Approved (h)"),
                ui::header_cell("Non-billable (h)"),
                ui::header_cell("Rate"),
                ui::header_cell("Cost"),
            ]);
            for row in labor {
                people.add_row(vec![
                    Cell::new(&row.user_email),
                    Cell::new(row.task_title.as_deref().unwrap_or("-")),
                    ui::amount_cell(row.logged_hours),
                    ui::amount_cell(row.approved_hours),
                    ui::amount_cell(row.non_billable_hours),
                    Cell::new(row.display_rate.to_string()),
                    ui::amount_cell(row.cost.amount),
                ]);
            }
            output.push_str(&format!("{people}\n"));
        }

        if !self.rates.is_complete() {
            output.push_str(&rate_warning(self));
        }
        output
    }
}

pub(crate) fn rate_warning(report: &ProfitabilityReport) -> String {
    let mut missing = report.rates.pending.clone();
    missing.extend(report.rates.unavailable.iter().cloned());
    format!(
        "{}\n",
        ui::style_text(
            &format!(
                "Rates missing for {}; those figures use a rate of 1.0",
                missing.join(", ")
            ),
            ui::StyleType::Warning
        )
    )
}
