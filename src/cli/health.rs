use super::ui;
use crate::core::ProfitabilityReport;
use crate::core::health::HealthFormula;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use serde::Serialize;

#[derive(Serialize)]
struct HealthView<'a> {
    project_id: &'a str,
    milestone_scope: Option<&'a str>,
    health: &'a crate::core::health::HealthScore,
    insights: Vec<String>,
    rates_complete: bool,
}

/// Prints the health score, its factors and any leakage insights.
pub fn run(report: &ProfitabilityReport, json: bool) -> Result<()> {
    if json {
        let view = HealthView {
            project_id: &report.project_id,
            milestone_scope: report.milestone_scope.as_deref(),
            health: &report.health,
            insights: report.insight_messages(),
            rates_complete: report.rates.is_complete(),
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    println!("{}", display_health(report));
    Ok(())
}

pub fn display_health(report: &ProfitabilityReport) -> String {
    let health = &report.health;
    let mut output = String::new();

    output.push_str(&format!(
        "{}\n",
        ui::style_text(
            &format!("Health of {} ({})", report.project_name, report.project_id),
            ui::StyleType::Title
        )
    ));
    let formula = match health.formula {
        HealthFormula::Retainer => "retainer",
        HealthFormula::Standard => "standard",
    };
    output.push_str(&format!(
        "{}: {}/100 {} ({} formula)\n",
        ui::style_text("Score", ui::StyleType::TotalLabel),
        health.score,
        ui::tier_text(health.tier),
        formula
    ));

    if !health.factors.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Factor"), ui::header_cell("Points")]);
        for factor in &health.factors {
            table.add_row(vec![
                Cell::new(&factor.label),
                Cell::new(format!("{:+.1}", factor.points)).set_alignment(CellAlignment::Right),
            ]);
        }
        output.push_str(&format!("{table}\n"));
    }

    let messages = report.insight_messages();
    if messages.is_empty() {
        output.push_str(&ui::style_text("No leakage signals", ui::StyleType::Subtle));
        output.push('\n');
    } else {
        output.push_str(&format!(
            "{}\n",
            ui::style_text("Insights", ui::StyleType::TotalLabel)
        ));
        for message in messages {
            output.push_str(&format!("  - {message}\n"));
        }
    }

    if !report.rates.is_complete() {
        output.push_str(&super::report::rate_warning(report));
    }
    output
}
