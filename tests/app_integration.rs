use std::fs;
use std::path::Path;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_rate_server(from: &str, to: &str, rate: f64) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rate"))
            .and(query_param("from", from))
            .and(query_param("to", to))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(format!(r#"{{"rate": {rate}}}"#)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        mock_server
    }
}

const SNAPSHOT: &str = r#"
projects:
  - id: "p1"
    name: "Mobile App"
    currency: "USD"
    billing_model: "fixed_price"
    contract_amount: 12000
    start_date: "2024-01-01"
    progress: 50
  - id: "p2"
    name: "Support"
    currency: "USD"
    billing_model: "retainer"
    retainer_amount: 2000
    retainer_period: "month"
    contract_start_date: "2024-01-01"
milestones:
  - id: "m1"
    project_id: "p1"
    name: "MVP"
    budget_value: 8000
    expense_budget: 1000
timesheets:
  - user_email: "ana@x.io"
    project_id: "p1"
    milestone_id: "m1"
    total_minutes: 600
    is_billable: true
    status: "approved"
  - user_email: "ana@x.io"
    project_id: "p2"
    total_minutes: 60
    is_billable: true
    status: "approved"
expenses:
  - project_id: "p1"
    milestone_id: "m1"
    amount: 32000
    currency: "INR"
    description: "Device lab"
users:
  - email: "ana@x.io"
    hourly_rate: 5000
    ctc_currency: "INR"
"#;

fn write_workspace(dir: &Path, providers: &str) -> String {
    fs::write(dir.join("snapshot.yaml"), SNAPSHOT).expect("Failed to write snapshot");
    let config_path = dir.join("config.yaml");
    let config_content = format!(
        r#"
currency: "USD"
snapshot_path: "snapshot.yaml"
default_project: "p1"
providers:
{providers}
"#
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_string_lossy().into_owned()
}

#[test_log::test(tokio::test)]
async fn test_report_flow_with_rate_service_mock() {
    let mock_server = test_utils::create_rate_server("INR", "USD", 0.0125).await;
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_workspace(
        dir.path(),
        &format!("  rate_service:\n    base_url: \"{}\"", mock_server.uri()),
    );

    let result = marginal::run_command(
        marginal::AppCommand::Report,
        &marginal::ReportOptions::default(),
        Some(&config_path),
    )
    .await;
    assert!(
        result.is_ok(),
        "Report command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_health_flow_with_fixed_rates() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_workspace(
        dir.path(),
        "  fixed:\n    rates:\n      \"INR/USD\": 0.0125\n      \"USD/EUR\": 0.8",
    );

    for options in [
        marginal::ReportOptions {
            milestone: Some("m1".to_string()),
            json: true,
            ..Default::default()
        },
        marginal::ReportOptions {
            project: Some("p2".to_string()),
            currency: Some("EUR".to_string()),
            ..Default::default()
        },
    ] {
        let result = marginal::run_command(
            marginal::AppCommand::Health,
            &options,
            Some(&config_path),
        )
        .await;
        assert!(
            result.is_ok(),
            "Health command failed with: {:?}",
            result.err()
        );
    }
}

#[test_log::test(tokio::test)]
async fn test_report_survives_rate_outage() {
    let mock_server = wiremock::MockServer::start().await;
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_workspace(
        dir.path(),
        &format!("  rate_service:\n    base_url: \"{}\"", mock_server.uri()),
    );

    // No mounted routes: every rate request answers 404.
    let result = marginal::run_command(
        marginal::AppCommand::Report,
        &marginal::ReportOptions {
            json: true,
            ..Default::default()
        },
        Some(&config_path),
    )
    .await;
    assert!(result.is_ok(), "Report should degrade, got: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_unknown_project_and_milestone_fail() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = write_workspace(dir.path(), "  fixed:\n    rates: {}");

    let missing_project = marginal::run_command(
        marginal::AppCommand::Report,
        &marginal::ReportOptions {
            project: Some("nope".to_string()),
            ..Default::default()
        },
        Some(&config_path),
    )
    .await;
    assert!(
        missing_project
            .unwrap_err()
            .to_string()
            .contains("Project nope not found")
    );

    let missing_milestone = marginal::run_command(
        marginal::AppCommand::Report,
        &marginal::ReportOptions {
            milestone: Some("m9".to_string()),
            ..Default::default()
        },
        Some(&config_path),
    )
    .await;
    assert!(
        missing_milestone
            .unwrap_err()
            .to_string()
            .contains("Milestone m9 not found")
    );
}
