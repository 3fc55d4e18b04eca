//! Input records the engine reads. They are owned by the entity services and
//! never mutated here.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum BillingModel {
    #[default]
    FixedPrice,
    Retainer,
    TimeAndMaterials,
    NonBillable,
}

impl From<&str> for BillingModel {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "retainer" => BillingModel::Retainer,
            "time_and_materials" | "time_and_material" | "t&m" | "tm" => {
                BillingModel::TimeAndMaterials
            }
            "non_billable" => BillingModel::NonBillable,
            _ => BillingModel::FixedPrice,
        }
    }
}

impl From<String> for BillingModel {
    fn from(s: String) -> Self {
        BillingModel::from(s.as_str())
    }
}

impl Display for BillingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BillingModel::FixedPrice => "Fixed price",
                BillingModel::Retainer => "Retainer",
                BillingModel::TimeAndMaterials => "Time & materials",
                BillingModel::NonBillable => "Non-billable",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum RetainerPeriod {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl From<&str> for RetainerPeriod {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "week" | "weekly" => RetainerPeriod::Week,
            "quarter" | "quarterly" => RetainerPeriod::Quarter,
            "year" | "yearly" | "annual" | "annually" => RetainerPeriod::Year,
            _ => RetainerPeriod::Month,
        }
    }
}

impl From<String> for RetainerPeriod {
    fn from(s: String) -> Self {
        RetainerPeriod::from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ProjectStatus {
    Planning,
    #[default]
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl From<&str> for ProjectStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "planning" => ProjectStatus::Planning,
            "on_hold" | "onhold" | "paused" => ProjectStatus::OnHold,
            "completed" | "complete" | "done" | "closed" => ProjectStatus::Completed,
            "cancelled" | "canceled" => ProjectStatus::Cancelled,
            _ => ProjectStatus::Active,
        }
    }
}

impl From<String> for ProjectStatus {
    fn from(s: String) -> Self {
        ProjectStatus::from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl From<&str> for RiskLevel {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => RiskLevel::Critical,
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(s: String) -> Self {
        RiskLevel::from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Missed,
}

impl From<&str> for MilestoneStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "in_progress" | "active" => MilestoneStatus::InProgress,
            "completed" | "complete" | "done" => MilestoneStatus::Completed,
            "missed" | "overdue" => MilestoneStatus::Missed,
            _ => MilestoneStatus::Pending,
        }
    }
}

impl From<String> for MilestoneStatus {
    fn from(s: String) -> Self {
        MilestoneStatus::from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum TimesheetStatus {
    Draft,
    #[default]
    Submitted,
    Approved,
    Rejected,
}

impl From<&str> for TimesheetStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "draft" => TimesheetStatus::Draft,
            "approved" => TimesheetStatus::Approved,
            "rejected" => TimesheetStatus::Rejected,
            _ => TimesheetStatus::Submitted,
        }
    }
}

impl From<String> for TimesheetStatus {
    fn from(s: String) -> Self {
        TimesheetStatus::from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "in_progress" | "review" | "in_review" => TaskStatus::InProgress,
            "done" | "completed" | "complete" | "closed" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        TaskStatus::from(s.as_str())
    }
}

/// Explicit classification a task may carry instead of relying on its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Feature,
    Bug,
    Rework,
}

/// Explicit classification an expense may carry instead of relying on its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Purchase,
    Travel,
    Subscription,
    Adjustment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub billing_model: BillingModel,
    pub contract_amount: Option<f64>,
    /// Legacy total used when `contract_amount` is absent.
    pub budget: Option<f64>,
    pub retainer_amount: Option<f64>,
    #[serde(default)]
    pub retainer_period: RetainerPeriod,
    #[serde(default, deserialize_with = "lenient_date")]
    pub contract_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub contract_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    /// Estimated effort in hours, used by time-and-materials contracts.
    pub estimated_duration: Option<f64>,
    pub default_bill_rate_per_hour: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub status: ProjectStatus,
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: f64,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub budget_value: f64,
    #[serde(default)]
    pub expense_budget: f64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MilestoneStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub kind: Option<TaskKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimesheetEntry {
    pub user_email: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub milestone_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub total_minutes: f64,
    #[serde(default)]
    pub is_billable: bool,
    #[serde(default)]
    pub status: TimesheetStatus,
    /// Cost captured when the entry was logged.
    pub snapshot_total_cost: Option<f64>,
    /// Rate captured when the entry was logged.
    #[serde(alias = "snapshot_rate")]
    pub snapshot_hourly_rate: Option<f64>,
    /// Live rate stored on the entry.
    pub hourly_rate: Option<f64>,
}

/// The charge an entry resolves to, in the user's native currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Charge {
    /// A precomputed total for the entry.
    Total(f64),
    /// An hourly rate to multiply by the entry's hours.
    Hourly(f64),
}

impl TimesheetEntry {
    pub fn hours(&self) -> f64 {
        if self.total_minutes.is_finite() && self.total_minutes > 0.0 {
            self.total_minutes / 60.0
        } else {
            0.0
        }
    }

    /// Whether the entry counts towards realized cost.
    pub fn is_approved_billable(&self) -> bool {
        self.is_billable && self.status == TimesheetStatus::Approved
    }

    /// Resolves the entry's charge: snapshot total, snapshot rate, live rate,
    /// then the user's current profile rate. Zero values are skipped.
    pub fn resolve_charge(&self, profile_rate: f64) -> Charge {
        let positive = |v: Option<f64>| v.filter(|r| r.is_finite() && *r > 0.0);

        if let Some(total) = positive(self.snapshot_total_cost) {
            return Charge::Total(total);
        }
        positive(self.snapshot_hourly_rate)
            .or_else(|| positive(self.hourly_rate))
            .map(Charge::Hourly)
            .unwrap_or(Charge::Hourly(finite_non_negative(profile_rate)))
    }

    /// Native-currency cost of the entry for the given charge.
    pub fn native_cost(&self, charge: Charge) -> f64 {
        match charge {
            Charge::Total(total) => total,
            Charge::Hourly(rate) => self.hours() * rate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub project_id: String,
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    pub currency: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub vendor: Option<String>,
    pub kind: Option<ExpenseKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub hourly_rate: f64,
    /// Currency the hourly rate is denominated in.
    pub ctc_currency: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn finite_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Parses `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Dates that are missing or unparsable deserialize to `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}
