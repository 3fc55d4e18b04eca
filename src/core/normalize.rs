//! Turns raw timesheet and expense records into cost rows expressed in the
//! project's currency.
use crate::core::model::{
    Charge, ExpenseKind, ExpenseRecord, Milestone, Task, TimesheetEntry, UserProfile,
};
use crate::core::money::{Money, finite_or_zero, ratio};
use crate::core::rates::RateLookup;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Labor aggregated per `(user, milestone, task)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaborRow {
    pub user_email: String,
    pub milestone_id: Option<String>,
    pub task_id: Option<String>,
    pub task_title: Option<String>,
    pub logged_hours: f64,
    pub approved_hours: f64,
    pub non_billable_hours: f64,
    /// Realized cost of approved billable entries, in the project currency.
    pub cost: Money,
    /// Cost of every logged entry regardless of approval, in the project currency.
    pub logged_cost: Money,
    /// Realized cost in the user's own currency.
    pub original_cost: Money,
    /// Weighted hourly rate in the project currency.
    pub display_rate: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseRow {
    pub milestone_id: Option<String>,
    pub category: String,
    pub description: String,
    pub vendor: Option<String>,
    pub kind: Option<ExpenseKind>,
    pub original_cost: Money,
    pub cost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostRow {
    Labor(LaborRow),
    Expense(ExpenseRow),
}

impl CostRow {
    pub fn milestone_id(&self) -> Option<&str> {
        match self {
            CostRow::Labor(row) => row.milestone_id.as_deref(),
            CostRow::Expense(row) => row.milestone_id.as_deref(),
        }
    }

    pub fn cost(&self) -> &Money {
        match self {
            CostRow::Labor(row) => &row.cost,
            CostRow::Expense(row) => &row.cost,
        }
    }

    /// Cost including unapproved labor. Expenses have no approval step here.
    pub fn logged_cost(&self) -> &Money {
        match self {
            CostRow::Labor(row) => &row.logged_cost,
            CostRow::Expense(row) => &row.cost,
        }
    }

    pub fn is_labor(&self) -> bool {
        matches!(self, CostRow::Labor(_))
    }
}

/// Records for one project, borrowed from a snapshot.
pub struct NormalizeInput<'a> {
    pub timesheets: &'a [TimesheetEntry],
    pub expenses: &'a [ExpenseRecord],
    pub users: &'a [UserProfile],
    pub tasks: &'a [Task],
    pub milestones: &'a [Milestone],
    pub project_currency: &'a str,
}

struct LaborGroup {
    row: LaborRow,
    profile_rate: f64,
    last_rate: f64,
}

/// Produces labor rows followed by expense rows.
pub fn normalize(input: &NormalizeInput<'_>, rates: &dyn RateLookup) -> Vec<CostRow> {
    let known_milestones: HashSet<&str> = input.milestones.iter().map(|m| m.id.as_str()).collect();
    let attribute = |milestone_id: Option<&String>| -> Option<String> {
        let id = milestone_id.filter(|id| !id.is_empty())?;
        if known_milestones.contains(id.as_str()) {
            Some(id.clone())
        } else {
            warn!("Unknown milestone {} on record, treating as unassigned", id);
            None
        }
    };

    let mut rows: Vec<CostRow> = normalize_labor(input, rates, &attribute)
        .into_iter()
        .map(CostRow::Labor)
        .collect();
    rows.extend(
        normalize_expenses(input, rates, &attribute)
            .into_iter()
            .map(CostRow::Expense),
    );
    rows
}

fn normalize_labor(
    input: &NormalizeInput<'_>,
    rates: &dyn RateLookup,
    attribute: &dyn Fn(Option<&String>) -> Option<String>,
) -> Vec<LaborRow> {
    let project_currency = input.project_currency;
    let profiles: HashMap<String, &UserProfile> = input
        .users
        .iter()
        .map(|u| (u.email.to_lowercase(), u))
        .collect();
    let task_titles: HashMap<&str, &str> = input
        .tasks
        .iter()
        .map(|t| (t.id.as_str(), t.title.as_str()))
        .collect();

    let mut index: HashMap<(String, Option<String>, Option<String>), usize> = HashMap::new();
    let mut groups: Vec<LaborGroup> = Vec::new();

    for entry in input.timesheets {
        let email = entry.user_email.to_lowercase();
        let profile = profiles.get(&email);
        let native_currency = profile
            .and_then(|p| p.ctc_currency.as_deref())
            .filter(|c| !c.is_empty())
            .unwrap_or(project_currency);
        let profile_rate = profile.map_or(0.0, |p| finite_or_zero(p.hourly_rate));
        let fx = rates.rate(native_currency, project_currency);

        let milestone_id = attribute(entry.milestone_id.as_ref());
        let task_id = entry.task_id.clone().filter(|t| !t.is_empty());
        let key = (email, milestone_id.clone(), task_id.clone());

        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(LaborGroup {
                row: LaborRow {
                    user_email: entry.user_email.clone(),
                    milestone_id,
                    task_title: task_id
                        .as_deref()
                        .and_then(|id| task_titles.get(id))
                        .map(|t| t.to_string()),
                    task_id,
                    logged_hours: 0.0,
                    approved_hours: 0.0,
                    non_billable_hours: 0.0,
                    cost: Money::zero(project_currency),
                    logged_cost: Money::zero(project_currency),
                    original_cost: Money::zero(native_currency),
                    display_rate: Money::zero(project_currency),
                },
                profile_rate: profile_rate * fx,
                last_rate: 0.0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        let hours = entry.hours();
        let charge = entry.resolve_charge(profile_rate);
        let native_cost = finite_or_zero(entry.native_cost(charge));
        let converted_cost = native_cost * fx;
        let converted_rate = match charge {
            Charge::Hourly(rate) => rate * fx,
            Charge::Total(total) => ratio(total, hours).unwrap_or(0.0) * fx,
        };

        group.row.logged_hours += hours;
        group.row.logged_cost.add_amount(converted_cost);
        if !entry.is_billable {
            group.row.non_billable_hours += hours;
        }
        if entry.is_approved_billable() {
            group.row.approved_hours += hours;
            group.row.cost.add_amount(converted_cost);
            group.row.original_cost.add_amount(native_cost);
        }
        if converted_rate > 0.0 {
            group.last_rate = converted_rate;
        }
    }

    debug!(
        "Normalized {} timesheet entries into {} labor rows",
        input.timesheets.len(),
        groups.len()
    );

    groups
        .into_iter()
        .map(|group| {
            let mut row = group.row;
            let rate = ratio(row.cost.amount, row.approved_hours)
                .or_else(|| (group.last_rate > 0.0).then_some(group.last_rate))
                .unwrap_or(group.profile_rate);
            row.display_rate = Money::new(rate, project_currency);
            row
        })
        .collect()
}

fn normalize_expenses(
    input: &NormalizeInput<'_>,
    rates: &dyn RateLookup,
    attribute: &dyn Fn(Option<&String>) -> Option<String>,
) -> Vec<ExpenseRow> {
    input
        .expenses
        .iter()
        .map(|expense| {
            let currency = expense
                .currency
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(input.project_currency);
            let amount = finite_or_zero(expense.amount);
            let original_cost = Money::new(amount, currency);
            let cost = original_cost.convert(
                rates.rate(currency, input.project_currency),
                input.project_currency,
            );
            ExpenseRow {
                milestone_id: attribute(expense.milestone_id.as_ref()),
                category: expense.category.clone(),
                description: expense.description.clone(),
                vendor: expense.vendor.clone(),
                kind: expense.kind,
                original_cost,
                cost,
            }
        })
        .collect()
}
