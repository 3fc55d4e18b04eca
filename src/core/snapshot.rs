//! Snapshot of the records one project report is computed from.

use crate::core::model::{ExpenseRecord, Milestone, Project, Task, TimesheetEntry, UserProfile};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: Project,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub timesheets: Vec<TimesheetEntry>,
    #[serde(default)]
    pub expenses: Vec<ExpenseRecord>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
}

impl ProjectSnapshot {
    /// Every currency a report over this snapshot may need a rate for.
    pub fn currencies(&self) -> BTreeSet<String> {
        let mut currencies = BTreeSet::new();
        currencies.insert(self.project.currency.clone());
        currencies.extend(self.users.iter().filter_map(|u| u.ctc_currency.clone()));
        currencies.extend(self.expenses.iter().filter_map(|e| e.currency.clone()));
        currencies.retain(|c| !c.is_empty());
        currencies
    }
}

/// Read access to the entity service, filtered to one project.
#[async_trait]
pub trait EntityReader: Send + Sync {
    async fn fetch_snapshot(&self, project_id: &str) -> Result<ProjectSnapshot>;
}
