use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::core::model::{ExpenseRecord, Milestone, Project, Task, TimesheetEntry, UserProfile};
use crate::core::snapshot::{EntityReader, ProjectSnapshot};

/// Entity arrays as exported by the entity service.
#[derive(Debug, Default, Deserialize)]
struct EntityExport {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    milestones: Vec<Milestone>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    timesheets: Vec<TimesheetEntry>,
    #[serde(default)]
    expenses: Vec<ExpenseRecord>,
    #[serde(default)]
    users: Vec<UserProfile>,
}

/// Reads a YAML or JSON entity export and filters it to one project.
pub struct SnapshotFileReader {
    path: PathBuf,
}

impl SnapshotFileReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_export(&self) -> Result<EntityExport> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot file: {}", self.path.display()))?;

        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let export: Result<EntityExport> = if is_json {
            serde_json::from_str(&content).map_err(anyhow::Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(anyhow::Error::from)
        };
        export.with_context(|| format!("Failed to parse snapshot file: {}", self.path.display()))
    }
}

#[async_trait]
impl EntityReader for SnapshotFileReader {
    #[instrument(name = "SnapshotFileRead", skip(self))]
    async fn fetch_snapshot(&self, project_id: &str) -> Result<ProjectSnapshot> {
        let export = self.read_export().await?;

        let project = export
            .projects
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| anyhow!("Project {} not found in {}", project_id, self.path.display()))?;

        let timesheets: Vec<TimesheetEntry> = export
            .timesheets
            .into_iter()
            .filter(|t| t.project_id == project_id)
            .collect();
        let emails: HashSet<String> = timesheets
            .iter()
            .map(|t| t.user_email.to_lowercase())
            .collect();

        let snapshot = ProjectSnapshot {
            project,
            milestones: export
                .milestones
                .into_iter()
                .filter(|m| m.project_id == project_id)
                .collect(),
            tasks: export
                .tasks
                .into_iter()
                .filter(|t| t.project_id == project_id)
                .collect(),
            expenses: export
                .expenses
                .into_iter()
                .filter(|e| e.project_id == project_id)
                .collect(),
            users: export
                .users
                .into_iter()
                .filter(|u| emails.contains(&u.email.to_lowercase()))
                .collect(),
            timesheets,
        };
        debug!(
            "Loaded snapshot for {}: {} milestones, {} timesheets, {} expenses",
            project_id,
            snapshot.milestones.len(),
            snapshot.timesheets.len(),
            snapshot.expenses.len()
        );
        Ok(snapshot)
    }
}
