//! Workflow job event data model
//!
//! GitHub populates different field subsets depending on the `action`, so
//! every field here is optional and access goes through explicit presence
//! checks. Unknown action values decode to [`WorkflowJobAction::Other`]
//! instead of failing.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Lifecycle actions of a `workflow_job` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowJobAction {
    Queued,
    InProgress,
    Completed,
    #[serde(other)]
    Other,
}

impl WorkflowJobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Other => "other",
        }
    }
}

/// One unit of CI work within a workflow run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowJob {
    pub id: Option<i64>,
    pub run_id: Option<i64>,
    pub name: Option<String>,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowJob {
    /// Derive the runner registration name. A run can contain multiple jobs,
    /// so the job id is preferred for uniqueness; older deliveries without a
    /// job id fall back to the run id.
    pub fn runner_identity(&self) -> Option<String> {
        self.id
            .or(self.run_id)
            .map(|id| format!("GCP-{}", id))
    }

    /// Seconds the job spent queued, when both timestamps are present.
    pub fn queued_seconds(&self) -> Option<i64> {
        match (self.created_at, self.started_at) {
            (Some(created), Some(started)) => Some((started - created).num_seconds()),
            _ => None,
        }
    }

    /// Seconds the job spent running, when both timestamps are present.
    pub fn running_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some((completed - started).num_seconds()),
            _ => None,
        }
    }

    /// Total seconds from creation to completion, when both are present.
    pub fn total_seconds(&self) -> Option<i64> {
        match (self.created_at, self.completed_at) {
            (Some(created), Some(completed)) => Some((completed - created).num_seconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
}

/// Decoded `workflow_job` webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: Option<WorkflowJobAction>,
    pub workflow_job: Option<WorkflowJob>,
    pub installation: Option<Installation>,
    pub organization: Option<Organization>,
    pub repository: Option<Repository>,
}

impl WorkflowJobEvent {
    pub fn installation_id(&self) -> Option<i64> {
        self.installation.as_ref().and_then(|i| i.id)
    }

    pub fn org_login(&self) -> Option<&str> {
        self.organization.as_ref().and_then(|o| o.login.as_deref())
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.repository.as_ref().and_then(|r| r.name.as_deref())
    }
}
