//! Change and failure records, and the terminal task result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::ValueStore;

/// Outcome of a single successful (or skipped) action step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Created,
    Replaced,
    Modified,
    Extended,
    Skipped,
    Deleted,
    Executed,
    Installed,
    Cloned,
}

/// Append-only record of one applied (or skipped) mutation.
///
/// A record with a status other than [`ChangeStatus::Skipped`] is appended
/// only after the mutation actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Action kind that produced this record (`add`, `copy`, …).
    pub kind: String,
    pub status: ChangeStatus,
    /// Destination path, relative to the run root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Captured stdout, for `exec`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Repository identifier, for `clone`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Installed package list, for `install`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

impl ChangeRecord {
    pub fn new(kind: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            kind: kind.into(),
            status,
            dest: None,
            stdout: None,
            repository: None,
            dependencies: None,
        }
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Whether this record marks a skipped step rather than a mutation.
    pub fn is_skip(&self) -> bool {
        self.status == ChangeStatus::Skipped
    }
}

/// Record of one action that failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Action kind that failed.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    pub error: String,
}

impl FailureRecord {
    pub fn new(kind: impl Into<String>, dest: Option<String>, error: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            dest,
            error: error.into(),
        }
    }
}

/// Terminal result of one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Unique id for this run.
    pub run_id: Uuid,
    /// The resolved value set the run ended with.
    pub values: ValueStore,
    pub changes: Vec<ChangeRecord>,
    pub failures: Vec<FailureRecord>,
    /// Fatal error that halted the run, when the owning task did not
    /// escalate it into a returned `Err`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            values: ValueStore::new(),
            changes: Vec::new(),
            failures: Vec::new(),
            error: None,
            started_at,
            completed_at: started_at,
        }
    }

    /// Whether the run completed without failures or a fatal error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failures.is_empty()
    }
}
