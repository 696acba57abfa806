//! Run domain types
//!
//! A run is one execution attempt of a site's handler, bounded by a
//! begin/complete pair in the scheduler's run registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run state of a single site
///
/// `active == true` always implies `status == RunStatus::Running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub site_id: String,
    pub active: bool,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RunRecord {
    /// Record for a site that has never been started
    pub fn never_run(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            active: false,
            status: RunStatus::NeverRun,
            started_at: None,
            ended_at: None,
            last_error: None,
        }
    }

    /// Marks the start of a fresh run
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.active = true;
        self.status = RunStatus::Running;
        self.started_at = Some(now);
        self.ended_at = None;
        self.last_error = None;
    }

    /// Marks the end of the current run
    pub fn finish(&mut self, now: DateTime<Utc>, outcome: RunOutcome, error: Option<String>) {
        self.active = false;
        self.ended_at = Some(now);
        match outcome {
            RunOutcome::Succeeded => {
                self.status = RunStatus::Succeeded;
                self.last_error = None;
            }
            RunOutcome::Failed => {
                self.status = RunStatus::Failed;
                self.last_error = Some(error.unwrap_or_else(|| "unknown error".to_string()));
            }
        }
    }

    /// Wall-clock duration of the last finished run
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Status of a site's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    NeverRun,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::NeverRun => write!(f, "never-run"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome passed when completing a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}
