//! Job and result data model
//!
//! A `ProcessJob` is the mutable in-flight record owned by exactly one
//! state-machine instance; once terminal it is frozen into a
//! `ProcessReport`, the unit the scheduler aggregates and the store
//! persists.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FlowError;

/// Lifecycle status of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Challenge solved and at least one row extracted
    Success,
    /// Challenge solved but the portal returned zero rows
    NoResults,
    /// Retry budget exhausted
    Error,
}

impl JobStatus {
    /// Terminal statuses that a rerun must not re-dispatch.
    /// Error entries stay retryable.
    pub fn is_completed(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::NoResults)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::NoResults | JobStatus::Error
        )
    }
}

/// One scraped listing row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub title: String,
    pub link: Url,
}

/// Optional explicit-period pair written into the search form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Mutable per-job state, owned by the state-machine instance driving it
#[derive(Clone, Debug)]
pub struct ProcessJob {
    pub identifier: String,
    pub status: JobStatus,
    pub retry_count: usize,
    pub last_error: Option<String>,
}

impl ProcessJob {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Pending,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Marks the job running and counts the attempt
    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::Running;
        self.retry_count += 1;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn succeed(self, results: Vec<ResultRecord>) -> ProcessReport {
        ProcessReport {
            identifier: self.identifier,
            status: JobStatus::Success,
            results,
            error: None,
        }
    }

    pub fn no_results(self) -> ProcessReport {
        ProcessReport {
            identifier: self.identifier,
            status: JobStatus::NoResults,
            results: Vec::new(),
            error: None,
        }
    }

    /// Terminal error after the retry budget is gone; keeps the last
    /// underlying failure message
    pub fn exhausted(self) -> ProcessReport {
        let message = FlowError::RetriesExhausted {
            attempts: self.retry_count,
            last_error: self
                .last_error
                .unwrap_or_else(|| "unknown error".to_string()),
        };
        ProcessReport {
            identifier: self.identifier,
            status: JobStatus::Error,
            results: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

/// Immutable terminal record for one job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessReport {
    pub identifier: String,
    pub status: JobStatus,
    pub results: Vec<ResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessReport {
    /// Terminal error that never reached the retry loop (e.g. the session
    /// could not be opened)
    pub fn failed(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: JobStatus::Error,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}
