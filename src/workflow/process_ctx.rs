//! Job context
//!
//! Captures "which process identifier am I searching, as which job of the
//! batch" plus the optional date range.

use std::fmt::Display;

use crate::models::DateRange;

/// Context for one job
#[derive(Debug, Clone)]
pub struct ProcessCtx {
    /// Process identifier used as the search key
    pub identifier: String,

    /// Position within the batch (1-based, unique per run)
    pub job_index: usize,

    /// Optional explicit-period pair for the date-range variant
    pub date_range: Option<DateRange>,
}

impl ProcessCtx {
    pub fn new(identifier: String, job_index: usize, date_range: Option<DateRange>) -> Self {
        Self {
            identifier,
            job_index,
            date_range,
        }
    }

    /// Filesystem-safe namespace for this job's temp artifacts.
    ///
    /// Prefixed with the job index so two jobs never share a namespace even
    /// if the same identifier is submitted twice in one batch.
    pub fn artifact_namespace(&self, attempt: usize) -> String {
        let slug: String = self
            .identifier
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}-{}-a{}", self.job_index, slug, attempt)
    }
}

impl Display for ProcessCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {} #{}", self.job_index, self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_filesystem_safe() {
        let ctx = ProcessCtx::new("12345.678901/2024-00".to_string(), 1, None);
        let namespace = ctx.artifact_namespace(0);
        assert!(!namespace.contains('/'));
        assert!(!namespace.contains('.'));
        assert_eq!(namespace, "1-12345-678901-2024-00-a0");
    }

    #[test]
    fn namespaces_differ_across_jobs_and_attempts() {
        let first = ProcessCtx::new("x".to_string(), 1, None);
        let second = ProcessCtx::new("x".to_string(), 2, None);
        assert_ne!(first.artifact_namespace(0), second.artifact_namespace(0));
        assert_ne!(first.artifact_namespace(0), first.artifact_namespace(1));
    }
}
