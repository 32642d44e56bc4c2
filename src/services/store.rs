//! Result sink - capability layer
//!
//! Loads any previously persisted result collection at startup and
//! checkpoints the full known set after each job terminates, bounding crash
//! loss to the work since the last checkpoint. The file is a single JSON
//! document, overwritten in place; only the scheduler's aggregation point
//! writes it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AppError, AppResult, FileError};
use crate::models::ProcessReport;

/// Durable set of terminal records, keyed by process identifier
pub struct ResultStore {
    path: PathBuf,
    entries: Vec<ProcessReport>,
}

impl ResultStore {
    /// Loads the persisted collection, or starts empty when the file does
    /// not exist yet
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let display = path.display().to_string();
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::file_read_failed(display.clone(), e))?;
        let entries: Vec<ProcessReport> = serde_json::from_str(&contents).map_err(|e| {
            AppError::File(FileError::JsonParseFailed {
                path: display,
                source: Box::new(e),
            })
        })?;

        info!("📂 {} resultados carregados de {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    /// Whether this identifier is already recorded as completed.
    /// Error entries are retryable, so they do not count.
    pub fn is_completed(&self, identifier: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.identifier == identifier && e.status.is_completed())
    }

    pub fn report_for(&self, identifier: &str) -> Option<&ProcessReport> {
        self.entries.iter().find(|e| e.identifier == identifier)
    }

    /// Records a terminal report, replacing any previous entry with the
    /// same identifier (no two entries share an identifier)
    pub fn record(&mut self, report: ProcessReport) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.identifier == report.identifier)
        {
            Some(existing) => *existing = report,
            None => self.entries.push(report),
        }
    }

    /// Serializes the full known set and overwrites the store file
    pub fn checkpoint(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::file_write_failed(parent.display().to_string(), e)
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized)
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
