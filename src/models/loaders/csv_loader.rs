//! CSV job-list loader
//!
//! Reads the batch input file: one process identifier per row, taken from
//! the `DSProcesso` column.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{AppError, AppResult, FileError};

/// Column carrying the process identifier
const IDENTIFIER_COLUMN: &str = "DSProcesso";

/// Loads all process identifiers from a CSV file
///
/// Blank cells are skipped; surrounding whitespace is trimmed.
pub fn load_identifiers_csv(path: impl AsRef<Path>) -> AppResult<Vec<String>> {
    let path = path.as_ref();
    let path_display = path.display().to_string();

    if !path.exists() {
        return Err(AppError::File(FileError::NotFound { path: path_display }));
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::File(FileError::CsvParseFailed {
            path: path_display.clone(),
            source: Box::new(e),
        })
    })?;

    let headers = reader.headers().map_err(|e| {
        AppError::File(FileError::CsvParseFailed {
            path: path_display.clone(),
            source: Box::new(e),
        })
    })?;
    let column = headers
        .iter()
        .position(|h| h.trim() == IDENTIFIER_COLUMN)
        .ok_or_else(|| {
            AppError::File(FileError::MissingColumn {
                path: path_display.clone(),
                column: IDENTIFIER_COLUMN.to_string(),
            })
        })?;

    let mut identifiers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            AppError::File(FileError::CsvParseFailed {
                path: path_display.clone(),
                source: Box::new(e),
            })
        })?;
        if let Some(value) = record.get(column) {
            let value = value.trim();
            if !value.is_empty() {
                identifiers.push(value.to_string());
            }
        }
    }

    debug!("{}: {} identifiers loaded", path_display, identifiers.len());
    info!("✓ {} processos carregados de {}", identifiers.len(), path_display);
    Ok(identifiers)
}
