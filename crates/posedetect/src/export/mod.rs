//! Durable result exports.
//!
//! Both formats consume the same [`ExportBatch`] and are selected through
//! [`ExportFormat`]. Files are rendered fully in memory and then moved into
//! place, so a failed export never leaves a truncated file at the destination.

pub mod csv;
pub mod json;

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use pose_core::{PoseResult, ProcessingStats};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Json, ExportFormat::Csv];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Serialize the batch into the format's byte representation.
    pub fn render(self, batch: &ExportBatch<'_>) -> Result<Vec<u8>, ExportError> {
        match self {
            ExportFormat::Json => json::render(batch),
            ExportFormat::Csv => Ok(csv::render(batch.results)),
        }
    }

    /// Render and atomically write the batch to `destination`.
    pub fn export(self, batch: &ExportBatch<'_>, destination: &Path) -> Result<PathBuf, ExportError> {
        let bytes = self.render(batch)?;
        write_atomic(destination, &bytes)?;
        info!(
            format = %self,
            results = batch.results.len(),
            path = %destination.display(),
            "results exported"
        );
        Ok(destination.to_path_buf())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Everything an exporter needs. `exported_at` is supplied by the caller so
/// that identical inputs render to identical bytes.
#[derive(Debug, Clone, Copy)]
pub struct ExportBatch<'a> {
    pub results: &'a [PoseResult],
    pub stats: &'a ProcessingStats,
    pub exported_at: DateTime<Utc>,
}

impl<'a> ExportBatch<'a> {
    pub fn new(results: &'a [PoseResult], stats: &'a ProcessingStats) -> Self {
        Self {
            results,
            stats,
            exported_at: Utc::now(),
        }
    }

    pub fn at(mut self, exported_at: DateTime<Utc>) -> Self {
        self.exported_at = exported_at;
        self
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize {format} export: {message}")]
    Serialize {
        format: ExportFormat,
        message: String,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path:?}: {message}")]
    Read { path: PathBuf, message: String },
}

/// Write `bytes` next to `path` in a temporary file, then rename it over
/// `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_err = |source: io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(parent).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = write_atomic(&path, b"data").unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn formats_parse_from_cli_names() {
        assert_eq!(ExportFormat::from_str("json", true).unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::from_str("CSV", true).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
    }
}
