//! Secure export retrieval.
//!
//! The zip is streamed from storage into a scoped temporary file and its data
//! entry extracted into a second scoped file. The zip is removed as soon as
//! extraction ends; the extracted file lives as long as its
//! [`ExtractedExport`].

use crate::locator;
use crate::model::{CheckFailure, SecureExportRef};
use archiva_core::effects::{StorageEffects, StorageError};
use archiva_core::{DataCategory, EvidenceConfig, MetadataType, TraceabilitySecureRecord};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Errors while retrieving a secure export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Could not fetch secure export {file}: {source}")]
    Fetch { file: String, source: StorageError },
    #[error("I/O error on secure export {file}: {source}")]
    Io { file: String, source: std::io::Error },
    #[error("Invalid secure export archive {file}: {source}")]
    Archive {
        file: String,
        source: zip::result::ZipError,
    },
    #[error("Secure export {file} has no entry named {entry}")]
    MissingEntry { file: String, entry: String },
    #[error("Extraction of {file} was interrupted: {reason}")]
    Interrupted { file: String, reason: String },
}

impl ExportError {
    fn io(file: &str, source: std::io::Error) -> Self {
        Self::Io {
            file: file.to_string(),
            source,
        }
    }
}

impl From<ExportError> for CheckFailure {
    fn from(err: ExportError) -> Self {
        CheckFailure::fatal(err.to_string())
    }
}

/// The extracted NDJSON entry of a secure export, deleted on drop.
#[derive(Debug)]
pub struct ExtractedExport {
    file_name: String,
    path: TempPath,
}

impl ExtractedExport {
    /// Download and extract `export` from the default strategy.
    pub async fn download(
        storage: &dyn StorageEffects,
        config: &EvidenceConfig,
        export: &SecureExportRef,
    ) -> Result<Self, ExportError> {
        let file = export.file_name.clone();
        let mut stream = storage
            .fetch_container(&config.default_strategy, DataCategory::Logbook, &file)
            .await
            .map_err(|source| ExportError::Fetch {
                file: file.clone(),
                source,
            })?;

        let (zip_file, zip_path) = temp_file(config.tmp_dir.as_deref(), ".zip")
            .map_err(|e| ExportError::io(&file, e))?
            .into_parts();
        let mut zip_out = tokio::fs::File::from_std(zip_file);
        tokio::io::copy(&mut stream, &mut zip_out)
            .await
            .map_err(|e| ExportError::io(&file, e))?;
        zip_out.flush().await.map_err(|e| ExportError::io(&file, e))?;
        drop(zip_out);

        let file_name = file.clone();
        let entry = config.secure_export_entry.clone();
        let tmp_dir = config.tmp_dir.clone();
        let path = tokio::task::spawn_blocking(move || {
            // zip_path is dropped at the end of this closure, deleting the zip
            extract_entry(&zip_path, &file_name, &entry, tmp_dir)
        })
        .await
        .map_err(|e| ExportError::Interrupted {
            file: file.clone(),
            reason: e.to_string(),
        })??;

        debug!(file = %file, "Secure export extracted");
        Ok(Self {
            file_name: file,
            path,
        })
    }

    /// Wrap an already extracted NDJSON file.
    pub fn from_temp_path(file_name: impl Into<String>, path: TempPath) -> Self {
        Self {
            file_name: file_name.into(),
            path,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locate the record of `(object_type, id)` without blocking the runtime.
    pub async fn locate(
        &self,
        object_type: MetadataType,
        id: &str,
    ) -> Result<TraceabilitySecureRecord, CheckFailure> {
        let path = self.path.to_path_buf();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let file = File::open(&path).map_err(|e| {
                CheckFailure::fatal(format!("Could not open secure export: {e}"))
            })?;
            locator::locate(BufReader::new(file), object_type, &id)
        })
        .await
        .map_err(|e| CheckFailure::fatal(format!("Record lookup was interrupted: {e}")))?
    }
}

fn temp_file(dir: Option<&Path>, suffix: &str) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("secure-export-").suffix(suffix);
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

fn extract_entry(
    zip_path: &Path,
    file: &str,
    entry: &str,
    tmp_dir: Option<PathBuf>,
) -> Result<TempPath, ExportError> {
    let archive_file = File::open(zip_path).map_err(|e| ExportError::io(file, e))?;
    let mut archive = zip::ZipArchive::new(archive_file).map_err(|source| ExportError::Archive {
        file: file.to_string(),
        source,
    })?;
    let mut data = archive.by_name(entry).map_err(|source| match source {
        zip::result::ZipError::FileNotFound => ExportError::MissingEntry {
            file: file.to_string(),
            entry: entry.to_string(),
        },
        source => ExportError::Archive {
            file: file.to_string(),
            source,
        },
    })?;
    let mut out = temp_file(tmp_dir.as_deref(), ".jsonl").map_err(|e| ExportError::io(file, e))?;
    std::io::copy(&mut data, &mut out).map_err(|e| ExportError::io(file, e))?;
    Ok(out.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn temp_files_are_removed_on_drop() {
        let mut file = temp_file(None, ".jsonl").unwrap();
        writeln!(file, "{{}}").unwrap();
        let export = ExtractedExport::from_temp_path("f.zip", file.into_temp_path());
        let path = export.path().to_path_buf();
        assert!(path.exists());
        drop(export);
        assert!(!path.exists());
    }
}
