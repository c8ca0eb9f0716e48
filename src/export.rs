//! Export and import of a user's diary as a single JSON document.
//!
//! The document layout is
//! `{user: {name, email, sheetId}, entries: [...], exportDate}`, where each
//! entry uses the same record shape as local storage. Exports are written to
//! `space-diary-<name>-<YYYY-MM-DD>.json`.

use crate::backend::records::EntryRecord;
use crate::constants::{DATE_FORMAT_ISO, EXPORT_FILE_PREFIX, STORAGE_FILE_EXTENSION};
use crate::errors::{AppError, AppResult};
use crate::model::{collapse_whitespace, DiaryEntry, Identity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The exporting user, as recorded in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub sheet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub user: ExportedUser,
    pub entries: Vec<EntryRecord>,
    pub export_date: String,
}

impl ExportDocument {
    pub fn build(identity: &Identity, entries: &[DiaryEntry], now: DateTime<Utc>) -> Self {
        Self {
            user: ExportedUser {
                name: identity.name.clone(),
                email: identity.email.clone(),
                sheet_id: identity.sheet_id.clone(),
            },
            entries: entries.iter().map(EntryRecord::from_entry).collect(),
            export_date: now.to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Validation(format!("Failed to encode export: {}", e)))
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Not a diary export: {}", e)))
    }

    /// Decodes the exported records as entries owned by `user_id`.
    pub fn into_entries(self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
        self.entries
            .into_iter()
            .map(|record| record.into_entry(user_id, "export"))
            .collect()
    }
}

/// File name for an export made by `name` on `date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use spacediary::export::export_filename;
///
/// let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
/// assert_eq!(export_filename("John  Doe", date), "space-diary-John-Doe-2024-05-06.json");
/// ```
pub fn export_filename(name: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}-{}.{}",
        EXPORT_FILE_PREFIX,
        collapse_whitespace(name.trim(), "-"),
        date.format(DATE_FORMAT_ISO),
        STORAGE_FILE_EXTENSION
    )
}

/// Writes `document` into `dir` under its conventional file name.
///
/// The file is written to a temporary sibling first and renamed into place.
///
/// # Errors
///
/// Returns an error if `dir` does not exist or is not writable, or if the
/// document cannot be encoded.
pub fn write_export(document: &ExportDocument, dir: &Path, date: NaiveDate) -> AppResult<PathBuf> {
    let path = dir.join(export_filename(&document.user.name, date));
    let json = document.to_json()?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(json.as_bytes())?;
    temp.flush()?;
    temp.persist(&path).map_err(|e| AppError::Io(e.error))?;

    info!(
        "Exported {} entries to {:?}",
        document.entries.len(),
        path
    );
    Ok(path)
}

pub fn read_export(path: &Path) -> AppResult<ExportDocument> {
    debug!("Reading export {:?}", path);
    let raw = fs::read_to_string(path)?;
    ExportDocument::from_json(&raw)
}
