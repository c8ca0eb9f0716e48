//! Wire records and the decode step at the storage boundary.
//!
//! Backing stores hand back loosely typed JSON. Every record is decoded into
//! one of the structs below and validated before it becomes a `DiaryEntry` or
//! an `Identity`; anything malformed is rejected with
//! `StorageError::MalformedRecord` instead of leaking a partial record.

use crate::constants::DATE_FORMAT_ISO;
use crate::errors::{AppError, AppResult, StorageError};
use crate::model::{DiaryEntry, Identity, Mood};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entry as persisted locally and in export documents:
/// `{id, date, title, mood, content, timestamp, updatedAt}`.
///
/// Timestamps are unix milliseconds. The owner is implied by the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: String,
    pub date: String,
    pub title: String,
    pub mood: String,
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl EntryRecord {
    pub fn from_entry(entry: &DiaryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            date: entry.date.format(DATE_FORMAT_ISO).to_string(),
            title: entry.title.clone(),
            mood: entry.mood.as_emoji().to_string(),
            content: entry.content.clone(),
            timestamp: entry.created_at.timestamp_millis(),
            updated_at: Some(entry.updated_at.timestamp_millis()),
        }
    }

    /// Validates the record and attaches it to `user_id`.
    pub fn into_entry(self, user_id: &str, key: &str) -> AppResult<DiaryEntry> {
        let created_at = millis_to_datetime(self.timestamp, key)?;
        let updated_at = match self.updated_at {
            Some(ms) => millis_to_datetime(ms, key)?,
            None => created_at,
        };
        Ok(DiaryEntry {
            id: non_empty(self.id, "id", key)?,
            user_id: user_id.to_string(),
            date: decode_date(&self.date, key)?,
            title: non_empty(self.title, "title", key)?,
            mood: decode_mood(&self.mood, key)?,
            content: non_empty(self.content, "content", key)?,
            created_at,
            updated_at,
        })
    }
}

/// A row of the hosted `diary_entries` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub title: String,
    pub mood: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl EntryRow {
    pub fn from_entry(entry: &DiaryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            date: entry.date.format(DATE_FORMAT_ISO).to_string(),
            title: entry.title.clone(),
            mood: entry.mood.as_emoji().to_string(),
            content: entry.content.clone(),
            created_at: entry.created_at.to_rfc3339(),
            updated_at: Some(entry.updated_at.to_rfc3339()),
        }
    }

    pub fn into_entry(self, key: &str) -> AppResult<DiaryEntry> {
        let created_at = decode_rfc3339(&self.created_at, key)?;
        let updated_at = match self.updated_at.as_deref() {
            Some(raw) => decode_rfc3339(raw, key)?,
            None => created_at,
        };
        Ok(DiaryEntry {
            id: non_empty(self.id, "id", key)?,
            user_id: non_empty(self.user_id, "user_id", key)?,
            date: decode_date(&self.date, key)?,
            title: non_empty(self.title, "title", key)?,
            mood: decode_mood(&self.mood, key)?,
            content: non_empty(self.content, "content", key)?,
            created_at,
            updated_at,
        })
    }
}

/// A row of the hosted `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub sheet_id: Option<String>,
}

impl ProfileRow {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar.clone(),
            sheet_id: identity.sheet_id.clone(),
        }
    }

    pub fn into_identity(self, key: &str) -> AppResult<Identity> {
        Ok(Identity {
            id: non_empty(self.id, "id", key)?,
            name: self.name,
            email: non_empty(self.email, "email", key)?,
            avatar: self.avatar_url,
            sheet_id: self.sheet_id,
        })
    }
}

/// Decodes a list of untyped JSON values, rejecting the whole batch on the
/// first value that does not match `T`.
pub fn decode_all<T: DeserializeOwned>(values: Vec<Value>, key: &str) -> AppResult<Vec<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value)
                .map_err(|e| AppError::from(malformed(key, format!("record {}: {}", index, e))))
        })
        .collect()
}

/// Parses `raw` as a JSON array of records of type `T`.
pub fn decode_list<T: DeserializeOwned>(raw: &str, key: &str) -> AppResult<Vec<T>> {
    let values: Vec<Value> = serde_json::from_str(raw)
        .map_err(|e| malformed(key, format!("expected a JSON array: {}", e)))?;
    decode_all(values, key)
}

pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> StorageError {
    StorageError::MalformedRecord {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(value: String, field: &str, key: &str) -> AppResult<String> {
    if value.trim().is_empty() {
        return Err(malformed(key, format!("empty {}", field)).into());
    }
    Ok(value)
}

fn decode_date(raw: &str, key: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT_ISO)
        .map_err(|e| malformed(key, format!("bad date '{}': {}", raw, e)).into())
}

fn decode_mood(raw: &str, key: &str) -> AppResult<Mood> {
    raw.parse::<Mood>()
        .map_err(|_| malformed(key, format!("unknown mood '{}'", raw)).into())
}

fn decode_rfc3339(raw: &str, key: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(key, format!("bad timestamp '{}': {}", raw, e)).into())
}

fn millis_to_datetime(ms: i64, key: &str) -> AppResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| malformed(key, format!("timestamp out of range: {}", ms)).into())
}
