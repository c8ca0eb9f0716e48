//! Core diary types without any I/O.
//!
//! This module defines the identity and entry records shared by the session
//! provider, the entry store and both backing stores, together with the small
//! amount of pure logic attached to them: mood parsing, input validation and
//! sheet id generation.

use crate::constants::{DATE_FORMAT_COMPACT, DATE_FORMAT_ISO, SHEET_ID_PREFIX};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An authenticated user.
///
/// The serialized form matches the persisted session marker:
/// `{id, name, email, avatar, sheetId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub sheet_id: Option<String>,
}

/// The fixed set of mood tags an entry can carry.
///
/// Moods are stored as their emoji.
///
/// # Examples
///
/// ```
/// use spacediary::model::Mood;
///
/// let mood: Mood = "happy".parse().unwrap();
/// assert_eq!(mood, Mood::Happy);
/// assert_eq!(mood.as_emoji(), "😊");
/// assert_eq!("😢".parse::<Mood>().unwrap(), Mood::Sad);
/// assert!("grumpy".parse::<Mood>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Neutral,
    Loved,
    Energetic,
}

impl Mood {
    /// All moods in display order.
    pub const ALL: [Mood; 5] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Neutral,
        Mood::Loved,
        Mood::Energetic,
    ];

    pub fn as_emoji(&self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Sad => "😢",
            Mood::Neutral => "😐",
            Mood::Loved => "❤️",
            Mood::Energetic => "☀️",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Neutral => "Neutral",
            Mood::Loved => "Loved",
            Mood::Energetic => "Energetic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_emoji())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Emoji may arrive with or without the U+FE0F variation selector.
        let trimmed = s.trim().trim_end_matches('\u{FE0F}');
        Mood::ALL
            .iter()
            .copied()
            .find(|mood| {
                mood.as_emoji().trim_end_matches('\u{FE0F}') == trimmed
                    || mood.label().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Unknown mood '{}'. Expected one of: {}",
                    s,
                    Mood::ALL
                        .iter()
                        .map(|m| format!("{} ({})", m.label(), m.as_emoji()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl Serialize for Mood {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_emoji())
    }
}

impl<'de> Deserialize<'de> for Mood {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One journal record owned by exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub title: String,
    pub mood: Mood,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub title: String,
    pub mood: Mood,
    pub content: String,
}

/// A partial update. Fields left as `None` keep their current value.
///
/// Identity, owner and creation time are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
    pub mood: Option<Mood>,
    pub content: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.title.is_none() && self.mood.is_none() && self.content.is_none()
    }

    /// Applies the patch to `entry`, trimming and validating text fields first.
    ///
    /// The entry is left untouched when validation fails.
    pub fn apply_to(&self, entry: &mut DiaryEntry) -> AppResult<()> {
        let title = self
            .title
            .as_deref()
            .map(|t| require_text("title", t))
            .transpose()?;
        let content = self
            .content
            .as_deref()
            .map(|c| require_text("content", c))
            .transpose()?;

        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(title) = title {
            entry.title = title;
        }
        if let Some(mood) = self.mood {
            entry.mood = mood;
        }
        if let Some(content) = content {
            entry.content = content;
        }
        Ok(())
    }
}

/// Trims `value` and rejects it if nothing is left.
pub fn require_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Parses a calendar date in `YYYY-MM-DD` or `YYYYMMDD` form.
///
/// # Examples
///
/// ```
/// use spacediary::model::parse_date;
/// use chrono::NaiveDate;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// assert_eq!(parse_date("2024-01-15").unwrap(), expected);
/// assert_eq!(parse_date("20240115").unwrap(), expected);
/// assert!(parse_date("15/01/2024").is_err());
/// ```
pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT_ISO)
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT_COMPACT))
        .map_err(|e| AppError::Validation(format!("Invalid date format '{}': {}", raw, e)))
}

/// Builds the backing-store identifier assigned to a user at sign-in or sign-up.
///
/// Whitespace runs in the display name become a single underscore.
///
/// # Examples
///
/// ```
/// use spacediary::model::generate_sheet_id;
///
/// assert_eq!(
///     generate_sheet_id("Ada  Lovelace", 1_700_000_000_000),
///     "SpaceDiary_Ada_Lovelace_1700000000000"
/// );
/// ```
pub fn generate_sheet_id(name: &str, created_millis: i64) -> String {
    format!(
        "{}_{}_{}",
        SHEET_ID_PREFIX,
        collapse_whitespace(name, "_"),
        created_millis
    )
}

/// Replaces every run of whitespace in `value` with `separator`.
pub(crate) fn collapse_whitespace(value: &str, separator: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push_str(separator);
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}
