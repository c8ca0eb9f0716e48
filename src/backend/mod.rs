//! Backing stores for identities and diary entries.
//!
//! The session provider and the entry store never talk to storage directly;
//! they go through the two traits defined here. Two implementations exist:
//!
//! - `local`: JSON files in a data directory (offline variant)
//! - `hosted`: a managed auth + REST table service (hosted variant)
//!
//! `records` holds the wire formats and the decode/validate step shared by both.

pub mod hosted;
pub mod local;
pub mod records;

use crate::errors::AppResult;
use crate::model::{DiaryEntry, Identity};
use crate::session::{Credentials, Password};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persists and recovers the signed-in identity.
pub trait SessionBackend {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Recovers a previously persisted identity, or `None` if there is no
    /// usable session.
    fn restore(&self) -> AppResult<Option<Identity>>;

    fn sign_in(&self, credentials: Credentials, now: DateTime<Utc>) -> AppResult<Identity>;

    fn sign_up(
        &self,
        email: &str,
        password: &Password,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Identity>;

    /// Clears any persisted session. Must succeed when nothing is persisted.
    fn sign_out(&self) -> AppResult<()>;
}

/// Persists the entries of one identity at a time.
///
/// Every method is scoped by user id; implementations must never return or
/// touch another user's entries.
pub trait EntryBackend {
    /// Loads every entry owned by `user_id`, in no particular order.
    fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>>;

    /// Persists a new entry and returns the stored record.
    fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry>;

    /// Replaces an existing entry and returns the stored record.
    ///
    /// Fails with `AppError::NotFound` if the id is unknown for the owner.
    fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry>;

    /// Fails with `AppError::NotFound` if the id is unknown for `user_id`.
    fn delete(&self, user_id: &str, id: &str) -> AppResult<()>;

    /// Removes every entry owned by `user_id`.
    fn clear(&self, user_id: &str) -> AppResult<()>;
}

impl<T: SessionBackend + ?Sized> SessionBackend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn restore(&self) -> AppResult<Option<Identity>> {
        (**self).restore()
    }

    fn sign_in(&self, credentials: Credentials, now: DateTime<Utc>) -> AppResult<Identity> {
        (**self).sign_in(credentials, now)
    }

    fn sign_up(
        &self,
        email: &str,
        password: &Password,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Identity> {
        (**self).sign_up(email, password, name, now)
    }

    fn sign_out(&self) -> AppResult<()> {
        (**self).sign_out()
    }
}

impl<T: EntryBackend + ?Sized> EntryBackend for Arc<T> {
    fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
        (**self).load(user_id)
    }

    fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        (**self).insert(entry)
    }

    fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        (**self).update(entry)
    }

    fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        (**self).delete(user_id, id)
    }

    fn clear(&self, user_id: &str) -> AppResult<()> {
        (**self).clear(user_id)
    }
}
