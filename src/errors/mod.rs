//! Error handling utilities for the spacediary application.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, as well as the
//! convenience type alias `AppResult` for functions that can return these errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents the ways authentication against a backing store can fail.
///
/// # Examples
///
/// ```
/// use spacediary::errors::AuthError;
///
/// let error = AuthError::InvalidCredentials;
/// assert!(format!("{}", error).contains("Invalid email or password"));
///
/// let error = AuthError::DuplicateEmail("ada@example.com".to_string());
/// assert!(format!("{}", error).contains("ada@example.com"));
/// ```
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backing service rejected the email/password pair.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// An account already exists for the email address.
    #[error("An account already exists for {0}")]
    DuplicateEmail(String),

    /// The operation needs a signed-in identity and there is none.
    #[error("Not signed in. Run `spacediary signin` first.")]
    NotSignedIn,

    /// The active backing store does not support the operation.
    #[error("{0} is not supported by the {1} backend")]
    Unsupported(&'static str, &'static str),

    /// A persisted session exists but could not be restored.
    #[error("Saved session could not be restored: {0}. Run `spacediary signout` to clear it.")]
    SessionUnavailable(String),

    /// Any other refusal from the auth service.
    #[error("Authentication rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the auth service
        status: u16,
        /// Message returned by the auth service
        message: String,
    },
}

/// Represents failures reading from or writing to a backing store.
///
/// # Examples
///
/// ```
/// use spacediary::errors::StorageError;
///
/// let error = StorageError::MalformedRecord {
///     key: "diary_user_1".to_string(),
///     reason: "missing title".to_string(),
/// };
/// assert!(format!("{}", error).contains("diary_user_1"));
/// assert!(format!("{}", error).contains("missing title"));
/// ```
#[derive(Debug, Error)]
pub enum StorageError {
    /// A stored value could not be read.
    #[error("Failed to read '{key}': {source}")]
    Read {
        /// Storage key being read
        key: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A value could not be written.
    #[error("Failed to write '{key}': {source}")]
    Write {
        /// Storage key being written
        key: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A stored record failed to decode or validate.
    #[error("Malformed record in '{key}': {reason}")]
    MalformedRecord {
        /// Storage key or table the record came from
        key: String,
        /// Why the record was rejected
        reason: String,
    },

    /// The hosted backend could not be reached.
    #[error("Hosted backend request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The hosted backend answered with an unexpected status.
    #[error("Hosted backend returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },
}

/// Represents errors that can occur when attempting to lock the data directory.
///
/// # Examples
///
/// ```
/// use spacediary::errors::LockError;
/// use std::path::PathBuf;
///
/// let error = LockError::FileBusy {
///     path: PathBuf::from("/path/to/.lock"),
/// };
///
/// assert!(format!("{}", error).contains("in use by another process"));
/// ```
#[derive(Debug, Error)]
pub enum LockError {
    /// Error when the directory is already locked by another process.
    #[error("Diary data is in use by another process: {path}. Please wait for the other spacediary process to finish.")]
    FileBusy {
        /// The path to the lock file
        path: PathBuf,
    },

    /// Error when acquiring the lock fails for a technical reason.
    #[error("Failed to acquire lock {path}: {source}. Please check file permissions and ensure the directory is accessible.")]
    AcquisitionFailed {
        /// The path to the lock file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Represents all possible errors that can occur in the spacediary application.
///
/// Note: This type does not implement `Clone` to avoid losing error context when
/// cloning `std::io::Error` values.
///
/// # Examples
///
/// ```
/// use spacediary::errors::AppError;
///
/// let error = AppError::Config("Missing data directory".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Missing data directory");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input rejected before it reached a backing store (empty title, unknown mood, bad date).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A mutation named an entry the current identity does not own.
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Errors from signing in, signing up or a missing session.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Errors from the backing store.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Errors related to locking the local data directory.
    #[error("File locking error: {0}")]
    Lock(#[from] LockError),

    /// A hosted request did not complete within the configured timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;
