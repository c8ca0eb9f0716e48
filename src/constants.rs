//! Constants used throughout the application.
//!
//! This module contains all constants used in the spacediary application, organized
//! into logical groups. Having constants centralized makes them easier to find,
//! modify, and reference consistently.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "spacediary";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "A personal journal: one dated entry per day with a mood";

// CLI Arguments & Defaults
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable for the local data directory.
pub const ENV_VAR_DIR: &str = "SPACEDIARY_DIR";
/// Environment variable selecting the backing store (`local` or `hosted`).
pub const ENV_VAR_BACKEND: &str = "SPACEDIARY_BACKEND";
/// Environment variable for the hosted request timeout in seconds.
pub const ENV_VAR_TIMEOUT_SECS: &str = "SPACEDIARY_TIMEOUT_SECS";
/// Environment variable for the hosted backend base URL.
pub const ENV_VAR_SUPABASE_URL: &str = "SUPABASE_URL";
/// Environment variable for the hosted backend anonymous access key.
pub const ENV_VAR_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
/// Environment variable supplying the hosted password non-interactively.
pub const ENV_VAR_PASSWORD: &str = "SPACEDIARY_PASSWORD";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default sub-directory name for diary data within the user's home directory.
pub const DEFAULT_DATA_SUBDIR: &str = ".spacediary";
/// Default hosted request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Validation
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// Local Storage Layout
/// Storage key of the persisted session marker.
pub const SESSION_KEY: &str = "spaceDiaryUser";
/// Prefix of the per-user entry list storage key.
pub const ENTRIES_KEY_PREFIX: &str = "diary_";
/// Storage key of the persisted hosted auth tokens.
pub const HOSTED_SESSION_KEY: &str = "hosted_session";
/// File extension for stored values.
pub const STORAGE_FILE_EXTENSION: &str = "json";
/// Name of the advisory lock file guarding writes to the data directory.
pub const STORAGE_LOCK_FILE: &str = ".lock";
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;

// Hosted Backend
/// Table holding user profiles.
pub const PROFILES_TABLE: &str = "profiles";
/// Table holding diary entries.
pub const ENTRIES_TABLE: &str = "diary_entries";

// Identity
/// Prefix of generated sheet identifiers.
pub const SHEET_ID_PREFIX: &str = "SpaceDiary";
/// Prefix of locally fabricated user identifiers.
pub const LOCAL_USER_ID_PREFIX: &str = "user_";
/// Avatar assigned to locally fabricated users.
pub const DEFAULT_AVATAR_URL: &str =
    "https://images.unsplash.com/photo-1535713875002-d1d0cf377fde?w=150&h=150&fit=crop&crop=face";

// Date/Time Logic
/// Date format string for ISO date format (YYYY-MM-DD).
pub const DATE_FORMAT_ISO: &str = "%Y-%m-%d";
/// Date format string for compact date format (YYYYMMDD).
pub const DATE_FORMAT_COMPACT: &str = "%Y%m%d";

// Export
/// Prefix of export file names.
pub const EXPORT_FILE_PREFIX: &str = "space-diary";

// Logging Configuration
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "spacediary";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
