//! Configuration management for spacediary.
//!
//! Settings come from environment variables, with defaults suitable for the
//! local backend.
//!
//! # Environment Variables
//!
//! - `SPACEDIARY_DIR`: Data directory (defaults to ~/.spacediary)
//! - `SPACEDIARY_BACKEND`: `local` (default) or `hosted`
//! - `SUPABASE_URL`: Base URL of the hosted service (hosted only)
//! - `SUPABASE_ANON_KEY`: Public API key of the hosted service (hosted only)
//! - `SPACEDIARY_TIMEOUT_SECS`: Hosted request timeout in seconds (defaults to 30)
//! - `HOME`: Used for expanding the default data directory path

use crate::constants::{
    DEFAULT_DATA_SUBDIR, DEFAULT_TIMEOUT_SECS, ENV_VAR_BACKEND, ENV_VAR_DIR, ENV_VAR_HOME,
    ENV_VAR_SUPABASE_ANON_KEY, ENV_VAR_SUPABASE_URL, ENV_VAR_TIMEOUT_SECS, REDACTED_PLACEHOLDER,
};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which backing store the diary talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// JSON files in the data directory.
    #[default]
    Local,
    /// The hosted auth and REST service.
    Hosted,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Hosted => "hosted",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "hosted" => Ok(BackendKind::Hosted),
            other => Err(AppError::Config(format!(
                "Unknown backend '{}'. Expected 'local' or 'hosted'",
                other
            ))),
        }
    }
}

/// Configuration for spacediary.
///
/// # Examples
///
/// ```
/// use spacediary::config::{BackendKind, Config};
/// use std::path::PathBuf;
///
/// let config = Config {
///     data_dir: PathBuf::from("/var/lib/spacediary"),
///     ..Config::default()
/// };
/// assert_eq!(config.backend, BackendKind::Local);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Config {
    /// Directory holding the local store, session marker and hosted token.
    pub data_dir: PathBuf,

    pub backend: BackendKind,

    /// Base URL of the hosted service, e.g. `https://xyz.supabase.co`.
    pub supabase_url: Option<String>,

    pub supabase_anon_key: Option<String>,

    /// Per-request timeout for the hosted backend.
    pub timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| REDACTED_PLACEHOLDER);
        f.debug_struct("Config")
            .field("data_dir", &REDACTED_PLACEHOLDER)
            .field("backend", &self.backend)
            .field("supabase_url", &redact(&self.supabase_url))
            .field("supabase_anon_key", &redact(&self.supabase_anon_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(""),
            backend: BackendKind::Local,
            supabase_url: None,
            supabase_anon_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// The data directory is expanded with `shellexpand`, so `~` and
    /// `$VARS` are allowed. Empty variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The data directory path expansion fails
    /// - `SPACEDIARY_BACKEND` is neither `local` nor `hosted`
    /// - `SPACEDIARY_TIMEOUT_SECS` is not a positive integer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spacediary::config::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Using the {} backend", config.backend),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let data_dir_str = non_empty_var(ENV_VAR_DIR).unwrap_or_else(|| {
            let home = env::var(ENV_VAR_HOME).unwrap_or_default();
            format!("{}/{}", home, DEFAULT_DATA_SUBDIR)
        });

        let expanded_path = shellexpand::full(&data_dir_str)
            .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;
        let data_dir = PathBuf::from(expanded_path.into_owned());

        let backend = match non_empty_var(ENV_VAR_BACKEND) {
            Some(raw) => raw.parse()?,
            None => BackendKind::default(),
        };

        let timeout_secs = match non_empty_var(ENV_VAR_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a positive number of seconds",
                    ENV_VAR_TIMEOUT_SECS
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            data_dir,
            backend,
            supabase_url: non_empty_var(ENV_VAR_SUPABASE_URL)
                .map(|url| url.trim_end_matches('/').to_string()),
            supabase_anon_key: non_empty_var(ENV_VAR_SUPABASE_ANON_KEY),
            timeout_secs,
        })
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` with one of the following messages:
    /// - "Data directory path is empty"
    /// - "Data directory must be an absolute path"
    /// - "Timeout must be greater than zero"
    /// - "... is required for the hosted backend" when hosted settings are missing
    pub fn validate(&self) -> AppResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(AppError::Config("Data directory path is empty".to_string()));
        }

        if !self.data_dir.is_absolute() {
            return Err(AppError::Config(
                "Data directory must be an absolute path".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(AppError::Config(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        if self.backend == BackendKind::Hosted {
            let url = self.supabase_url.as_deref().ok_or_else(|| {
                AppError::Config(format!(
                    "{} is required for the hosted backend",
                    ENV_VAR_SUPABASE_URL
                ))
            })?;
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AppError::Config(format!(
                    "{} must start with http:// or https://",
                    ENV_VAR_SUPABASE_URL
                )));
            }
            if self.supabase_anon_key.is_none() {
                return Err(AppError::Config(format!(
                    "{} is required for the hosted backend",
                    ENV_VAR_SUPABASE_ANON_KEY
                )));
            }
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    const VARS: [&str; 5] = [
        ENV_VAR_DIR,
        ENV_VAR_BACKEND,
        ENV_VAR_SUPABASE_URL,
        ENV_VAR_SUPABASE_ANON_KEY,
        ENV_VAR_TIMEOUT_SECS,
    ];

    /// Runs `f` with the diary variables cleared, restoring them afterwards.
    fn with_clean_env<F: FnOnce()>(f: F) {
        let saved: Vec<(&str, Option<String>)> =
            VARS.iter().map(|name| (*name, env::var(name).ok())).collect();
        for name in VARS {
            env::remove_var(name);
        }

        f();

        for (name, value) in saved {
            match value {
                Some(v) => env::set_var(name, v),
                None => env::remove_var(name),
            }
        }
    }

    fn hosted_config() -> Config {
        Config {
            data_dir: PathBuf::from("/data"),
            backend: BackendKind::Hosted,
            supabase_url: Some("https://example.supabase.co".to_string()),
            supabase_anon_key: Some("anon".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_debug_impl_redacts_sensitive_info() {
        let config = Config {
            data_dir: PathBuf::from("/home/username/private/diary"),
            supabase_anon_key: Some("super-secret-key".to_string()),
            ..hosted_config()
        };

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains(REDACTED_PLACEHOLDER));
        assert!(debug_output.contains("Hosted"));
        assert!(!debug_output.contains("/home/username/private/diary"));
        assert!(!debug_output.contains("super-secret-key"));
        assert!(!debug_output.contains("example.supabase.co"));
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        with_clean_env(|| {
            let config = Config::load().unwrap();
            assert_eq!(config.backend, BackendKind::Local);
            assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
            assert!(config.data_dir.ends_with(DEFAULT_DATA_SUBDIR));
            assert!(config.supabase_url.is_none());
        });
    }

    #[test]
    #[serial]
    fn test_load_with_custom_dir() {
        with_clean_env(|| {
            let temp_dir = tempdir().unwrap();
            let dir_path = temp_dir.path().to_string_lossy().to_string();
            env::set_var(ENV_VAR_DIR, &dir_path);

            let config = Config::load().unwrap();
            assert_eq!(config.data_dir, PathBuf::from(dir_path));
        });
    }

    #[test]
    #[serial]
    fn test_load_hosted_settings() {
        with_clean_env(|| {
            env::set_var(ENV_VAR_BACKEND, "Hosted");
            env::set_var(ENV_VAR_SUPABASE_URL, "https://example.supabase.co/");
            env::set_var(ENV_VAR_SUPABASE_ANON_KEY, "anon");
            env::set_var(ENV_VAR_TIMEOUT_SECS, "12");

            let config = Config::load().unwrap();
            assert_eq!(config.backend, BackendKind::Hosted);
            assert_eq!(
                config.supabase_url.as_deref(),
                Some("https://example.supabase.co")
            );
            assert_eq!(config.timeout_secs, 12);
        });
    }

    #[test]
    #[serial]
    fn test_load_rejects_bad_values() {
        with_clean_env(|| {
            env::set_var(ENV_VAR_BACKEND, "cloud");
            match Config::load() {
                Err(AppError::Config(msg)) => assert!(msg.contains("Unknown backend")),
                other => panic!("Expected Config error, got {:?}", other),
            }

            env::remove_var(ENV_VAR_BACKEND);
            env::set_var(ENV_VAR_TIMEOUT_SECS, "soon");
            match Config::load() {
                Err(AppError::Config(msg)) => assert!(msg.contains(ENV_VAR_TIMEOUT_SECS)),
                other => panic!("Expected Config error, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_validate_relative_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("relative/path"),
            ..Config::default()
        };

        match config.validate() {
            Err(AppError::Config(message)) => {
                assert!(message.contains("must be an absolute path"))
            }
            _ => panic!("Expected Config error about relative path"),
        }
    }

    #[test]
    fn test_validate_empty_data_dir() {
        match Config::default().validate() {
            Err(AppError::Config(message)) => {
                assert!(message.contains("Data directory path is empty"))
            }
            _ => panic!("Expected Config error about empty data directory"),
        }
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            timeout_secs: 0,
            ..hosted_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hosted_requirements() {
        assert!(hosted_config().validate().is_ok());

        let missing_key = Config {
            supabase_anon_key: None,
            ..hosted_config()
        };
        match missing_key.validate() {
            Err(AppError::Config(message)) => assert!(message.contains(ENV_VAR_SUPABASE_ANON_KEY)),
            _ => panic!("Expected Config error about the anon key"),
        }

        let bad_url = Config {
            supabase_url: Some("example.supabase.co".to_string()),
            ..hosted_config()
        };
        assert!(bad_url.validate().is_err());

        // Local ignores hosted settings entirely.
        let local = Config {
            backend: BackendKind::Local,
            supabase_url: None,
            supabase_anon_key: None,
            ..hosted_config()
        };
        assert!(local.validate().is_ok());
    }
}
