//! Offline backing store: JSON values in a data directory.
//!
//! The layout mirrors a browser's key/value storage. Each key maps to one
//! `<key>.json` file:
//!
//! - `spaceDiaryUser`: the persisted session marker
//! - `diary_<user id>`: that user's entry list
//!
//! Writes take an advisory exclusive lock on the directory and replace files
//! atomically, so a reader never sees a half-written list.

use crate::backend::records::{decode_list, malformed, EntryRecord};
use crate::backend::{EntryBackend, SessionBackend};
use crate::constants::{
    ENTRIES_KEY_PREFIX, SESSION_KEY, STORAGE_FILE_EXTENSION, STORAGE_LOCK_FILE,
};
use crate::errors::{AppError, AppResult, AuthError, LockError, StorageError};
use crate::model::{generate_sheet_id, DiaryEntry, Identity};
use crate::session::{Credentials, Password};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ensures the data directory exists, creating it with owner-only permissions.
///
/// # Errors
///
/// Returns:
/// - `AppError::Config` if the provided path is not an absolute path
/// - `AppError::Io` if the directory creation fails
pub fn ensure_data_directory_exists(data_dir: &Path) -> AppResult<()> {
    if !data_dir.is_absolute() {
        return Err(AppError::Config(format!(
            "Data directory path must be absolute: {}",
            data_dir.display()
        )));
    }

    if !data_dir.exists() {
        fs::create_dir_all(data_dir).map_err(|e| {
            AppError::Io(io::Error::new(
                e.kind(),
                format!("Failed to create data directory: {}", e),
            ))
        })?;

        #[cfg(unix)]
        {
            let permissions =
                fs::Permissions::from_mode(crate::constants::DEFAULT_DIR_PERMISSIONS);
            fs::set_permissions(data_dir, permissions).map_err(|e| {
                AppError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to set secure permissions on data directory: {}", e),
                ))
            })?;
            debug!("Set 0o700 permissions on data directory");
        }
    }
    Ok(())
}

/// Returns the storage key holding a user's entry list.
pub fn entries_key(user_id: &str) -> String {
    format!("{}{}", ENTRIES_KEY_PREFIX, user_id)
}

/// String key/value storage backed by one JSON file per key.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

/// Held while writing; releases the directory lock on drop.
struct DirLock {
    file: File,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl LocalStorage {
    /// Opens storage rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> AppResult<Self> {
        ensure_data_directory_exists(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the value stored under `key`, or `None` if nothing is stored.
    pub fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                key: key.to_string(),
                source,
            }
            .into()),
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let _lock = self.lock()?;
        self.write_unlocked(key, value)
    }

    /// Removes `key`. Removing a missing key is a no-op.
    pub fn remove_item(&self, key: &str) -> AppResult<()> {
        let _lock = self.lock()?;
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                key: key.to_string(),
                source,
            }
            .into()),
        }
    }

    /// Read-modify-write of a single key under one lock acquisition.
    pub fn modify_item<F>(&self, key: &str, f: F) -> AppResult<()>
    where
        F: FnOnce(Option<String>) -> AppResult<String>,
    {
        let _lock = self.lock()?;
        let current = self.get_item(key)?;
        let next = f(current)?;
        self.write_unlocked(key, &next)
    }

    fn write_unlocked(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        let write_err = |source: io::Error| StorageError::Write {
            key: key.to_string(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            let permissions =
                fs::Permissions::from_mode(crate::constants::DEFAULT_FILE_PERMISSIONS);
            fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
        }

        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        debug!("Wrote {} bytes to key {}", value.len(), key);
        Ok(())
    }

    fn lock(&self) -> AppResult<DirLock> {
        let path = self.dir.join(STORAGE_LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::AcquisitionFailed {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(DirLock { file }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LockError::FileBusy { path }.into())
            }
            Err(source) => Err(LockError::AcquisitionFailed { path, source }.into()),
        }
    }

    /// Fails with `AppError::Validation` if `key` cannot name a stored value.
    pub fn check_key(&self, key: &str) -> AppResult<()> {
        self.path_for(key).map(|_| ())
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
        if !valid {
            return Err(AppError::Validation(format!(
                "Storage key contains unsupported characters: {:?}",
                key
            )));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", key, STORAGE_FILE_EXTENSION)))
    }
}

/// Session provider backend for the offline variant.
///
/// Sign-in takes a ready-made identity and cannot be refused.
#[derive(Debug, Clone)]
pub struct LocalSessionBackend {
    storage: LocalStorage,
}

impl LocalSessionBackend {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }
}

impl LocalSessionBackend {
    /// Drops a session marker that cannot name a usable identity.
    fn discard_marker(&self, reason: &str) -> AppResult<Option<Identity>> {
        warn!("Discarding unreadable session marker: {}", reason);
        self.storage.remove_item(SESSION_KEY)?;
        Ok(None)
    }
}

impl SessionBackend for LocalSessionBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn restore(&self) -> AppResult<Option<Identity>> {
        let Some(raw) = self.storage.get_item(SESSION_KEY)? else {
            debug!("No persisted session");
            return Ok(None);
        };
        let identity = match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) => identity,
            Err(e) => return self.discard_marker(&e.to_string()),
        };
        if identity.id.trim().is_empty() {
            return self.discard_marker("empty id");
        }
        if let Err(e) = self.storage.check_key(&entries_key(&identity.id)) {
            return self.discard_marker(&e.to_string());
        }
        Ok(Some(identity))
    }

    fn sign_in(&self, credentials: Credentials, now: DateTime<Utc>) -> AppResult<Identity> {
        let mut identity = match credentials {
            Credentials::Profile(identity) => identity,
            Credentials::Password { .. } => {
                return Err(AuthError::Unsupported("password sign-in", "local").into())
            }
        };
        let key = entries_key(&identity.id);
        self.storage.check_key(&key).map_err(|_| {
            AppError::Validation(format!(
                "User id {:?} may only contain letters, digits, '_', '-', '.' or '@'",
                identity.id
            ))
        })?;
        identity.sheet_id = Some(generate_sheet_id(&identity.name, now.timestamp_millis()));

        let serialized =
            serde_json::to_string(&identity).map_err(|e| malformed(SESSION_KEY, e.to_string()))?;
        self.storage.set_item(SESSION_KEY, &serialized)?;

        if self.storage.get_item(&key)?.is_none() {
            self.storage.set_item(&key, "[]")?;
        }

        info!("Signed in locally");
        Ok(identity)
    }

    fn sign_up(
        &self,
        _email: &str,
        _password: &Password,
        _name: &str,
        _now: DateTime<Utc>,
    ) -> AppResult<Identity> {
        Err(AuthError::Unsupported("sign-up", "local").into())
    }

    fn sign_out(&self) -> AppResult<()> {
        self.storage.remove_item(SESSION_KEY)
    }
}

/// Entry store backend for the offline variant.
#[derive(Debug, Clone)]
pub struct LocalEntryBackend {
    storage: LocalStorage,
}

impl LocalEntryBackend {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    fn modify_records<F>(&self, user_id: &str, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut Vec<EntryRecord>) -> AppResult<()>,
    {
        let key = entries_key(user_id);
        self.storage.modify_item(&key, |current| {
            let mut records: Vec<EntryRecord> = match current {
                Some(raw) => decode_list(&raw, &key)?,
                None => Vec::new(),
            };
            f(&mut records)?;
            serde_json::to_string(&records)
                .map_err(|e| malformed(&key, e.to_string()).into())
        })
    }
}

impl EntryBackend for LocalEntryBackend {
    fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
        let key = entries_key(user_id);
        let Some(raw) = self.storage.get_item(&key)? else {
            return Ok(Vec::new());
        };
        let records: Vec<EntryRecord> = decode_list(&raw, &key)?;
        records
            .into_iter()
            .map(|record| record.into_entry(user_id, &key))
            .collect()
    }

    fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        self.modify_records(&entry.user_id, |records| {
            records.insert(0, EntryRecord::from_entry(entry));
            Ok(())
        })?;
        Ok(entry.clone())
    }

    fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        self.modify_records(&entry.user_id, |records| {
            let slot = records
                .iter_mut()
                .find(|r| r.id == entry.id)
                .ok_or_else(|| AppError::NotFound(entry.id.clone()))?;
            *slot = EntryRecord::from_entry(entry);
            Ok(())
        })?;
        Ok(entry.clone())
    }

    fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        self.modify_records(user_id, |records| {
            let index = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(id.to_string()))?;
            records.remove(index);
            Ok(())
        })
    }

    fn clear(&self, user_id: &str) -> AppResult<()> {
        self.storage.remove_item(&entries_key(user_id))
    }
}
