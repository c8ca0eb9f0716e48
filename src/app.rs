//! The diary context: one session provider and one entry store, wired
//! together.
//!
//! `Diary` is the object presentation code holds. Opening it restores any
//! persisted session before anything else can run, and every session action
//! it exposes forwards the resulting `IdentityChange` to the entry store
//! before returning.

use crate::backend::hosted::HostedClient;
use crate::backend::local::{LocalEntryBackend, LocalSessionBackend, LocalStorage};
use crate::backend::{EntryBackend, SessionBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{BackendKind, Config};
use crate::errors::{AppError, AppResult, AuthError};
use crate::export::{read_export, write_export, ExportDocument};
use crate::model::Identity;
use crate::session::{Credentials, IdentityChange, IdentityObserver, Password, SessionProvider};
use crate::stats::DiaryStats;
use crate::store::{EntryStore, ImportReport};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Diary {
    session: SessionProvider,
    store: EntryStore,
    clock: Rc<dyn Clock>,
    restore_failure: Option<String>,
}

impl Diary {
    /// Opens the diary described by `config` using the wall clock.
    pub fn open(config: &Config) -> AppResult<Self> {
        Self::open_with_clock(config, Rc::new(SystemClock))
    }

    /// Builds the backends `config` selects and restores the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the data directory
    /// cannot be created, or the persisted session cannot be read.
    pub fn open_with_clock(config: &Config, clock: Rc<dyn Clock>) -> AppResult<Self> {
        config.validate()?;
        let storage = LocalStorage::open(&config.data_dir)?;
        debug!("Opening {} diary", config.backend);

        let (sessions, entries): (Box<dyn SessionBackend>, Box<dyn EntryBackend>) =
            match config.backend {
                BackendKind::Local => (
                    Box::new(LocalSessionBackend::new(storage.clone())) as Box<dyn SessionBackend>,
                    Box::new(LocalEntryBackend::new(storage)) as Box<dyn EntryBackend>,
                ),
                BackendKind::Hosted => {
                    let (url, key) = config
                        .supabase_url
                        .as_deref()
                        .zip(config.supabase_anon_key.as_deref())
                        .ok_or_else(|| {
                            AppError::Config("hosted backend is not configured".to_string())
                        })?;
                    let client = Arc::new(HostedClient::new(
                        url,
                        key,
                        config.timeout_secs,
                        storage,
                    )?);
                    (
                        Box::new(Arc::clone(&client)) as Box<dyn SessionBackend>,
                        Box::new(client) as Box<dyn EntryBackend>,
                    )
                }
            };

        Self::from_backends(sessions, entries, clock)
    }

    /// Assembles a diary from explicit backends and restores the session.
    ///
    /// A session that cannot be restored, or whose entries cannot be loaded,
    /// leaves the diary open and signed out. The failure is kept in
    /// `restore_failure` and reported by `require_user`, and `sign_out`
    /// still clears the persisted session.
    pub fn from_backends(
        sessions: Box<dyn SessionBackend>,
        entries: Box<dyn EntryBackend>,
        clock: Rc<dyn Clock>,
    ) -> AppResult<Self> {
        let mut diary = Self {
            session: SessionProvider::new(sessions, Rc::clone(&clock)),
            store: EntryStore::new(entries, Rc::clone(&clock)),
            clock,
            restore_failure: None,
        };

        let restored = diary
            .session
            .restore_session()
            .and_then(|change| diary.forward(change));
        if let Err(e) = restored {
            warn!("Continuing signed out: {}", e);
            let change = diary.session.abandon();
            diary.forward(change)?;
            diary.restore_failure = Some(e.to_string());
        }
        Ok(diary)
    }

    pub fn session(&self) -> &SessionProvider {
        &self.session
    }

    pub fn entries(&self) -> &EntryStore {
        &self.store
    }

    pub fn entries_mut(&mut self) -> &mut EntryStore {
        &mut self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn current_user(&self) -> Option<&Identity> {
        self.session.current()
    }

    /// Why the persisted session was not restored on open, if it failed.
    pub fn restore_failure(&self) -> Option<&str> {
        self.restore_failure.as_deref()
    }

    /// The current identity, or `AuthError::NotSignedIn`
    /// (`SessionUnavailable` when a saved session failed to restore).
    pub fn require_user(&self) -> AppResult<&Identity> {
        if let Some(identity) = self.session.current() {
            return Ok(identity);
        }
        match &self.restore_failure {
            Some(reason) => Err(AuthError::SessionUnavailable(reason.clone()).into()),
            None => Err(AppError::Auth(AuthError::NotSignedIn)),
        }
    }

    pub fn sign_in(&mut self, credentials: Credentials) -> AppResult<&Identity> {
        let change = self.session.sign_in(credentials)?;
        self.settle(change)?;
        self.require_user()
    }

    pub fn sign_up(&mut self, email: &str, password: &Password, name: &str) -> AppResult<&Identity> {
        let change = self.session.sign_up(email, password, name)?;
        self.settle(change)?;
        self.require_user()
    }

    pub fn sign_out(&mut self) -> AppResult<()> {
        let change = self.session.sign_out()?;
        self.restore_failure = None;
        self.forward(change)
    }

    pub fn stats(&self) -> DiaryStats {
        DiaryStats::compute(self.store.entries(), self.clock.today())
    }

    /// Writes the current user's entries to an export file in `dir`.
    pub fn export_to(&self, dir: &Path) -> AppResult<PathBuf> {
        let user = self.require_user()?;
        let document = ExportDocument::build(user, self.store.entries(), self.clock.now());
        write_export(&document, dir, self.clock.today())
    }

    /// Imports the entries of an export file into the current user's diary.
    pub fn import_from(&mut self, path: &Path) -> AppResult<ImportReport> {
        let user_id = self.require_user()?.id.clone();
        let document = read_export(path)?;
        if document.user.email != self.require_user()?.email {
            info!("Importing entries exported by a different account");
        }
        let entries = document.into_entries(&user_id)?;
        self.store.import(entries)
    }

    /// Forwards a sign-in or sign-up. If the new identity's entries cannot be
    /// loaded the sign-in is undone, persisted marker included.
    fn settle(&mut self, change: IdentityChange) -> AppResult<()> {
        if let Err(e) = self.forward(change) {
            warn!("Loading entries failed, signing out again: {}", e);
            match self.session.sign_out() {
                Ok(change) => self.forward(change)?,
                Err(undo) => {
                    warn!("Sign-out after failed sign-in also failed: {}", undo);
                    let change = self.session.abandon();
                    self.forward(change)?;
                }
            }
            return Err(e);
        }
        self.restore_failure = None;
        Ok(())
    }

    fn forward(&mut self, change: IdentityChange) -> AppResult<()> {
        if change.user_changed() {
            debug!("Identity changed, reloading entries");
        }
        self.store.identity_changed(&change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{Mood, NewEntry};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    fn local_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    fn clock() -> Rc<dyn Clock> {
        Rc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ))
    }

    fn profile(id: &str) -> Credentials {
        Credentials::Profile(Identity {
            id: id.to_string(),
            name: "Alex Carter".to_string(),
            email: "alex@example.com".to_string(),
            avatar: None,
            sheet_id: None,
        })
    }

    #[test]
    fn test_open_restores_session_and_entries() {
        let dir = tempdir().unwrap();
        let config = local_config(dir.path());

        {
            let mut diary = Diary::open_with_clock(&config, clock()).unwrap();
            assert!(diary.current_user().is_none());
            diary.sign_in(profile("user_1")).unwrap();
            diary
                .entries_mut()
                .add(NewEntry {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    title: "Day One".to_string(),
                    mood: Mood::Happy,
                    content: "Hello".to_string(),
                })
                .unwrap();
        }

        let diary = Diary::open_with_clock(&config, clock()).unwrap();
        assert_eq!(diary.current_user().map(|u| u.id.as_str()), Some("user_1"));
        assert_eq!(diary.entries().len(), 1);
        assert!(diary.entries().today_entry().is_some());
        assert_eq!(diary.stats().current_streak, 1);
    }

    #[test]
    fn test_sign_out_empties_store() {
        let dir = tempdir().unwrap();
        let mut diary = Diary::open_with_clock(&local_config(dir.path()), clock()).unwrap();
        diary.sign_in(profile("user_1")).unwrap();
        diary.sign_out().unwrap();

        assert!(diary.current_user().is_none());
        assert!(diary.entries().owner().is_none());
        assert!(matches!(
            diary.export_to(dir.path()),
            Err(AppError::Auth(AuthError::NotSignedIn))
        ));
    }

    #[test]
    fn test_failed_entry_load_undoes_sign_in() {
        let dir = tempdir().unwrap();
        let config = local_config(dir.path());
        std::fs::write(dir.path().join("diary_user_1.json"), "{not a list").unwrap();

        let mut diary = Diary::open_with_clock(&config, clock()).unwrap();
        assert!(matches!(
            diary.sign_in(profile("user_1")),
            Err(AppError::Storage(_))
        ));
        assert!(diary.current_user().is_none());
        assert!(diary.entries().owner().is_none());
        assert!(!dir.path().join("spaceDiaryUser.json").exists());

        let reopened = Diary::open_with_clock(&config, clock()).unwrap();
        assert!(reopened.current_user().is_none());
        assert!(reopened.restore_failure().is_none());
    }

    #[test]
    fn test_unloadable_session_opens_signed_out_until_sign_out() {
        let dir = tempdir().unwrap();
        let config = local_config(dir.path());
        {
            let mut diary = Diary::open_with_clock(&config, clock()).unwrap();
            diary.sign_in(profile("user_1")).unwrap();
        }
        std::fs::write(dir.path().join("diary_user_1.json"), "{not a list").unwrap();

        let mut diary = Diary::open_with_clock(&config, clock()).unwrap();
        assert!(diary.current_user().is_none());
        assert!(diary.entries().owner().is_none());
        assert!(diary.restore_failure().unwrap().contains("diary_user_1"));
        assert!(matches!(
            diary.require_user(),
            Err(AppError::Auth(AuthError::SessionUnavailable(_)))
        ));

        diary.sign_out().unwrap();
        assert!(diary.restore_failure().is_none());
        assert!(matches!(
            diary.require_user(),
            Err(AppError::Auth(AuthError::NotSignedIn))
        ));
        assert!(!dir.path().join("spaceDiaryUser.json").exists());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = Config {
            data_dir: PathBuf::from("relative"),
            ..Config::default()
        };
        assert!(matches!(Diary::open(&config), Err(AppError::Config(_))));
    }
}
