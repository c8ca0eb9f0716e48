//! Session provider: the single owner of "who is signed in".
//!
//! Lifecycle: `Initializing` until `restore_session` has run once, then
//! `Resolved`. Every action that can move the current identity returns an
//! `IdentityChange` describing the transition, which callers hand to any
//! `IdentityObserver` (the entry store in particular) so dependents react
//! explicitly rather than through shared global state.

use crate::backend::SessionBackend;
use crate::clock::Clock;
use crate::errors::{AppError, AppResult};
use crate::model::Identity;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// A password that is wiped from memory when dropped.
pub type Password = Zeroizing<String>;

/// What a caller presents to sign in.
pub enum Credentials {
    /// A ready-made identity (local variant).
    Profile(Identity),
    /// Email and password checked by the auth service (hosted variant).
    Password { email: String, password: Password },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Profile(identity) => {
                f.debug_tuple("Profile").field(&identity.id).finish()
            }
            Credentials::Password { .. } => f
                .debug_struct("Password")
                .field("email", &crate::constants::REDACTED_PLACEHOLDER)
                .field("password", &crate::constants::REDACTED_PLACEHOLDER)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The persisted session has not been checked yet.
    Initializing,
    /// Signed in or not, the answer is known.
    Resolved,
}

/// A transition of the current identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    pub previous: Option<Identity>,
    pub current: Option<Identity>,
}

impl IdentityChange {
    /// True when the signed-in user id differs between the two sides.
    pub fn user_changed(&self) -> bool {
        self.previous.as_ref().map(|i| &i.id) != self.current.as_ref().map(|i| &i.id)
    }
}

/// Implemented by components that must react to identity transitions.
pub trait IdentityObserver {
    fn identity_changed(&mut self, change: &IdentityChange) -> AppResult<()>;
}

/// Owns the current identity and its persistence.
pub struct SessionProvider {
    backend: Box<dyn SessionBackend>,
    clock: Rc<dyn Clock>,
    current: Option<Identity>,
    state: SessionState,
}

impl SessionProvider {
    pub fn new(backend: Box<dyn SessionBackend>, clock: Rc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            current: None,
            state: SessionState::Initializing,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Recovers a persisted identity. Runs its backend check only once;
    /// later calls report no change.
    ///
    /// The provider is `Resolved` afterwards even if the backend failed, in
    /// which case no one is signed in and the error is returned.
    pub fn restore_session(&mut self) -> AppResult<IdentityChange> {
        if self.state == SessionState::Resolved {
            return Ok(self.unchanged());
        }
        let restored = self.backend.restore();
        self.state = SessionState::Resolved;

        match restored {
            Ok(Some(identity)) => {
                info!("Restored {} session", self.backend.name());
                Ok(self.replace(Some(identity)))
            }
            Ok(None) => {
                debug!("No session to restore");
                Ok(self.unchanged())
            }
            Err(e) => {
                warn!("Session restore failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn sign_in(&mut self, credentials: Credentials) -> AppResult<IdentityChange> {
        self.ensure_resolved()?;
        debug!("Signing in with {:?}", credentials);
        let identity = self.backend.sign_in(credentials, self.clock.now())?;
        Ok(self.replace(Some(identity)))
    }

    pub fn sign_up(
        &mut self,
        email: &str,
        password: &Password,
        name: &str,
    ) -> AppResult<IdentityChange> {
        self.ensure_resolved()?;
        let identity = self
            .backend
            .sign_up(email, password, name, self.clock.now())?;
        Ok(self.replace(Some(identity)))
    }

    /// Clears the current identity and the persisted marker. Signing out
    /// while signed out is a no-op.
    pub fn sign_out(&mut self) -> AppResult<IdentityChange> {
        self.backend.sign_out()?;
        if self.current.is_some() {
            info!("Signed out");
        }
        Ok(self.replace(None))
    }

    /// Forgets the current identity in memory only. The persisted marker is
    /// left for a later `sign_out` or restore.
    pub fn abandon(&mut self) -> IdentityChange {
        if self.current.is_some() {
            warn!("Dropping current identity");
        }
        self.replace(None)
    }

    fn ensure_resolved(&self) -> AppResult<()> {
        if self.state == SessionState::Initializing {
            return Err(AppError::Config(
                "session must be restored before signing in".to_string(),
            ));
        }
        Ok(())
    }

    fn replace(&mut self, next: Option<Identity>) -> IdentityChange {
        let previous = std::mem::replace(&mut self.current, next);
        IdentityChange {
            previous,
            current: self.current.clone(),
        }
    }

    fn unchanged(&self) -> IdentityChange {
        IdentityChange {
            previous: self.current.clone(),
            current: self.current.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::errors::AuthError;
    use chrono::{DateTime, Utc};
    use std::cell::RefCell;

    /// In-memory backend recording calls.
    #[derive(Default)]
    struct MemoryBackend {
        persisted: RefCell<Option<Identity>>,
        sign_outs: RefCell<usize>,
    }

    impl SessionBackend for MemoryBackend {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn restore(&self) -> AppResult<Option<Identity>> {
            Ok(self.persisted.borrow().clone())
        }

        fn sign_in(&self, credentials: Credentials, _now: DateTime<Utc>) -> AppResult<Identity> {
            match credentials {
                Credentials::Profile(identity) => {
                    *self.persisted.borrow_mut() = Some(identity.clone());
                    Ok(identity)
                }
                Credentials::Password { .. } => Err(AuthError::InvalidCredentials.into()),
            }
        }

        fn sign_up(
            &self,
            _email: &str,
            _password: &Password,
            _name: &str,
            _now: DateTime<Utc>,
        ) -> AppResult<Identity> {
            Err(AuthError::Unsupported("sign-up", "memory").into())
        }

        fn sign_out(&self) -> AppResult<()> {
            *self.sign_outs.borrow_mut() += 1;
            *self.persisted.borrow_mut() = None;
            Ok(())
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            name: "Alex Carter".to_string(),
            email: "alex.carter@apnidiary.com".to_string(),
            avatar: None,
            sheet_id: None,
        }
    }

    fn provider(backend: MemoryBackend) -> SessionProvider {
        SessionProvider::new(Box::new(backend), Rc::new(SystemClock))
    }

    #[test]
    fn test_starts_initializing_and_resolves_once() {
        let backend = MemoryBackend::default();
        *backend.persisted.borrow_mut() = Some(identity("u1"));
        let mut session = provider(backend);
        assert_eq!(session.state(), SessionState::Initializing);

        let change = session.restore_session().unwrap();
        assert_eq!(session.state(), SessionState::Resolved);
        assert!(change.user_changed());
        assert_eq!(session.current().map(|i| i.id.as_str()), Some("u1"));

        let again = session.restore_session().unwrap();
        assert!(!again.user_changed());
    }

    #[test]
    fn test_sign_in_before_restore_is_rejected() {
        let mut session = provider(MemoryBackend::default());
        let result = session.sign_in(Credentials::Profile(identity("u1")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_sign_in_switches_identity() {
        let mut session = provider(MemoryBackend::default());
        session.restore_session().unwrap();

        let first = session.sign_in(Credentials::Profile(identity("a"))).unwrap();
        assert_eq!(first.previous, None);

        let second = session.sign_in(Credentials::Profile(identity("b"))).unwrap();
        assert_eq!(second.previous.map(|i| i.id), Some("a".to_string()));
        assert_eq!(second.current.map(|i| i.id), Some("b".to_string()));
    }

    #[test]
    fn test_rejected_credentials_leave_identity_unchanged() {
        let mut session = provider(MemoryBackend::default());
        session.restore_session().unwrap();
        session.sign_in(Credentials::Profile(identity("a"))).unwrap();

        let result = session.sign_in(Credentials::Password {
            email: "a@b.c".to_string(),
            password: Password::new("wrong".to_string()),
        });
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
        assert_eq!(session.current().map(|i| i.id.as_str()), Some("a"));
    }

    #[test]
    fn test_sign_out_is_idempotent() {
        let mut session = provider(MemoryBackend::default());
        session.restore_session().unwrap();
        session.sign_in(Credentials::Profile(identity("a"))).unwrap();

        let change = session.sign_out().unwrap();
        assert!(change.user_changed());
        assert!(!session.is_signed_in());

        let change = session.sign_out().unwrap();
        assert!(!change.user_changed());
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::Password {
            email: "secret@example.com".to_string(),
            password: Password::new("hunter2".to_string()),
        };
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("secret@example.com"));
    }
}
