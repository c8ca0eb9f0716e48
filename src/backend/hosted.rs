//! Hosted backing store: a managed auth service plus REST tables.
//!
//! Talks to a Supabase-style backend over HTTP:
//!
//! - `/auth/v1/*` for password sign-in, sign-up, token checks and logout
//! - `/rest/v1/profiles` and `/rest/v1/diary_entries` for data, always
//!   filtered by the signed-in user's id
//!
//! One `HostedClient` is shared (behind an `Arc`) by the session backend and
//! the entry backend so both use the same access token. The token is also
//! persisted in the local data directory so the next process can restore the
//! session.

use crate::backend::local::LocalStorage;
use crate::backend::records::{decode_all, malformed, EntryRow, ProfileRow};
use crate::backend::{EntryBackend, SessionBackend};
use crate::constants::{ENTRIES_TABLE, HOSTED_SESSION_KEY, PROFILES_TABLE};
use crate::errors::{AppError, AppResult, AuthError, StorageError};
use crate::model::{generate_sheet_id, DiaryEntry, Identity};
use crate::session::{Credentials, Password};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

/// Tokens issued by the auth service for the signed-in user.
#[derive(Clone, Serialize, Deserialize)]
struct AuthTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user_id: String,
}

impl Drop for AuthTokens {
    fn drop(&mut self) {
        self.access_token.zeroize();
        if let Some(refresh) = self.refresh_token.as_mut() {
            refresh.zeroize();
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: AuthUser,
}

impl TokenResponse {
    /// Moves the tokens out, leaving empty strings behind.
    fn take_tokens(&mut self) -> AuthTokens {
        AuthTokens {
            access_token: std::mem::take(&mut self.access_token),
            refresh_token: self.refresh_token.take(),
            user_id: self.user.id.clone(),
        }
    }
}

impl Drop for TokenResponse {
    fn drop(&mut self) {
        self.access_token.zeroize();
        if let Some(refresh) = self.refresh_token.as_mut() {
            refresh.zeroize();
        }
    }
}

/// Sign-up answers with a session when no email confirmation is required,
/// and with the bare user otherwise.
#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<String>,
}

impl Drop for SignUpResponse {
    fn drop(&mut self) {
        if let Some(access) = self.access_token.as_mut() {
            access.zeroize();
        }
        if let Some(refresh) = self.refresh_token.as_mut() {
            refresh.zeroize();
        }
    }
}

/// Error body shapes returned by the auth service.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthErrorBody {
    fn text(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_default()
    }
}

/// HTTP client for the hosted backend.
pub struct HostedClient {
    base_url: String,
    anon_key: String,
    timeout_secs: u64,
    http: Client,
    tokens: Mutex<Option<AuthTokens>>,
    token_store: LocalStorage,
}

impl HostedClient {
    /// Creates a client for `base_url` (e.g. "https://xyz.supabase.co").
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend project URL, without a trailing path
    /// * `anon_key` - Public access key sent as the `apikey` header
    /// * `timeout_secs` - Per-request timeout
    /// * `token_store` - Local storage used to persist the session token
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout_secs: u64,
        token_store: LocalStorage,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(StorageError::Http)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            timeout_secs,
            http,
            tokens: Mutex::new(None),
            token_store,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn tokens(&self) -> AppResult<MutexGuard<'_, Option<AuthTokens>>> {
        self.tokens
            .lock()
            .map_err(|_| AppError::Config("hosted session state poisoned".to_string()))
    }

    fn bearer(&self) -> AppResult<(String, String)> {
        let guard = self.tokens()?;
        let tokens = guard.as_ref().ok_or(AuthError::NotSignedIn)?;
        Ok((tokens.access_token.clone(), tokens.user_id.clone()))
    }

    /// Adds the `apikey` header and a bearer token (the anon key when no
    /// user token is given).
    fn authorized(&self, request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        request.send().map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else {
            StorageError::Http(e).into()
        }
    }

    /// Turns a non-success response into `StorageError::UnexpectedStatus`.
    fn expect_success(&self, response: Response) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Err(StorageError::UnexpectedStatus { status, body }.into())
    }

    fn json_rows(&self, response: Response, key: &str) -> AppResult<Vec<Value>> {
        let response = self.expect_success(response)?;
        let text = response.text().map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&text)
            .map_err(|e| malformed(key, format!("expected a JSON array: {}", e)).into())
    }

    fn auth_failure(&self, response: Response, email: &str) -> AppError {
        let status = response.status();
        let body: AuthErrorBody = response.json().unwrap_or_default();
        let message = body.text();
        let lowered = message.to_lowercase();

        if lowered.contains("already registered") || lowered.contains("already exists") {
            return AuthError::DuplicateEmail(email.to_string()).into();
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return AuthError::InvalidCredentials.into();
        }
        AuthError::Rejected {
            status: status.as_u16(),
            message,
        }
        .into()
    }

    fn store_tokens(&self, tokens: AuthTokens) -> AppResult<()> {
        let serialized = serde_json::to_string(&tokens)
            .map_err(|e| malformed(HOSTED_SESSION_KEY, e.to_string()))?;
        self.token_store.set_item(HOSTED_SESSION_KEY, &serialized)?;
        *self.tokens()? = Some(tokens);
        Ok(())
    }

    fn forget_tokens(&self) -> AppResult<()> {
        *self.tokens()? = None;
        self.token_store.remove_item(HOSTED_SESSION_KEY)
    }

    fn password_grant(&self, email: &str, password: &Password) -> AppResult<AuthTokens> {
        debug!("Requesting password grant");
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password.as_str() }));
        let response = self.send(request)?;
        if !response.status().is_success() {
            return Err(self.auth_failure(response, email));
        }
        let mut body: TokenResponse = response
            .json()
            .map_err(|e| malformed("auth/token", e.to_string()))?;
        Ok(body.take_tokens())
    }

    fn fetch_profile(&self, access_token: &str, user_id: &str) -> AppResult<Option<Identity>> {
        let request = self
            .http
            .get(self.table_url(PROFILES_TABLE))
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())]);
        let response = self.send(self.authorized(request, Some(access_token)))?;
        let rows: Vec<ProfileRow> = decode_all(self.json_rows(response, PROFILES_TABLE)?, PROFILES_TABLE)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_identity(PROFILES_TABLE))
            .transpose()
    }

    fn insert_profile(&self, access_token: &str, identity: &Identity) -> AppResult<Identity> {
        let request = self
            .http
            .post(self.table_url(PROFILES_TABLE))
            .header("Prefer", "return=representation")
            .json(&ProfileRow::from_identity(identity));
        let response = self.send(self.authorized(request, Some(access_token)))?;
        let rows: Vec<ProfileRow> = decode_all(self.json_rows(response, PROFILES_TABLE)?, PROFILES_TABLE)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::from(malformed(PROFILES_TABLE, "insert returned no row")))
            .and_then(|row| row.into_identity(PROFILES_TABLE))
    }

    /// Loads the profile for a freshly authenticated user, creating one if the
    /// account predates its profile row.
    fn profile_or_create(
        &self,
        tokens: &AuthTokens,
        email: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Identity> {
        if let Some(identity) = self.fetch_profile(&tokens.access_token, &tokens.user_id)? {
            return Ok(identity);
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
        info!("Creating profile for hosted user");
        let identity = Identity {
            id: tokens.user_id.clone(),
            sheet_id: Some(generate_sheet_id(&name, now.timestamp_millis())),
            name,
            email: email.to_string(),
            avatar: None,
        };
        self.insert_profile(&tokens.access_token, &identity)
    }

    fn entry_filter(user_id: &str, id: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("user_id", format!("eq.{}", user_id))];
        if let Some(id) = id {
            query.push(("id", format!("eq.{}", id)));
        }
        query
    }

    fn single_entry(&self, response: Response, missing_id: &str) -> AppResult<DiaryEntry> {
        let rows: Vec<EntryRow> = decode_all(self.json_rows(response, ENTRIES_TABLE)?, ENTRIES_TABLE)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(missing_id.to_string()))
            .and_then(|row| row.into_entry(ENTRIES_TABLE))
    }
}

impl SessionBackend for HostedClient {
    fn name(&self) -> &'static str {
        "hosted"
    }

    fn restore(&self) -> AppResult<Option<Identity>> {
        let Some(raw) = self.token_store.get_item(HOSTED_SESSION_KEY)? else {
            debug!("No persisted hosted session");
            return Ok(None);
        };
        let tokens: AuthTokens = match serde_json::from_str(&raw) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Discarding unreadable hosted session: {}", e);
                self.forget_tokens()?;
                return Ok(None);
            }
        };

        let request = self.http.get(self.auth_url("user"));
        let response = self.send(self.authorized(request, Some(&tokens.access_token)))?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            info!("Persisted hosted session expired");
            self.forget_tokens()?;
            return Ok(None);
        }
        let response = self.expect_success(response)?;
        let user: AuthUser = response
            .json()
            .map_err(|e| malformed("auth/user", e.to_string()))?;
        if user.id != tokens.user_id {
            warn!("Persisted hosted session belongs to a different user; discarding");
            self.forget_tokens()?;
            return Ok(None);
        }

        let identity = self
            .fetch_profile(&tokens.access_token, &tokens.user_id)?
            .ok_or_else(|| malformed(PROFILES_TABLE, "no profile for session user"))?;
        *self.tokens()? = Some(tokens);
        Ok(Some(identity))
    }

    fn sign_in(&self, credentials: Credentials, now: DateTime<Utc>) -> AppResult<Identity> {
        let (email, password) = match credentials {
            Credentials::Password { email, password } => (email, password),
            Credentials::Profile(_) => {
                return Err(AuthError::Unsupported("profile sign-in", "hosted").into())
            }
        };
        let tokens = self.password_grant(&email, &password)?;
        let identity = self.profile_or_create(&tokens, &email, None, now)?;
        self.store_tokens(tokens)?;
        info!("Signed in to hosted backend");
        Ok(identity)
    }

    fn sign_up(
        &self,
        email: &str,
        password: &Password,
        name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Identity> {
        debug!("Creating hosted account");
        let request = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password.as_str(),
                "data": { "name": name },
            }));
        let response = self.send(request)?;
        if !response.status().is_success() {
            return Err(self.auth_failure(response, email));
        }
        let mut body: SignUpResponse = response
            .json()
            .map_err(|e| malformed("auth/signup", e.to_string()))?;

        let user_id = body.user.as_ref().map(|user| user.id.clone());
        let tokens = match (body.access_token.take().map(Zeroizing::new), user_id) {
            (Some(mut access_token), Some(user_id)) => AuthTokens {
                access_token: std::mem::take(&mut *access_token),
                refresh_token: body.refresh_token.take(),
                user_id,
            },
            _ => {
                if body.id.is_none() && body.user.is_none() {
                    return Err(malformed("auth/signup", "response named no user").into());
                }
                self.password_grant(email, password)?
            }
        };

        let identity = Identity {
            id: tokens.user_id.clone(),
            name: name.to_string(),
            email: email.to_string(),
            avatar: None,
            sheet_id: Some(generate_sheet_id(name, now.timestamp_millis())),
        };
        let identity = self.insert_profile(&tokens.access_token, &identity)?;
        self.store_tokens(tokens)?;
        info!("Signed up on hosted backend");
        Ok(identity)
    }

    fn sign_out(&self) -> AppResult<()> {
        let current = self.tokens()?.clone();
        if let Some(tokens) = current {
            let request = self.http.post(self.auth_url("logout"));
            match self.send(self.authorized(request, Some(&tokens.access_token))) {
                Ok(response) if response.status().is_success() => {
                    debug!("Hosted session revoked")
                }
                Ok(response) => warn!("Logout returned {}", response.status()),
                Err(e) => warn!("Logout request failed: {}", e),
            }
        }
        self.forget_tokens()
    }
}

impl EntryBackend for HostedClient {
    fn load(&self, user_id: &str) -> AppResult<Vec<DiaryEntry>> {
        let (access_token, _) = self.bearer()?;
        let mut query = Self::entry_filter(user_id, None);
        query.push(("order", "created_at.desc".to_string()));
        query.push(("select", "*".to_string()));

        let request = self.http.get(self.table_url(ENTRIES_TABLE)).query(&query);
        let response = self.send(self.authorized(request, Some(&access_token)))?;
        let rows: Vec<EntryRow> = decode_all(self.json_rows(response, ENTRIES_TABLE)?, ENTRIES_TABLE)?;
        let entries = rows
            .into_iter()
            .map(|row| row.into_entry(ENTRIES_TABLE))
            .collect::<AppResult<Vec<_>>>()?;

        if entries.iter().any(|e| e.user_id != user_id) {
            return Err(malformed(ENTRIES_TABLE, "row owned by another user").into());
        }
        debug!("Loaded {} hosted entries", entries.len());
        Ok(entries)
    }

    fn insert(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        let (access_token, _) = self.bearer()?;
        let request = self
            .http
            .post(self.table_url(ENTRIES_TABLE))
            .header("Prefer", "return=representation")
            .json(&EntryRow::from_entry(entry));
        let response = self.send(self.authorized(request, Some(&access_token)))?;
        self.single_entry(response, &entry.id)
    }

    fn update(&self, entry: &DiaryEntry) -> AppResult<DiaryEntry> {
        let (access_token, _) = self.bearer()?;
        let row = EntryRow::from_entry(entry);
        let request = self
            .http
            .patch(self.table_url(ENTRIES_TABLE))
            .query(&Self::entry_filter(&entry.user_id, Some(&entry.id)))
            .header("Prefer", "return=representation")
            .json(&json!({
                "date": row.date,
                "title": row.title,
                "mood": row.mood,
                "content": row.content,
                "updated_at": row.updated_at,
            }));
        let response = self.send(self.authorized(request, Some(&access_token)))?;
        self.single_entry(response, &entry.id)
    }

    fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        let (access_token, _) = self.bearer()?;
        let request = self
            .http
            .delete(self.table_url(ENTRIES_TABLE))
            .query(&Self::entry_filter(user_id, Some(id)))
            .header("Prefer", "return=representation");
        let response = self.send(self.authorized(request, Some(&access_token)))?;
        self.single_entry(response, id).map(|_| ())
    }

    fn clear(&self, user_id: &str) -> AppResult<()> {
        let (access_token, _) = self.bearer()?;
        let request = self
            .http
            .delete(self.table_url(ENTRIES_TABLE))
            .query(&Self::entry_filter(user_id, None));
        let response = self.send(self.authorized(request, Some(&access_token)))?;
        self.expect_success(response)?;
        Ok(())
    }
}
