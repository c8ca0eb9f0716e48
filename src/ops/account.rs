//! Sign-in, sign-up, sign-out and whoami.

use crate::app::Diary;
use crate::cli::{SignInArgs, SignUpArgs};
use crate::config::BackendKind;
use crate::constants::{DEFAULT_AVATAR_URL, ENV_VAR_PASSWORD, LOCAL_USER_ID_PREFIX};
use crate::errors::{AppError, AppResult};
use crate::model::{require_text, Identity};
use crate::session::{Credentials, Password};
use std::env;
use std::io::Write;
use tracing::debug;

/// Signs in with the credentials the active backend expects.
///
/// The local backend builds the identity from the arguments, fabricating an
/// id when none is given. The hosted backend asks for a password.
pub fn sign_in(
    diary: &mut Diary,
    backend: BackendKind,
    args: SignInArgs,
    out: &mut dyn Write,
) -> AppResult<()> {
    let credentials = match backend {
        BackendKind::Local => Credentials::Profile(local_identity(diary, args)?),
        BackendKind::Hosted => Credentials::Password {
            email: require_text("email", &args.email)?,
            password: read_password()?,
        },
    };

    let identity = diary.sign_in(credentials)?;
    writeln!(out, "Signed in as {} <{}>", identity.name, identity.email)?;
    writeln!(out, "User id: {}", identity.id)?;
    Ok(())
}

pub fn sign_up(diary: &mut Diary, args: SignUpArgs, out: &mut dyn Write) -> AppResult<()> {
    let email = require_text("email", &args.email)?;
    let name = require_text("name", &args.name)?;
    let password = read_password()?;

    let identity = diary.sign_up(&email, &password, &name)?;
    writeln!(out, "Welcome aboard, {}!", identity.name)?;
    writeln!(out, "User id: {}", identity.id)?;
    Ok(())
}

pub fn sign_out(diary: &mut Diary, out: &mut dyn Write) -> AppResult<()> {
    let was_signed_in = diary.current_user().is_some();
    diary.sign_out()?;
    if was_signed_in {
        writeln!(out, "Signed out")?;
    } else {
        writeln!(out, "Not signed in")?;
    }
    Ok(())
}

pub fn whoami(diary: &Diary, out: &mut dyn Write) -> AppResult<()> {
    let Some(identity) = diary.current_user() else {
        writeln!(out, "Not signed in")?;
        if let Some(reason) = diary.restore_failure() {
            writeln!(out, "Saved session could not be restored: {}", reason)?;
            writeln!(out, "Run `spacediary signout` to clear it")?;
        }
        return Ok(());
    };

    writeln!(out, "{} <{}>", identity.name, identity.email)?;
    writeln!(out, "User id:  {}", identity.id)?;
    if let Some(sheet_id) = &identity.sheet_id {
        writeln!(out, "Sheet id: {}", sheet_id)?;
    }
    writeln!(out, "Backend:  {}", diary.session().backend_name())?;
    Ok(())
}

fn local_identity(diary: &Diary, args: SignInArgs) -> AppResult<Identity> {
    let name = args.name.as_deref().ok_or_else(|| {
        AppError::Validation("--name is required for the local backend".to_string())
    })?;

    let id = match args.id {
        Some(id) => require_text("id", &id)?,
        None => format!(
            "{}{}",
            LOCAL_USER_ID_PREFIX,
            diary.clock().now().timestamp_millis()
        ),
    };

    Ok(Identity {
        id,
        name: require_text("name", name)?,
        email: require_text("email", &args.email)?,
        avatar: Some(args.avatar.unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string())),
        sheet_id: None,
    })
}

/// Reads the hosted password from `SPACEDIARY_PASSWORD` or the terminal.
fn read_password() -> AppResult<Password> {
    let raw = match env::var(ENV_VAR_PASSWORD) {
        Ok(value) if !value.is_empty() => {
            debug!("Using {} for non-interactive sign-in", ENV_VAR_PASSWORD);
            value
        }
        _ => rpassword::prompt_password("Password: ")?,
    };

    let password = Password::new(raw);
    if password.is_empty() {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }
    Ok(password)
}
