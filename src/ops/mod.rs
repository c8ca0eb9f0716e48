//! Command handlers behind the CLI subcommands.
//!
//! Each handler works against an open `Diary` and writes its human-readable
//! output to `out`, so the binary passes stdout and tests pass a buffer.

pub mod account;
pub mod entries;
pub mod profile;

use crate::app::Diary;
use crate::cli::Command;
use crate::config::Config;
use crate::errors::AppResult;
use std::io::Write;

/// Runs `command` against `diary`.
pub fn run(
    command: Command,
    diary: &mut Diary,
    config: &Config,
    out: &mut dyn Write,
) -> AppResult<()> {
    match command {
        Command::Signin(args) => account::sign_in(diary, config.backend, args, out),
        Command::Signup(args) => account::sign_up(diary, args, out),
        Command::Signout => account::sign_out(diary, out),
        Command::Whoami => account::whoami(diary, out),
        Command::Write(args) => entries::write(diary, args, out),
        Command::Today => entries::today(diary, out),
        Command::List { limit } => entries::list(diary, limit, out),
        Command::Show { id } => entries::show(diary, &id, out),
        Command::Edit(args) => entries::edit(diary, args, out),
        Command::Delete { id } => entries::delete(diary, &id, out),
        Command::Stats => profile::stats(diary, out),
        Command::Export { dir } => profile::export(diary, dir, out),
        Command::Import { file } => profile::import(diary, &file, out),
        Command::Clear { yes } => profile::clear(diary, yes, out),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::app::Diary;
    use crate::clock::{Clock, TickingClock};
    use crate::config::Config;
    use crate::model::Identity;
    use crate::session::Credentials;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::path::Path;
    use std::rc::Rc;

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    pub fn config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    pub fn open(dir: &Path) -> Diary {
        let clock: Rc<dyn Clock> = Rc::new(TickingClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            Duration::seconds(1),
            today(),
        ));
        Diary::open_with_clock(&config(dir), clock).unwrap()
    }

    pub fn signed_in(dir: &Path) -> Diary {
        let mut diary = open(dir);
        diary
            .sign_in(Credentials::Profile(Identity {
                id: "user_1".to_string(),
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                avatar: None,
                sheet_id: None,
            }))
            .unwrap();
        diary
    }

    pub fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }
}
