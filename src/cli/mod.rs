//! Command-line interface definitions.

use crate::constants::{APP_DESCRIPTION, APP_NAME, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// A personal journal: one dated entry per day with a mood
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION, version, long_about = None)]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(
        long,
        global = true,
        value_name = "FORMAT",
        default_value = LOG_FORMAT_TEXT,
        value_parser = [LOG_FORMAT_TEXT, LOG_FORMAT_JSON]
    )]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in (local: with a name and email; hosted: with email and password)
    Signin(SignInArgs),

    /// Create a hosted account and sign in
    Signup(SignUpArgs),

    /// Sign out and forget the persisted session
    Signout,

    /// Show the signed-in user
    Whoami,

    /// Write a new entry
    Write(WriteArgs),

    /// Show today's entry
    Today,

    /// List entries, newest first
    List {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one entry in full
    Show {
        /// Entry id
        id: String,
    },

    /// Change fields of an existing entry
    Edit(EditArgs),

    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },

    /// Show streak and entry counts
    Stats,

    /// Export all entries to a JSON file
    Export {
        /// Directory to write the export into (defaults to the current directory)
        #[arg(short = 'o', long)]
        dir: Option<PathBuf>,
    },

    /// Import entries from an export file
    Import {
        /// Path to a file produced by `export`
        file: PathBuf,
    },

    /// Delete every entry of the signed-in user
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct SignInArgs {
    /// Email address
    #[arg(short = 'e', long)]
    pub email: String,

    /// Display name (local backend)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// User id to sign in as (local backend; generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Avatar URL (local backend)
    #[arg(long)]
    pub avatar: Option<String>,
}

#[derive(Args, Debug)]
pub struct SignUpArgs {
    #[arg(short = 'e', long)]
    pub email: String,

    /// Display name
    #[arg(short = 'n', long)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Entry title
    #[arg(short = 't', long)]
    pub title: String,

    /// Mood: happy, sad, neutral, loved, energetic (or the emoji)
    #[arg(short = 'm', long, default_value = "happy")]
    pub mood: String,

    /// Entry text (read from stdin when omitted)
    #[arg(short = 'c', long)]
    pub content: Option<String>,

    /// Entry date (format: YYYY-MM-DD or YYYYMMDD, defaults to today)
    #[arg(short = 'd', long)]
    pub date: Option<String>,

    /// Write even if an entry already exists for the date
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Entry id
    pub id: String,

    #[arg(short = 't', long)]
    pub title: Option<String>,

    #[arg(short = 'm', long)]
    pub mood: Option<String>,

    #[arg(short = 'c', long)]
    pub content: Option<String>,

    /// New date (format: YYYY-MM-DD or YYYYMMDD)
    #[arg(short = 'd', long)]
    pub date: Option<String>,
}
