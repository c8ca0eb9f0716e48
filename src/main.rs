/*!
# spacediary - a personal journal in the terminal

Write one dated entry per day with a mood, then browse, edit and export them.
Entries live either in a local data directory or in a hosted backend.

## Usage

```
spacediary [OPTIONS] <COMMAND>

Commands:
  signin   Sign in (local: with a name and email; hosted: with email and password)
  signup   Create a hosted account and sign in
  signout  Sign out and forget the persisted session
  whoami   Show the signed-in user
  write    Write a new entry
  today    Show today's entry
  list     List entries, newest first
  show     Show one entry in full
  edit     Change fields of an existing entry
  delete   Delete an entry
  stats    Show streak and entry counts
  export   Export all entries to a JSON file
  import   Import entries from an export file
  clear    Delete every entry of the signed-in user

Options:
  -v, --verbose              Enable debug logging
      --log-format <FORMAT>  Log output format [default: text] [possible values: text, json]
```

## Configuration

- `SPACEDIARY_DIR`: data directory (defaults to `~/.spacediary`)
- `SPACEDIARY_BACKEND`: `local` (default) or `hosted`
- `SUPABASE_URL`, `SUPABASE_ANON_KEY`: hosted backend endpoint and key
- `SPACEDIARY_TIMEOUT_SECS`: hosted request timeout (defaults to 30)
*/

use clap::Parser;
use spacediary::app::Diary;
use spacediary::cli::CliArgs;
use spacediary::config::Config;
use spacediary::constants::{
    DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME,
};
use spacediary::errors::AppResult;
use spacediary::ops;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info_span};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose, &args.log_format);

    let correlation_id = Uuid::new_v4().to_string();
    let root_span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service_name = TRACING_SERVICE_NAME,
        correlation_id = %correlation_id
    );
    let _guard = root_span.enter();

    // Errors are logged once, here.
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> AppResult<()> {
    debug!("CLI arguments: {:?}", args);

    let config = Config::load()?;
    debug!("Configuration: {:?}", config);

    let mut diary = Diary::open(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    ops::run(args.command, &mut diary, &config, &mut out)
}

/// Installs the global subscriber. `--verbose` wins over `RUST_LOG`.
fn init_tracing(verbose: bool, log_format: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    };
    let registry = tracing_subscriber::registry().with(filter);

    if log_format == LOG_FORMAT_JSON {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .init();
    }
}
