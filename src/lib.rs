/*!
# spacediary

A personal journal: users sign in, write one dated entry per day with a mood
tag, and browse, edit or delete past entries. Entries are persisted either in
a local data directory or in a hosted auth + REST backend.

## Architecture

- `session`: the session provider, single owner of the current identity
- `store`: the entry store, owning the current identity's entries
- `app`: the `Diary` context wiring the two together
- `backend`: the storage traits and their local and hosted implementations
- `model`: identities, entries, moods and input validation
- `stats`, `export`: streaks and counts, JSON export and import
- `cli`, `ops`: the command-line front end
- `config`, `errors`, `constants`, `clock`: supporting infrastructure

## Usage Example

```rust,no_run
use spacediary::model::{Identity, Mood, NewEntry};
use spacediary::session::Credentials;
use spacediary::{Config, Diary};

fn main() -> spacediary::AppResult<()> {
    let config = Config::load()?;
    let mut diary = Diary::open(&config)?;

    diary.sign_in(Credentials::Profile(Identity {
        id: "user_1".to_string(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        avatar: None,
        sheet_id: None,
    }))?;

    let today = diary.clock().today();
    diary.entries_mut().add(NewEntry {
        date: today,
        title: "Day One".to_string(),
        mood: Mood::Happy,
        content: "Hello".to_string(),
    })?;
    assert!(diary.entries().today_entry().is_some());
    Ok(())
}
```
*/

/// The diary context
pub mod app;
/// Storage traits and implementations
pub mod backend;
/// Command-line interface for parsing and handling user arguments
pub mod cli;
pub mod clock;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Error types and utilities for error handling
pub mod errors;
/// Export documents
pub mod export;
pub mod model;
/// Command handlers
pub mod ops;
pub mod session;
pub mod stats;
pub mod store;

// Re-export important types for convenience
pub use app::Diary;
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult};
