//! Profile panel actions: statistics, export, import and clearing data.

use crate::app::Diary;
use crate::errors::{AppError, AppResult};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn stats(diary: &Diary, out: &mut dyn Write) -> AppResult<()> {
    let user = diary.require_user()?;
    let stats = diary.stats();

    writeln!(out, "{}", user.name)?;
    writeln!(out, "Total entries:  {}", stats.total)?;
    writeln!(out, "This month:     {}", stats.this_month)?;
    writeln!(
        out,
        "Current streak: {} day{}",
        stats.current_streak,
        if stats.current_streak == 1 { "" } else { "s" }
    )?;
    Ok(())
}

/// Writes an export file to `dir`, or the working directory.
pub fn export(diary: &Diary, dir: Option<PathBuf>, out: &mut dyn Write) -> AppResult<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let path = diary.export_to(&dir)?;
    writeln!(
        out,
        "Exported {} entries to {}",
        diary.entries().len(),
        path.display()
    )?;
    Ok(())
}

pub fn import(diary: &mut Diary, file: &Path, out: &mut dyn Write) -> AppResult<()> {
    let report = diary.import_from(file)?;
    writeln!(
        out,
        "Imported {} entries ({} already present)",
        report.imported, report.skipped
    )?;
    Ok(())
}

/// Deletes every entry. Requires `--yes`.
pub fn clear(diary: &mut Diary, confirmed: bool, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    if !confirmed {
        return Err(AppError::Validation(
            "This deletes every entry permanently. Re-run with --yes to confirm".to_string(),
        ));
    }
    let removed = diary.entries_mut().clear_all()?;
    writeln!(out, "Deleted {} entries", removed)?;
    Ok(())
}
