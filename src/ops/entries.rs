//! Writing, reading, editing and deleting entries.

use crate::app::Diary;
use crate::cli::{EditArgs, WriteArgs};
use crate::errors::{AppError, AppResult};
use crate::model::{parse_date, DiaryEntry, EntryPatch, Mood, NewEntry};
use crate::stats::relative_time;
use std::io::{self, Write};
use tracing::debug;

/// Adds an entry, refusing a second one for the same date unless forced.
pub fn write(diary: &mut Diary, args: WriteArgs, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;

    let date = match args.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => diary.clock().today(),
    };
    let mood: Mood = args.mood.parse()?;

    if !args.force {
        if let Some(existing) = diary.entries().entry_for_date(date) {
            return Err(AppError::Validation(format!(
                "An entry for {} already exists ('{}'). Use `edit {}` to change it, or --force to add another",
                date, existing.title, existing.id
            )));
        }
    }

    let content = match args.content {
        Some(content) => content,
        None => {
            debug!("Reading entry content from stdin");
            io::read_to_string(io::stdin())?
        }
    };

    let entry = diary.entries_mut().add(NewEntry {
        date,
        title: args.title,
        mood,
        content,
    })?;
    writeln!(out, "Saved entry {} for {}", entry.id, entry.date)?;
    Ok(())
}

pub fn today(diary: &Diary, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    match diary.entries().today_entry() {
        Some(entry) => print_entry(diary, entry, out),
        None => {
            writeln!(out, "No entry for today yet")?;
            Ok(())
        }
    }
}

pub fn list(diary: &Diary, limit: Option<usize>, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    let entries = diary.entries().entries();
    if entries.is_empty() {
        writeln!(out, "No entries yet")?;
        return Ok(());
    }

    let now = diary.clock().now();
    for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
        writeln!(
            out,
            "{}  {}  {}  ({})  [{}]",
            entry.date,
            entry.mood,
            entry.title,
            relative_time(entry.created_at, now),
            entry.id
        )?;
    }
    Ok(())
}

pub fn show(diary: &Diary, id: &str, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    let entry = diary
        .entries()
        .get(id)
        .ok_or_else(|| AppError::NotFound(id.to_string()))?;
    print_entry(diary, entry, out)
}

pub fn edit(diary: &mut Diary, args: EditArgs, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    let patch = EntryPatch {
        date: args.date.as_deref().map(parse_date).transpose()?,
        title: args.title,
        mood: args.mood.as_deref().map(str::parse::<Mood>).transpose()?,
        content: args.content,
    };
    if patch.is_empty() {
        return Err(AppError::Validation(
            "Nothing to change: pass at least one of --title, --mood, --content or --date"
                .to_string(),
        ));
    }

    let entry = diary.entries_mut().update(&args.id, patch)?;
    writeln!(out, "Updated entry {}", entry.id)?;
    Ok(())
}

pub fn delete(diary: &mut Diary, id: &str, out: &mut dyn Write) -> AppResult<()> {
    diary.require_user()?;
    diary.entries_mut().delete(id)?;
    writeln!(out, "Deleted entry {}", id)?;
    Ok(())
}

fn print_entry(diary: &Diary, entry: &DiaryEntry, out: &mut dyn Write) -> AppResult<()> {
    writeln!(out, "{}", entry.title)?;
    writeln!(out, "{}  {} {}", entry.date, entry.mood, entry.mood.label())?;
    writeln!(out)?;
    writeln!(out, "{}", entry.content)?;
    writeln!(out)?;
    writeln!(
        out,
        "id: {}  written {}",
        entry.id,
        relative_time(entry.created_at, diary.clock().now()).to_lowercase()
    )?;
    Ok(())
}
