//! Dump journal command implementation.

use journaldoc_core::document::recovery::read_journal;
use journaldoc_core::{DocumentFiles, Journal, Value};
use serde::Serialize;
use std::path::Path;

/// Journal command representation for output.
#[derive(Debug, Serialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 1 (0 is the info entry).
    pub index: usize,
    /// Command path.
    pub path: String,
    /// Command value.
    pub value: Value,
}

/// Runs the dump-journal command.
pub fn run(
    path: &Path,
    crashtime: bool,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = DocumentFiles::new(path);
    let journal_path = if crashtime {
        files.crashtime_journal()
    } else {
        files.journal()
    };

    let journal = read_journal(journal_path)?
        .ok_or_else(|| format!("Journal file not found: {}", journal_path.display()))?;
    let entries = collect_entries(&journal, limit);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&journal, &entries)?;
        }
    }

    Ok(())
}

/// Lists up to `limit` commands of `journal`.
pub fn collect_entries(journal: &Journal, limit: Option<usize>) -> Vec<JournalEntry> {
    journal
        .commands()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, command)| JournalEntry {
            index: i + 1,
            path: command.path.clone(),
            value: command.value.clone(),
        })
        .collect()
}

fn print_text_output(
    journal: &Journal,
    entries: &[JournalEntry],
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Journal type {:?}, version {}: {} commands",
        journal.info().journal_type,
        journal.info().version,
        journal.len()
    );
    println!("{:-<60}", "");

    for entry in entries {
        let value = String::from_utf8(entry.value.to_json_vec()?)?;
        println!("{:>6}  {:?} = {}", entry.index, entry.path, value);
    }

    if entries.len() < journal.len() {
        println!("... {} more", journal.len() - entries.len());
    }

    Ok(())
}
