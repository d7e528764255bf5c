//! Inspect command implementation.

use journaldoc_core::document::recovery::read_journal;
use journaldoc_core::{DocumentFiles, JournalInfo, JournaledDocument, Value};
use journaldoc_storage::SENTINEL;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Document inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Document base path.
    pub path: String,
    /// Every document file and whether it exists.
    pub files: Vec<FileStats>,
    /// Runtime journal summary.
    pub journal: Option<JournalStats>,
    /// Crash-time journal summary.
    pub crashtime_journal: Option<JournalStats>,
    /// Shape of the recovered document.
    pub document: Option<DocumentShape>,
    /// Why recovery failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_error: Option<String>,
}

/// Statistics for one file.
#[derive(Debug, Serialize)]
pub struct FileStats {
    /// Role of the file.
    pub kind: &'static str,
    /// Whether the file exists.
    pub exists: bool,
    /// File size in bytes.
    pub size: u64,
}

/// Statistics for one journal file.
#[derive(Debug, Serialize)]
pub struct JournalStats {
    /// Journal header, if it decodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<JournalInfo>,
    /// Number of commands.
    pub commands: usize,
    /// Bytes in use before the sentinel fill.
    pub used_bytes: usize,
    /// Decoding error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// High-level shape of a document.
#[derive(Debug, Serialize)]
pub struct DocumentShape {
    /// Top-level keys with the type of their value.
    pub keys: Vec<(String, &'static str)>,
    /// Size of the document encoded as JSON.
    pub json_bytes: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects inspection data for the document at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let files = DocumentFiles::new(path);
    let stats = [
        ("snapshot", files.snapshot()),
        ("snapshot.new", files.new_snapshot()),
        ("journal", files.journal()),
        ("journal.crashtime", files.crashtime_journal()),
    ]
    .into_iter()
    .map(|(kind, file)| file_stats(kind, file))
    .collect::<Vec<_>>();

    if stats.iter().all(|s| !s.exists) {
        return Err(format!("No document found at {}", path.display()).into());
    }

    let (document, recovery_error) = match JournaledDocument::load_document_contents(path) {
        Ok(Some(map)) => {
            let keys = map
                .entries()
                .into_iter()
                .map(|(key, value)| (key, value.type_name()))
                .collect();
            let json_bytes = Value::Map(map).to_json_vec()?.len();
            (Some(DocumentShape { keys, json_bytes }), None)
        }
        Ok(None) => (None, None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        files: stats,
        journal: journal_stats(files.journal()),
        crashtime_journal: journal_stats(files.crashtime_journal()),
        document,
        recovery_error,
    })
}

fn file_stats(kind: &'static str, path: &Path) -> FileStats {
    match fs::metadata(path) {
        Ok(meta) => FileStats {
            kind,
            exists: true,
            size: meta.len(),
        },
        Err(_) => FileStats {
            kind,
            exists: false,
            size: 0,
        },
    }
}

fn journal_stats(path: &Path) -> Option<JournalStats> {
    let bytes = fs::read(path).ok()?;
    let used_bytes = bytes.len() - bytes.iter().rev().take_while(|&&b| b == SENTINEL).count();

    Some(match read_journal(path) {
        Ok(Some(journal)) => JournalStats {
            info: Some(journal.info().clone()),
            commands: journal.len(),
            used_bytes,
            error: None,
        },
        Ok(None) => return None,
        Err(e) => JournalStats {
            info: None,
            commands: 0,
            used_bytes,
            error: Some(e.to_string()),
        },
    })
}

fn print_text_output(result: &InspectResult) {
    println!("journaldoc Document Inspection");
    println!("==============================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Files:");
    for file in &result.files {
        if file.exists {
            println!("  {:<18} {}", file.kind, format_size(file.size));
        } else {
            println!("  {:<18} -", file.kind);
        }
    }

    for (name, journal) in [
        ("Journal", &result.journal),
        ("Crash-time journal", &result.crashtime_journal),
    ] {
        let Some(journal) = journal else { continue };
        println!();
        println!("{name}:");
        if let Some(info) = &journal.info {
            println!("  Type:      {}", info.journal_type);
            println!("  Version:   {}", info.version);
        }
        println!("  Commands:  {}", journal.commands);
        println!("  Used:      {}", format_size(journal.used_bytes as u64));
        if let Some(error) = &journal.error {
            println!("  Error:     {error}");
        }
    }

    println!();
    match (&result.document, &result.recovery_error) {
        (Some(document), _) => {
            println!("Document ({}):", format_size(document.json_bytes as u64));
            for (key, kind) in &document.keys {
                println!("  {key}: {kind}");
            }
        }
        (None, Some(error)) => println!("Document: recovery failed: {error}"),
        (None, None) => println!("Document: none"),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
