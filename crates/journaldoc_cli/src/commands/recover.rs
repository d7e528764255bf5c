//! Recover command implementation.

use journaldoc_core::{JournaledDocument, Value};
use std::path::Path;
use tracing::info;

/// Runs the recover command.
pub fn run(path: &Path, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let document = JournaledDocument::load_document_contents(path)?
        .ok_or_else(|| format!("No document found at {}", path.display()))?;
    info!(entries = document.len(), "document recovered");

    let value = Value::Map(document);
    let json = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{json}");

    Ok(())
}
