//! Apply command implementation.

use journaldoc_core::document::recovery::read_journal;
use journaldoc_core::{DocumentConfig, DocumentFiles, JournalInfo, JournaledDocument, Value};
use std::path::Path;
use tracing::info;

/// Journal type used when none is given and none is found on disk.
const DEFAULT_JOURNAL_TYPE: &str = "journaldoc";

/// Runs the apply command.
pub fn run(
    path: &Path,
    command_path: &str,
    value: &str,
    journal_type: Option<String>,
    journal_version: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = Value::from_json_slice(value.as_bytes())?;
    let info = resolve_info(path, journal_type, journal_version);
    info!(
        journal_type = %info.journal_type,
        version = info.version,
        "opening document"
    );

    let config = DocumentConfig::new(info.journal_type, info.version);
    let document = JournaledDocument::open_recovered(path, config)?;
    document.add_command(command_path, value)?;
    document.close()?;

    info!(path = command_path, "command applied");
    Ok(())
}

/// Picks the journal info: explicit arguments first, then the header of the
/// journal on disk, then defaults.
pub fn resolve_info(
    path: &Path,
    journal_type: Option<String>,
    journal_version: Option<u64>,
) -> JournalInfo {
    let files = DocumentFiles::new(path);
    let on_disk = read_journal(files.journal())
        .ok()
        .flatten()
        .map(|journal| journal.info().clone());

    JournalInfo::new(
        journal_type
            .or_else(|| on_disk.as_ref().map(|i| i.journal_type.clone()))
            .unwrap_or_else(|| DEFAULT_JOURNAL_TYPE.to_string()),
        journal_version
            .or_else(|| on_disk.as_ref().map(|i| i.version))
            .unwrap_or(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use journaldoc_core::DocMap;
    use tempfile::tempdir;

    #[test]
    fn apply_to_new_document() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("doc");

        run(&base, "a.b", "[1,2]", None, None).unwrap();
        run(&base, "a.b.", "3", None, None).unwrap();
        run(&base, "n+", "2.5", None, None).unwrap();

        let document = JournaledDocument::load_document_contents(&base)
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::Map(document),
            Value::from(serde_json::json!({"a": {"b": [1, 2, 3]}, "n": 2.5}))
        );
    }

    #[test]
    fn info_comes_from_disk() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("doc");
        let doc =
            JournaledDocument::open(&base, DocumentConfig::new("settings", 7), &DocMap::new())
                .unwrap();
        doc.close().unwrap();

        assert_eq!(
            resolve_info(&base, None, None),
            JournalInfo::new("settings", 7)
        );
        assert_eq!(
            resolve_info(&base, None, Some(8)),
            JournalInfo::new("settings", 8)
        );
        assert_eq!(
            resolve_info(&dir.path().join("other"), None, None),
            JournalInfo::new(DEFAULT_JOURNAL_TYPE, 1)
        );
    }

    #[test]
    fn invalid_json_rejected() {
        let dir = tempdir().unwrap();
        assert!(run(&dir.path().join("doc"), "a", "{not json", None, None).is_err());
    }
}
