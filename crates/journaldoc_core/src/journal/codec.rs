//! Journal wire format.
//!
//! ```text
//! {"*":{"type":T,"version":V}} 0x00 {path:value} 0x00 {path:value} 0x00 ...
//! ```
//!
//! Every entry is a single-entry JSON object followed by one NUL byte. JSON
//! text never contains a raw NUL, so the terminator is unambiguous. Bytes
//! after the last terminator are the unused tail of the buffer (sentinel
//! fill or an entry cut short by a crash) and are ignored.

use crate::error::{CoreError, CoreResult};
use crate::journal::command::{Command, JournalInfo};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Byte that terminates every entry.
pub const ENTRY_TERMINATOR: u8 = 0x00;

/// Key of the reserved first entry.
pub const INFO_KEY: &str = "*";

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct InfoEntry {
    #[serde(rename = "*")]
    info: JournalInfo,
}

/// Encodes the reserved info entry, terminator included.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn serialize_info(info: &JournalInfo) -> CoreResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(&InfoEntry { info: info.clone() })?;
    bytes.push(ENTRY_TERMINATOR);
    Ok(bytes)
}

/// Encodes one command entry, terminator included.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn serialize_command(command: &Command) -> CoreResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(command)?;
    bytes.push(ENTRY_TERMINATOR);
    Ok(bytes)
}

/// Decodes a complete journal.
///
/// # Errors
///
/// Returns [`CoreError::JournalCorruption`] if the info entry is missing or
/// malformed, or if any terminated entry is not a single-entry object.
pub fn decode(bytes: &[u8]) -> CoreResult<(JournalInfo, Vec<Command>)> {
    let mut info = None;
    let mut commands = Vec::new();
    let mut offset = 0;
    let mut entry = 0;

    while let Some(len) = bytes[offset..]
        .iter()
        .position(|&b| b == ENTRY_TERMINATOR)
    {
        let segment = &bytes[offset..offset + len];
        if entry == 0 {
            info = Some(decode_info(segment, offset)?);
        } else {
            commands.push(decode_command(segment, entry, offset)?);
        }
        offset += len + 1;
        entry += 1;
    }

    let info = info.ok_or_else(|| CoreError::journal_corruption(0, 0, "missing journal info entry"))?;
    Ok((info, commands))
}

fn decode_info(segment: &[u8], offset: usize) -> CoreResult<JournalInfo> {
    serde_json::from_slice::<InfoEntry>(segment)
        .map(|entry| entry.info)
        .map_err(|e| CoreError::journal_corruption(0, offset, format!("invalid info entry: {e}")))
}

fn decode_command(segment: &[u8], entry: usize, offset: usize) -> CoreResult<Command> {
    let value = Value::from_json_slice(segment)
        .map_err(|e| CoreError::journal_corruption(entry, offset, e.to_string()))?;

    let Value::Map(map) = value else {
        return Err(CoreError::journal_corruption(
            entry,
            offset,
            format!("expected an object, found {}", value.type_name()),
        ));
    };

    let mut entries = map.entries();
    if entries.len() != 1 {
        return Err(CoreError::journal_corruption(
            entry,
            offset,
            format!("expected exactly one entry, found {}", entries.len()),
        ));
    }
    let (path, value) = entries.remove(0);
    Ok(Command { path, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use journaldoc_storage::SENTINEL;

    fn info() -> JournalInfo {
        JournalInfo::new("test", 1)
    }

    fn encode_all(commands: &[Command]) -> Vec<u8> {
        let mut bytes = serialize_info(&info()).unwrap();
        for command in commands {
            bytes.extend(serialize_command(command).unwrap());
        }
        bytes
    }

    #[test]
    fn info_entry_layout() {
        let bytes = serialize_info(&info()).unwrap();
        assert_eq!(bytes, b"{\"*\":{\"type\":\"test\",\"version\":1}}\0");
    }

    #[test]
    fn decode_ignores_sentinel_tail() {
        let mut bytes = encode_all(&[Command::new("a", 1), Command::new("b.", "x")]);
        bytes.extend([SENTINEL; 64]);

        let (decoded_info, commands) = decode(&bytes).unwrap();
        assert_eq!(decoded_info, info());
        assert_eq!(commands, vec![Command::new("a", 1), Command::new("b.", "x")]);
    }

    #[test]
    fn decode_ignores_unterminated_entry() {
        let mut bytes = encode_all(&[Command::new("a", 1)]);
        bytes.extend(b"{\"b\":2");

        let (_, commands) = decode(&bytes).unwrap();
        assert_eq!(commands, vec![Command::new("a", 1)]);
    }

    #[test]
    fn info_key_must_be_star() {
        let err = decode(b"{\"x\":{\"type\":\"test\",\"version\":1}}\0").unwrap_err();
        assert!(matches!(err, CoreError::JournalCorruption { entry: 0, .. }));
    }

    #[test]
    fn info_fields_must_be_typed() {
        for bad in [
            &b"{\"*\":{\"type\":1,\"version\":1}}\0"[..],
            &b"{\"*\":{\"type\":\"t\",\"version\":\"1\"}}\0"[..],
            &b"{\"*\":{\"type\":\"t\"}}\0"[..],
        ] {
            assert!(decode(bad).is_err());
        }
    }

    #[test]
    fn missing_info_entry() {
        let err = decode(&[SENTINEL; 16]).unwrap_err();
        assert!(matches!(err, CoreError::JournalCorruption { entry: 0, offset: 0, .. }));
    }

    #[test]
    fn command_with_two_entries_reports_position() {
        let mut bytes = encode_all(&[Command::new("a", 1)]);
        let offset = bytes.len();
        bytes.extend(b"{\"b\":2,\"c\":3}\0");

        let err = decode(&bytes).unwrap_err();
        match err {
            CoreError::JournalCorruption {
                entry, offset: at, ..
            } => {
                assert_eq!(entry, 2);
                assert_eq!(at, offset);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn command_must_be_object() {
        let mut bytes = encode_all(&[]);
        bytes.extend(b"[1,2]\0");
        assert!(matches!(
            decode(&bytes),
            Err(CoreError::JournalCorruption { entry: 1, .. })
        ));
    }

    #[test]
    fn empty_entry_is_corrupt() {
        let mut bytes = encode_all(&[]);
        bytes.push(ENTRY_TERMINATOR);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn nul_in_string_is_escaped() {
        let bytes = serialize_command(&Command::new("a", "x\0y")).unwrap();
        assert_eq!(bytes.iter().filter(|&&b| b == ENTRY_TERMINATOR).count(), 1);
    }
}
