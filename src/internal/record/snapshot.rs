//! Snapshot records.
//!
//! A snapshot is the ordered list of files present in the workspace at
//! commit time, one [`SnapshotItem`] per file. The order reflects traversal
//! order and is preserved verbatim through serialization round-trips.
//!
//! Each item serializes to one line of whitespace-separated fields:
//!
//! ```text
//! <checksum> <mode octal> <size> <atime %.3f> <mtime %.3f> <path literal>
//! ```
//!
//! The path may contain any text, including whitespace and newlines, so it
//! is emitted as a double-quoted, backslash-escaped literal; parsing accepts
//! that literal form and restores the original text. The mode field carries
//! the permission bits; parsing regenerates `st_mode` by OR-ing the decoded
//! octal with the regular-file bit.

use serde::{Deserialize, Serialize};

use crate::errors::FridgeError;
use crate::fs::FileStatus;
use crate::internal::record::Record;

const S_IFREG: u32 = libc::S_IFREG as u32;

/// One file captured in a snapshot: content checksum, workspace-relative
/// path, and the file status to restore on checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub checksum: String,
    pub path: String,
    pub status: FileStatus,
}

/// Serialize a snapshot: items joined by single newlines.
pub fn serialize_snapshot(items: &[SnapshotItem]) -> String {
    items
        .iter()
        .map(Record::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a serialized snapshot, one item per line.
pub fn parse_snapshot(text: &str) -> Result<Vec<SnapshotItem>, FridgeError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split('\n').map(SnapshotItem::from_text).collect()
}

impl Record for SnapshotItem {
    fn to_text(&self) -> String {
        format!(
            "{} {:04o} {} {:.3} {:.3} {}",
            self.checksum,
            self.status.mode & 0o7777,
            self.status.size,
            self.status.atime,
            self.status.mtime,
            quote_path(&self.path),
        )
    }

    fn from_text(text: &str) -> Result<Self, FridgeError> {
        let (checksum, rest) = take_field(text)?;
        let (mode, rest) = take_field(rest)?;
        let (size, rest) = take_field(rest)?;
        let (atime, rest) = take_field(rest)?;
        let (mtime, rest) = take_field(rest)?;

        let mode = u32::from_str_radix(mode, 8)
            .map_err(|_| FridgeError::Deserialization(format!("invalid mode octal: {mode}")))?;
        let size = size
            .parse::<u64>()
            .map_err(|_| FridgeError::Deserialization(format!("invalid size: {size}")))?;
        let atime = parse_time(atime)?;
        let mtime = parse_time(mtime)?;

        Ok(SnapshotItem {
            checksum: checksum.to_string(),
            path: unquote_path(rest.trim())?,
            status: FileStatus {
                mode: mode | S_IFREG,
                size,
                atime,
                mtime,
            },
        })
    }
}

fn take_field(text: &str) -> Result<(&str, &str), FridgeError> {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => Ok((&text[..end], &text[end..])),
        None => Err(FridgeError::Deserialization(
            "truncated snapshot item line".to_string(),
        )),
    }
}

fn parse_time(field: &str) -> Result<f64, FridgeError> {
    field
        .parse::<f64>()
        .map_err(|_| FridgeError::Deserialization(format!("invalid timestamp: {field}")))
}

/// Render a path as a double-quoted literal whose content survives
/// whitespace-based line splitting.
fn quote_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 2);
    out.push('"');
    for c in path.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote_path(literal: &str) -> Result<String, FridgeError> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| {
            FridgeError::Deserialization(format!("path is not a quoted literal: {literal}"))
        })?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err(FridgeError::Deserialization(
                        "malformed unicode escape in path literal".to_string(),
                    ));
                }
                let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                let value = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                match value {
                    Some(c) => out.push(c),
                    None => {
                        return Err(FridgeError::Deserialization(
                            "malformed unicode escape in path literal".to_string(),
                        ));
                    }
                }
            }
            _ => {
                return Err(FridgeError::Deserialization(
                    "dangling escape in path literal".to_string(),
                ));
            }
        }
    }
    Ok(out)
}
