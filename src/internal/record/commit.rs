//! Commit records.
//!
//! A commit pins one snapshot together with a free-text message, a UTC
//! timestamp and an optional parent commit key. Chained parent keys give the
//! repository its history; an empty parent marks a root commit.
//!
//! The textual form is a headers block followed by a blank line and the
//! message:
//!
//! ```text
//! timestamp <seconds %.3f>
//! parent <key or empty>
//! snapshot <key>
//!
//! <message, may span multiple lines>
//! ```
//!
//! Parsing splits at the first blank line (tolerating CR+LF line endings in
//! the headers), requires each header exactly once and rejects unknown
//! headers.

use serde::{Deserialize, Serialize};

use crate::errors::FridgeError;
use crate::internal::record::Record;

/// A commit record: timestamp, snapshot key, message, parent key (empty for
/// a root commit).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub timestamp: f64,
    pub snapshot: String,
    pub message: String,
    pub parent: String,
}

impl Record for Commit {
    fn to_text(&self) -> String {
        format!(
            "timestamp {:.3}\nparent {}\nsnapshot {}\n\n{}",
            self.timestamp, self.parent, self.snapshot, self.message
        )
    }

    fn from_text(text: &str) -> Result<Self, FridgeError> {
        let mut timestamp: Option<f64> = None;
        let mut parent: Option<String> = None;
        let mut snapshot: Option<String> = None;

        let mut rest = text;
        loop {
            let (line, tail) = rest.split_once('\n').ok_or_else(|| {
                FridgeError::Deserialization("commit record has no message separator".to_string())
            })?;
            rest = tail;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            let slot = match key {
                "timestamp" => {
                    let value = value.parse::<f64>().map_err(|_| {
                        FridgeError::Deserialization(format!("invalid commit timestamp: {value}"))
                    })?;
                    if timestamp.replace(value).is_some() {
                        Err("timestamp")
                    } else {
                        Ok(())
                    }
                }
                "parent" => {
                    if parent.replace(value.to_string()).is_some() {
                        Err("parent")
                    } else {
                        Ok(())
                    }
                }
                "snapshot" => {
                    if snapshot.replace(value.to_string()).is_some() {
                        Err("snapshot")
                    } else {
                        Ok(())
                    }
                }
                other => {
                    return Err(FridgeError::Deserialization(format!(
                        "unknown commit header: {other}"
                    )));
                }
            };
            if let Err(duplicate) = slot {
                return Err(FridgeError::Deserialization(format!(
                    "duplicate commit header: {duplicate}"
                )));
            }
        }

        Ok(Commit {
            timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
            snapshot: snapshot.ok_or_else(|| missing("snapshot"))?,
            message: rest.to_string(),
            parent: parent.ok_or_else(|| missing("parent"))?,
        })
    }
}

fn missing(header: &str) -> FridgeError {
    FridgeError::Deserialization(format!("missing commit header: {header}"))
}
