//! Reference records.
//!
//! A reference points either directly at a commit key or at a branch by
//! name. HEAD is a single serialized reference, and user-supplied arguments
//! to operations like checkout resolve to one of the two shapes.
//!
//! Textual form is `<kind>: <value>` with kind `commit` or `branch`;
//! parsing trims whitespace on both sides of the separator.

use serde::{Deserialize, Serialize};

use crate::errors::FridgeError;
use crate::internal::record::Record;

/// Tagged pointer to a commit key or a branch name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reference {
    Commit(String),
    Branch(String),
}

impl Record for Reference {
    fn to_text(&self) -> String {
        match self {
            Reference::Commit(key) => format!("commit: {key}"),
            Reference::Branch(name) => format!("branch: {name}"),
        }
    }

    fn from_text(text: &str) -> Result<Self, FridgeError> {
        let (kind, value) = text.split_once(':').ok_or_else(|| {
            FridgeError::Deserialization(format!("reference has no kind separator: {text}"))
        })?;
        let value = value.trim().to_string();
        match kind.trim() {
            "commit" => Ok(Reference::Commit(value)),
            "branch" => Ok(Reference::Branch(value)),
            other => Err(FridgeError::Deserialization(format!(
                "unknown reference kind: {other}"
            ))),
        }
    }
}
