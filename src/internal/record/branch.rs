//! Branch records.
//!
//! A branch is a named mutable pointer to a commit key, persisted as one
//! file per branch under the branches directory. The file content is the
//! commit key alone; an empty value means the branch has no commit yet.

use serde::{Deserialize, Serialize};

use crate::errors::FridgeError;
use crate::internal::record::Record;

/// The commit key a branch points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub head: String,
}

impl Record for Branch {
    fn to_text(&self) -> String {
        self.head.clone()
    }

    fn from_text(text: &str) -> Result<Self, FridgeError> {
        Ok(Branch {
            head: text.trim().to_string(),
        })
    }
}
