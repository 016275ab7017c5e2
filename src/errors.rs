//! Error types for the fridge crate.
//!
//! This module defines a unified error enumeration used across the
//! content-addressable store, the record codecs, the repository core and the
//! workspace operations. It integrates with `thiserror` to provide rich
//! `Display` implementations and error source chaining where applicable.
//!
//! Notes:
//! - Filesystem failures keep their POSIX `std::io::ErrorKind` and the
//!   offending path.
//! - Reference-resolution failures carry the reference text as given by the
//!   caller.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the fridge library.
///
/// - Used across the CAS, record parsing, repository core and workspace
///   operations.
/// - Implements `std::error::Error` via `thiserror`.
pub enum FridgeError {
    /// `.fridge` is missing where a repository was expected.
    #[error("not an initialized fridge repository: {}", .0.display())]
    NotInitialized(PathBuf),

    /// `.fridge` already exists where `init` was asked to create one.
    #[error("fridge repository already initialized: {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// The reference matches neither a branch name nor a commit key.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// The reference is both a branch name and a commit key.
    #[error("ambiguous reference (names both a branch and a commit): {0}")]
    AmbiguousReference(String),

    /// Branch creation collided with an existing branch of the same name.
    #[error("branch already exists: {0}")]
    BranchExists(String),

    /// Malformed record text (unknown key, duplicate key, missing required
    /// field, unparseable number).
    #[error("malformed record: {0}")]
    Deserialization(String),

    /// Passthrough of an underlying filesystem error, with the failing path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Repository metadata in a state the invariants rule out, e.g. HEAD
    /// naming a branch that does not exist.
    #[error("corrupt repository: {0}")]
    CorruptRepository(String),
}

impl PartialEq for FridgeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FridgeError::NotInitialized(a), FridgeError::NotInitialized(b)) => a == b,
            (FridgeError::AlreadyInitialized(a), FridgeError::AlreadyInitialized(b)) => a == b,
            (FridgeError::UnknownReference(a), FridgeError::UnknownReference(b)) => a == b,
            (FridgeError::AmbiguousReference(a), FridgeError::AmbiguousReference(b)) => a == b,
            (FridgeError::BranchExists(a), FridgeError::BranchExists(b)) => a == b,
            (FridgeError::Deserialization(a), FridgeError::Deserialization(b)) => a == b,
            (
                FridgeError::Io {
                    path: a_path,
                    source: a_source,
                },
                FridgeError::Io {
                    path: b_path,
                    source: b_source,
                },
            ) => a_path == b_path && a_source.kind() == b_source.kind(),
            (FridgeError::CorruptRepository(a), FridgeError::CorruptRepository(b)) => a == b,
            _ => false,
        }
    }
}

impl FridgeError {
    /// Wrap an `io::Error` together with the path the operation failed on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> FridgeError {
        FridgeError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for an I/O error whose kind is `AlreadyExists`.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            FridgeError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::AlreadyExists
        )
    }

    /// True for an I/O error whose kind is `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FridgeError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
