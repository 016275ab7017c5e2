//! Record model definitions for snapshots, commits, branches and references,
//! plus the trait that gives each record its textual, line-oriented codec.
//!
//! Records are plain data: equality is field-wise and derived, printing is
//! derived, and the codec is a small hand-written parser/printer per record.
//! Everything stored under `.fridge` is one of these records serialized to
//! text (blobs excepted, which are raw file bytes).

pub mod branch;
pub mod commit;
pub mod reference;
pub mod snapshot;

pub use branch::Branch;
pub use commit::Commit;
pub use reference::Reference;
pub use snapshot::{SnapshotItem, parse_snapshot, serialize_snapshot};

use crate::errors::FridgeError;

/// **The Record Trait**
/// Common interface for every persisted record kind: render to the textual
/// storage form, and parse that form back into a value.
///
/// For every record `r` the round-trip law holds:
/// `Record::from_text(&r.to_text()) == Ok(r)`.
pub trait Record: Sized {
    /// Render the record to its textual storage form.
    fn to_text(&self) -> String;

    /// Parse the textual storage form produced by [`Record::to_text`].
    fn from_text(text: &str) -> Result<Self, FridgeError>;
}
