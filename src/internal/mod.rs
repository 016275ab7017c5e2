//! Internal building blocks (record model and textual codecs) that power the
//! public repository APIs.

pub mod record;
