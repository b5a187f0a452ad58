//! Data models for Jot

mod collection;
mod note;

pub use collection::{Collection, Fingerprint};
pub use note::{ChecklistItem, Note, NoteId, NoteKind, Owner, TextContent, SHARED_OWNER};
