//! jot-core - Core library for Jot
//!
//! Note model, collection reconciliation and the sync orchestrator shared by
//! every Jot client. Persistence, HTTP transport and connectivity sit behind
//! traits so hosts can plug in their own.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Collection, Note, NoteId, Owner};
pub use reconcile::{reconcile, Reconciliation};
