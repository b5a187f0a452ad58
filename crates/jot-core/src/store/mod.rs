//! Durable persistence of the note collection.

mod json_file;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::Collection;

pub use json_file::{JsonFileStore, NOTES_FILE_NAME};

/// Get/set persistence for a whole note collection.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Load the persisted collection; an empty collection if nothing was saved yet
    async fn load(&self) -> Result<Collection>;

    /// Replace the persisted collection
    async fn save(&self, notes: &Collection) -> Result<()>;
}

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: Mutex<Collection>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(notes: Collection) -> Self {
        Self {
            notes: Mutex::new(notes),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of completed `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Collection {
        self.notes.lock().await.clone()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn load(&self) -> Result<Collection> {
        Ok(self.notes.lock().await.clone())
    }

    async fn save(&self, notes: &Collection) -> Result<()> {
        *self.notes.lock().await = notes.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Note;

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryStore::default();
        assert!(store.load().await.unwrap().is_empty());

        let notes = Collection::from_notes([Note::text("a", "b")]);
        store.save(&notes).await.unwrap();

        assert_eq!(store.load().await.unwrap(), notes);
        assert_eq!(store.save_count(), 1);
    }
}
