//! Test doubles shared by the sync tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Collection, Note, NoteId};
use crate::remote::{Endpoint, RemoteClient, RemoteError};
use crate::store::NoteStore;

pub fn note_at(id: &str, updated_at: i64) -> Note {
    let mut note = Note::text("", "");
    note.id = NoteId::from(id);
    note.updated_at = updated_at;
    note
}

/// In-memory server with scripted failures.
#[derive(Debug, Default)]
pub struct FakeRemote {
    notes: Mutex<Collection>,
    failures: Mutex<VecDeque<RemoteError>>,
    latency: Mutex<Duration>,
    pushed: Mutex<Vec<Collection>>,
    fetches: AtomicUsize,
    pushes: AtomicUsize,
}

impl FakeRemote {
    pub fn new(notes: Collection) -> Self {
        Self {
            notes: Mutex::new(notes),
            ..Self::default()
        }
    }

    /// Fail the next call (fetch or push) with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<Collection> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn server_notes(&self) -> Collection {
        self.notes.lock().unwrap().clone()
    }

    async fn call(&self) -> std::result::Result<(), RemoteError> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let failure = self.failures.lock().unwrap().pop_front();
        failure.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn fetch_all(&self, _endpoint: &Endpoint) -> std::result::Result<Collection, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.call().await?;
        Ok(self.server_notes())
    }

    async fn push_subset(
        &self,
        _endpoint: &Endpoint,
        notes: &Collection,
    ) -> std::result::Result<(), RemoteError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.call().await?;
        let mut server = self.notes.lock().unwrap();
        for note in notes.iter() {
            server.insert(note.clone());
        }
        self.pushed.lock().unwrap().push(notes.clone());
        Ok(())
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl NoteStore for FailingStore {
    async fn load(&self) -> Result<Collection> {
        Ok(Collection::new())
    }

    async fn save(&self, _notes: &Collection) -> Result<()> {
        Err(Error::Storage("disk full".to_string()))
    }
}
