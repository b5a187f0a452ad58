//! JSON file backed note store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::NoteStore;
use crate::error::{Error, Result};
use crate::models::Collection;

/// Default file name for the persisted collection.
pub const NOTES_FILE_NAME: &str = "notes.json";

/// Stores the collection as a pretty-printed JSON array in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous collection intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `notes.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(NOTES_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Move an unreadable collection file out of the way.
    ///
    /// Returns the backup path, or `None` when there was nothing to move.
    pub async fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut backup_name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        backup_name.push(format!(".corrupt-{timestamp}"));
        let backup_path = self.path.with_file_name(backup_name);

        tokio::fs::rename(&self.path, &backup_path).await?;
        tracing::warn!(
            "Moved unreadable note collection from {} to {}",
            self.path.display(),
            backup_path.display()
        );
        Ok(Some(backup_path))
    }

    /// Load the collection, moving an unparsable file aside and starting over
    /// with an empty collection.
    pub async fn load_or_quarantine(&self) -> Result<Collection> {
        match self.load().await {
            Err(Error::Serialization(error)) => {
                tracing::error!(
                    %error,
                    "Note collection at {} is unreadable",
                    self.path.display()
                );
                self.quarantine().await?;
                Ok(Collection::new())
            }
            other => other,
        }
    }
}

#[async_trait]
impl NoteStore for JsonFileStore {
    async fn load(&self) -> Result<Collection> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!("No note collection at {}", self.path.display());
                return Ok(Collection::new());
            }
            Err(error) => return Err(error.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Collection::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, notes: &Collection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let serialized = serde_json::to_vec_pretty(notes)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, serialized).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        tracing::trace!(
            notes = notes.len(),
            "Saved note collection to {}",
            self.path.display()
        );
        Ok(())
    }
}
