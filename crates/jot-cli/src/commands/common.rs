use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use jot_core::config::{ClientConfig, CONFIG_FILE_NAME};
use jot_core::connectivity::{ConnectivityMonitor, ManualConnectivity, ProbeConnectivity};
use jot_core::models::{ChecklistItem, Collection, Note, NoteKind};
use jot_core::remote::HttpNotesClient;
use jot_core::store::JsonFileStore;
use jot_core::sync::SyncEngine;
use serde::Serialize;

use crate::error::CliError;

/// Resolved config and paths for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Context {
    pub const fn new(config: ClientConfig, config_path: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config,
            config_path,
            data_dir,
        }
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let data_dir = match data_dir {
            Some(path) => path,
            None => default_data_dir()?,
        };
        let config = ClientConfig::load_from_path(&config_path)?.with_env_overrides();
        Ok(Self::new(config, config_path, data_dir))
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::in_dir(&self.data_dir)
    }

    pub async fn load_notes(&self) -> Result<Collection, CliError> {
        Ok(self.store().load_or_quarantine().await?)
    }

    /// Build a sync engine over the local collection.
    ///
    /// With `probe_network` the engine watches TCP reachability of the server;
    /// otherwise it assumes connectivity and is only used for local edits.
    pub async fn open_engine(&self, probe_network: bool) -> Result<Arc<SyncEngine>, CliError> {
        let store = Arc::new(self.store());
        let notes = store.load_or_quarantine().await?;
        let endpoint = self.config.endpoint()?;

        let connectivity: Arc<dyn ConnectivityMonitor> = match endpoint
            .as_ref()
            .filter(|_| probe_network)
            .and_then(ProbeConnectivity::for_endpoint)
        {
            Some(probe) => Arc::new(probe),
            None => Arc::new(ManualConnectivity::default()),
        };
        let remote = HttpNotesClient::new(self.config.http_options())?
            .with_connectivity(Arc::clone(&connectivity));

        let engine = SyncEngine::new(endpoint, Arc::new(remote), store, connectivity)
            .with_settings(self.config.sync_settings())
            .with_notes(notes);
        Ok(Arc::new(engine))
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("jot").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_data_dir() -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("jot"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub preview: String,
    pub owner: Option<String>,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ChecklistItem>,
    pub deleted: bool,
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        kind: match note.kind {
            NoteKind::Text => "note",
            NoteKind::Checklist => "list",
        },
        preview: note_preview(note, 80),
        owner: note.owner.clone().map(String::from),
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, Utc::now().timestamp_millis()),
        tags: note.tags.clone(),
        items: note.items.clone(),
        deleted: note.deleted,
    }
}

/// Notes to show, newest first.
///
/// Without a username every live note is shown. `include_all` also shows
/// tombstones and other users' notes.
pub fn select_notes<'a>(
    notes: &'a Collection,
    username: Option<&str>,
    tag: Option<&str>,
    include_all: bool,
) -> Vec<&'a Note> {
    let mut selected: Vec<&Note> = notes
        .iter()
        .filter(|note| {
            include_all
                || match username {
                    Some(username) => note.is_visible_to(username),
                    None => !note.deleted,
                }
        })
        .filter(|note| tag.is_none_or(|tag| note.has_tag(tag)))
        .collect();
    selected.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    selected
}

/// Find a live note by exact id or unique id prefix.
pub fn resolve_note<'a>(notes: &'a Collection, query: &str) -> Result<&'a Note, CliError> {
    let query = normalize_note_identifier(query)?;
    let live = || notes.iter().filter(|note| !note.deleted);

    if let Some(note) = live().find(|note| note.id.as_str() == query) {
        return Ok(note);
    }

    let matches: Vec<&Note> = live()
        .filter(|note| note.id.as_str().starts_with(&query))
        .take(3)
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(query)),
        [note] => Ok(note),
        _ => {
            let options = matches
                .iter()
                .map(|note| short_id(note))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Find a checklist item by 1-based position or id prefix.
pub fn resolve_item<'a>(note: &'a Note, query: &str) -> Result<&'a ChecklistItem, CliError> {
    let query = query.trim();
    if let Ok(position) = query.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| note.items.get(index))
            .ok_or_else(|| CliError::ItemNotFound(query.to_string()));
    }

    let mut matches = note
        .items
        .iter()
        .filter(|item| !query.is_empty() && item.id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        _ => Err(CliError::ItemNotFound(query.to_string())),
    }
}

pub fn format_note_lines(notes: &[&Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(note);
            let mut preview = note_preview(note, 40);
            if note.deleted {
                preview = format!("(deleted) {preview}");
            }
            let relative_time = format_relative_time(note.updated_at, now_ms);
            let progress = checklist_progress(note);
            let tags = render_tags(note);

            let mut line = format!("{short_id:<13}  {preview:<40}  {relative_time:<10}");
            if let Some(progress) = progress {
                line.push_str("  ");
                line.push_str(&progress);
            }
            if !tags.is_empty() {
                line.push_str("  ");
                line.push_str(&tags);
            }
            line.trim_end().to_string()
        })
        .collect()
}

pub fn short_id(note: &Note) -> String {
    note.id.as_str().chars().take(13).collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let title = note.title_preview(usize::MAX);
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn checklist_progress(note: &Note) -> Option<String> {
    if note.kind != NoteKind::Checklist {
        return None;
    }
    let done = note.items.iter().filter(|item| item.checked).count();
    Some(format!("[{done}/{}]", note.items.len()))
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
