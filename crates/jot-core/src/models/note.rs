//! Note model

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Owner sentinel for notes shared with every user.
pub const SHARED_OWNER: &str = "All";

/// A stable note identifier.
///
/// Locally created notes get a UUID v7 (time-sortable); ids received from the
/// server are accepted verbatim as long as they are not blank. Integer ids on
/// the wire are kept in their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(Self(match WireId::deserialize(deserializer)? {
            WireId::Text(text) => text,
            WireId::Signed(number) => number.to_string(),
            WireId::Unsigned(number) => number.to_string(),
        }))
    }
}

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids that are empty or whitespace-only cannot be reconciled.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Note ID cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Who can see a note: a single user, or everyone (`"All"` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    Shared,
    User(String),
}

impl Owner {
    /// Build an owner from a username, mapping the sentinel to `Shared`.
    pub fn from_username(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Whether `username` is allowed to see notes with this owner.
    pub fn admits(&self, username: &str) -> bool {
        match self {
            Self::Shared => true,
            Self::User(owner) => owner == username,
        }
    }
}

impl From<String> for Owner {
    fn from(value: String) -> Self {
        if value == SHARED_OWNER {
            Self::Shared
        } else {
            Self::User(value)
        }
    }
}

impl From<Owner> for String {
    fn from(value: Owner) -> Self {
        match value {
            Owner::Shared => SHARED_OWNER.to_string(),
            Owner::User(name) => name,
        }
    }
}

/// Note flavour. Text notes omit `type` on the wire; checklists use `"list"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    #[default]
    #[serde(rename = "note", alias = "text")]
    Text,
    #[serde(rename = "list")]
    Checklist,
}

impl NoteKind {
    const fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// Body of a text note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub text: String,
}

/// A single checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    /// Create an unchecked item with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            text: text.into(),
            checked: false,
        }
    }
}

/// A note or checklist.
///
/// Only `id`, `updated_at` and `deleted` matter to reconciliation; every other
/// field is carried along untouched. Fields this model does not know about are
/// kept in `extra` so a store or server round-trip never loses data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable identifier, never reused
    pub id: NoteId,
    /// Last mutation timestamp (Unix ms)
    #[serde(default)]
    pub updated_at: i64,
    /// Tombstone flag; deleted notes are kept so the deletion propagates
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Owning user, `"All"` for shared notes
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "NoteKind::is_text")]
    pub kind: NoteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ChecklistItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl Note {
    fn blank(kind: NoteKind, title: String) -> Self {
        Self {
            id: NoteId::new(),
            updated_at: unix_millis_now(),
            deleted: false,
            owner: None,
            title,
            kind,
            content: None,
            tags: Vec::new(),
            items: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Create a text note
    #[must_use]
    pub fn text(title: impl Into<String>, body: impl Into<String>) -> Self {
        let mut note = Self::blank(NoteKind::Text, title.into());
        note.content = Some(TextContent { text: body.into() });
        note
    }

    /// Create a checklist with unchecked items
    #[must_use]
    pub fn checklist<I, S>(title: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut note = Self::blank(NoteKind::Checklist, title.into());
        note.items = items.into_iter().map(ChecklistItem::new).collect();
        note
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .filter_map(|tag| {
                let tag: String = tag.into();
                let tag = tag.trim();
                (!tag.is_empty()).then(|| tag.to_string())
            })
            .collect();
        self
    }

    /// Bump `updated_at`, keeping it strictly increasing for this replica
    /// even when the wall clock stalls or steps backwards.
    pub fn touch(&mut self) {
        self.updated_at = unix_millis_now().max(self.updated_at.saturating_add(1));
    }

    /// Turn the note into a tombstone.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Whether the note should be listed for `username`.
    ///
    /// Notes without an owner predate per-user notes and are shown to everyone.
    pub fn is_visible_to(&self, username: &str) -> bool {
        !self.deleted
            && self
                .owner
                .as_ref()
                .is_none_or(|owner| owner.admits(username))
    }

    /// Case-insensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|own| own.eq_ignore_ascii_case(tag))
    }

    /// Flip a checklist item and bump the note. Returns the new checked state.
    pub fn toggle_item(&mut self, item_id: &str) -> Result<bool> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| Error::NotFound(format!("checklist item {item_id}")))?;
        item.checked = !item.checked;
        let checked = item.checked;
        self.touch();
        Ok(checked)
    }

    /// Title, or the first line of the body, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.content
                .as_ref()
                .and_then(|content| content.text.lines().next())
                .unwrap_or("")
        } else {
            self.title.trim()
        };
        source.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("   ".parse::<NoteId>().is_err());
    }

    #[test]
    fn test_text_note_new() {
        let note = Note::text("Groceries", "milk");
        assert_eq!(note.kind, NoteKind::Text);
        assert_eq!(note.content.as_ref().unwrap().text, "milk");
        assert!(!note.deleted);
        assert!(note.updated_at > 0);
    }

    #[test]
    fn touch_is_strictly_increasing() {
        let mut note = Note::text("a", "b");
        note.updated_at = i64::MAX / 2;
        let before = note.updated_at;
        note.touch();
        assert_eq!(note.updated_at, before + 1);
    }

    #[test]
    fn mark_deleted_bumps_timestamp() {
        let mut note = Note::text("a", "b");
        let before = note.updated_at;
        note.mark_deleted();
        assert!(note.deleted);
        assert!(note.updated_at > before);
    }

    #[test]
    fn wire_format_uses_camel_case_and_sentinel_owner() {
        let mut note = Note::checklist("Trip", ["passport"]).with_owner(Owner::Shared);
        note.id = NoteId::from("42");
        note.updated_at = 100;
        let value = serde_json::to_value(&note).unwrap();

        assert_eq!(value["id"], json!("42"));
        assert_eq!(value["updatedAt"], json!(100));
        assert_eq!(value["username"], json!("All"));
        assert_eq!(value["type"], json!("list"));
        assert_eq!(value["items"][0]["text"], json!("passport"));
        assert_eq!(value["items"][0]["checked"], json!(false));
        assert!(value.get("deleted").is_none());
    }

    #[test]
    fn integer_ids_are_read_as_strings() {
        let note: Note = serde_json::from_value(json!({"id": 1, "updatedAt": 150})).unwrap();
        assert_eq!(note.id, NoteId::from("1"));
        assert_eq!(serde_json::to_value(&note).unwrap()["id"], json!("1"));

        let negative: NoteId = serde_json::from_value(json!(-3)).unwrap();
        assert_eq!(negative.as_str(), "-3");
        let large: NoteId = serde_json::from_value(json!(u64::MAX)).unwrap();
        assert_eq!(large.as_str(), u64::MAX.to_string());

        assert!(serde_json::from_value::<NoteId>(json!(1.5)).is_err());
        assert!(serde_json::from_value::<NoteId>(json!(null)).is_err());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "7",
            "updatedAt": 55,
            "deleted": true,
            "username": "sam",
            "title": "Old",
            "content": { "text": "body" },
            "tags": ["work"],
            "isGlobal": false,
            "color": "#ffcc00"
        });
        let note: Note = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(note.owner, Some(Owner::User("sam".into())));
        assert_eq!(note.extra.get("color"), Some(&json!("#ffcc00")));

        let back = serde_json::to_value(&note).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn visibility_follows_owner() {
        let private = Note::text("a", "").with_owner(Owner::from_username("sam"));
        let shared = Note::text("b", "").with_owner(Owner::from_username("All"));
        let mut gone = Note::text("c", "").with_owner(Owner::Shared);
        gone.mark_deleted();

        assert!(private.is_visible_to("sam"));
        assert!(!private.is_visible_to("alex"));
        assert!(shared.is_visible_to("alex"));
        assert!(!gone.is_visible_to("alex"));
    }

    #[test]
    fn toggle_item_flips_and_touches() {
        let mut note = Note::checklist("Packing", ["socks", "charger"]);
        let item_id = note.items[1].id.clone();
        let before = note.updated_at;

        assert!(note.toggle_item(&item_id).unwrap());
        assert!(note.items[1].checked);
        assert!(note.updated_at > before);
        assert!(!note.toggle_item(&item_id).unwrap());
        assert!(note.toggle_item("missing").is_err());
    }

    #[test]
    fn tags_are_trimmed_and_matched_case_insensitively() {
        let note = Note::text("a", "").with_tags([" Work ", "", "home"]);
        assert_eq!(note.tags, vec!["Work", "home"]);
        assert!(note.has_tag("work"));
        assert!(!note.has_tag("garden"));
    }

    #[test]
    fn test_title_preview() {
        let note = Note::text("", "First line\nSecond line");
        assert_eq!(note.title_preview(50), "First line");
        assert_eq!(note.title_preview(5), "First");
        assert_eq!(Note::text("Title", "body").title_preview(50), "Title");
    }
}
