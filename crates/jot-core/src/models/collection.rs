//! Note collection model

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::note::{Note, NoteId};

/// A set of notes keyed by id.
///
/// Iteration follows id order so every consumer (stores, pushes, tests) sees
/// the same sequence for the same contents. On the wire and on disk a
/// collection is a plain JSON array of notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Note>", into = "Vec<Note>")]
pub struct Collection {
    notes: BTreeMap<NoteId, Note>,
}

/// Per-id `updated_at` snapshot used to tell whether a collection changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeMap<NoteId, i64>);

impl Collection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from arbitrary notes.
    ///
    /// Notes with a blank id are dropped. When the same id appears more than
    /// once the newest copy wins, the later one on equal timestamps.
    pub fn from_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut collection = Self::new();
        for note in notes {
            collection.absorb(note);
        }
        collection
    }

    fn absorb(&mut self, note: Note) {
        if note.id.is_blank() {
            tracing::debug!("Dropping note without a usable id");
            return;
        }
        match self.notes.entry(note.id.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(note);
            }
            btree_map::Entry::Occupied(mut slot) => {
                if note.updated_at >= slot.get().updated_at {
                    slot.insert(note);
                }
            }
        }
    }

    /// Insert or replace a note unconditionally, returning the previous copy.
    pub fn insert(&mut self, note: Note) -> Option<Note> {
        self.notes.insert(note.id.clone(), note)
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn get_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.get_mut(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NoteId> {
        self.notes.keys()
    }

    /// Live notes visible to `username`, newest first.
    pub fn visible_to(&self, username: &str) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self
            .iter()
            .filter(|note| note.is_visible_to(username))
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    /// Live notes visible to `username` that carry `tag`, newest first.
    pub fn with_tag(&self, username: &str, tag: &str) -> Vec<&Note> {
        self.visible_to(username)
            .into_iter()
            .filter(|note| note.has_tag(tag))
            .collect()
    }

    /// Every tag used by any note, sorted and de-duplicated.
    pub fn all_tags(&self) -> Vec<String> {
        self.iter()
            .flat_map(|note| note.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(
            self.notes
                .iter()
                .map(|(id, note)| (id.clone(), note.updated_at))
                .collect(),
        )
    }

    pub fn into_notes(self) -> Vec<Note> {
        self.notes.into_values().collect()
    }
}

impl From<Vec<Note>> for Collection {
    fn from(notes: Vec<Note>) -> Self {
        Self::from_notes(notes)
    }
}

impl From<Collection> for Vec<Note> {
    fn from(collection: Collection) -> Self {
        collection.into_notes()
    }
}

impl FromIterator<Note> for Collection {
    fn from_iter<T: IntoIterator<Item = Note>>(iter: T) -> Self {
        Self::from_notes(iter)
    }
}

impl IntoIterator for Collection {
    type Item = Note;
    type IntoIter = btree_map::IntoValues<NoteId, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.into_values()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Note;
    type IntoIter = btree_map::Values<'a, NoteId, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Owner;
    use pretty_assertions::assert_eq;

    fn note(id: &str, updated_at: i64, title: &str) -> Note {
        let mut note = Note::text(title, "");
        note.id = NoteId::from(id);
        note.updated_at = updated_at;
        note
    }

    #[test]
    fn duplicates_keep_the_newest_copy() {
        let collection = Collection::from_notes([
            note("1", 200, "newer"),
            note("1", 100, "older"),
            note("2", 50, "first"),
            note("2", 50, "second"),
        ]);

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(&"1".into()).unwrap().title, "newer");
        assert_eq!(collection.get(&"2".into()).unwrap().title, "second");
    }

    #[test]
    fn blank_ids_are_dropped() {
        let collection = Collection::from_notes([note("", 1, "x"), note("  ", 2, "y")]);
        assert!(collection.is_empty());
    }

    #[test]
    fn serializes_as_array_in_id_order() {
        let collection = Collection::from_notes([note("b", 2, "B"), note("a", 1, "A")]);
        let json = serde_json::to_value(&collection).unwrap();
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let back: Collection = serde_json::from_value(json).unwrap();
        assert_eq!(back, collection);
    }

    #[test]
    fn visible_to_filters_owner_and_tombstones() {
        let mut deleted = note("3", 300, "gone");
        deleted.deleted = true;
        let collection = Collection::from_notes([
            note("1", 100, "mine").with_owner(Owner::from_username("sam")),
            note("2", 200, "theirs").with_owner(Owner::from_username("alex")),
            deleted,
            note("4", 400, "shared").with_owner(Owner::Shared),
        ]);

        let titles: Vec<&str> = collection
            .visible_to("sam")
            .iter()
            .map(|note| note.title.as_str())
            .collect();
        assert_eq!(titles, vec!["shared", "mine"]);
    }

    #[test]
    fn tags_are_collected_sorted() {
        let collection = Collection::from_notes([
            note("1", 1, "a").with_tags(["work", "home"]),
            note("2", 2, "b").with_tags(["home"]),
        ]);
        assert_eq!(collection.all_tags(), vec!["home", "work"]);
        assert_eq!(collection.with_tag("anyone", "WORK").len(), 1);
    }

    #[test]
    fn fingerprint_tracks_timestamps() {
        let mut collection = Collection::from_notes([note("1", 1, "a")]);
        let before = collection.fingerprint();
        collection.get_mut(&"1".into()).unwrap().touch();
        assert_ne!(before, collection.fingerprint());
    }
}
