//! Two-way merge of a local and a remote note collection.
//!
//! The merge looks at nothing but `id`, `updated_at` and `deleted`:
//!
//! | present in      | winner                                   | pushed upstream |
//! |-----------------|------------------------------------------|-----------------|
//! | local only      | local                                    | yes             |
//! | remote only     | remote                                   | no              |
//! | both, newer     | the strictly newer copy                  | if local won    |
//! | both, same time | the live copy over a tombstone, else remote | if local won |
//!
//! Reconciling a collection with itself yields the same collection and
//! nothing to push.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{Collection, Note, NoteId};

/// Result of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// One winning copy per id
    pub merged: Collection,
    /// Local copies the server has not seen yet
    pub push_upstream: Collection,
}

/// Which replica's copy of a note survives the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Remote,
}

/// Merge `local` with `remote`. Pure and infallible.
pub fn reconcile(local: &Collection, remote: &Collection) -> Reconciliation {
    let ids: BTreeSet<&NoteId> = local.ids().chain(remote.ids()).collect();
    let mut outcome = Reconciliation::default();

    for id in ids {
        if id.is_blank() {
            continue;
        }
        let (winner, side) = match (local.get(id), remote.get(id)) {
            (Some(mine), Some(theirs)) => match pick(mine, theirs) {
                Side::Local => (mine, Side::Local),
                Side::Remote => (theirs, Side::Remote),
            },
            (Some(mine), None) => (mine, Side::Local),
            (None, Some(theirs)) => (theirs, Side::Remote),
            (None, None) => continue,
        };

        if side == Side::Local {
            outcome.push_upstream.insert(winner.clone());
        }
        outcome.merged.insert(winner.clone());
    }

    outcome
}

fn pick(local: &Note, remote: &Note) -> Side {
    match local.updated_at.cmp(&remote.updated_at) {
        Ordering::Greater => Side::Local,
        Ordering::Less => Side::Remote,
        // A live copy beats a tombstone stamped at the same instant; anything
        // else is settled in the server's favour.
        Ordering::Equal if remote.deleted && !local.deleted => Side::Local,
        Ordering::Equal => Side::Remote,
    }
}
