//! Undo/redo history entries and their selection metadata.
//!
//! Each history entry carries a string-keyed metadata map. The selection
//! engine attaches a [`CursorMemo`] under [`CURSOR_KEY`] when an entry is
//! recorded, and reads it back when the entry is popped, so undo and redo
//! land the cursor where the user was. The map is deliberately open-ended:
//! other layers hang their own values off the same entries.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::anchor::PositionAnchor;
use crate::doc::{BlockId, TextId};

/// Metadata key under which the cursor memo is stored.
pub const CURSOR_KEY: &str = "cursor-location";

/// String-keyed heterogeneous metadata attached to a history entry.
#[derive(Default)]
pub struct EntryMeta(HashMap<String, Box<dyn Any>>);

impl EntryMeta {
    pub fn set(&mut self, key: &str, value: impl Any) {
        self.0.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.0.get(key)?.downcast_ref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl fmt::Debug for EntryMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Where the cursor was when a history entry was recorded.
///
/// The anchor is the preferred restore path; the plain `text`/`block`/
/// `offset` triple is the structural fallback for when the anchor no longer
/// resolves (unit deleted, sequence garbage-collected).
#[derive(Debug, Clone)]
pub struct CursorMemo {
    pub text: Option<TextId>,
    pub block: Option<BlockId>,
    pub offset: u32,
    pub anchor: Option<PositionAnchor>,
}

/// One undoable step, as seen by the selection engine: the step's own payload
/// lives elsewhere, only the metadata travels through here.
#[derive(Debug, Default)]
pub struct HistoryEntry {
    meta: EntryMeta,
}

impl HistoryEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut EntryMeta {
        &mut self.meta
    }
}

/// The undo and redo stacks.
#[derive(Debug, Default)]
pub struct EditHistory {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new step. A fresh edit invalidates the redo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push(entry);
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// Park an undone entry on the redo stack, keeping its metadata intact
    /// for the round trip back.
    pub fn stash_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Park a redone entry back on the undo stack.
    pub fn stash_undo(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}
