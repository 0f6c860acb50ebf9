/*!
 * Editor façade.
 *
 * [`Editor`] owns the document, the host tree mirror, the bindings, the
 * selection engine and the history stacks, and routes between them: host
 * selection events come in through [`Editor::set_native_selection`],
 * programmatic placement goes out through the `set_*` family, and undo/redo
 * restores the cursor from history metadata. Nothing here is thread-safe;
 * an editor lives on the host's single event-dispatch thread.
 */

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::anchor::{Bias, PositionAnchor};
use crate::doc::{BlockId, Document, TextId};
use crate::history::{CURSOR_KEY, CursorMemo, EditHistory, HistoryEntry};
use crate::host::{HostTree, NodeBindings, NodeId, RawSelection};
use crate::plugins::Plugin;
use crate::position;
use crate::selection::{SelectionEngine, SelectionSnapshot};

/// Tunable editor behavior. All fields have defaults, so a config file may
/// give any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Attribute set on host elements of selected blocks.
    pub selected_marker: String,
    /// Attribute set on host elements of focused blocks.
    pub focused_marker: String,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            selected_marker: "data-edda-selected".to_string(),
            focused_marker: "data-edda-focused".to_string(),
        }
    }
}

/// Where a programmatic selection operation should land: a text unit
/// directly, or a block (resolved to its first text unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    Text(TextId),
    Block(BlockId),
}

impl From<TextId> for SelectionTarget {
    fn from(text: TextId) -> Self {
        Self::Text(text)
    }
}

impl From<BlockId> for SelectionTarget {
    fn from(block: BlockId) -> Self {
        Self::Block(block)
    }
}

/// Work queued for the next host tick. Some host gestures (triple-click)
/// report before the host selection has settled; acting on them is deferred
/// until the host signals the next frame.
#[derive(Debug, Clone, Copy)]
enum Deferred {
    SelectWholeStartText,
}

pub struct Editor {
    pub doc: Document,
    pub host: HostTree,
    pub bindings: NodeBindings,
    pub history: EditHistory,
    selection: SelectionEngine,
    plugins: Vec<Box<dyn Plugin>>,
    options: EditorOptions,
    container: NodeId,
    on_selection_change: Option<Box<dyn FnMut(&SelectionSnapshot)>>,
    deferred: VecDeque<Deferred>,
    attached: bool,
}

impl Editor {
    pub fn new(options: EditorOptions) -> Self {
        let host = HostTree::new();
        let container = host.root();
        Self {
            doc: Document::new(),
            host,
            bindings: NodeBindings::default(),
            history: EditHistory::new(),
            selection: SelectionEngine::new(),
            plugins: Vec::new(),
            options,
            container,
            on_selection_change: None,
            deferred: VecDeque::new(),
            attached: false,
        }
    }

    /// Build an editor around a document materialized from JSON.
    pub fn from_json(value: &serde_json::Value, options: EditorOptions) -> anyhow::Result<Self> {
        let mut editor = Self::new(options);
        editor.doc = Document::from_json(value)?;
        Ok(editor)
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Mount the editor into a subtree of the host page. Selection events
    /// anchored outside this node are not the editor's to handle.
    pub fn set_container(&mut self, node: NodeId) {
        self.container = node;
    }

    pub fn snapshot(&self) -> Rc<SelectionSnapshot> {
        self.selection.snapshot()
    }

    pub fn focused_blocks(&self) -> &std::collections::BTreeSet<BlockId> {
        self.selection.focused_blocks()
    }

    pub fn selected_blocks(&self) -> &std::collections::BTreeSet<BlockId> {
        self.selection.selected_blocks()
    }

    pub fn set_selection_callback(&mut self, callback: impl FnMut(&SelectionSnapshot) + 'static) {
        self.on_selection_change = Some(Box::new(callback));
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    // ---- lifecycle ----

    /// Start consuming host events and recording cursor metadata. Calling it
    /// again while attached is a no-op.
    pub fn init(&mut self) {
        if self.attached {
            return;
        }
        self.attached = true;
        debug!("editor attached");
    }

    /// Stop consuming host events. Safe to call repeatedly and before
    /// [`Self::init`].
    pub fn teardown(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.deferred.clear();
        debug!("editor detached");
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn notify_selection_change(&mut self) {
        if !self.attached {
            return;
        }
        let snapshot = self.selection.snapshot();
        if let Some(callback) = self.on_selection_change.as_mut() {
            callback(&snapshot);
        }
        for plugin in &mut self.plugins {
            plugin.on_selection_change(&snapshot);
        }
    }

    // ---- selection input ----

    /// Feed one raw host selection event through the state machine. Events
    /// outside the managed container, or delivered while the editor is
    /// detached, are ignored entirely: no snapshot update, no hook firings,
    /// no host mutation.
    pub fn set_native_selection(&mut self, raw: &RawSelection) {
        if !self.attached {
            trace!("selection event while detached ignored");
            return;
        }
        let changed = self.selection.apply_host_selection(
            &self.doc,
            &mut self.host,
            &self.bindings,
            &self.options,
            self.container,
            raw,
        );
        if changed {
            self.notify_selection_change();
        }
    }

    /// Collapse the selection at a character offset under an arbitrary host
    /// node. Unresolvable positions leave the selection unchanged.
    pub fn set_at_node_offset(&mut self, node: NodeId, offset: u32) {
        let Some((text_node, within)) = position::find_text_node(&self.host, node, offset) else {
            warn!("no text node at offset {offset} under {node:?}, selection unchanged");
            return;
        };
        self.set_native_selection(&RawSelection::collapsed(text_node, within));
    }

    /// Collapse the selection at a logical offset inside a target's text.
    pub fn set_at_text_offset(&mut self, target: impl Into<SelectionTarget>, offset: u32) {
        let Some(text) = self.resolve_target(target.into()) else {
            warn!("selection target does not resolve to a text unit");
            return;
        };
        let Some(node) = self.bindings.text_node(text) else {
            warn!("text unit {text:?} is not rendered, selection unchanged");
            return;
        };
        self.set_at_node_offset(node, offset);
    }

    /// Select `[start, end]` within one text unit.
    pub fn set_selection_at_text_range(&mut self, text: TextId, start: u32, end: u32) {
        let Some(node) = self.bindings.text_node(text) else {
            warn!("text unit {text:?} is not rendered, selection unchanged");
            return;
        };
        let Some(((start_node, start_offset), (end_node, end_offset))) =
            position::find_range_nodes(&self.host, node, start, end)
        else {
            warn!("range [{start}, {end}] unresolvable in {text:?}, selection unchanged");
            return;
        };
        self.set_native_selection(&RawSelection {
            anchor_node: start_node,
            anchor_offset: start_offset,
            focus_node: end_node,
            focus_offset: end_offset,
        });
    }

    /// Select from the start of one text unit to the end of another.
    pub fn set_selection_at_texts_range(&mut self, start_text: TextId, end_text: TextId) {
        let (Some(start_node), Some(end_node)) = (
            self.bindings.text_node(start_text),
            self.bindings.text_node(end_text),
        ) else {
            warn!("cross-unit range endpoints are not both rendered, selection unchanged");
            return;
        };
        let Some(end_len) = self.doc.text_len(end_text) else {
            return;
        };
        let Some((anchor_node, anchor_offset)) = position::find_text_node(&self.host, start_node, 0)
        else {
            return;
        };
        let Some((focus_node, focus_offset)) =
            position::find_text_node(&self.host, end_node, end_len)
        else {
            return;
        };
        self.set_native_selection(&RawSelection {
            anchor_node,
            anchor_offset,
            focus_node,
            focus_offset,
        });
    }

    fn resolve_target(&self, target: SelectionTarget) -> Option<TextId> {
        match target {
            SelectionTarget::Text(text) => self.doc.text(text).map(|unit| unit.id),
            SelectionTarget::Block(block) => self.doc.block(block)?.first_text(),
        }
    }

    // ---- block-level selection ----

    pub fn select_blocks(&mut self, blocks: &[BlockId]) {
        self.selection.select_blocks(
            &self.doc,
            &mut self.host,
            &self.bindings,
            &self.options,
            blocks,
        );
    }

    pub fn focus_blocks(&mut self, blocks: &[BlockId]) {
        self.selection.focus_blocks(
            &self.doc,
            &mut self.host,
            &self.bindings,
            &self.options,
            blocks,
        );
    }

    // ---- gestures and local edits ----

    /// A click gesture with the host's click count. Triple clicks select the
    /// whole current text unit, but only on the next tick: the host selection
    /// has not settled when the gesture fires.
    pub fn handle_triple_click(&mut self, detail: u32) {
        if detail < 3 {
            return;
        }
        self.deferred.push_back(Deferred::SelectWholeStartText);
    }

    /// Run work deferred to the next host tick.
    pub fn tick(&mut self) {
        while let Some(task) = self.deferred.pop_front() {
            match task {
                Deferred::SelectWholeStartText => {
                    let Some(text) = self.selection.snapshot().start_text else {
                        continue;
                    };
                    let Some(len) = self.doc.text_len(text) else {
                        continue;
                    };
                    self.set_selection_at_text_range(text, 0, len);
                }
            }
        }
    }

    /// Slide the snapshot's offsets after a local insert (positive delta) or
    /// deletion (negative) at the cursor, without a full recomputation.
    pub fn shift(&mut self, delta: i64) {
        self.selection.shift(&self.doc, delta);
        self.notify_selection_change();
    }

    /// Re-place the cursor from the snapshot's edit-resilient anchor, after
    /// `text` was mutated by a remote collaborator. No-op unless the cursor
    /// currently sits in `text`, or when the anchor no longer resolves.
    pub fn restore_anchor(&mut self, text: TextId) {
        if self.selection.snapshot().start_text != Some(text) {
            return;
        }
        let Some(anchor) = self.selection.snapshot().anchor.clone() else {
            return;
        };
        let Some(position) = anchor.decode(&self.doc) else {
            debug!("anchor for {text:?} no longer resolves, cursor left in place");
            return;
        };
        self.set_at_text_offset(position.text, position.offset);
    }

    // ---- history coupling ----

    /// Record an undoable step, tagging it with the current cursor location.
    /// Metadata is only attached while the editor is attached.
    pub fn record_history_entry(&mut self) {
        let mut entry = HistoryEntry::new();
        if self.attached {
            let snapshot = self.selection.snapshot();
            let block = snapshot
                .start_text
                .and_then(|t| self.doc.text(t))
                .map(|unit| unit.parent);
            let anchor = snapshot.start_text.and_then(|t| {
                PositionAnchor::encode(&self.doc, t, snapshot.y_end, Bias::Before)
            });
            entry.meta_mut().set(
                CURSOR_KEY,
                CursorMemo {
                    text: snapshot.start_text,
                    block,
                    offset: snapshot.y_end,
                    anchor,
                },
            );
        }
        self.history.push(entry);
    }

    /// Pop the undo stack and restore the cursor recorded on the entry. The
    /// entry moves to the redo stack with its metadata intact.
    pub fn undo(&mut self) {
        let Some(entry) = self.history.pop_undo() else {
            return;
        };
        if self.attached {
            self.restore_from_entry(&entry);
        }
        self.history.stash_redo(entry);
    }

    pub fn redo(&mut self) {
        let Some(entry) = self.history.pop_redo() else {
            return;
        };
        if self.attached {
            self.restore_from_entry(&entry);
        }
        self.history.stash_undo(entry);
    }

    /// Restore the cursor from an entry's memo: anchor first, then the plain
    /// offset against the exact unit, then the owning block's first unit.
    /// When nothing resolves the selection is left unchanged.
    fn restore_from_entry(&mut self, entry: &HistoryEntry) {
        let Some(memo) = entry.meta().get::<CursorMemo>(CURSOR_KEY) else {
            return;
        };
        if let Some(anchor) = &memo.anchor {
            if let Some(position) = anchor.decode(&self.doc) {
                self.set_at_text_offset(position.text, position.offset);
                return;
            }
        }
        let unit = memo
            .text
            .and_then(|t| self.doc.text_by_id_or_parent(t, memo.block))
            .map(|unit| unit.id);
        let Some(text) = unit else {
            debug!("history entry cursor location no longer exists, selection unchanged");
            return;
        };
        let offset = self
            .doc
            .text_len(text)
            .map_or(memo.offset, |len| memo.offset.min(len));
        self.set_at_text_offset(text, offset);
    }
}
