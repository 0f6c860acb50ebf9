/*!
 * Selection state machine.
 *
 * [`SelectionEngine`] turns raw host selection events into
 * [`SelectionSnapshot`]s and maintains the focused/selected block sets. The
 * snapshot is immutable-by-replacement: each recomputation builds a complete
 * value and swaps one `Rc`. Every failure path degrades to "selection
 * unchanged" or to a semantically empty snapshot — a stale selection is
 * always safer than crashing the editing surface.
 */

mod reconcile;
pub mod snapshot;

pub use snapshot::SelectionSnapshot;

use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, trace};

use crate::anchor::{Bias, PositionAnchor};
use crate::doc::{BlockId, Document, TextId};
use crate::editor::EditorOptions;
use crate::host::{HostTree, NodeBindings, NodeId, RawSelection};
use crate::position;
use reconcile::{EnterHook, reconcile};

pub struct SelectionEngine {
    snapshot: Rc<SelectionSnapshot>,
    focused: BTreeSet<BlockId>,
    selected: BTreeSet<BlockId>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self {
            snapshot: Rc::new(SelectionSnapshot::default()),
            focused: BTreeSet::new(),
            selected: BTreeSet::new(),
        }
    }

    /// The current snapshot. Cheap to clone; consumers must treat it as
    /// read-only and subscribe to change notifications for freshness.
    pub fn snapshot(&self) -> Rc<SelectionSnapshot> {
        Rc::clone(&self.snapshot)
    }

    pub fn focused_blocks(&self) -> &BTreeSet<BlockId> {
        &self.focused
    }

    pub fn selected_blocks(&self) -> &BTreeSet<BlockId> {
        &self.selected
    }

    /// Consume one raw host selection event and recompute the snapshot.
    /// Returns whether a new snapshot was produced (out-of-container events
    /// produce none, and cause no side effects at all).
    pub(crate) fn apply_host_selection(
        &mut self,
        doc: &Document,
        host: &mut HostTree,
        bindings: &NodeBindings,
        options: &EditorOptions,
        container: NodeId,
        raw: &RawSelection,
    ) -> bool {
        // Events whose anchor lies outside the managed container are not
        // ours: no snapshot update, no hook firings, no notification.
        if !host.contains(container, raw.anchor_node) {
            trace!("selection change outside managed container ignored");
            return false;
        }

        let is_collapsed = raw.is_collapsed();
        let ranges = raw.ranges();

        // Direction: reversed only when anchor and focus share a node
        // context and the anchor's offset is past the focus's. Cross-node
        // reversals surface as out-of-order logical offsets and are
        // normalized below.
        let is_reversed = !is_collapsed
            && raw.anchor_node == raw.focus_node
            && raw.anchor_offset > raw.focus_offset;
        let (mut start_node, mut start) = if is_reversed {
            (raw.focus_node, raw.focus_offset)
        } else {
            (raw.anchor_node, raw.anchor_offset)
        };
        let (mut end_node, mut end) = if is_reversed {
            (raw.anchor_node, raw.anchor_offset)
        } else {
            (raw.focus_node, raw.focus_offset)
        };

        let mut start_text = bindings.text_at(host, start_node);
        let mut end_text = if is_collapsed {
            start_text
        } else {
            bindings.text_at(host, end_node)
        };

        let Some(resolved_start) = start_text else {
            // Structurally complete, semantically empty.
            debug!("selection change resolved no text unit");
            self.select_blocks(doc, host, bindings, options, &[]);
            self.focus_blocks(doc, host, bindings, options, &[]);
            self.snapshot = Rc::new(SelectionSnapshot::unresolved(raw));
            return true;
        };

        // Host offsets -> logical offsets, per unit.
        let mut y_start =
            position::logical_index(host, bindings, resolved_start, start_node, start)
                .unwrap_or(0);
        let mut y_end = if is_collapsed {
            y_start
        } else {
            end_text
                .and_then(|text| position::logical_index(host, bindings, text, end_node, end))
                .unwrap_or(y_start)
        };

        // Normalize to document order. When the logical offsets arrive
        // reversed, the start/end identities (units, host nodes, host
        // offsets) swap in the same step so that every start field keeps
        // describing the earlier endpoint.
        let order = doc.texts_in_order();
        let mut start_index = start_text.and_then(|t| order.iter().position(|x| *x == t));
        let mut end_index = end_text.and_then(|t| order.iter().position(|x| *x == t));
        let out_of_order = match (start_index, end_index) {
            (Some(s), Some(e)) => s > e || (s == e && y_start > y_end),
            _ => y_start > y_end,
        };
        if out_of_order {
            std::mem::swap(&mut start_text, &mut end_text);
            std::mem::swap(&mut start_node, &mut end_node);
            std::mem::swap(&mut start, &mut end);
            std::mem::swap(&mut y_start, &mut y_end);
            std::mem::swap(&mut start_index, &mut end_index);
        }

        // Every unit the selection spans, in document order.
        let texts: Vec<TextId> = match (start_index, end_index) {
            (Some(s), Some(e)) => order[s..=e].to_vec(),
            _ => start_text.into_iter().collect(),
        };

        // A text selection clears any whole-block selection, and focus
        // follows the parents of the spanned units.
        self.select_blocks(doc, host, bindings, options, &[]);
        let mut parents: Vec<BlockId> = Vec::new();
        for text in &texts {
            if let Some(unit) = doc.text(*text) {
                if !parents.contains(&unit.parent) {
                    parents.push(unit.parent);
                }
            }
        }
        self.focus_blocks(doc, host, bindings, options, &parents);

        // Nearest void/island ancestor of the start unit's block.
        let start_block = start_text.and_then(|t| doc.text(t)).map(|u| u.parent);
        let island_root = start_block
            .and_then(|b| doc.ancestors(b).find(|blk| blk.definition.is_island()))
            .map(|blk| blk.id);
        let void_root = start_block
            .and_then(|b| doc.ancestors(b).find(|blk| blk.definition.is_void()))
            .map(|blk| blk.id);

        let end_len = end_text.and_then(|t| doc.text_len(t));
        let content = spanned_content(doc, &texts, y_start, y_end);
        let anchor =
            start_text.and_then(|t| PositionAnchor::encode(doc, t, y_start, Bias::Before));
        let raw_content = start_text
            .and_then(|t| doc.text_content(t))
            .unwrap_or_default();

        self.snapshot = Rc::new(SelectionSnapshot {
            selection: Some(*raw),
            start,
            end,
            y_start,
            y_end,
            length: content.len() as u32,
            content,
            is_collapsed,
            ranges,
            is_text_spanning: start_text != end_text && texts.len() > 1,
            texts,
            start_text,
            end_text,
            start_node: Some(start_node),
            end_node: Some(end_node),
            is_at_start: y_start == 0,
            is_at_end: matches!(end_len, Some(len) if y_end == len),
            is_void: void_root.is_some(),
            is_island: island_root.is_some(),
            void_root,
            island_root,
            anchor,
            raw_content,
        });
        debug!(
            "selection snapshot replaced: y_start={y_start} y_end={y_end} collapsed={is_collapsed}"
        );
        true
    }

    /// Select a whole-block set. Selecting exactly one block also clears the
    /// focused set: a single selected block owns the selection outright.
    pub(crate) fn select_blocks(
        &mut self,
        doc: &Document,
        host: &mut HostTree,
        bindings: &NodeBindings,
        options: &EditorOptions,
        blocks: &[BlockId],
    ) {
        reconcile(
            &mut self.selected,
            blocks,
            doc,
            host,
            bindings,
            &options.selected_marker,
            EnterHook::Select,
        );
        if blocks.len() == 1 {
            reconcile(
                &mut self.focused,
                &[],
                doc,
                host,
                bindings,
                &options.focused_marker,
                EnterHook::Focus,
            );
        }
    }

    pub(crate) fn focus_blocks(
        &mut self,
        doc: &Document,
        host: &mut HostTree,
        bindings: &NodeBindings,
        options: &EditorOptions,
        blocks: &[BlockId],
    ) {
        reconcile(
            &mut self.focused,
            blocks,
            doc,
            host,
            bindings,
            &options.focused_marker,
            EnterHook::Focus,
        );
    }

    /// Slide the snapshot's offsets after a local insert at the cursor,
    /// refreshing the raw-content mirror. Replaces the snapshot; never
    /// mutates the published value in place.
    pub(crate) fn shift(&mut self, doc: &Document, delta: i64) {
        let bump = |offset: u32| -> u32 { (i64::from(offset) + delta).max(0) as u32 };
        let mut next = (*self.snapshot).clone();
        next.start = bump(next.start);
        next.end = bump(next.end);
        next.y_start = bump(next.y_start);
        next.y_end = bump(next.y_end);
        next.raw_content = next
            .start_text
            .and_then(|t| doc.text_content(t))
            .unwrap_or_default();
        self.snapshot = Rc::new(next);
    }
}

/// Textual content of the selection, materialized from the logical units:
/// tail of the start unit, whole middle units, head of the end unit.
fn spanned_content(doc: &Document, texts: &[TextId], y_start: u32, y_end: u32) -> String {
    match texts {
        [] => String::new(),
        [only] => doc
            .text_content(*only)
            .map(|s| unit_slice(&s, y_start as usize..y_end as usize))
            .unwrap_or_default(),
        [first, middle @ .., last] => {
            let mut out = String::new();
            if let Some(s) = doc.text_content(*first) {
                out.push_str(&unit_slice(&s, y_start as usize..s.len()));
            }
            for text in middle {
                if let Some(s) = doc.text_content(*text) {
                    out.push_str(&s);
                }
            }
            if let Some(s) = doc.text_content(*last) {
                out.push_str(&unit_slice(&s, 0..y_end as usize));
            }
            out
        }
    }
}

/// Slice a unit's content, degrading to empty when an offset lands inside a
/// multi-byte character instead of on a boundary.
fn unit_slice(content: &str, range: std::ops::Range<usize>) -> String {
    match content.get(range.clone()) {
        Some(slice) => slice.to_string(),
        None => {
            debug!(
                "selection offsets [{}, {}] do not fall on character boundaries, \
                 content left empty",
                range.start, range.end
            );
            String::new()
        }
    }
}
