use crate::anchor::PositionAnchor;
use crate::doc::{BlockId, TextId};
use crate::host::{NodeId, RawRange, RawSelection};

/// Immutable, fully-derived description of the current selection.
///
/// The snapshot is the engine's read API: it is recomputed atomically on
/// every host selection-change event and replaced wholesale — consumers
/// always receive a fresh value behind a new `Rc`, never a mutated one, so
/// there are no torn reads. Holders must not rely on a snapshot staying
/// current; subscribe to selection-change notifications instead.
///
/// Invariants: `y_start <= y_end` always (reversed raw selections are
/// normalized, including their start/end text units and host nodes);
/// collapsed implies `y_start == y_end` and `start_text == end_text`;
/// `is_at_end` holds iff `y_end` equals the end unit's length; `is_at_start`
/// holds iff `y_start` is zero.
///
/// When no text unit can be resolved the snapshot is still structurally
/// complete — every derived field holds its empty value — so consumers never
/// observe a partial state.
#[derive(Debug, Clone, Default)]
pub struct SelectionSnapshot {
    /// The raw host selection this snapshot was derived from.
    pub selection: Option<RawSelection>,
    /// Host-level character offset of the start, within its host node.
    pub start: u32,
    /// Host-level character offset of the end, within its host node.
    pub end: u32,
    /// Logical character index of the start within `start_text`.
    pub y_start: u32,
    /// Logical character index of the end within `end_text`.
    pub y_end: u32,
    /// Length of the selected content.
    pub length: u32,
    /// Textual content of the selection.
    pub content: String,
    pub is_collapsed: bool,
    /// Ordered host ranges backing the selection.
    pub ranges: Vec<RawRange>,
    /// Every text unit the selection spans, in document order.
    pub texts: Vec<TextId>,
    pub start_text: Option<TextId>,
    pub end_text: Option<TextId>,
    pub start_node: Option<NodeId>,
    pub end_node: Option<NodeId>,
    /// True iff the start sits at offset zero of the start unit.
    pub is_at_start: bool,
    /// True iff the end sits at the end unit's full length.
    pub is_at_end: bool,
    /// True iff the selection spans more than one text unit.
    pub is_text_spanning: bool,
    pub is_void: bool,
    pub is_island: bool,
    /// Nearest void ancestor of the start unit's block, if any.
    pub void_root: Option<BlockId>,
    /// Nearest island ancestor of the start unit's block, if any.
    pub island_root: Option<BlockId>,
    /// Edit-resilient anchor for the start position.
    pub anchor: Option<PositionAnchor>,
    /// Full content of the start unit. Legacy mirror kept for consumers that
    /// still diff against raw text.
    pub raw_content: String,
}

impl SelectionSnapshot {
    /// Structurally complete but semantically empty snapshot, carrying only
    /// what could be read off the raw selection.
    pub(crate) fn unresolved(raw: &RawSelection) -> Self {
        Self {
            selection: Some(*raw),
            start: raw.anchor_offset,
            end: raw.focus_offset,
            is_collapsed: raw.is_collapsed(),
            ranges: raw.ranges(),
            start_node: Some(raw.anchor_node),
            end_node: Some(raw.focus_node),
            ..Self::default()
        }
    }
}
