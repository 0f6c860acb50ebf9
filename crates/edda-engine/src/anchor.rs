//! Edit-resilient position anchors.
//!
//! A [`PositionAnchor`] encodes a logical position relative to a text unit's
//! CRDT character sequence rather than as a plain integer, so it stays valid
//! after concurrent insertions and deletions elsewhere in the sequence. It is
//! the only mechanism for restoring cursor location across undo/redo and
//! remote mutation.

use log::trace;
use yrs::{Assoc, IndexedSequence, StickyIndex};

use crate::doc::{Document, TextId};

/// Which side of the offset the anchor sticks to when text is inserted
/// exactly at the anchored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Prefer the character before the offset: an insert at the cursor keeps
    /// the anchor where it was. This is the bias used for selection starts.
    #[default]
    Before,
    /// Prefer the character after the offset.
    After,
}

impl From<Bias> for Assoc {
    fn from(bias: Bias) -> Assoc {
        match bias {
            Bias::Before => Assoc::Before,
            Bias::After => Assoc::After,
        }
    }
}

/// A decoded anchor: the text unit plus the absolute offset it currently
/// denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsolutePosition {
    pub text: TextId,
    pub offset: u32,
}

/// Relative position inside one text unit's character sequence.
#[derive(Debug, Clone)]
pub struct PositionAnchor {
    text: TextId,
    index: StickyIndex,
}

impl PositionAnchor {
    /// Encode `offset` within `text` as an edit-resilient anchor. `None` when
    /// the unit is unknown or the offset is beyond the sequence.
    pub fn encode(doc: &Document, text: TextId, offset: u32, bias: Bias) -> Option<Self> {
        let unit = doc.text(text)?;
        let mut txn = doc.write_txn();
        let index = unit.ytext().sticky_index(&mut txn, offset, bias.into())?;
        Some(Self { text, index })
    }

    /// Resolve the anchor against the document's current state. Returns
    /// `None` — never panics — when the referenced unit has been removed or
    /// the sequence state makes the anchor unresolvable; callers treat that
    /// as "cannot restore cursor, leave selection unchanged".
    pub fn decode(&self, doc: &Document) -> Option<AbsolutePosition> {
        if doc.text(self.text).is_none() {
            trace!("anchor text unit {:?} no longer exists", self.text);
            return None;
        }
        let txn = doc.read_txn();
        let offset = self.index.get_offset(&txn)?;
        Some(AbsolutePosition {
            text: self.text,
            offset: offset.index,
        })
    }

    /// The text unit this anchor was encoded against.
    pub fn text(&self) -> TextId {
        self.text
    }
}
