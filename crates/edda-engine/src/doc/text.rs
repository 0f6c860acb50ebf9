use std::fmt;

use uuid::Uuid;
use yrs::TextRef;

use crate::doc::BlockId;

/// Stable identity token for a text unit.
///
/// The token survives structural moves: a unit keeps its `TextId` when its
/// owning block is reordered or reparented, so anchors and history metadata
/// can refer to it across edits.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TextId(pub Uuid);

impl TextId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Key under which the unit's character sequence lives in the yrs doc.
    pub(crate) fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextId({})", self.0)
    }
}

/// Logical text unit: one CRDT character sequence owned by exactly one block.
///
/// The unit holds a back-reference to its owning block (the block owns the
/// unit, never the other way round) and exposes its sequence through the
/// accessors on [`Document`](crate::doc::Document), which open the read
/// transaction. A unit never exists without an owning block; it is dropped
/// from the registry when that block is removed from the tree.
#[derive(Clone)]
pub struct TextUnit {
    pub id: TextId,
    /// Owning block. Back-reference only.
    pub parent: BlockId,
    pub(crate) ytext: TextRef,
}

impl TextUnit {
    /// The underlying yrs character sequence.
    pub fn ytext(&self) -> &TextRef {
        &self.ytext
    }
}

impl fmt::Debug for TextUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextUnit")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
