use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::doc::TextId;

/// Stable identity token for a block node.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct BlockId(pub Uuid);

impl BlockId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// One entry of a block's ordered content: text units interleaved with
/// inline blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentItem {
    Text(TextId),
    Inline(BlockId),
}

/// Block-type capabilities.
///
/// Every method has a default, so a block type only implements the
/// capabilities it actually has. Absence of a lifecycle hook is a no-op, not
/// an error. A *void* block's interior is not a normal cursor target; an
/// *island* block's descendants are selected as one atomic unit.
pub trait BlockDefinition {
    /// Block-type name, e.g. `"paragraph"`.
    fn kind(&self) -> &str;

    fn is_void(&self) -> bool {
        false
    }

    fn is_island(&self) -> bool {
        false
    }

    /// Fired when the block enters the focused set.
    fn on_focus(&self, _block: &Block) {}

    /// Fired exactly once when the block leaves the focused or selected set.
    fn on_blur(&self, _block: &Block) {}

    /// Fired when the block enters the selected set.
    fn on_select(&self, _block: &Block) {}
}

/// Plain block type: static flags, no lifecycle hooks.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub kind: String,
    pub void: bool,
    pub island: bool,
}

impl BasicBlock {
    pub fn new(kind: &str) -> Rc<Self> {
        Rc::new(Self {
            kind: kind.to_string(),
            ..Self::default()
        })
    }

    pub fn void(kind: &str) -> Rc<Self> {
        Rc::new(Self {
            kind: kind.to_string(),
            void: true,
            island: false,
        })
    }

    pub fn island(kind: &str) -> Rc<Self> {
        Rc::new(Self {
            kind: kind.to_string(),
            void: false,
            island: true,
        })
    }
}

impl BlockDefinition for BasicBlock {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn is_void(&self) -> bool {
        self.void
    }

    fn is_island(&self) -> bool {
        self.island
    }
}

/// Logical block node: one editable unit of document structure.
///
/// A block owns an ordered content sequence (text units interleaved with
/// inline blocks) and an ordered list of child blocks. The tree is acyclic
/// and rooted; the selection engine only reads this structure and requests
/// focus/blur/select callbacks, it never mutates it.
#[derive(Clone)]
pub struct Block {
    pub id: BlockId,
    /// `None` for root-level blocks.
    pub parent: Option<BlockId>,
    pub content: Vec<ContentItem>,
    pub children: Vec<BlockId>,
    pub definition: Rc<dyn BlockDefinition>,
}

impl Block {
    /// First text unit in the block's content, if any.
    pub fn first_text(&self) -> Option<TextId> {
        self.text_items().next()
    }

    /// Text units of the content sequence, in order.
    pub fn text_items(&self) -> impl Iterator<Item = TextId> + '_ {
        self.content.iter().filter_map(|item| match item {
            ContentItem::Text(id) => Some(*id),
            ContentItem::Inline(_) => None,
        })
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("kind", &self.definition.kind())
            .field("content", &self.content)
            .field("children", &self.children)
            .finish()
    }
}
