pub mod anchor;
pub mod doc;
pub mod editor;
pub mod history;
pub mod host;
pub mod plugins;
pub mod position;
pub mod selection;

// Re-export key types for easier usage
pub use anchor::{AbsolutePosition, Bias, PositionAnchor};
pub use doc::{BasicBlock, Block, BlockDefinition, BlockId, ContentItem, DocError, Document, TextId, TextUnit};
pub use editor::{Editor, EditorOptions, SelectionTarget};
pub use history::{CURSOR_KEY, CursorMemo, EditHistory, EntryMeta, HistoryEntry};
pub use host::{HostTree, NodeBindings, NodeId, RawRange, RawSelection};
pub use plugins::Plugin;
pub use position::{find_range_nodes, find_text_node, logical_index};
pub use selection::SelectionSnapshot;
