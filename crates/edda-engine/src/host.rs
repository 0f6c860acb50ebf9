/*!
 * Host-environment primitives.
 *
 * The engine never owns the rendering surface; it reads the host's node
 * structure and raw selection through the narrow types in this module. The
 * node tree is a flat arena indexed by [`NodeId`] — elements with ordered
 * children and attributes, and text nodes with plain content — just enough
 * structure for the position resolver to walk.
 *
 * Logical entities are associated with host nodes through [`NodeBindings`],
 * an explicit weak lookup table: entries can be removed without touching the
 * logical tree, and the logical tree never stores owning pointers to host
 * nodes.
 */

use std::collections::{BTreeMap, HashMap};

use crate::doc::{BlockId, TextId};

/// Index of a node in the host tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        children: Vec<NodeId>,
        attrs: BTreeMap<String, String>,
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// Arena tree of host nodes, rooted at the editor's managed container.
#[derive(Debug, Clone)]
pub struct HostTree {
    nodes: Vec<NodeData>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    /// A tree containing only the managed container element.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                kind: NodeKind::Element {
                    children: Vec::new(),
                    attrs: BTreeMap::new(),
                },
            }],
        }
    }

    /// The managed container.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn create_element(&mut self, parent: NodeId) -> NodeId {
        self.create(
            parent,
            NodeKind::Element {
                children: Vec::new(),
                attrs: BTreeMap::new(),
            },
        )
    }

    pub fn create_text(&mut self, parent: NodeId, content: &str) -> NodeId {
        self.create(
            parent,
            NodeKind::Text {
                content: content.to_string(),
            },
        )
    }

    fn create(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            parent: Some(parent),
            kind,
        });
        if let NodeKind::Element { children, .. } = &mut self.nodes[parent.0 as usize].kind {
            children.push(id);
        }
        id
    }

    pub fn set_text(&mut self, node: NodeId, content: &str) {
        if let NodeKind::Text { content: current } = &mut self.nodes[node.0 as usize].kind {
            current.clear();
            current.push_str(content);
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0 as usize].kind, NodeKind::Text { .. })
    }

    pub fn text_content(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0 as usize].kind {
            NodeKind::Text { content } => Some(content),
            NodeKind::Element { .. } => None,
        }
    }

    /// Length of a text node's content; `0` for elements.
    pub fn text_len(&self, node: NodeId) -> u32 {
        self.text_content(node).map_or(0, |c| c.len() as u32)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0 as usize].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match &self.nodes[node.0 as usize].kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Pre-order walk over the text nodes at or under `node`.
    pub fn descendant_text_nodes(&self, node: NodeId) -> TextNodes<'_> {
        TextNodes {
            tree: self,
            stack: vec![node],
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0 as usize].kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0 as usize].kind {
            attrs.remove(name);
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0 as usize].kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text { .. } => None,
        }
    }
}

/// Iterator behind [`HostTree::descendant_text_nodes`].
pub struct TextNodes<'a> {
    tree: &'a HostTree,
    stack: Vec<NodeId>,
}

impl Iterator for TextNodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            if self.tree.is_text(node) {
                return Some(node);
            }
            let children = self.tree.children(node);
            self.stack.extend(children.iter().rev().copied());
        }
        None
    }
}

/// One endpoint pair of a host range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRange {
    pub start_node: NodeId,
    pub start_offset: u32,
    pub end_node: NodeId,
    pub end_offset: u32,
}

/// Raw host selection: anchor is where the gesture started, focus is where
/// it currently ends. Offsets are character offsets within the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSelection {
    pub anchor_node: NodeId,
    pub anchor_offset: u32,
    pub focus_node: NodeId,
    pub focus_offset: u32,
}

impl RawSelection {
    pub fn collapsed(node: NodeId, offset: u32) -> Self {
        Self {
            anchor_node: node,
            anchor_offset: offset,
            focus_node: node,
            focus_offset: offset,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_node == self.focus_node && self.anchor_offset == self.focus_offset
    }

    /// The ordered host range list backing this selection. Hosts may deliver
    /// several ranges; this implementation materializes one.
    pub fn ranges(&self) -> Vec<RawRange> {
        vec![RawRange {
            start_node: self.anchor_node,
            start_offset: self.anchor_offset,
            end_node: self.focus_node,
            end_offset: self.focus_offset,
        }]
    }
}

/// Weak association table between logical identity and host nodes.
///
/// Entries are removable without affecting logical-tree integrity; a missing
/// binding means "not currently rendered", never an error.
#[derive(Debug, Default)]
pub struct NodeBindings {
    texts: HashMap<TextId, NodeId>,
    blocks: HashMap<BlockId, NodeId>,
    by_node: HashMap<NodeId, TextId>,
}

impl NodeBindings {
    pub fn bind_text(&mut self, text: TextId, node: NodeId) {
        self.texts.insert(text, node);
        self.by_node.insert(node, text);
    }

    pub fn bind_block(&mut self, block: BlockId, node: NodeId) {
        self.blocks.insert(block, node);
    }

    pub fn unbind_text(&mut self, text: TextId) {
        if let Some(node) = self.texts.remove(&text) {
            self.by_node.remove(&node);
        }
    }

    pub fn unbind_block(&mut self, block: BlockId) {
        self.blocks.remove(&block);
    }

    /// Host node rendering the given text unit.
    pub fn text_node(&self, text: TextId) -> Option<NodeId> {
        self.texts.get(&text).copied()
    }

    /// Host node rendering the given block.
    pub fn block_node(&self, block: BlockId) -> Option<NodeId> {
        self.blocks.get(&block).copied()
    }

    /// The text unit whose rendered subtree contains `node`: climbs the host
    /// ancestry to the nearest bound element.
    pub fn text_at(&self, host: &HostTree, node: NodeId) -> Option<TextId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(text) = self.by_node.get(&id) {
                return Some(*text);
            }
            current = host.parent(id);
        }
        None
    }
}
