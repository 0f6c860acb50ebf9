//! Position resolver: host `(node, offset)` pairs ↔ logical character
//! indices inside a text unit.
//!
//! All functions here are pure reads over host structure. Offsets past the
//! total text length resolve to `None` — callers decide what an unresolvable
//! position means, the resolver never clamps silently.

use crate::doc::TextId;
use crate::host::{HostTree, NodeBindings, NodeId};

/// Locate the host text node containing `offset` within the subtree of
/// `node`, returning the node and the offset into its own content.
///
/// Walks descendant text nodes in pre-order, accumulating visited length;
/// the target is the first node whose cumulative range `[start, start+len]`
/// contains the offset. Both bounds are inclusive so a cursor can sit
/// exactly on a node boundary (offset == full length resolves to the last
/// node, not to "not found").
pub fn find_text_node(host: &HostTree, node: NodeId, offset: u32) -> Option<(NodeId, u32)> {
    let mut cumulative = 0u32;
    for text in host.descendant_text_nodes(node) {
        let end = cumulative + host.text_len(text);
        if offset >= cumulative && offset <= end {
            return Some((text, offset - cumulative));
        }
        cumulative = end;
    }
    None
}

/// Inverse mapping: the logical character index that `(node, node_offset)`
/// denotes inside `text`'s character sequence.
///
/// Sums the lengths of the text nodes that precede `node` inside the unit's
/// bound element. When the host hands us the bound element itself (empty
/// units render no text nodes), the offset is already logical.
pub fn logical_index(
    host: &HostTree,
    bindings: &NodeBindings,
    text: TextId,
    node: NodeId,
    node_offset: u32,
) -> Option<u32> {
    let root = bindings.text_node(text)?;
    if node == root && !host.is_text(node) {
        return Some(node_offset);
    }
    let mut cumulative = 0u32;
    for candidate in host.descendant_text_nodes(root) {
        if candidate == node {
            return Some(cumulative + node_offset);
        }
        cumulative += host.text_len(candidate);
    }
    None
}

/// Resolve both endpoints of a `[start, end]` character range in one walk
/// over the subtree of `node`. Used by the range-selection operations, where
/// the endpoints may land in different host text nodes.
pub fn find_range_nodes(
    host: &HostTree,
    node: NodeId,
    start: u32,
    end: u32,
) -> Option<((NodeId, u32), (NodeId, u32))> {
    let mut start_hit = None;
    let mut end_hit = None;
    let mut cumulative = 0u32;
    for text in host.descendant_text_nodes(node) {
        let node_end = cumulative + host.text_len(text);
        if start_hit.is_none() && start >= cumulative && start <= node_end {
            start_hit = Some((text, start - cumulative));
        }
        if end_hit.is_none() && end >= cumulative && end <= node_end {
            end_hit = Some((text, end - cumulative));
        }
        if start_hit.is_some() && end_hit.is_some() {
            break;
        }
        cumulative = node_end;
    }
    Some((start_hit?, end_hit?))
}
