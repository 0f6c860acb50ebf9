//! Focused/selected block set reconciliation.
//!
//! A reconcile pass computes the symmetric difference between the current
//! set and a target set, fires lifecycle hooks exactly once per changed
//! block — all removals blur before any addition fires — and keeps the
//! host-visible marker attribute in step with membership. Calling it twice
//! with the same target fires nothing the second time.

use std::collections::BTreeSet;

use crate::doc::{BlockId, Document};
use crate::host::{HostTree, NodeBindings};

/// Which capability hook fires for blocks entering the set.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EnterHook {
    Focus,
    Select,
}

pub(crate) fn reconcile(
    current: &mut BTreeSet<BlockId>,
    target: &[BlockId],
    doc: &Document,
    host: &mut HostTree,
    bindings: &NodeBindings,
    marker: &str,
    hook: EnterHook,
) {
    let target_set: BTreeSet<BlockId> = target.iter().copied().collect();
    // BTreeSet iteration keeps the per-partition firing order stable.
    let removed: Vec<BlockId> = current.difference(&target_set).copied().collect();
    let added: Vec<BlockId> = target_set.difference(current).copied().collect();

    for id in removed {
        current.remove(&id);
        if let Some(block) = doc.block(id) {
            block.definition.on_blur(block);
        }
        if let Some(node) = bindings.block_node(id) {
            host.remove_attribute(node, marker);
        }
    }

    for id in added {
        let Some(block) = doc.block(id) else {
            // Unreachable blocks never enter the set.
            continue;
        };
        current.insert(id);
        match hook {
            EnterHook::Focus => block.definition.on_focus(block),
            EnterHook::Select => block.definition.on_select(block),
        }
        if let Some(node) = bindings.block_node(id) {
            host.set_attribute(node, marker, "true");
        }
    }
}
