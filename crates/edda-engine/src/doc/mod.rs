/*!
 * Logical document model.
 *
 * The document is a rooted, acyclic tree of [`Block`] nodes whose textual
 * content lives in [`TextUnit`]s, each backed by its own character sequence
 * inside a single shared [`yrs::Doc`]. Identity is carried by uuid tokens
 * ([`BlockId`], [`TextId`]) that survive structural moves, so anchors,
 * bindings and history metadata can refer to parts of the tree across edits.
 *
 * The selection engine only *reads* this model; the mutators here are the
 * narrow surface used by the (external) editing layer and by tests. Remote
 * collaborator edits arrive through [`Document::apply_update`] — the engine's
 * only obligation towards them is that position anchors stay decodable, or
 * safely report unresolvable.
 */

mod block;
mod text;

pub use block::{BasicBlock, Block, BlockDefinition, BlockId, ContentItem};
pub use text::{TextId, TextUnit};

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Context, bail};
use serde_json::{Value, json};
use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, ReadTxn, StateVector, Text, Transact, Update};

/// Errors produced by document mutators.
///
/// Selection-engine operations never surface these: per the engine's error
/// policy a failed selection request degrades to "selection unchanged".
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("unknown text unit: {0:?}")]
    UnknownText(TextId),
    #[error("unknown block: {0:?}")]
    UnknownBlock(BlockId),
    #[error("offset {offset} out of range for text of length {len}")]
    OffsetOutOfRange { offset: u32, len: u32 },
    #[error("malformed update: {0}")]
    BadUpdate(String),
}

/// The block/text tree plus its backing CRDT document.
pub struct Document {
    ydoc: Doc,
    blocks: HashMap<BlockId, Block>,
    texts: HashMap<TextId, TextUnit>,
    roots: Vec<BlockId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            ydoc: Doc::new(),
            blocks: HashMap::new(),
            texts: HashMap::new(),
            roots: Vec::new(),
        }
    }

    // ---- structure ----

    /// Append a block under `parent`, or at the root when `parent` is `None`.
    pub fn insert_block(
        &mut self,
        parent: Option<BlockId>,
        definition: Rc<dyn BlockDefinition>,
    ) -> Result<BlockId, DocError> {
        let id = BlockId::generate();
        if let Some(parent_id) = parent {
            let parent_block = self
                .blocks
                .get_mut(&parent_id)
                .ok_or(DocError::UnknownBlock(parent_id))?;
            parent_block.children.push(id);
        } else {
            self.roots.push(id);
        }
        self.blocks.insert(
            id,
            Block {
                id,
                parent,
                content: Vec::new(),
                children: Vec::new(),
                definition,
            },
        );
        Ok(id)
    }

    /// Append an inline block to `host`'s content sequence.
    pub fn insert_inline_block(
        &mut self,
        host: BlockId,
        definition: Rc<dyn BlockDefinition>,
    ) -> Result<BlockId, DocError> {
        let id = BlockId::generate();
        let host_block = self
            .blocks
            .get_mut(&host)
            .ok_or(DocError::UnknownBlock(host))?;
        host_block.content.push(ContentItem::Inline(id));
        self.blocks.insert(
            id,
            Block {
                id,
                parent: Some(host),
                content: Vec::new(),
                children: Vec::new(),
                definition,
            },
        );
        Ok(id)
    }

    /// Create a text unit owned by `block` and append it to the block's
    /// content sequence.
    pub fn insert_text(&mut self, block: BlockId, initial: &str) -> Result<TextId, DocError> {
        self.insert_text_with_id(block, TextId::generate(), initial)
    }

    /// Like [`Self::insert_text`] but with a caller-provided identity token.
    /// Used when adopting structure that arrived from a remote collaborator,
    /// where the token (and possibly the character sequence itself) already
    /// exists.
    pub fn insert_text_with_id(
        &mut self,
        block: BlockId,
        id: TextId,
        initial: &str,
    ) -> Result<TextId, DocError> {
        let owner = self
            .blocks
            .get_mut(&block)
            .ok_or(DocError::UnknownBlock(block))?;
        owner.content.push(ContentItem::Text(id));
        let ytext = self.ydoc.get_or_insert_text(id.key());
        if !initial.is_empty() {
            let mut txn = self.ydoc.transact_mut();
            ytext.insert(&mut txn, 0, initial);
        }
        self.texts.insert(
            id,
            TextUnit {
                id,
                parent: block,
                ytext,
            },
        );
        Ok(id)
    }

    /// Remove a block and everything it owns. Text units of the whole subtree
    /// are dropped from the registry (their yrs sequences remain in the CRDT
    /// history, which is what makes anchors report unresolvable instead of
    /// pointing into freed structure).
    pub fn remove_block(&mut self, id: BlockId) -> Result<(), DocError> {
        let block = self.blocks.get(&id).ok_or(DocError::UnknownBlock(id))?;
        match block.parent {
            Some(parent_id) => {
                if let Some(parent) = self.blocks.get_mut(&parent_id) {
                    parent.children.retain(|child| *child != id);
                    parent.content.retain(|item| *item != ContentItem::Inline(id));
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(block) = self.blocks.remove(&current) {
                for item in &block.content {
                    match item {
                        ContentItem::Text(text) => {
                            self.texts.remove(text);
                        }
                        ContentItem::Inline(inline) => stack.push(*inline),
                    }
                }
                stack.extend(block.children.iter().copied());
            }
        }
        Ok(())
    }

    // ---- read access ----

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn text(&self, id: TextId) -> Option<&TextUnit> {
        self.texts.get(&id)
    }

    /// Owning block of a text unit.
    pub fn parent_block(&self, text: TextId) -> Option<&Block> {
        self.blocks.get(&self.texts.get(&text)?.parent)
    }

    /// Resolve a text unit by identity, falling back to the first unit of the
    /// given block when the exact unit no longer exists.
    pub fn text_by_id_or_parent(&self, text: TextId, block: Option<BlockId>) -> Option<&TextUnit> {
        self.texts.get(&text).or_else(|| {
            let fallback = self.blocks.get(&block?)?.first_text()?;
            self.texts.get(&fallback)
        })
    }

    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    /// Walk the parent chain starting at `block` (inclusive). The iterator is
    /// lazily evaluated, so callers can short-circuit with `find`.
    pub fn ancestors(&self, block: BlockId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(block),
        }
    }

    /// All text units of the tree, in document (pre-order) order.
    pub fn texts_in_order(&self) -> Vec<TextId> {
        let mut out = Vec::with_capacity(self.texts.len());
        for root in &self.roots {
            self.collect_texts(*root, &mut out);
        }
        out
    }

    fn collect_texts(&self, block: BlockId, out: &mut Vec<TextId>) {
        let Some(block) = self.blocks.get(&block) else {
            return;
        };
        for item in &block.content {
            match item {
                ContentItem::Text(text) => out.push(*text),
                ContentItem::Inline(inline) => self.collect_texts(*inline, out),
            }
        }
        for child in &block.children {
            self.collect_texts(*child, out);
        }
    }

    // ---- character sequences ----

    /// Length of a unit's character sequence, in the document's offset units.
    pub fn text_len(&self, id: TextId) -> Option<u32> {
        let unit = self.texts.get(&id)?;
        let txn = self.ydoc.transact();
        Some(unit.ytext.len(&txn))
    }

    /// Plain-text materialization of a unit's character sequence.
    pub fn text_content(&self, id: TextId) -> Option<String> {
        let unit = self.texts.get(&id)?;
        let txn = self.ydoc.transact();
        Some(unit.ytext.get_string(&txn))
    }

    pub fn insert_in_text(&mut self, id: TextId, index: u32, chunk: &str) -> Result<(), DocError> {
        let unit = self.texts.get(&id).ok_or(DocError::UnknownText(id))?;
        let mut txn = self.ydoc.transact_mut();
        let len = unit.ytext.len(&txn);
        if index > len {
            return Err(DocError::OffsetOutOfRange { offset: index, len });
        }
        unit.ytext.insert(&mut txn, index, chunk);
        Ok(())
    }

    pub fn remove_text_range(
        &mut self,
        id: TextId,
        index: u32,
        removed: u32,
    ) -> Result<(), DocError> {
        let unit = self.texts.get(&id).ok_or(DocError::UnknownText(id))?;
        let mut txn = self.ydoc.transact_mut();
        let len = unit.ytext.len(&txn);
        if index + removed > len {
            return Err(DocError::OffsetOutOfRange {
                offset: index + removed,
                len,
            });
        }
        unit.ytext.remove_range(&mut txn, index, removed);
        Ok(())
    }

    // ---- CRDT boundary ----

    /// Encode the full CRDT state as a yrs v1 update.
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.ydoc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Apply a remote update to the CRDT document. Structure registries are
    /// untouched; adopting remote blocks/texts is the collaboration layer's
    /// job (see [`Self::insert_text_with_id`]).
    pub fn apply_update(&mut self, update: &[u8]) -> Result<(), DocError> {
        let update = Update::decode_v1(update).map_err(|e| DocError::BadUpdate(e.to_string()))?;
        let mut txn = self.ydoc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| DocError::BadUpdate(e.to_string()))?;
        Ok(())
    }

    pub(crate) fn read_txn(&self) -> yrs::Transaction<'_> {
        self.ydoc.transact()
    }

    pub(crate) fn write_txn(&self) -> yrs::TransactionMut<'_> {
        self.ydoc.transact_mut()
    }

    // ---- JSON materialization ----

    /// Materialize the tree as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "children": self
                .roots
                .iter()
                .filter_map(|id| self.block_to_json(*id))
                .collect::<Vec<_>>(),
        })
    }

    fn block_to_json(&self, id: BlockId) -> Option<Value> {
        let block = self.blocks.get(&id)?;
        let content: Vec<Value> = block
            .content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => {
                    Some(json!({ "text": self.text_content(*text)?, "id": text }))
                }
                ContentItem::Inline(inline) => {
                    Some(json!({ "block": self.block_to_json(*inline)? }))
                }
            })
            .collect();
        let children: Vec<Value> = block
            .children
            .iter()
            .filter_map(|child| self.block_to_json(*child))
            .collect();
        Some(json!({
            "type": block.definition.kind(),
            "id": block.id,
            "content": content,
            "children": children,
        }))
    }

    /// Build a document from its JSON form. The inverse of [`Self::to_json`],
    /// minus identity (fresh tokens are generated). Block-type flags may be
    /// given as `"void": true` / `"island": true` on the block object.
    pub fn from_json(value: &Value) -> anyhow::Result<Self> {
        let mut doc = Self::new();
        let children = value
            .get("children")
            .and_then(Value::as_array)
            .context("document JSON must have a `children` array")?;
        for child in children {
            doc.block_from_json(None, child)?;
        }
        Ok(doc)
    }

    fn block_from_json(&mut self, parent: Option<BlockId>, value: &Value) -> anyhow::Result<()> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .context("block JSON must have a `type`")?;
        let void = value.get("void").and_then(Value::as_bool).unwrap_or(false);
        let island = value
            .get("island")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let definition = Rc::new(BasicBlock {
            kind: kind.to_string(),
            void,
            island,
        });
        let id = self.insert_block(parent, definition)?;
        if let Some(content) = value.get("content").and_then(Value::as_array) {
            for item in content {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    self.insert_text(id, text)?;
                } else if let Some(inline) = item.get("block") {
                    self.inline_from_json(id, inline)?;
                } else {
                    bail!("content item must be a `text` or a `block`: {item}");
                }
            }
        }
        if let Some(children) = value.get("children").and_then(Value::as_array) {
            for child in children {
                self.block_from_json(Some(id), child)?;
            }
        }
        Ok(())
    }

    fn inline_from_json(&mut self, host: BlockId, value: &Value) -> anyhow::Result<()> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .context("inline block JSON must have a `type`")?;
        let void = value.get("void").and_then(Value::as_bool).unwrap_or(false);
        let island = value
            .get("island")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let definition = Rc::new(BasicBlock {
            kind: kind.to_string(),
            void,
            island,
        });
        let id = self.insert_inline_block(host, definition)?;
        if let Some(content) = value.get("content").and_then(Value::as_array) {
            for item in content {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    self.insert_text(id, text)?;
                } else {
                    bail!("nested inline blocks are not supported: {item}");
                }
            }
        }
        Ok(())
    }
}

/// Iterator over a block's ancestor chain, starting at the block itself.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<BlockId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        let block = self.doc.blocks.get(&id)?;
        self.next = block.parent;
        Some(block)
    }
}
