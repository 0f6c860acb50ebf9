//! End-to-end selection behavior through the [`Editor`] façade: host events
//! in, snapshots and lifecycle hooks out.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use edda_engine::{
    BlockId, ContentItem, Document, Editor, EditorOptions, NodeId, Plugin, RawSelection,
    SelectionSnapshot, TextId,
};

// ---- fixtures ----

fn editor() -> Editor {
    Editor::new(EditorOptions::default())
}

fn paragraph(editor: &mut Editor, content: &str) -> (BlockId, TextId) {
    let block = editor
        .doc
        .insert_block(None, edda_engine::BasicBlock::new("paragraph"))
        .unwrap();
    let text = editor.doc.insert_text(block, content).unwrap();
    (block, text)
}

/// Render the whole document into the host tree: one element per block, one
/// element per text unit wrapping a single host text node.
fn mount(editor: &mut Editor) {
    let container = editor.container();
    for block in editor.doc.roots().to_vec() {
        mount_block(editor, block, container);
    }
}

fn mount_block(editor: &mut Editor, block: BlockId, parent: NodeId) {
    let node = editor.host.create_element(parent);
    editor.bindings.bind_block(block, node);
    let (content, children) = {
        let b = editor.doc.block(block).unwrap();
        (b.content.clone(), b.children.clone())
    };
    for item in content {
        match item {
            ContentItem::Text(text) => {
                let element = editor.host.create_element(node);
                let chars = editor.doc.text_content(text).unwrap_or_default();
                editor.host.create_text(element, &chars);
                editor.bindings.bind_text(text, element);
            }
            ContentItem::Inline(inline) => mount_block(editor, inline, node),
        }
    }
    for child in children {
        mount_block(editor, child, node);
    }
}

/// The single host text node rendering a text unit.
fn rendered_node(editor: &Editor, text: TextId) -> NodeId {
    let element = editor.bindings.text_node(text).unwrap();
    editor
        .host
        .descendant_text_nodes(element)
        .next()
        .expect("unit is rendered with a text node")
}

// ---- resolving host selections ----

#[test]
fn selecting_within_one_unit_derives_offsets_and_content() {
    let mut editor = editor();
    let (block, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    let node = rendered_node(&editor, text);

    editor.set_native_selection(&RawSelection {
        anchor_node: node,
        anchor_offset: 0,
        focus_node: node,
        focus_offset: 5,
    });

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 0);
    assert_eq!(snapshot.y_end, 5);
    assert_eq!(snapshot.content, "hello");
    assert_eq!(snapshot.length, 5);
    assert_eq!(snapshot.raw_content, "hello world");
    assert!(!snapshot.is_collapsed);
    assert!(!snapshot.is_text_spanning);
    assert!(snapshot.is_at_start);
    assert!(!snapshot.is_at_end);
    assert_eq!(snapshot.texts, vec![text]);
    assert_eq!(snapshot.start_text, Some(text));
    assert_eq!(snapshot.end_text, Some(text));
    assert_eq!(snapshot.ranges.len(), 1);
    assert!(snapshot.anchor.is_some());
    assert!(editor.focused_blocks().contains(&block));
}

#[test]
fn collapsed_cursor_at_the_units_end() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    let node = rendered_node(&editor, text);

    editor.set_native_selection(&RawSelection::collapsed(node, 11));

    let snapshot = editor.snapshot();
    assert!(snapshot.is_collapsed);
    assert_eq!(snapshot.y_start, 11);
    assert_eq!(snapshot.y_end, 11);
    assert_eq!(snapshot.content, "");
    assert_eq!(snapshot.length, 0);
    assert!(snapshot.is_at_end);
    assert!(!snapshot.is_at_start);
    assert_eq!(snapshot.start_text, snapshot.end_text);
}

#[test]
fn spanning_selection_across_blocks() {
    let mut editor = editor();
    let (first, alpha) = paragraph(&mut editor, "alpha");
    let (second, beta) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();

    editor.set_native_selection(&RawSelection {
        anchor_node: rendered_node(&editor, alpha),
        anchor_offset: 3,
        focus_node: rendered_node(&editor, beta),
        focus_offset: 2,
    });

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.texts, vec![alpha, beta]);
    assert!(snapshot.is_text_spanning);
    assert_eq!(snapshot.y_start, 3);
    assert_eq!(snapshot.y_end, 2);
    assert_eq!(snapshot.content, "habe");
    assert_eq!(snapshot.start_text, Some(alpha));
    assert_eq!(snapshot.end_text, Some(beta));
    assert!(editor.focused_blocks().contains(&first));
    assert!(editor.focused_blocks().contains(&second));
    assert_eq!(editor.focused_blocks().len(), 2);
}

#[test]
fn offsets_inside_a_multi_byte_character_degrade_to_empty_content() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "café!");
    mount(&mut editor);
    editor.init();
    let node = rendered_node(&editor, text);

    // The 'é' occupies bytes 3..5; offset 4 lands inside it.
    editor.set_native_selection(&RawSelection {
        anchor_node: node,
        anchor_offset: 0,
        focus_node: node,
        focus_offset: 4,
    });

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 0);
    assert_eq!(snapshot.y_end, 4);
    assert_eq!(snapshot.content, "");
    assert_eq!(snapshot.length, 0);
    assert_eq!(snapshot.start_text, Some(text));
}

#[test]
fn reversed_selection_in_one_node_is_normalized() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    let node = rendered_node(&editor, text);

    editor.set_native_selection(&RawSelection {
        anchor_node: node,
        anchor_offset: 5,
        focus_node: node,
        focus_offset: 2,
    });

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 2);
    assert_eq!(snapshot.y_end, 5);
    assert_eq!(snapshot.content, "llo");
    assert!(!snapshot.is_collapsed);
}

#[test]
fn reversed_cross_unit_selection_swaps_endpoint_identities() {
    let mut editor = editor();
    let (_, alpha) = paragraph(&mut editor, "alpha");
    let (_, beta) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();
    let alpha_node = rendered_node(&editor, alpha);
    let beta_node = rendered_node(&editor, beta);

    // Gesture started in the later unit and dragged backwards.
    editor.set_native_selection(&RawSelection {
        anchor_node: beta_node,
        anchor_offset: 2,
        focus_node: alpha_node,
        focus_offset: 3,
    });

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.start_text, Some(alpha));
    assert_eq!(snapshot.end_text, Some(beta));
    assert_eq!(snapshot.start_node, Some(alpha_node));
    assert_eq!(snapshot.end_node, Some(beta_node));
    assert_eq!(snapshot.y_start, 3);
    assert_eq!(snapshot.y_end, 2);
    assert_eq!(snapshot.start, 3);
    assert_eq!(snapshot.end, 2);
    assert_eq!(snapshot.content, "habe");
}

#[test]
fn offsets_resolve_across_split_text_nodes() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");

    // The host may render one unit as several text nodes.
    let container = editor.container();
    let element = editor.host.create_element(container);
    editor.host.create_text(element, "hel");
    editor.host.create_text(element, "lo ");
    let tail = editor.host.create_text(element, "world");
    editor.bindings.bind_text(text, element);
    editor.init();

    editor.set_at_text_offset(text, 7);

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.start_node, Some(tail));
    assert_eq!(snapshot.start, 1); // offset within the third node
    assert_eq!(snapshot.y_start, 7); // logical offset within the unit
    assert!(snapshot.is_collapsed);
}

#[test]
fn selection_outside_the_container_is_ignored() {
    let mut editor = editor();
    let page_root = editor.host.root();
    let managed = editor.host.create_element(page_root);
    editor.set_container(managed);

    let sidebar = editor.host.create_element(page_root);
    let sidebar_text = editor.host.create_text(sidebar, "not ours");

    let (_, text) = paragraph(&mut editor, "ours");
    // Mount under the managed container by hand.
    let element = editor.host.create_element(managed);
    editor.host.create_text(element, "ours");
    editor.bindings.bind_text(text, element);
    editor.init();

    let fired = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&fired);
    editor.set_selection_callback(move |_| *counter.borrow_mut() += 1);

    editor.set_native_selection(&RawSelection::collapsed(sidebar_text, 2));

    // No snapshot update, no notification.
    assert!(editor.snapshot().selection.is_none());
    assert_eq!(*fired.borrow(), 0);
}

#[test]
fn unresolvable_selection_yields_an_empty_but_complete_snapshot() {
    let mut editor = editor();
    let (block, text) = paragraph(&mut editor, "hello");
    mount(&mut editor);
    editor.init();

    // Focus the paragraph first, then select on an unbound element.
    editor.set_native_selection(&RawSelection::collapsed(rendered_node(&editor, text), 1));
    assert!(editor.focused_blocks().contains(&block));

    let container = editor.container();
    let unbound = editor.host.create_element(container);
    editor.set_native_selection(&RawSelection::collapsed(unbound, 0));

    let snapshot = editor.snapshot();
    assert!(snapshot.selection.is_some());
    assert_eq!(snapshot.start_text, None);
    assert!(snapshot.texts.is_empty());
    assert_eq!(snapshot.content, "");
    assert!(snapshot.anchor.is_none());
    assert!(editor.focused_blocks().is_empty());
}

// ---- focus and block selection ----

#[test]
fn focused_blocks_follow_the_selection_and_blur_on_leave() {
    let mut editor = editor();
    let (first, alpha) = paragraph(&mut editor, "alpha");
    let (second, beta) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();
    let marker = editor.options().focused_marker.clone();

    editor.set_native_selection(&RawSelection::collapsed(rendered_node(&editor, alpha), 0));
    let first_node = editor.bindings.block_node(first).unwrap();
    assert_eq!(editor.host.attribute(first_node, &marker), Some("true"));

    editor.set_native_selection(&RawSelection::collapsed(rendered_node(&editor, beta), 0));

    assert!(!editor.focused_blocks().contains(&first));
    assert!(editor.focused_blocks().contains(&second));
    assert_eq!(editor.host.attribute(first_node, &marker), None);
    let second_node = editor.bindings.block_node(second).unwrap();
    assert_eq!(editor.host.attribute(second_node, &marker), Some("true"));
}

#[test]
fn selecting_a_single_block_clears_the_focused_set() {
    let mut editor = editor();
    let (first, alpha) = paragraph(&mut editor, "alpha");
    let (second, _) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();

    editor.set_native_selection(&RawSelection::collapsed(rendered_node(&editor, alpha), 0));
    assert!(editor.focused_blocks().contains(&first));

    editor.select_blocks(&[second]);

    assert!(editor.selected_blocks().contains(&second));
    assert!(editor.focused_blocks().is_empty());
    let node = editor.bindings.block_node(second).unwrap();
    assert_eq!(
        editor.host.attribute(node, &editor.options().selected_marker),
        Some("true")
    );
}

#[test]
fn void_and_island_ancestors_are_reported() {
    let mut editor = editor();
    let island = editor
        .doc
        .insert_block(None, edda_engine::BasicBlock::island("figure"))
        .unwrap();
    let caption = editor
        .doc
        .insert_block(Some(island), edda_engine::BasicBlock::new("paragraph"))
        .unwrap();
    let caption_text = editor.doc.insert_text(caption, "caption").unwrap();

    let (host_block, _) = paragraph(&mut editor, "before ");
    let mention = editor
        .doc
        .insert_inline_block(host_block, edda_engine::BasicBlock::void("mention"))
        .unwrap();
    let mention_text = editor.doc.insert_text(mention, "@someone").unwrap();

    mount(&mut editor);
    editor.init();

    editor.set_native_selection(&RawSelection::collapsed(
        rendered_node(&editor, caption_text),
        2,
    ));
    let snapshot = editor.snapshot();
    assert!(snapshot.is_island);
    assert_eq!(snapshot.island_root, Some(island));
    assert!(!snapshot.is_void);

    editor.set_native_selection(&RawSelection::collapsed(
        rendered_node(&editor, mention_text),
        1,
    ));
    let snapshot = editor.snapshot();
    assert!(snapshot.is_void);
    assert_eq!(snapshot.void_root, Some(mention));
    assert!(!snapshot.is_island);
}

// ---- programmatic placement ----

#[test]
fn set_selection_at_texts_range_spans_whole_units() {
    let mut editor = editor();
    let (_, alpha) = paragraph(&mut editor, "alpha");
    let (_, beta) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();

    editor.set_selection_at_texts_range(alpha, beta);

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 0);
    assert_eq!(snapshot.y_end, 4);
    assert!(snapshot.is_at_start);
    assert!(snapshot.is_at_end);
    assert!(snapshot.is_text_spanning);
    assert_eq!(snapshot.content, "alphabeta");
}

#[test]
fn triple_click_selects_the_whole_unit_on_the_next_tick() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    editor.set_at_text_offset(text, 4);

    editor.handle_triple_click(3);
    // Nothing happens until the host ticks.
    assert!(editor.snapshot().is_collapsed);

    editor.tick();

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 0);
    assert_eq!(snapshot.y_end, 11);
    assert!(snapshot.is_at_start);
    assert!(snapshot.is_at_end);
    assert_eq!(snapshot.content, "hello world");

    // Double clicks defer nothing.
    editor.handle_triple_click(2);
    editor.set_at_text_offset(text, 4);
    editor.tick();
    assert!(editor.snapshot().is_collapsed);
}

#[test]
fn shift_slides_offsets_after_a_local_insert() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    editor.set_at_text_offset(text, 5);

    editor.doc.insert_in_text(text, 5, "X").unwrap();
    let node = rendered_node(&editor, text);
    editor.host.set_text(node, "helloX world");
    editor.shift(1);

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.y_start, 6);
    assert_eq!(snapshot.y_end, 6);
    assert_eq!(snapshot.raw_content, "helloX world");
}

// ---- anchors across remote edits ----

#[test]
fn anchor_in_the_snapshot_survives_a_remote_insert() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();
    editor.set_at_text_offset(text, 5);

    // A collaborator prepends three characters.
    editor.doc.insert_in_text(text, 0, ">> ").unwrap();
    let node = rendered_node(&editor, text);
    editor.host.set_text(node, ">> hello world");

    let anchor = editor.snapshot().anchor.clone().unwrap();
    assert_eq!(anchor.decode(&editor.doc).unwrap().offset, 8);

    editor.restore_anchor(text);
    assert_eq!(editor.snapshot().y_start, 8);
    assert!(editor.snapshot().is_collapsed);
}

#[test]
fn restore_anchor_only_applies_to_the_unit_holding_the_cursor() {
    let mut editor = editor();
    let (_, alpha) = paragraph(&mut editor, "alpha");
    let (_, beta) = paragraph(&mut editor, "beta");
    mount(&mut editor);
    editor.init();
    editor.set_at_text_offset(alpha, 2);

    editor.restore_anchor(beta);

    assert_eq!(editor.snapshot().start_text, Some(alpha));
    assert_eq!(editor.snapshot().y_start, 2);
}

// ---- history coupling ----

#[test]
fn undo_restores_the_recorded_cursor_through_later_edits() {
    let mut editor = editor();
    let (_, text) = paragraph(&mut editor, "hello world");
    mount(&mut editor);
    editor.init();

    editor.set_at_text_offset(text, 5);
    editor.record_history_entry();

    // Later edits move the cursor and grow the text before the memo.
    editor.doc.insert_in_text(text, 0, ">> ").unwrap();
    let node = rendered_node(&editor, text);
    editor.host.set_text(node, ">> hello world");
    editor.set_at_text_offset(text, 0);

    editor.undo();

    // The memo's anchor tracked the remote-style insert.
    assert_eq!(editor.snapshot().y_start, 8);
    assert_eq!(editor.snapshot().start_text, Some(text));

    editor.redo();
    assert_eq!(editor.snapshot().y_start, 8);
    assert_eq!(editor.history.undo_len(), 1);
}

#[test]
fn history_restore_falls_back_to_the_blocks_first_unit() {
    let mut editor = editor();
    let (block, text) = paragraph(&mut editor, "short");
    mount(&mut editor);
    editor.init();

    // A memo whose exact unit never existed here, with an offset past the
    // fallback unit's length.
    let mut stale = Document::new();
    let stale_block = stale
        .insert_block(None, edda_engine::BasicBlock::new("paragraph"))
        .unwrap();
    let stale_text = stale.insert_text(stale_block, "gone").unwrap();

    let mut entry = edda_engine::HistoryEntry::new();
    entry.meta_mut().set(
        edda_engine::CURSOR_KEY,
        edda_engine::CursorMemo {
            text: Some(stale_text),
            block: Some(block),
            offset: 99,
            anchor: None,
        },
    );
    editor.history.push(entry);

    editor.undo();

    assert_eq!(editor.snapshot().start_text, Some(text));
    assert_eq!(editor.snapshot().y_start, 5); // clamped to the unit's length
}

#[test]
fn history_restore_with_nothing_left_keeps_the_selection() {
    let mut editor = editor();
    let (block, text) = paragraph(&mut editor, "doomed");
    let (_, survivor) = paragraph(&mut editor, "still here");
    mount(&mut editor);
    editor.init();

    editor.set_at_text_offset(text, 3);
    editor.record_history_entry();
    editor.doc.remove_block(block).unwrap();
    editor.set_at_text_offset(survivor, 4);

    editor.undo();

    assert_eq!(editor.snapshot().start_text, Some(survivor));
    assert_eq!(editor.snapshot().y_start, 4);
}

// ---- notification fan-out ----

struct Recording {
    log: Rc<RefCell<Vec<String>>>,
}

impl Plugin for Recording {
    fn on_selection_change(&mut self, snapshot: &SelectionSnapshot) {
        self.log
            .borrow_mut()
            .push(format!("plugin:{}", snapshot.y_start));
    }
}

#[test]
fn callback_fires_before_plugins_and_only_while_attached() {
    let mut editor = editor();
    let (block, text) = paragraph(&mut editor, "hello");
    mount(&mut editor);

    let log = Rc::new(RefCell::new(Vec::new()));
    let callback_log = Rc::clone(&log);
    editor.set_selection_callback(move |snapshot: &SelectionSnapshot| {
        callback_log
            .borrow_mut()
            .push(format!("callback:{}", snapshot.y_start));
    });
    editor.register_plugin(Box::new(Recording {
        log: Rc::clone(&log),
    }));

    // Detached: the event is ignored outright — no snapshot, no hooks, no
    // host mutation, no notification.
    let node = rendered_node(&editor, text);
    let block_node = editor.bindings.block_node(block).unwrap();
    let marker = editor.options().focused_marker.clone();
    editor.set_native_selection(&RawSelection::collapsed(node, 2));
    assert!(editor.snapshot().selection.is_none());
    assert!(editor.focused_blocks().is_empty());
    assert_eq!(editor.host.attribute(block_node, &marker), None);
    assert!(log.borrow().is_empty());

    editor.init();
    editor.set_native_selection(&RawSelection::collapsed(node, 3));
    assert_eq!(*log.borrow(), vec!["callback:3", "plugin:3"]);

    // Torn down: events stop touching the editor again.
    editor.teardown();
    editor.set_native_selection(&RawSelection::collapsed(node, 4));
    assert_eq!(editor.snapshot().y_start, 3);
    assert_eq!(log.borrow().len(), 2);
}
