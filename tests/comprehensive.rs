//! End-to-end behavior over realistic documents: structural invariants,
//! string-value round trips, replay idempotence, compact-view parity,
//! and handle translation.

use doctable::{
    play_all, Axis, AxisIter, CompactView, DocTable, Event, NodeId, NodeKind, OwnedAttr,
    TreeBuilder, TreeRegistry, TypeFilter,
};

fn book_events() -> Vec<Event> {
    vec![
        Event::StartDocument,
        Event::ProcessingInstruction {
            target: "style".into(),
            data: "screen".into(),
        },
        Event::open_with("book", vec![OwnedAttr::new("lang", "en")]),
        Event::open("title"),
        Event::text("Columnar "),
        Event::text("Trees"),
        Event::close("title"),
        Event::Comment("draft".into()),
        Event::open("chapter"),
        Event::open("para"),
        Event::text("first"),
        Event::close("para"),
        Event::open("para"),
        Event::text("second"),
        Event::close("para"),
        Event::close("chapter"),
        Event::open("chapter"),
        Event::text("tail"),
        Event::close("chapter"),
        Event::close("book"),
        Event::EndDocument,
    ]
}

fn build(events: &[Event]) -> DocTable {
    let mut builder = TreeBuilder::new();
    play_all(events, &mut builder);
    builder.finish()
}

#[test]
fn every_non_root_node_has_exactly_one_reachable_parent() {
    let table = build(&book_events());
    for id in 1..table.node_count() as NodeId {
        let parent = table
            .parent_of(id)
            .unwrap_or_else(|| panic!("node {id} has no parent"));
        if table
            .node_kind(id)
            .map(|k| k == NodeKind::Attribute || k == NodeKind::Namespace)
            .unwrap()
        {
            // Attribute-like nodes hang off their owner but are not
            // children.
            assert!(!table.axis_iter(Axis::Child, parent).any(|c| c == id));
            continue;
        }
        // The node is reachable from its parent's child chain exactly
        // once.
        let hits = table
            .axis_iter(Axis::Child, parent)
            .filter(|&c| c == id)
            .count();
        assert_eq!(hits, 1, "node {id} reachable {hits} times");
    }
}

#[test]
fn child_chains_terminate_and_have_no_duplicates() {
    let table = build(&book_events());
    for id in 0..table.node_count() as NodeId {
        let children: Vec<NodeId> = table.axis_iter(Axis::Child, id).collect();
        let mut sorted = children.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(children.len(), sorted.len(), "duplicate children under {id}");
        for &child in &children {
            assert_eq!(table.parent_of(child), Some(id));
        }
    }
}

#[test]
fn string_value_equals_descendant_text_concatenation() {
    let table = build(&book_events());
    for id in 0..table.node_count() as NodeId {
        if table.node_kind(id) != Some(NodeKind::Element) {
            continue;
        }
        let mut concatenated = String::new();
        for text in table.axis_iter_typed(Axis::Descendant, id, TypeFilter::Kind(NodeKind::Text)) {
            concatenated.push_str(&table.string_value(text));
        }
        assert_eq!(table.string_value(id), concatenated, "element {id}");
    }
}

#[test]
fn descendant_elements_from_document_cover_every_element_once() {
    let table = build(&book_events());
    let scanned: Vec<NodeId> = table
        .axis_iter_typed(Axis::Descendant, 0, TypeFilter::Kind(NodeKind::Element))
        .collect();
    let mut by_kind: Vec<NodeId> = (0..table.node_count() as NodeId)
        .filter(|&id| table.node_kind(id) == Some(NodeKind::Element))
        .collect();
    by_kind.sort_unstable();
    let mut sorted = scanned.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, by_kind);
    // And the scan itself was in document order.
    assert!(scanned.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn replay_into_fresh_builder_is_idempotent() {
    let original = build(&book_events());
    let mut second = TreeBuilder::new();
    original.replay_subtree(0, &mut second);
    let rebuilt = second.finish();

    assert_eq!(rebuilt.node_count(), original.node_count());
    for id in 0..original.node_count() as NodeId {
        assert_eq!(rebuilt.node_kind(id), original.node_kind(id));
        assert_eq!(rebuilt.node_name(id), original.node_name(id));
        assert_eq!(rebuilt.string_value(id), original.string_value(id));
        assert_eq!(rebuilt.parent_of(id), original.parent_of(id));
        assert_eq!(rebuilt.first_child_of(id), original.first_child_of(id));
        assert_eq!(rebuilt.next_sibling_of(id), original.next_sibling_of(id));
    }
}

#[test]
fn compact_view_is_bit_identical_to_the_table() {
    let mut events = book_events();
    // A text run past the inline length limit exercises the overflow
    // encoding in both accessors.
    let long = "y".repeat(5000);
    events.insert(events.len() - 2, Event::text(&long));
    let table = build(&events);
    let view = CompactView::new(&table).unwrap();

    assert_eq!(view.node_count(), table.node_count());
    for id in 0..table.node_count() as NodeId {
        assert_eq!(view.expanded_type(id), table.expanded_type(id));
        assert_eq!(view.node_kind(id), table.node_kind(id));
        assert_eq!(view.parent_of(id), table.parent_of(id));
        assert_eq!(view.first_child_of(id), table.first_child_of(id));
        assert_eq!(view.next_sibling_of(id), table.next_sibling_of(id));
        assert_eq!(view.string_value(id), table.string_value(id));
        assert_eq!(view.node_name(id), table.node_name(id));
        assert_eq!(view.first_attribute(id), table.first_attribute(id));
    }
    // One past the end stays empty on both.
    let past = table.node_count() as NodeId;
    assert_eq!(view.node_kind(past), None);
    assert_eq!(table.node_kind(past), None);
}

#[test]
fn axis_iterators_work_over_the_compact_view() {
    let table = build(&book_events());
    let view = CompactView::new(&table).unwrap();
    let from_table: Vec<NodeId> = table
        .axis_iter_typed(Axis::Descendant, 0, TypeFilter::Kind(NodeKind::Element))
        .collect();
    let from_view: Vec<NodeId> =
        AxisIter::typed(&view, Axis::Descendant, 0, TypeFilter::Kind(NodeKind::Element)).collect();
    assert_eq!(from_view, from_table);
}

#[test]
fn dispatch_characters_normalizes_across_node_boundaries() {
    let table = build(&[
        Event::StartDocument,
        Event::open("e"),
        Event::text("  a  "),
        Event::open("b"),
        Event::text(" b "),
        Event::close("b"),
        Event::text("  c  "),
        Event::close("e"),
        Event::EndDocument,
    ]);
    let elem = table.first_child_of(0).unwrap();
    let mut out = String::new();
    table.dispatch_characters(elem, &mut out, true);
    assert_eq!(out, "a b c");
}

#[test]
fn handles_round_trip_for_every_node() {
    let table = build(&book_events());
    let mut registry = TreeRegistry::new();
    let tag = registry.register().unwrap();
    for id in 0..table.node_count() as NodeId {
        let handle = registry.handle_for(tag, id).unwrap();
        assert_eq!(registry.resolve(handle), Some((tag, id)));
    }
}

#[test]
fn processing_instruction_and_comment_are_content_children() {
    let table = build(&book_events());
    let kids: Vec<NodeKind> = table
        .axis_iter(Axis::Child, 0)
        .filter_map(|c| table.node_kind(c))
        .collect();
    assert_eq!(kids, vec![NodeKind::ProcessingInstruction, NodeKind::Element]);

    let book = table
        .axis_iter_typed(Axis::Child, 0, TypeFilter::Kind(NodeKind::Element))
        .next()
        .unwrap();
    let comment = table
        .axis_iter_typed(Axis::Child, book, TypeFilter::Kind(NodeKind::Comment))
        .next()
        .unwrap();
    assert_eq!(table.string_value(comment), "draft");
    assert_eq!(table.node_name(comment), "#comment");
    let pi = table
        .axis_iter_typed(Axis::Child, 0, TypeFilter::Kind(NodeKind::ProcessingInstruction))
        .next()
        .unwrap();
    assert_eq!(table.node_name(pi), "style");
    assert_eq!(table.string_value(pi), "screen");
}
