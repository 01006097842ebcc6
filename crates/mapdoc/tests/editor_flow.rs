//! End-to-end scenarios over the assembled editor core.

use std::sync::Arc;

use mapdoc::{
    Anchor, BasicRecordFactory, CreateRecords, Directive, Document, Editor, Field,
    FieldValue, InsertRecords, ItemRef, MemoryMedium, MoveBreakoutControl, MoveRecord,
    Record, RecordId, RecoveryStore, RemoveRecords, SetBreakoutEnabled, SetField,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn record(fields: &[(&str, &str)]) -> Record {
    Record::new(
        fields
            .iter()
            .map(|(k, v)| Field {
                key: (*k).to_owned(),
                value: FieldValue::Select(Some((*v).to_owned())),
            })
            .collect(),
    )
}

/// Serialized collection contents: the state identity used by the undo
/// round-trip assertions.
fn fingerprint(editor: &Editor) -> String {
    let records: Vec<&Record> = editor.state().collection.iter().collect();
    serde_json::to_string(&records).unwrap()
}

fn assert_projection_synced(editor: &Editor) {
    let mut leaves = editor.state().projection.leaf_ids();
    leaves.sort_unstable();
    let mut members = editor.state().collection.order().to_vec();
    members.sort_unstable();
    assert_eq!(leaves, members, "projection leaf set drifted from collection");
}

#[test]
fn insert_after_scenario_is_contiguous_in_argument_order() {
    init_tracing();
    let mut editor = Editor::new();
    let (r1, r2, r3) = (
        record(&[("status", "a")]),
        record(&[("status", "b")]),
        record(&[("status", "c")]),
    );
    let (id1, id2, id3) = (r1.id(), r2.id(), r3.id());
    editor
        .perform(InsertRecords::new(vec![r1, r2, r3], Anchor::Head))
        .unwrap();

    let (r4, r5) = (record(&[("status", "d")]), record(&[("status", "e")]));
    let (id4, id5) = (r4.id(), r5.id());
    editor
        .perform(InsertRecords::new(vec![r4, r5], Anchor::After(id2)))
        .unwrap();

    assert_eq!(
        editor.state().collection.order(),
        [id1, id2, id4, id5, id3]
    );
}

#[test]
fn status_breakout_groups_with_no_value_bucket() {
    init_tracing();
    let mut editor = Editor::new();
    editor.state_mut().controls.register("status");

    let r1 = record(&[("status", "new")]);
    let r2 = record(&[("status", "closed")]);
    let r3 = Record::new(vec![Field {
        key: "status".into(),
        value: FieldValue::Select(None),
    }]);
    let (id1, id2, id3) = (r1.id(), r2.id(), r3.id());
    editor
        .perform(InsertRecords::new(vec![r1, r2, r3], Anchor::Head))
        .unwrap();
    editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();

    let sections = editor.state().projection.sections();
    let values: Vec<Option<&str>> = sections.iter().map(|s| s.value()).collect();
    assert_eq!(values, [Some("new"), Some("closed"), None]);
    assert_eq!(sections[0].leaves(), [id1]);
    assert_eq!(sections[1].leaves(), [id2]);
    assert_eq!(sections[2].leaves(), [id3]);
}

#[test]
fn reordering_controls_flips_nesting_and_keeps_leaves() {
    init_tracing();
    let mut editor = Editor::new();
    editor.state_mut().controls.register("status");
    editor.state_mut().controls.register("kind");

    editor
        .perform(InsertRecords::new(
            vec![
                record(&[("status", "new"), ("kind", "road")]),
                record(&[("status", "new"), ("kind", "rail")]),
            ],
            Anchor::Head,
        ))
        .unwrap();
    editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();
    editor.perform(SetBreakoutEnabled::new("kind", true)).unwrap();

    // status outer, kind inner
    let outer: Vec<Option<&str>> = editor
        .state()
        .projection
        .sections()
        .iter()
        .map(|s| s.value())
        .collect();
    assert_eq!(outer, [Some("new")]);

    let batch = editor.perform(MoveBreakoutControl::new("kind", 0)).unwrap();
    assert!(batch.flags.contains(Directive::REBUILD_BREAKOUTS));

    let outer: Vec<Option<&str>> = editor
        .state()
        .projection
        .sections()
        .iter()
        .map(|s| s.value())
        .collect();
    assert_eq!(outer, [Some("road"), Some("rail")]);
    assert_projection_synced(&editor);

    // Undo restores the original nesting.
    editor.undo().unwrap();
    let outer: Vec<Option<&str>> = editor
        .state()
        .projection
        .sections()
        .iter()
        .map(|s| s.value())
        .collect();
    assert_eq!(outer, [Some("new")]);
}

#[test]
fn group_of_three_with_failing_third_restores_pre_state() {
    init_tracing();
    let mut editor = Editor::new();
    editor
        .perform(InsertRecords::new(vec![record(&[("status", "a")])], Anchor::Head))
        .unwrap();
    let before = fingerprint(&editor);

    let ghost = RecordId::mint();
    let result = editor.perform_group("doomed", |group, cx, sink| {
        group.execute_and_add(
            InsertRecords::new(vec![record(&[("status", "b")])], Anchor::Head),
            cx,
            sink,
        )?;
        group.execute_and_add(
            InsertRecords::new(vec![record(&[("status", "c")])], Anchor::Head),
            cx,
            sink,
        )?;
        // Third child: editing a nonexistent record always fails.
        group.execute_and_add(
            SetField::new(ghost, "status", FieldValue::Select(None)),
            cx,
            sink,
        )
    });

    assert!(result.is_err());
    assert_eq!(fingerprint(&editor), before);
    assert_eq!(editor.undo_depth(), 1); // only the initial insert
}

#[test]
fn factory_group_creates_then_edits_created_record() {
    init_tracing();
    let factory = Arc::new(BasicRecordFactory::new(["status"]));
    let mut editor = Editor::new();

    editor
        .perform_group("create-and-annotate", |group, cx, sink| {
            let mut create = CreateRecords::new(
                factory.clone(),
                vec![vec![Field {
                    key: "status".into(),
                    value: FieldValue::Select(Some("new".into())),
                }]],
                Anchor::Head,
            );
            use mapdoc::Command;
            create.execute(cx, sink)?;
            let id = create.ids()[0];
            group.add(create);
            // The second child needs the first child's output (the new id).
            group.execute_and_add(
                SetField::new(id, "note", FieldValue::Text("made by group".into())),
                cx,
                sink,
            )
        })
        .unwrap();

    assert_eq!(editor.state().collection.len(), 1);
    let annotated = editor.state().collection.iter().next().unwrap();
    assert_eq!(
        annotated.field("note"),
        Some(&FieldValue::Text("made by group".into()))
    );

    // The whole group is one undo unit.
    editor.undo().unwrap();
    assert!(editor.state().collection.is_empty());
    editor.redo().unwrap();
    assert_eq!(editor.state().collection.len(), 1);
}

#[test]
fn missing_mandatory_field_fails_before_any_mutation() {
    init_tracing();
    let factory = Arc::new(BasicRecordFactory::new(["status"]));
    let mut editor = Editor::new();
    let result = editor.perform(CreateRecords::new(
        factory,
        vec![vec![Field { key: "note".into(), value: FieldValue::Text("x".into()) }]],
        Anchor::Head,
    ));
    assert!(result.is_err());
    assert!(editor.state().collection.is_empty());
    assert_eq!(editor.undo_depth(), 0);
}

#[test]
fn direct_field_mutation_bypasses_undo() {
    init_tracing();
    let mut editor = Editor::new();
    let r = record(&[("status", "new")]);
    let id = r.id();
    editor.perform(InsertRecords::new(vec![r], Anchor::Head)).unwrap();
    let depth = editor.undo_depth();

    editor
        .state_mut()
        .collection
        .get_mut(id)
        .unwrap()
        .set_field("status", FieldValue::Select(Some("closed".into())));
    assert_eq!(editor.undo_depth(), depth);

    // Undoing the insert still works; the direct edit was never recorded.
    editor.undo().unwrap();
    assert!(editor.state().collection.is_empty());
}

#[test]
fn selection_survives_reindex_but_sections_reset_on_rebuild() {
    init_tracing();
    let mut editor = Editor::new();
    editor.state_mut().controls.register("status");
    editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();

    let r = record(&[("status", "new")]);
    let id = r.id();
    editor.perform(InsertRecords::new(vec![r], Anchor::Head)).unwrap();

    let leaf = ItemRef::Leaf(id);
    editor.state_mut().projection.set_selected(&leaf, true);

    // A field edit reindexes the leaf; its selection persists.
    editor
        .perform(SetField::new(id, "status", FieldValue::Select(Some("closed".into()))))
        .unwrap();
    assert!(editor.state().projection.is_selected(&leaf));
    assert_projection_synced(&editor);
}

#[test]
fn document_autosave_and_recovery_round_trip() {
    init_tracing();
    let mut store = RecoveryStore::open(MemoryMedium::new());
    let mut doc = Document::new("doc1", "Mapping A");
    doc.editor_mut()
        .perform(InsertRecords::new(vec![record(&[("status", "new")])], Anchor::Head))
        .unwrap();

    assert!(doc.autosave(&mut store).unwrap());
    let contents = store.get("doc1").unwrap().contents.clone();
    let restored = Document::from_snapshot("doc1", "Mapping A", &contents).unwrap();
    assert_eq!(restored.editor().state().collection.len(), 1);

    doc.close(&mut store);
    assert!(store.get("doc1").is_none());
}

// ---------------------------------------------------------------------------
// Sequence properties
// ---------------------------------------------------------------------------

mod props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u8),
        Remove(usize),
        SetStatus(usize, u8),
        Move(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..3).prop_map(Op::Insert),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8, 0u8..3).prop_map(|(i, s)| Op::SetStatus(i, s)),
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Move(a, b)),
        ]
    }

    const STATUSES: [&str; 3] = ["new", "in-progress", "closed"];

    fn apply(editor: &mut Editor, op: &Op) {
        match op {
            Op::Insert(s) => {
                let r = record(&[("status", STATUSES[*s as usize])]);
                let anchor = editor
                    .state()
                    .collection
                    .order()
                    .last()
                    .copied()
                    .map_or(Anchor::Head, Anchor::After);
                editor.perform(InsertRecords::new(vec![r], anchor)).unwrap();
            }
            Op::Remove(i) => {
                let order = editor.state().collection.order();
                if let Some(&id) = order.get(i % order.len().max(1)) {
                    editor.perform(RemoveRecords::new(vec![id])).unwrap();
                }
            }
            Op::SetStatus(i, s) => {
                let order = editor.state().collection.order();
                if let Some(&id) = order.get(i % order.len().max(1)) {
                    editor
                        .perform(SetField::new(
                            id,
                            "status",
                            FieldValue::Select(Some(STATUSES[*s as usize].into())),
                        ))
                        .unwrap();
                }
            }
            Op::Move(a, b) => {
                let order = editor.state().collection.order();
                let len = order.len();
                if len < 2 {
                    return;
                }
                let id = order[a % len];
                let target = order[b % len];
                if id != target {
                    editor.perform(MoveRecord::new(id, Anchor::After(target))).unwrap();
                }
            }
        }
    }

    proptest! {
        // Executing C1..Cn then undoing all in reverse restores the initial
        // collection exactly (same members, order, field values).
        #[test]
        fn execute_all_then_undo_all_restores_initial_state(
            ops in proptest::collection::vec(op_strategy(), 1..25)
        ) {
            let mut editor = Editor::new();
            editor.state_mut().controls.register("status");
            editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();
            let initial = fingerprint(&editor);
            let initial_depth = editor.undo_depth();

            for op in &ops {
                apply(&mut editor, op);
                assert_projection_synced(&editor);
            }
            let executed = editor.undo_depth() - initial_depth;
            let after = fingerprint(&editor);

            for _ in 0..executed {
                editor.undo().unwrap();
                assert_projection_synced(&editor);
            }
            prop_assert_eq!(fingerprint(&editor), initial);

            // Redo replays to the exact post-execute state.
            for _ in 0..executed {
                editor.redo().unwrap();
                assert_projection_synced(&editor);
            }
            prop_assert_eq!(fingerprint(&editor), after);
        }
    }
}
