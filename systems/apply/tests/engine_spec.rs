//! End-to-end apply scenarios against an in-process engine and queue

use std::collections::HashMap;
use std::time::Duration;

use archihub_core_model::{Model, spawn_editor};
use archihub_core_types::{ElementId, Handle, ViewId};
use archihub_systems_apply::{
    ApplyEngine, ApplyOptions, BomDocument, DuplicateStrategy, OperationRecord, OperationStatus,
    OperationStore, OutcomeStatus, DEFAULT_OP_TTL,
};
use serde_json::json;

struct Harness {
    engine: Handle<ApplyEngine>,
    editor: archihub_core_model::EditorHandle,
}

fn harness() -> Harness {
    let editor = spawn_editor(Model::new("test"));
    let store = OperationStore::new(DEFAULT_OP_TTL);
    let engine = ApplyEngine::new(editor.clone(), store, false);
    Harness { engine, editor }
}

fn bom(changes: serde_json::Value) -> BomDocument {
    serde_json::from_value(json!({ "version": "1.0", "changes": changes })).unwrap()
}

async fn apply_and_wait(h: &Harness, doc: BomDocument, options: ApplyOptions) -> OperationRecord {
    let initial = h
        .engine
        .submit(doc, options, HashMap::new(), None)
        .await
        .unwrap();
    h.engine
        .store()
        .wait(&initial.id, Duration::from_secs(5))
        .await
        .unwrap()
}

async fn element_count(h: &Harness) -> usize {
    h.editor.snapshot().await.unwrap().elements.len()
}

/// S1: element create + idempotent reuse under the same key
#[tokio::test]
async fn s1_create_then_replay_with_same_key() {
    let h = harness();
    let doc = bom(json!([
        { "op": "createElement", "type": "business-actor", "name": "Customer", "tempId": "t1" }
    ]));
    let options = ApplyOptions {
        idempotency_key: Some("K1".into()),
        duplicate_strategy: DuplicateStrategy::Reuse,
        ..Default::default()
    };

    let first = apply_and_wait(&h, doc.clone(), options.clone()).await;
    assert_eq!(first.status, OperationStatus::Complete);
    let id_a = first.temp_id_map.get("t1").unwrap().clone();
    assert_eq!(first.outcomes[0].status, OutcomeStatus::Created);

    // Identical payload, identical key: the prior operation is returned
    // without re-execution
    let second = h
        .engine
        .submit(doc, options, HashMap::new(), None)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.temp_id_map.get("t1").unwrap(), &id_a);
    assert_eq!(element_count(&h).await, 1);
}

/// S1 variant: same BOM under a fresh key reuses the element itself
#[tokio::test]
async fn s1_reuse_resolves_to_existing_element() {
    let h = harness();
    let doc = bom(json!([
        { "op": "createElement", "type": "business-actor", "name": "Customer", "tempId": "t1" }
    ]));
    let options = ApplyOptions {
        duplicate_strategy: DuplicateStrategy::Reuse,
        ..Default::default()
    };

    let first = apply_and_wait(&h, doc.clone(), options.clone()).await;
    let id_a = first.temp_id_map.get("t1").unwrap().clone();

    let second = apply_and_wait(&h, doc, options).await;
    assert_eq!(second.status, OperationStatus::Complete);
    assert_eq!(second.outcomes[0].status, OutcomeStatus::Reused);
    assert_eq!(second.temp_id_map.get("t1").unwrap(), &id_a);
    assert_eq!(element_count(&h).await, 1);
}

/// S2: access relationships with different accessType are not duplicates
#[tokio::test]
async fn s2_access_variants_are_distinct_relationships() {
    let h = harness();
    let doc = bom(json!([
        { "op": "createElement", "type": "business-process", "name": "P", "tempId": "p" },
        { "op": "createElement", "type": "business-object", "name": "Q", "tempId": "q" },
        { "op": "createRelationship", "type": "access-relationship",
          "sourceId": "p", "targetId": "q", "accessType": "read", "tempId": "r1" },
        { "op": "createRelationship", "type": "access-relationship",
          "sourceId": "p", "targetId": "q", "accessType": "write", "tempId": "r2" }
    ]));
    let record = apply_and_wait(&h, doc, ApplyOptions::default()).await;

    assert_eq!(record.status, OperationStatus::Complete);
    let r1 = record.temp_id_map.get("r1").unwrap();
    let r2 = record.temp_id_map.get("r2").unwrap();
    assert_ne!(r1, r2);
    assert_eq!(record.digest.by_op["createRelationship"]["created"], 2);

    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.relationships.len(), 2);
}

/// S3: large batch in one chunk, complete mapping, no ghosts
#[tokio::test]
async fn s3_large_batch_integrity() {
    let h = harness();
    let changes: Vec<serde_json::Value> = (0..40)
        .map(|i| {
            json!({
                "op": "createElement", "type": "application-component",
                "name": format!("component-{i}"), "tempId": format!("t{i}")
            })
        })
        .collect();
    let options = ApplyOptions {
        chunk_size: 50,
        ..Default::default()
    };
    let record = apply_and_wait(&h, bom(json!(changes)), options).await;

    assert_eq!(record.status, OperationStatus::Complete);
    assert_eq!(record.temp_id_map.len(), 40);
    assert!(!record.digest.mapping_incomplete);
    assert!(!record.digest.ghost_detected);
    assert_eq!(element_count(&h).await, 40);

    let report = h.editor.dispatch(|m| m.diagnostics()).await.unwrap();
    assert_eq!(report.ghosts, 0);
}

/// S4: nested placement with parent-relative coordinates
#[tokio::test]
async fn s4_nested_visual_is_parent_relative() {
    let h = harness();
    let doc = bom(json!([
        { "op": "createElement", "type": "application-component", "name": "Parent", "tempId": "p" },
        { "op": "createElement", "type": "application-component", "name": "Child", "tempId": "c" },
        { "op": "createView", "name": "main", "tempId": "v" },
        { "op": "addToView", "viewId": "v", "elementId": "p",
          "x": 50.0, "y": 50.0, "width": 300.0, "height": 200.0, "tempId": "vp" },
        { "op": "addToView", "viewId": "v", "elementId": "c",
          "x": 10.0, "y": 30.0, "parentVisualId": "vp", "tempId": "vc" }
    ]));
    let record = apply_and_wait(&h, doc, ApplyOptions { chunk_size: 10, ..Default::default() }).await;
    assert_eq!(record.status, OperationStatus::Complete);

    let view_id = ViewId::from(record.temp_id_map.get("v").unwrap().as_str());
    let child_visual = record.temp_id_map.get("vc").unwrap().clone();
    let parent_visual = record.temp_id_map.get("vp").unwrap().clone();

    let snapshot = h.editor.snapshot().await.unwrap();
    let view = snapshot.views.get(&view_id).unwrap();
    let child = view
        .objects
        .get(&archihub_core_types::VisualId::from(child_visual.as_str()))
        .unwrap();
    assert_eq!((child.bounds.x, child.bounds.y), (10.0, 30.0));
    assert_eq!(
        child.parent.as_ref().map(|p| p.as_str()),
        Some(parent_visual.as_str())
    );
    let origin = view
        .absolute_origin(&archihub_core_types::VisualId::from(child_visual.as_str()))
        .unwrap();
    assert_eq!((origin.x, origin.y), (60.0, 80.0));
}

/// S5: failing chunk under continueOnError; the rest still applies
#[tokio::test]
async fn s5_failed_chunk_with_continue_on_error() {
    let h = harness();

    // Chunks of 2: chunk 2 (indices 4..6) deletes an element and then
    // relates it, a failure that only surfaces at execution time
    let doc = bom(json!([
        { "op": "createElement", "type": "business-actor", "name": "A0", "tempId": "a0" },
        { "op": "createElement", "type": "business-actor", "name": "A1", "tempId": "a1" },
        { "op": "createElement", "type": "business-actor", "name": "O", "tempId": "o" },
        { "op": "createElement", "type": "business-process", "name": "P", "tempId": "p" },
        { "op": "deleteElement", "id": "o" },
        { "op": "createRelationship", "type": "triggering-relationship",
          "sourceId": "o", "targetId": "p", "tempId": "bad" },
        { "op": "createElement", "type": "business-actor", "name": "A2", "tempId": "a2" },
        { "op": "createElement", "type": "business-actor", "name": "A3", "tempId": "a3" },
        { "op": "createElement", "type": "business-actor", "name": "A4", "tempId": "a4" },
        { "op": "createElement", "type": "business-actor", "name": "A5", "tempId": "a5" }
    ]));
    let options = ApplyOptions {
        chunk_size: 2,
        continue_on_error: true,
        ..Default::default()
    };
    let record = apply_and_wait(&h, doc, options).await;

    assert_eq!(record.status, OperationStatus::Complete);
    let failed: Vec<_> = record
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().any(|o| o.error.as_deref().is_some_and(|e| !e.is_empty())));
    assert_eq!(record.retry_hints.len(), 2);

    // Elements from the healthy chunks all exist; the failed chunk's
    // delete was rolled back with it
    let snapshot = h.editor.snapshot().await.unwrap();
    assert_eq!(snapshot.elements.len(), 8);
    for temp in ["a0", "a1", "a2", "a3", "a4", "a5"] {
        assert!(record.temp_id_map.contains_key(temp), "missing {temp}");
    }
    assert!(!record.temp_id_map.contains_key("bad"));
}

/// S6: direction-inconsistent connection is rejected at submission
#[tokio::test]
async fn s6_reversed_connection_rejected_at_submission() {
    let h = harness();

    // Set up relationship X → Y with visuals for both
    let setup = bom(json!([
        { "op": "createElement", "type": "business-actor", "name": "X", "tempId": "x" },
        { "op": "createElement", "type": "business-actor", "name": "Y", "tempId": "y" },
        { "op": "createRelationship", "type": "association-relationship",
          "sourceId": "x", "targetId": "y", "tempId": "r" },
        { "op": "createView", "name": "main", "tempId": "v" },
        { "op": "addToView", "viewId": "v", "elementId": "x", "tempId": "vx" },
        { "op": "addToView", "viewId": "v", "elementId": "y", "tempId": "vy" }
    ]));
    let record = apply_and_wait(&h, setup, ApplyOptions { chunk_size: 10, ..Default::default() }).await;
    assert_eq!(record.status, OperationStatus::Complete);
    let before = element_count(&h).await;

    // Endpoints swapped: visual(Y) offered as source of the X→Y relationship
    let doc = bom(json!([
        { "op": "addConnectionToView",
          "viewId": record.temp_id_map["v"],
          "relationshipId": record.temp_id_map["r"],
          "sourceVisualId": record.temp_id_map["vy"],
          "targetVisualId": record.temp_id_map["vx"] }
    ]));
    let err = h
        .engine
        .submit(doc, ApplyOptions::default(), HashMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, archihub_core_types::HubError::Validation { .. }));
    assert_eq!(element_count(&h).await, before);
}

/// Chunk atomicity: a failed chunk leaves counts unchanged
#[tokio::test]
async fn failed_single_chunk_rolls_back_entirely() {
    let h = harness();
    // One chunk holds everything; deleting an element and then relating it
    // fails mid-chunk at execution, so the whole compound must roll back
    let doc = bom(json!([
        { "op": "createElement", "type": "business-actor", "name": "O", "tempId": "o" },
        { "op": "createElement", "type": "business-process", "name": "P", "tempId": "p" },
        { "op": "deleteElement", "id": "o" },
        { "op": "createRelationship", "type": "triggering-relationship",
          "sourceId": "o", "targetId": "p", "tempId": "bad" }
    ]));
    let record = apply_and_wait(
        &h,
        doc,
        ApplyOptions { chunk_size: 50, ..Default::default() },
    )
    .await;
    assert_eq!(record.status, OperationStatus::Error);
    assert!(record
        .outcomes
        .iter()
        .all(|o| o.status == OutcomeStatus::Failed));
    assert_eq!(element_count(&h).await, 0);
}

/// Undo atomicity: a multi-chunk BOM is one undo step
#[tokio::test]
async fn multi_chunk_apply_collapses_to_one_undo_unit() {
    let h = harness();
    let changes: Vec<serde_json::Value> = (0..6)
        .map(|i| {
            json!({
                "op": "createElement", "type": "business-actor",
                "name": format!("actor-{i}"), "tempId": format!("t{i}")
            })
        })
        .collect();
    let record = apply_and_wait(
        &h,
        bom(json!(changes)),
        ApplyOptions { chunk_size: 2, ..Default::default() },
    )
    .await;
    assert_eq!(record.status, OperationStatus::Complete);
    assert_eq!(element_count(&h).await, 6);

    let (depth, undone, remaining) = h
        .editor
        .dispatch(|m| {
            let depth = m.undo_depth();
            let undone = m.undo_last();
            (depth, undone, m.counts().0)
        })
        .await
        .unwrap();
    assert_eq!(depth, 1);
    assert!(undone);
    assert_eq!(remaining, 0);
}

/// Conflicting payload under a reused idempotency key is rejected
#[tokio::test]
async fn idempotency_key_with_different_payload_conflicts() {
    let h = harness();
    let options = ApplyOptions {
        idempotency_key: Some("K9".into()),
        ..Default::default()
    };
    apply_and_wait(
        &h,
        bom(json!([
            { "op": "createElement", "type": "business-actor", "name": "One", "tempId": "t" }
        ])),
        options.clone(),
    )
    .await;

    let err = h
        .engine
        .submit(
            bom(json!([
                { "op": "createElement", "type": "business-actor", "name": "Two", "tempId": "t" }
            ])),
            options,
            HashMap::new(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, archihub_core_types::HubError::Conflict(_)));
}

/// Mapping completeness: every created tempId resolves to a retrievable id
#[tokio::test]
async fn temp_id_map_entries_are_retrievable() {
    let h = harness();
    let record = apply_and_wait(
        &h,
        bom(json!([
            { "op": "createElement", "type": "node", "name": "host-1", "tempId": "n1" },
            { "op": "createElement", "type": "artifact", "name": "app.war", "tempId": "a1" },
            { "op": "createRelationship", "type": "assignment-relationship",
              "sourceId": "n1", "targetId": "a1", "tempId": "dep" }
        ])),
        ApplyOptions::default(),
    )
    .await;
    assert_eq!(record.status, OperationStatus::Complete);

    let snapshot = h.editor.snapshot().await.unwrap();
    for temp in ["n1", "a1"] {
        let real = record.temp_id_map.get(temp).unwrap();
        assert!(snapshot.elements.contains_key(&ElementId::from(real.as_str())));
    }
    let rel = record.temp_id_map.get("dep").unwrap();
    assert!(snapshot
        .relationships
        .contains_key(&archihub_core_types::RelationshipId::from(rel.as_str())));
}
