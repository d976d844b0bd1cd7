//! Apply Engine (C4)
//!
//! Takes a composed BOM through validation, resolution and chunk planning,
//! then executes chunk by chunk on the editor actor. Each chunk is one
//! atomic undoable compound; compounds of one operation merge into a single
//! undo unit. Failures either abort the rest of the operation or, with
//! continueOnError, only the failing chunk.

use std::collections::HashMap;
use std::path::PathBuf;

use archihub_core_model::{
    EditorHandle, ElementPatch, FolderKind, Model, NewElement, NewRelationship, RelationshipPatch,
};
use archihub_core_types::{
    Bounds, ElementId, FolderId, Handle, HubError, HubResult, OperationId, Ref, RelationshipId,
    ViewId, VisualId, handle,
};
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::json;
use sha2::{Digest as _, Sha256};
use tracing::{error, info, warn};

use archihub_systems_view::composer::{self, AddToViewParams, DecorationParams};
use archihub_systems_view::layout::{Algorithm, LayoutParams, layout_view};

use crate::bom::{BomDocument, Change, MAX_CHANGES};
use crate::operation::{
    ChangeOutcome, Digest, OperationRecord, OperationStatus, OutcomeStatus,
};
use crate::options::{ApplyOptions, DuplicateStrategy, LayoutAlgorithm};
use crate::planner::{ChunkRange, PlanReport, plan_chunks};
use crate::queue::{ChunkReplay, OperationStore};
use crate::resolver::resolve;
use crate::validate::validate;

#[derive(Clone)]
pub struct ApplyEngine {
    editor: EditorHandle,
    store: Handle<OperationStore>,
    /// Serializes operations: chunks of different operations never interleave
    run_lock: Handle<tokio::sync::Mutex<()>>,
    /// Throughput profile: wider chunks, no ghost verification
    fast: bool,
}

impl ApplyEngine {
    pub fn new(editor: EditorHandle, store: Handle<OperationStore>, fast: bool) -> Handle<Self> {
        handle(Self {
            editor,
            store,
            run_lock: handle(tokio::sync::Mutex::new(())),
            fast,
        })
    }

    pub fn store(&self) -> Handle<OperationStore> {
        self.store.clone()
    }

    /// Dry-run: resolve, validate and plan without enqueueing anything
    pub async fn plan(
        &self,
        bom: BomDocument,
        options: ApplyOptions,
        id_map: HashMap<String, String>,
    ) -> HubResult<PlanReport> {
        let options = options.normalized(self.fast);
        let mut changes = bom.changes;
        if changes.len() > MAX_CHANGES {
            return Err(HubError::PayloadTooLarge(format!(
                "{} changes exceed the {MAX_CHANGES} limit",
                changes.len()
            )));
        }
        let snapshot = self.editor.snapshot().await?;
        resolve(&mut changes, &snapshot, &id_map, options.resolve_names)?;
        let violations = validate(&changes, &snapshot, &options);
        let chunks = plan_chunks(&changes, options.chunk_size);
        Ok(PlanReport::new(&changes, &chunks, options.chunk_size, violations))
    }

    /// Validate and enqueue a BOM; returns the freshly queued (or, on an
    /// idempotent replay, the previously recorded) operation.
    pub async fn submit(
        &self,
        bom: BomDocument,
        options: ApplyOptions,
        id_map: HashMap<String, String>,
        bom_path: Option<PathBuf>,
    ) -> HubResult<OperationRecord> {
        let options = options.normalized(self.fast);
        let mut changes = bom.changes;
        if changes.len() > MAX_CHANGES {
            return Err(HubError::PayloadTooLarge(format!(
                "{} changes exceed the {MAX_CHANGES} limit",
                changes.len()
            )));
        }

        let payload_hash = payload_hash(&changes, &options);
        if let Some(key) = &options.idempotency_key {
            if let Some(prior) = self.store.find_by_key(key).await {
                if prior.payload_hash == payload_hash {
                    info!(op = %prior.id, key = %key, "idempotent replay, returning prior operation");
                    return Ok(prior);
                }
                return Err(HubError::Conflict(format!(
                    "idempotencyKey '{key}' was used with a different payload"
                )));
            }
        }

        let snapshot = self.editor.snapshot().await?;
        resolve(&mut changes, &snapshot, &id_map, options.resolve_names)?;
        let violations = validate(&changes, &snapshot, &options);
        if let Some(first) = violations.into_iter().next() {
            return Err(first.into_error());
        }

        let chunks = plan_chunks(&changes, options.chunk_size);
        let seeded: Vec<String> = changes
            .iter()
            .filter_map(|c| c.declared_temp_id().map(str::to_string))
            .collect();
        let record = OperationRecord::new(
            bom.description,
            options.idempotency_key.clone(),
            payload_hash,
            changes.len(),
            &seeded,
        );
        let initial = record.clone();
        self.store.insert(record).await;

        let engine = self.clone();
        let op_id = initial.id.clone();
        tokio::spawn(async move {
            if let Err(err) = engine
                .run(op_id.clone(), changes, chunks, options, bom_path, seeded)
                .await
            {
                error!(op = %op_id, %err, "operation runner failed");
                let _ = engine
                    .store
                    .update(&op_id, |r| {
                        r.status = OperationStatus::Error;
                        r.error = Some(err.to_string());
                        r.push_event("error", Some(err.to_string()));
                    })
                    .await;
            }
        });

        Ok(initial)
    }

    /// Execute all chunks of one operation, in submission order
    async fn run(
        &self,
        op_id: OperationId,
        changes: Vec<Change>,
        chunks: Vec<ChunkRange>,
        options: ApplyOptions,
        bom_path: Option<PathBuf>,
        seeded: Vec<String>,
    ) -> HubResult<()> {
        // FIFO across operations: a later submission waits here until every
        // chunk of the earlier one has run
        let _run_guard = self.run_lock.lock().await;
        self.store
            .update(&op_id, |r| {
                r.status = OperationStatus::Processing;
                r.push_event("processing", None);
            })
            .await?;

        let mut temp_map: IndexMap<String, String> = IndexMap::new();
        let mut outcomes: Vec<ChangeOutcome> = Vec::new();
        let mut retry_hints: Vec<serde_json::Value> = Vec::new();
        let mut ghost_detected = false;
        let mut chunks_succeeded = 0usize;
        let mut aborted = false;

        for (chunk_index, range) in chunks.iter().enumerate() {
            let chunk: Vec<(usize, Change)> = range
                .clone()
                .map(|i| (i, changes[i].clone()))
                .collect();

            if aborted {
                for (index, change) in &chunk {
                    outcomes.push(ChangeOutcome {
                        index: *index,
                        op: change.op_name().to_string(),
                        temp_id: change.declared_temp_id().map(str::to_string),
                        real_id: None,
                        status: OutcomeStatus::Skipped,
                        skip_reason: Some("aborted".into()),
                        error: None,
                    });
                }
                continue;
            }

            // Idempotent chunk replay
            let sub_key = options
                .idempotency_key
                .as_deref()
                .map(|key| chunk_sub_key(key, chunk_index, &chunk));
            if let Some(sub_key) = &sub_key {
                if let Some(replay) = self.store.cached_chunk(sub_key).await {
                    temp_map.extend(replay.temp_ids.clone());
                    outcomes.extend(replay.outcomes.clone());
                    chunks_succeeded += 1;
                    self.store
                        .update(&op_id, |r| {
                            r.push_event(
                                "chunk-replayed",
                                Some(format!("chunk {chunk_index} reused prior outcome")),
                            );
                        })
                        .await?;
                    continue;
                }
            }

            let result = self
                .execute_chunk(&op_id, chunk_index, chunk.clone(), &options, &temp_map)
                .await?;

            temp_map.extend(result.new_temp_ids.clone());
            ghost_detected |= result.ghost_detected;
            let failed = result.error.is_some();
            if failed {
                for outcome in &result.outcomes {
                    if outcome.status == OutcomeStatus::Failed {
                        // Resolved payload fragment so the caller can retry
                        // exactly the failing changes
                        if let Some((_, change)) =
                            chunk.iter().find(|(i, _)| *i == outcome.index)
                        {
                            let mut resolved = change.clone();
                            substitute_temp_ids(&mut resolved, &temp_map);
                            retry_hints.push(json!({
                                "index": outcome.index,
                                "change": resolved,
                            }));
                        }
                    }
                }
            } else {
                chunks_succeeded += 1;
                if let Some(sub_key) = sub_key {
                    self.store
                        .cache_chunk(
                            sub_key,
                            ChunkReplay {
                                outcomes: result.outcomes.clone(),
                                temp_ids: result.new_temp_ids.clone(),
                                expires_at: Utc::now() + self.store.ttl(),
                            },
                        )
                        .await;
                }
            }
            outcomes.extend(result.outcomes);

            let note = result.error.clone();
            let event = if failed { "chunk-failed" } else { "chunk-complete" };
            let temp_snapshot = temp_map.clone();
            let outcome_snapshot = outcomes.clone();
            self.store
                .update(&op_id, move |r| {
                    r.outcomes = outcome_snapshot;
                    for (temp, real) in &temp_snapshot {
                        r.temp_id_map.insert(temp.clone(), real.clone());
                    }
                    r.push_event(event, note.or(Some(format!("chunk {chunk_index}"))));
                })
                .await?;

            if failed && !options.continue_on_error {
                aborted = true;
            }
        }

        // Post-apply layout over every view the batch touched
        if options.layout_after && chunks_succeeded > 0 {
            let views = touched_views(&changes, &temp_map);
            let algorithm = match options.layout_algorithm {
                LayoutAlgorithm::Dagre => Algorithm::Dagre,
                LayoutAlgorithm::Sugiyama => Algorithm::Sugiyama,
            };
            let tag = op_id.to_string();
            self.editor
                .dispatch(move |model| {
                    for view_id in views {
                        model.begin_compound("layout", Some(tag.clone()));
                        let params = LayoutParams {
                            algorithm,
                            ..Default::default()
                        };
                        match layout_view(model, &view_id, &params) {
                            Ok(_) => model.commit_compound(),
                            Err(err) => {
                                warn!(view = %view_id, %err, "post-apply layout failed");
                                model.rollback_compound();
                            }
                        }
                    }
                })
                .await?;
            self.store
                .update(&op_id, |r| r.push_event("layout", None))
                .await?;
        }

        let digest = Digest::from_outcomes(&outcomes, &temp_map, &seeded, ghost_detected);
        let failed_any = outcomes.iter().any(|o| o.status == OutcomeStatus::Failed);
        let status = if chunks_succeeded == 0 && failed_any {
            OperationStatus::Error
        } else if aborted {
            OperationStatus::Error
        } else {
            OperationStatus::Complete
        };

        if status == OperationStatus::Complete {
            if let Some(bom_path) = &bom_path {
                if let Err(err) = write_ids_file(bom_path, &temp_map) {
                    warn!(%err, "could not write ids file");
                }
            }
        }

        let final_temp_map = temp_map.clone();
        self.store
            .update(&op_id, move |r| {
                r.status = status;
                r.digest = digest;
                r.retry_hints = retry_hints;
                // Includes the skipped outcomes of aborted chunks, which
                // never went through a per-chunk update
                r.outcomes = outcomes;
                for (temp, real) in &final_temp_map {
                    r.temp_id_map.insert(temp.clone(), real.clone());
                }
                // Drop seeded-but-never-filled entries; mappingIncomplete
                // already records the fact
                r.temp_id_map.retain(|_, v| !v.is_empty());
                let event = match status {
                    OperationStatus::Complete => "complete",
                    _ => "error",
                };
                r.push_event(event, None);
            })
            .await?;
        info!(op = %op_id, ?status, "operation finished");
        Ok(())
    }

    /// Run one chunk as an atomic compound on the editor actor
    async fn execute_chunk(
        &self,
        op_id: &OperationId,
        chunk_index: usize,
        chunk: Vec<(usize, Change)>,
        options: &ApplyOptions,
        temp_map: &IndexMap<String, String>,
    ) -> HubResult<ChunkResult> {
        let tag = op_id.to_string();
        let options = options.clone();
        let known_temp_ids = temp_map.clone();
        let verify = !self.fast;

        self.editor
            .dispatch(move |model| {
                execute_chunk_on_editor(model, chunk_index, chunk, &options, known_temp_ids, tag, verify)
            })
            .await
    }
}

struct ChunkResult {
    outcomes: Vec<ChangeOutcome>,
    new_temp_ids: IndexMap<String, String>,
    error: Option<String>,
    ghost_detected: bool,
}

/// Runs inside the editor actor: applies every change of the chunk inside
/// one compound, rolling the compound back on the first failure.
fn execute_chunk_on_editor(
    model: &mut Model,
    chunk_index: usize,
    chunk: Vec<(usize, Change)>,
    options: &ApplyOptions,
    mut temp_ids: IndexMap<String, String>,
    tag: String,
    verify: bool,
) -> ChunkResult {
    model.begin_compound(format!("chunk {chunk_index}"), Some(tag));

    let preexisting: IndexMap<String, String> = temp_ids.clone();
    let mut outcomes: Vec<ChangeOutcome> = Vec::new();
    let mut created: Vec<CreatedRef> = Vec::new();
    let mut error: Option<String> = None;

    for (index, change) in &chunk {
        let mut resolved = change.clone();
        substitute_temp_ids(&mut resolved, &temp_ids);
        match apply_change(model, &resolved, options, &mut created) {
            Ok((status, real_id)) => {
                if let (Some(temp), Some(real)) = (change.declared_temp_id(), &real_id) {
                    temp_ids.insert(temp.to_string(), real.clone());
                }
                outcomes.push(ChangeOutcome {
                    index: *index,
                    op: change.op_name().to_string(),
                    temp_id: change.declared_temp_id().map(str::to_string),
                    real_id,
                    status,
                    skip_reason: None,
                    error: None,
                });
            }
            Err(err) => {
                error = Some(err.to_string());
                // The compound rolls back as a whole: every change of the
                // chunk reports failed, the faulty one carries the error
                outcomes = chunk
                    .iter()
                    .map(|(i, c)| ChangeOutcome {
                        index: *i,
                        op: c.op_name().to_string(),
                        temp_id: c.declared_temp_id().map(str::to_string),
                        real_id: None,
                        status: OutcomeStatus::Failed,
                        skip_reason: None,
                        error: if i == index {
                            Some(err.to_string())
                        } else {
                            Some("chunk rolled back".into())
                        },
                    })
                    .collect();
                break;
            }
        }
    }

    let mut ghost_detected = false;
    if error.is_some() {
        model.rollback_compound();
        temp_ids = preexisting.clone();
    } else {
        if verify {
            // Guard against half-applied compounds: everything the chunk
            // claims to have created must be retrievable again
            for created_ref in &created {
                if !created_ref.is_retrievable(model) {
                    ghost_detected = true;
                    warn!(?created_ref, "ghost detected after chunk");
                }
            }
        }
        model.commit_compound();
    }

    let new_temp_ids = temp_ids
        .into_iter()
        .filter(|(temp, _)| !preexisting.contains_key(temp))
        .collect();

    ChunkResult {
        outcomes,
        new_temp_ids,
        error,
        ghost_detected,
    }
}

/// A creation performed by the current chunk, for post-chunk verification
#[derive(Debug)]
enum CreatedRef {
    Element(ElementId),
    Relationship(RelationshipId),
    View(ViewId),
    Visual(ViewId, VisualId),
    Connection(ViewId, VisualId),
}

impl CreatedRef {
    fn is_retrievable(&self, model: &Model) -> bool {
        match self {
            CreatedRef::Element(id) => model.get_element(id).is_some(),
            CreatedRef::Relationship(id) => model.get_relationship(id).is_some(),
            CreatedRef::View(id) => model.get_view(id).is_some(),
            CreatedRef::Visual(view, visual) => model
                .get_view(view)
                .is_some_and(|v| v.objects.contains_key(visual)),
            CreatedRef::Connection(view, visual) => model
                .get_view(view)
                .is_some_and(|v| v.connections.contains_key(visual)),
        }
    }
}

/// Apply one resolved change through the adapter / composer.
///
/// Returns the outcome status and, for creations, the real id.
fn apply_change(
    model: &mut Model,
    change: &Change,
    options: &ApplyOptions,
    created: &mut Vec<CreatedRef>,
) -> HubResult<(OutcomeStatus, Option<String>)> {
    match change {
        Change::CreateElement {
            element_type,
            name,
            documentation,
            properties,
            folder_id,
            ..
        }
        | Change::CreateOrGetElement {
            element_type,
            name,
            documentation,
            properties,
            folder_id,
            ..
        } => {
            let upsert = matches!(change, Change::CreateOrGetElement { .. });
            if let Some(existing) = model.find_element_by_key(*element_type, name) {
                let existing_id = existing.id.clone();
                if upsert || options.duplicate_strategy == DuplicateStrategy::Reuse {
                    return Ok((OutcomeStatus::Reused, Some(existing_id.0)));
                }
                if options.duplicate_strategy == DuplicateStrategy::Rename {
                    let renamed = next_free_name(model, *element_type, name);
                    let id = model.create_element(NewElement {
                        element_type: Some(*element_type),
                        name: renamed,
                        documentation: documentation.clone(),
                        properties: properties.clone(),
                        folder: folder_id.as_deref().map(FolderId::from),
                    })?;
                    created.push(CreatedRef::Element(id.clone()));
                    return Ok((OutcomeStatus::Renamed, Some(id.0)));
                }
                return Err(HubError::Conflict(format!(
                    "duplicate element ({}, '{name}')",
                    element_type.wire_name()
                )));
            }
            let id = model.create_element(NewElement {
                element_type: Some(*element_type),
                name: name.clone(),
                documentation: documentation.clone(),
                properties: properties.clone(),
                folder: folder_id.as_deref().map(FolderId::from),
            })?;
            created.push(CreatedRef::Element(id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::CreateRelationship {
            relationship_type,
            source_id,
            target_id,
            name,
            properties,
            access_type,
            strength,
            folder_id,
            ..
        }
        | Change::CreateOrGetRelationship {
            relationship_type,
            source_id,
            target_id,
            name,
            properties,
            access_type,
            strength,
            folder_id,
            ..
        } => {
            let upsert = matches!(change, Change::CreateOrGetRelationship { .. });
            let source = ElementId::from(source_id.as_str());
            let target = ElementId::from(target_id.as_str());
            let access = access_type.unwrap_or_default();
            if let Some(existing) = model.find_relationship_by_key(
                *relationship_type,
                &source,
                &target,
                access,
                strength.as_deref(),
            ) {
                let existing_id = existing.id.clone();
                if upsert || options.duplicate_strategy == DuplicateStrategy::Reuse {
                    return Ok((OutcomeStatus::Reused, Some(existing_id.0)));
                }
                // rename is never valid for relationships
                return Err(HubError::Conflict(
                    "duplicate relationship (type, source, target, accessType, strength)".into(),
                ));
            }
            let id = model.create_relationship(NewRelationship {
                relationship_type: *relationship_type,
                source,
                target,
                name: name.clone(),
                properties: properties.clone(),
                access_type: access,
                strength: strength.clone(),
                folder: folder_id.as_deref().map(FolderId::from),
            })?;
            created.push(CreatedRef::Relationship(id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::UpdateElement { id, name, documentation, properties } => {
            model.update_element(
                &ElementId::from(id.as_str()),
                ElementPatch {
                    name: name.clone(),
                    documentation: documentation.clone(),
                    properties: properties.clone(),
                },
            )?;
            Ok((OutcomeStatus::Created, Some(id.clone())))
        }

        Change::UpdateRelationship { id, name, properties, access_type, strength } => {
            model.update_relationship(
                &RelationshipId::from(id.as_str()),
                RelationshipPatch {
                    name: name.clone(),
                    properties: properties.clone(),
                    access_type: *access_type,
                    strength: strength.clone(),
                },
            )?;
            Ok((OutcomeStatus::Created, Some(id.clone())))
        }

        Change::DeleteElement { id, cascade } => {
            model.delete_element(&ElementId::from(id.as_str()), *cascade)?;
            Ok((OutcomeStatus::Created, None))
        }

        Change::DeleteRelationship { id } => {
            model.delete_relationship(&RelationshipId::from(id.as_str()))?;
            Ok((OutcomeStatus::Created, None))
        }

        Change::SetProperty { id, key, value } => {
            model.set_property(id, key, value.clone())?;
            Ok((OutcomeStatus::Created, Some(id.clone())))
        }

        Change::MoveToFolder { id, folder_id } => {
            model.move_to_folder(id, &FolderId::from(folder_id.as_str()))?;
            Ok((OutcomeStatus::Created, Some(id.clone())))
        }

        Change::CreateFolder { name, parent_id, layer, .. } => {
            let kind = layer
                .map(FolderKind::Layer)
                .unwrap_or(FolderKind::Layer(archihub_core_types::Layer::Other));
            let id = model.create_folder(
                name.clone(),
                kind,
                parent_id.as_deref().map(FolderId::from),
            )?;
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::CreateView { name, viewpoint, folder_id, .. } => {
            let id = model.create_view(
                name.clone(),
                viewpoint.clone(),
                folder_id.as_deref().map(FolderId::from),
            )?;
            created.push(CreatedRef::View(id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::DeleteView { view_id } => {
            model.delete_view(&ViewId::from(view_id.as_str()))?;
            Ok((OutcomeStatus::Created, None))
        }

        Change::AddToView {
            view_id,
            element_id,
            x,
            y,
            width,
            height,
            parent_visual_id,
            style,
            ..
        } => {
            let view = ViewId::from(view_id.as_str());
            let defaults = Bounds::default();
            let bounds = Bounds::new(
                x.unwrap_or(defaults.x),
                y.unwrap_or(defaults.y),
                width.unwrap_or(defaults.width),
                height.unwrap_or(defaults.height),
            );
            let id = composer::add_to_view(
                model,
                AddToViewParams {
                    view: view.clone(),
                    element: ElementId::from(element_id.as_str()),
                    bounds,
                    parent: parent_visual_id.as_deref().map(VisualId::from),
                    style: style.clone(),
                },
            )?;
            created.push(CreatedRef::Visual(view, id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::NestInView { view_id, visual_id, parent_visual_id, x, y } => {
            composer::nest_in_view(
                model,
                &ViewId::from(view_id.as_str()),
                &VisualId::from(visual_id.as_str()),
                &VisualId::from(parent_visual_id.as_str()),
                *x,
                *y,
            )?;
            Ok((OutcomeStatus::Created, Some(visual_id.clone())))
        }

        Change::AddConnectionToView {
            view_id,
            relationship_id,
            source_visual_id,
            target_visual_id,
            ..
        } => {
            let view = ViewId::from(view_id.as_str());
            let id = composer::add_connection_to_view(
                model,
                &view,
                &RelationshipId::from(relationship_id.as_str()),
                &VisualId::from(source_visual_id.as_str()),
                &VisualId::from(target_visual_id.as_str()),
            )?;
            created.push(CreatedRef::Connection(view, id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::DeleteConnectionFromView { view_id, connection_id } => {
            model.remove_visual_connection(
                &ViewId::from(view_id.as_str()),
                &VisualId::from(connection_id.as_str()),
            )?;
            Ok((OutcomeStatus::Created, None))
        }

        Change::StyleViewObject { view_id, visual_id, style } => {
            model.set_visual_style(
                &ViewId::from(view_id.as_str()),
                &VisualId::from(visual_id.as_str()),
                style,
            )?;
            Ok((OutcomeStatus::Created, Some(visual_id.clone())))
        }

        Change::StyleConnection { view_id, connection_id, style } => {
            model.set_connection_style(
                &ViewId::from(view_id.as_str()),
                &VisualId::from(connection_id.as_str()),
                style,
            )?;
            Ok((OutcomeStatus::Created, Some(connection_id.clone())))
        }

        Change::MoveViewObject { view_id, visual_id, x, y, width, height } => {
            composer::move_view_object(
                model,
                &ViewId::from(view_id.as_str()),
                &VisualId::from(visual_id.as_str()),
                *x,
                *y,
                *width,
                *height,
            )?;
            Ok((OutcomeStatus::Created, Some(visual_id.clone())))
        }

        Change::CreateNote { view_id, content, x, y, width, height, .. } => {
            let view = ViewId::from(view_id.as_str());
            let id = composer::create_note(
                model,
                DecorationParams {
                    view: view.clone(),
                    bounds: decoration_bounds(*x, *y, *width, *height),
                },
                content.clone(),
            )?;
            created.push(CreatedRef::Visual(view, id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }

        Change::CreateGroup { view_id, name, x, y, width, height, .. } => {
            let view = ViewId::from(view_id.as_str());
            let id = composer::create_group(
                model,
                DecorationParams {
                    view: view.clone(),
                    bounds: decoration_bounds(*x, *y, *width, *height),
                },
                name.clone(),
            )?;
            created.push(CreatedRef::Visual(view, id.clone()));
            Ok((OutcomeStatus::Created, Some(id.0)))
        }
    }
}

fn decoration_bounds(x: Option<f64>, y: Option<f64>, w: Option<f64>, h: Option<f64>) -> Bounds {
    Bounds::new(
        x.unwrap_or(0.0),
        y.unwrap_or(0.0),
        w.unwrap_or(160.0),
        h.unwrap_or(80.0),
    )
}

/// Smallest free "name (n)" for duplicateStrategy=rename; deterministic
fn next_free_name(
    model: &Model,
    element_type: archihub_core_types::ElementType,
    name: &str,
) -> String {
    let mut n = 2usize;
    loop {
        let candidate = format!("{name} ({n})");
        if model.find_element_by_key(element_type, &candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Replace every reference that names an already-created tempId
fn substitute_temp_ids(change: &mut Change, temp_ids: &IndexMap<String, String>) {
    for (_, field) in change.reference_fields() {
        if let Ref::Temp(symbol) = Ref::parse(field) {
            if let Some(real) = temp_ids.get(&symbol) {
                *field = real.clone();
            }
        }
    }
}

/// Views a change list touches, with tempIds mapped through to real ids
fn touched_views(changes: &[Change], temp_map: &IndexMap<String, String>) -> Vec<ViewId> {
    let mut views: Vec<ViewId> = Vec::new();
    for change in changes {
        let mut clone = change.clone();
        for (kind, field) in clone.reference_fields() {
            if kind != crate::bom::RefKind::View {
                continue;
            }
            let raw = temp_map.get(field.as_str()).unwrap_or(field);
            let id = ViewId::from(raw.as_str());
            if !views.contains(&id) {
                views.push(id);
            }
        }
    }
    views
}

/// Hash binding an idempotency key to the exact payload it was used with
fn payload_hash(changes: &[Change], options: &ApplyOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(changes).unwrap_or_default());
    hasher.update([options.continue_on_error as u8, options.resolve_names as u8]);
    hex_digest(hasher)
}

/// Deterministic per-chunk idempotency sub-key
fn chunk_sub_key(key: &str, chunk_index: usize, chunk: &[(usize, Change)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(chunk_index.to_le_bytes());
    let payload: Vec<&Change> = chunk.iter().map(|(_, c)| c).collect();
    hasher.update(serde_json::to_vec(&payload).unwrap_or_default());
    hex_digest(hasher)
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// `<bom>.ids.json` beside the applied BOM file
fn write_ids_file(bom_path: &PathBuf, temp_map: &IndexMap<String, String>) -> HubResult<()> {
    let target = bom_path.with_extension("ids.json");
    let flat: IndexMap<&String, &String> =
        temp_map.iter().filter(|(_, v)| !v.is_empty()).collect();
    std::fs::write(&target, serde_json::to_string_pretty(&flat)?)?;
    info!(path = %target.display(), entries = flat.len(), "ids file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_keys_differ_by_index_and_payload() {
        let chunk: Vec<(usize, Change)> = vec![(
            0,
            serde_json::from_value(serde_json::json!({
                "op": "createElement", "type": "business-actor", "name": "A"
            }))
            .unwrap(),
        )];
        let a = chunk_sub_key("K", 0, &chunk);
        let b = chunk_sub_key("K", 1, &chunk);
        let c = chunk_sub_key("K2", 0, &chunk);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, chunk_sub_key("K", 0, &chunk));
    }

    #[test]
    fn rename_suffix_is_deterministic() {
        let mut model = Model::new("test");
        model.begin_compound("setup", None);
        for name in ["X", "X (2)"] {
            model
                .create_element(NewElement {
                    element_type: Some(archihub_core_types::ElementType::BusinessActor),
                    name: name.into(),
                    ..Default::default()
                })
                .unwrap();
        }
        model.commit_compound();
        assert_eq!(
            next_free_name(&model, archihub_core_types::ElementType::BusinessActor, "X"),
            "X (3)"
        );
    }
}
