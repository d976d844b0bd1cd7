//! Model read and mutation endpoints

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use archihub_core_model::SearchFilter;
use archihub_core_types::{ElementId, Handle, HubError, RelationshipId};
use archihub_systems_apply::bom::compose_document;
use archihub_systems_apply::{ApplyOptions, BomDocument, load_bom_file};
use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::envelope::{ApiError, ApiResult, ok, ok_timed};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    /// How many elements to include in the sample
    sample_size: usize,
}

/// POST /model/query — summary plus a sample of elements and views
pub async fn query(
    State(state): State<Handle<AppState>>,
    body: Option<Json<QueryRequest>>,
) -> ApiResult {
    let started = Instant::now();
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let sample_size = if request.sample_size == 0 { 20 } else { request.sample_size };

    let snapshot = state.editor.snapshot().await?;
    let sample = snapshot
        .search(&SearchFilter {
            limit: Some(sample_size),
            ..Default::default()
        })
        .map_err(ApiError)?;
    Ok(ok_timed(
        json!({
            "model": snapshot.model_name,
            "takenAt": snapshot.taken_at,
            "stats": snapshot.stats(),
            "sample": sample,
            "views": snapshot.view_summaries(),
        }),
        started,
    ))
}

/// POST /model/search — filtered element listing
pub async fn search(
    State(state): State<Handle<AppState>>,
    Json(filter): Json<SearchFilter>,
) -> ApiResult {
    let started = Instant::now();
    let snapshot = state.editor.snapshot().await?;
    let hits = snapshot.search(&filter).map_err(ApiError)?;
    Ok(ok_timed(json!({ "count": hits.len(), "hits": hits }), started))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Inline BOM document; may be omitted when bomPath is given
    bom: Option<BomDocument>,
    /// BOM file on disk; also the anchor for includes/idFiles and the
    /// `<bom>.ids.json` output
    bom_path: Option<String>,
    #[serde(default)]
    options: ApplyOptions,
}

fn compose(request: ApplyRequest) -> Result<(BomDocument, HashMap<String, String>, Option<PathBuf>, ApplyOptions), ApiError> {
    let bom_path = request.bom_path.map(PathBuf::from);
    let (doc, id_map) = match (request.bom, &bom_path) {
        (Some(doc), path) => {
            let base = path.as_ref().and_then(|p| p.parent().map(PathBuf::from));
            compose_document(doc, base.as_deref())?
        }
        (None, Some(path)) => load_bom_file(path)?,
        (None, None) => {
            return Err(ApiError(HubError::Usage(
                "either bom or bomPath is required".into(),
            )));
        }
    };
    Ok((doc, id_map, bom_path, request.options))
}

/// POST /model/plan — dry-run: resolve, validate, chunk; nothing enqueued
pub async fn plan(
    State(state): State<Handle<AppState>>,
    Json(request): Json<ApplyRequest>,
) -> ApiResult {
    let started = Instant::now();
    let (doc, id_map, _, options) = compose(request)?;
    let report = state.engine.plan(doc, options, id_map).await?;
    if !report.violations.is_empty() {
        // Same contract as apply: an invalid BOM is a 400 either way, the
        // dry-run just reports every violation at once
        let first = report.violations[0].clone();
        return Err(ApiError(HubError::Validation {
            change_index: first.change_index,
            op: first.op,
            cause: format!(
                "{} ({} violations total)",
                first.cause,
                report.violations.len()
            ),
        }));
    }
    Ok(ok_timed(report, started))
}

/// POST /model/apply — submit a BOM; responds immediately with the
/// operation id
pub async fn apply(
    State(state): State<Handle<AppState>>,
    Json(request): Json<ApplyRequest>,
) -> ApiResult {
    state.limiter.check()?;
    let (doc, id_map, bom_path, options) = compose(request)?;
    info!(changes = doc.changes.len(), "apply submitted");
    let record = state.engine.submit(doc, options, id_map, bom_path).await?;
    Ok(ok(json!({
        "operationId": record.id,
        "status": record.status,
        "changeCount": record.change_count,
    })))
}

/// GET /model/element/{id} — detail with relationships and containing views
pub async fn element_detail(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    let element_id = ElementId::from(id.as_str());
    let element = snapshot
        .elements
        .get(&element_id)
        .ok_or_else(|| ApiError(HubError::NotFound(format!("element {id}"))))?;

    let relationships: Vec<_> = snapshot
        .relationships
        .values()
        .filter(|r| r.source == element_id || r.target == element_id)
        .collect();
    let views: Vec<_> = snapshot
        .views
        .values()
        .filter(|v| !v.visuals_of_element(&element_id).is_empty())
        .map(|v| json!({ "id": v.id, "name": v.name }))
        .collect();

    Ok(ok(json!({
        "element": element,
        "relationships": relationships,
        "views": views,
    })))
}

/// GET /model/relationship/{id}
pub async fn relationship_detail(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    let relationship = snapshot
        .relationships
        .get(&RelationshipId::from(id.as_str()))
        .ok_or_else(|| ApiError(HubError::NotFound(format!("relationship {id}"))))?;
    Ok(ok(json!({ "relationship": relationship })))
}

/// GET /model/stats — counts by type
pub async fn stats(State(state): State<Handle<AppState>>) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    Ok(ok(snapshot.stats()))
}

/// GET /model/diagnostics — orphans, ghosts, matrix violations, duplicates
pub async fn diagnostics(State(state): State<Handle<AppState>>) -> ApiResult {
    let report = state.editor.dispatch(|m| m.diagnostics()).await?;
    Ok(ok(report))
}

/// GET /model/folders — the organization tree
pub async fn folders(State(state): State<Handle<AppState>>) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    let folders: Vec<_> = snapshot.folders.values().collect();
    Ok(ok(json!({ "folders": folders })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveRequest {
    path: Option<String>,
}

/// POST /model/save — persist the model to disk
pub async fn save(
    State(state): State<Handle<AppState>>,
    body: Option<Json<SaveRequest>>,
) -> ApiResult {
    let path = body.and_then(|Json(b)| b.path).map(PathBuf::from);
    let written = state
        .editor
        .dispatch(move |m| m.save(path.as_deref()))
        .await??;
    Ok(ok(json!({ "path": written.display().to_string() })))
}
