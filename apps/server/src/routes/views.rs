//! View endpoints: CRUD, layout, export, routing

use archihub_core_model::RouterPreset;
use archihub_core_types::{FolderId, Handle, HubError, ViewId};
use archihub_systems_view::{ExportParams, LayoutParams, apply_router, export_view, layout_view};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::envelope::{ApiError, ApiResult, ok};
use crate::state::AppState;

/// GET /views — list all views
pub async fn list(State(state): State<Handle<AppState>>) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    Ok(ok(json!({ "views": snapshot.view_summaries() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateViewRequest {
    name: String,
    viewpoint: Option<String>,
    folder_id: Option<String>,
}

/// POST /views — create a view
pub async fn create(
    State(state): State<Handle<AppState>>,
    Json(request): Json<CreateViewRequest>,
) -> ApiResult {
    let id = state
        .editor
        .dispatch(move |m| {
            m.with_compound("createView", None, |m| {
                m.create_view(
                    request.name,
                    request.viewpoint,
                    request.folder_id.as_deref().map(FolderId::from),
                )
            })
        })
        .await??;
    Ok(ok(json!({ "viewId": id })))
}

/// GET /views/{id} — full view content
pub async fn detail(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let snapshot = state.editor.snapshot().await?;
    let view = snapshot
        .views
        .get(&ViewId::from(id.as_str()))
        .ok_or_else(|| ApiError(HubError::NotFound(format!("view {id}"))))?;
    Ok(ok(json!({ "view": view })))
}

/// DELETE /views/{id}
pub async fn remove(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let view_id = ViewId::from(id.as_str());
    state
        .editor
        .dispatch(move |m| {
            m.with_compound("deleteView", None, |m| m.delete_view(&view_id))
        })
        .await??;
    Ok(ok(json!({ "deleted": id })))
}

/// POST /views/{id}/layout — auto-layout the view's visuals
pub async fn layout(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<LayoutParams>>,
) -> ApiResult {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let view_id = ViewId::from(id.as_str());
    let moved = state
        .editor
        .dispatch(move |m| {
            m.with_compound("layout", None, |m| layout_view(m, &view_id, &params))
        })
        .await??;
    Ok(ok(json!({ "viewId": id, "moved": moved })))
}

/// POST /views/{id}/export — render to PNG or JPEG; raw bytes, no envelope
pub async fn export(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ExportParams>>,
) -> Result<Response, ApiError> {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let snapshot = state.editor.snapshot().await?;
    let bytes = export_view(&snapshot, &ViewId::from(id.as_str()), &params)?;
    Ok((
        [(header::CONTENT_TYPE, params.format.content_type())],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RouterRequest {
    router: RouterPreset,
}

/// PUT /views/{id}/router — connection routing preset
pub async fn router(
    State(state): State<Handle<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RouterRequest>,
) -> ApiResult {
    let view_id = ViewId::from(id.as_str());
    let preset = request.router;
    state
        .editor
        .dispatch(move |m| {
            m.with_compound("router", None, |m| apply_router(m, &view_id, preset))
        })
        .await??;
    Ok(ok(json!({ "viewId": id, "router": preset })))
}
