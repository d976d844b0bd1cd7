//! Liveness and model status

use archihub_core_types::Handle;
use axum::extract::State;
use serde_json::json;

use crate::envelope::{ApiResult, ok};
use crate::state::AppState;

pub async fn health(State(state): State<Handle<AppState>>) -> ApiResult {
    let (elements, relationships, views) = state.editor.dispatch(|m| m.counts()).await?;
    Ok(ok(json!({
        "status": "ok",
        "model": {
            "elements": elements,
            "relationships": relationships,
            "views": views,
        },
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "fast": state.config.fast,
    })))
}
