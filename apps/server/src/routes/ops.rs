//! Operation lifecycle endpoints

use std::time::Duration;

use archihub_core_types::{Handle, HubError, OperationId};
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::envelope::{ApiError, ApiResult, ok};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_WAIT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    op_id: String,
    /// Summary only: digest and counters, no outcome array
    #[serde(default)]
    summary: bool,
    /// Outcome paging cursor (index into the outcome array)
    cursor: Option<usize>,
    page_size: Option<usize>,
}

/// GET /ops/status — poll one operation
pub async fn status(
    State(state): State<Handle<AppState>>,
    Query(query): Query<StatusQuery>,
) -> ApiResult {
    let record = state
        .store
        .get(&OperationId::from(query.op_id.as_str()))
        .await
        .ok_or_else(|| ApiError(HubError::NotFound(format!("operation {}", query.op_id))))?;

    if query.summary {
        return Ok(ok(record.summary()));
    }

    // Outcome arrays can be huge; page them behind a cursor
    let cursor = query.cursor.unwrap_or(0);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let total = record.outcomes.len();
    let page: Vec<_> = record
        .outcomes
        .iter()
        .skip(cursor)
        .take(page_size)
        .collect();
    let next_cursor = (cursor + page.len() < total).then_some(cursor + page.len());

    Ok(ok(json!({
        "operationId": record.id,
        "status": record.status,
        "submittedAt": record.submitted_at,
        "updatedAt": record.updated_at,
        "changeCount": record.change_count,
        "tempIdMap": record.temp_id_map,
        "digest": record.digest,
        "timeline": record.timeline,
        "retryHints": record.retry_hints,
        "error": record.error,
        "outcomes": page,
        "outcomeTotal": total,
        "nextCursor": next_cursor,
    })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    limit: Option<usize>,
}

/// GET /ops/list — recent operations, newest first
pub async fn list(
    State(state): State<Handle<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let records = state.store.list(query.limit.unwrap_or(50)).await;
    let summaries: Vec<_> = records.iter().map(|r| r.summary()).collect();
    Ok(ok(json!({ "operations": summaries })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    op_id: String,
    timeout_ms: Option<u64>,
}

/// GET /ops/wait — block until the operation is terminal or timeout
pub async fn wait(
    State(state): State<Handle<AppState>>,
    Query(query): Query<WaitQuery>,
) -> ApiResult {
    let timeout = Duration::from_millis(query.timeout_ms.unwrap_or(30_000)).min(MAX_WAIT);
    let record = state
        .store
        .wait(&OperationId::from(query.op_id.as_str()), timeout)
        .await?;
    Ok(ok(json!({
        "operationId": record.id,
        "status": record.status,
        "terminal": record.status.is_terminal(),
        "tempIdMap": record.temp_id_map,
        "digest": record.digest,
        "error": record.error,
    })))
}

/// POST /ops/gc — manual eviction sweep
pub async fn gc(State(state): State<Handle<AppState>>) -> ApiResult {
    let evicted = state.store.sweep().await;
    Ok(ok(json!({ "evicted": evicted })))
}
