//! Endpoint wiring and envelope contract tests

use archihub_server::{AppState, ServerConfig, build_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    app_with(ServerConfig {
        rate_limit_per_min: 0,
        ..Default::default()
    })
}

fn app_with(config: ServerConfig) -> Router {
    build_router(AppState::bootstrap(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_model_counts() {
    let app = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["model"]["elements"], 0);
    assert!(body["metadata"]["timestamp"].is_string());
}

#[tokio::test]
async fn apply_then_wait_then_read_element() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post(
            "/model/apply",
            json!({
                "bom": {
                    "version": "1.0",
                    "changes": [
                        { "op": "createElement", "type": "business-actor",
                          "name": "Customer", "tempId": "t1" }
                    ]
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let op_id = body["data"]["operationId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "queued");

    let response = app
        .clone()
        .oneshot(get(&format!("/ops/wait?opId={op_id}&timeoutMs=5000")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "complete");
    let real_id = body["data"]["tempIdMap"]["t1"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/model/element/{real_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["element"]["name"], "Customer");

    let response = app.oneshot(get("/model/stats")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["elements"], 1);
}

#[tokio::test]
async fn invalid_bom_is_rejected_with_validation_error() {
    let app = app();
    let response = app
        .oneshot(post(
            "/model/plan",
            json!({
                "bom": {
                    "version": "1.0",
                    "changes": [
                        { "op": "createRelationship", "type": "access-relationship",
                          "sourceId": "id-missing", "targetId": "id-alsomissing" }
                    ]
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["changeIndex"], 0);
}

#[tokio::test]
async fn unknown_operation_is_404() {
    let app = app();
    let response = app
        .oneshot(get("/ops/status?opId=op-doesnotexist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn rate_limit_returns_retry_after() {
    let app = app_with(ServerConfig {
        rate_limit_per_min: 1,
        ..Default::default()
    });
    let request_body = json!({
        "bom": { "version": "1.0", "changes": [] }
    });

    let first = app
        .clone()
        .oneshot(post("/model/apply", request_body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post("/model/apply", request_body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn view_lifecycle_layout_and_export() {
    let app = app();

    // Create a small populated view through the apply path
    let response = app
        .clone()
        .oneshot(post(
            "/model/apply",
            json!({
                "bom": {
                    "version": "1.0",
                    "changes": [
                        { "op": "createElement", "type": "application-component", "name": "A", "tempId": "a" },
                        { "op": "createElement", "type": "application-component", "name": "B", "tempId": "b" },
                        { "op": "createRelationship", "type": "serving-relationship",
                          "sourceId": "a", "targetId": "b", "tempId": "r" },
                        { "op": "createView", "name": "overview", "tempId": "v" },
                        { "op": "addToView", "viewId": "v", "elementId": "a", "tempId": "va" },
                        { "op": "addToView", "viewId": "v", "elementId": "b", "tempId": "vb" },
                        { "op": "addConnectionToView", "viewId": "v", "relationshipId": "r",
                          "sourceVisualId": "va", "targetVisualId": "vb" }
                    ]
                },
                "options": { "chunkSize": 10 }
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let op_id = body["data"]["operationId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/ops/wait?opId={op_id}&timeoutMs=5000")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "complete");
    let view_id = body["data"]["tempIdMap"]["v"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post(&format!("/views/{view_id}/layout"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["moved"].as_u64().unwrap() > 0);

    let response = app
        .clone()
        .oneshot(post(&format!("/views/{view_id}/export"), json!({ "format": "png" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!bytes.is_empty());

    // Routing preset switch
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/views/{view_id}/router"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "router": "manhattan" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/model/diagnostics")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["ghosts"], 0);
}

#[tokio::test]
async fn ops_status_pages_outcomes() {
    let app = app();
    let changes: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "op": "createElement", "type": "node",
                "name": format!("host-{i}"), "tempId": format!("t{i}")
            })
        })
        .collect();
    let response = app
        .clone()
        .oneshot(post(
            "/model/apply",
            json!({
                "bom": { "version": "1.0", "changes": changes },
                "options": { "chunkSize": 10 }
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let op_id = body["data"]["operationId"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(get(&format!("/ops/wait?opId={op_id}&timeoutMs=5000")))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/ops/status?opId={op_id}&cursor=0&pageSize=4")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["outcomes"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["outcomeTotal"], 10);
    assert_eq!(body["data"]["nextCursor"], 4);

    let response = app
        .oneshot(get(&format!("/ops/status?opId={op_id}&summary=true")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["outcomeCount"], 10);
    assert!(body["data"]["digest"]["byOp"]["createElement"]["created"].is_number());
}
