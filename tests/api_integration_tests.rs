//! Integration tests for the REST API: endpoint behavior and the error
//! status mapping, driven through the router with oneshot requests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gravnet::api::{create_router, ApiState};
use gravnet::registry::Registry;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

fn test_state() -> ApiState {
    ApiState {
        registry: Registry::new(),
    }
}

fn post_nodes(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/nodes")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_state());
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = create_router(test_state());
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "gravnet");
    assert!(body["endpoints"]["nodes"]["create"].is_string());
}

#[tokio::test]
async fn test_create_node_happy_path() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "payload": {"key": "value"},
            "pos": [1.0, 2.0, 3.0],
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["kind"], "Block");
    assert_eq!(body["pos"], json!([1.0, 2.0, 3.0]));
    assert_eq!(body["payload_type"], "mapping");
    assert_eq!(body["attempts"], 0);
    assert_eq!(body["is_anchor"], false);
    assert_eq!(body["connection_threshold"], 0.4);
    assert_eq!(body["addr"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_create_node_invalid_kind_is_400() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({ "kind": "Cube" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Cube"));
}

#[tokio::test]
async fn test_create_node_bad_vector_is_400() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({ "kind": "Block", "pos": [1.0, 2.0] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "velocity": [1.0, 2.0, 3.0, 4.0],
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_node_bad_payload_is_400() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "payload": "definitely not base64 !!",
            "data_format": "bytes",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "payload": [[1, 2], [3]],
            "data_format": "ndarray",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_node_ndarray_payload() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "payload": [[1.0, 2.0], [3.0, 4.0]],
            "data_format": "ndarray",
            "pos": [0.0, 0.0, 0.0],
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["payload_type"], "matrix");
    assert_eq!(body["payload_json"]["format"], "ndarray");
    assert_eq!(body["payload_json"]["dtype"], "float64");
    assert_eq!(body["payload_json"]["shape"], json!([2, 2]));
    assert_eq!(body["payload_json"]["value"], json!([[1.0, 2.0], [3.0, 4.0]]));
}

#[tokio::test]
async fn test_create_node_bytes_payload() {
    let app = create_router(test_state());
    let response = app
        .oneshot(post_nodes(json!({
            "kind": "Point",
            "payload": "aGVsbG8=",
            "data_format": "bytes",
            "pos": [0.0, 0.0, 0.0],
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["payload_type"], "bytes");
    assert_eq!(body["payload_summary"], "bytes len=5");
    assert_eq!(body["payload_json"]["length"], 5);
    assert_eq!(body["payload_json"]["value"], "aGVsbG8=");
}

#[tokio::test]
async fn test_list_and_fetch_nodes() {
    let state = test_state();
    let app = create_router(state.clone());
    app.clone()
        .oneshot(post_nodes(json!({ "kind": "Block", "pos": [0.0, 0.0, 0.0] })))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_nodes(json!({ "kind": "Sphere", "pos": [1.0, 1.0, 1.0] })))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/nodes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = app.oneshot(get("/nodes/2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "Sphere");
    assert_eq!(body["is_anchor"], true);
}

#[tokio::test]
async fn test_fetch_unknown_node_is_404() {
    let app = create_router(test_state());
    let response = app.clone().oneshot(get("/nodes/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/nodes/42/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_has_initial_snapshot() {
    let app = create_router(test_state());
    app.clone()
        .oneshot(post_nodes(json!({
            "kind": "Block",
            "payload": "hello",
            "pos": [0.0, 0.0, 0.0],
        })))
        .await
        .unwrap();

    let response = app.oneshot(get("/nodes/1/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["idx"], 0);
    assert_eq!(entries[0]["payload_summary"], "hello");
    assert_eq!(entries[0]["kind"], "Block");
    assert!(entries[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_simulation_status() {
    let app = create_router(test_state());
    app.clone()
        .oneshot(post_nodes(json!({ "kind": "Point", "pos": [0.0, 0.0, 0.0] })))
        .await
        .unwrap();

    let response = app.oneshot(get("/simulation/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // No scheduler bound in these tests.
    assert_eq!(body["running"], false);
    assert_eq!(body["node_count"], 1);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(body["nodes"][0]["tick_interval"], 2.0);
}
