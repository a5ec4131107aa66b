//! REST and websocket API for the node registry.
//!
//! A thin adapter over the engine: endpoints create nodes, query state and
//! history, and stream live snapshots to visualizers. No simulation
//! semantics live here.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::STREAM_UPDATE_INTERVAL;
use crate::error::EngineError;
use crate::history::SnapshotEntry;
use crate::node::{Node, NodeId, NodeKind};
use crate::payload::PayloadValue;
use crate::registry::{NodeOverrides, Registry};
use crate::Vec3;

/// Shared application state.
#[derive(Clone)]
pub struct ApiState {
    /// The registry this API fronts.
    pub registry: Arc<Registry>,
}

/// How the `payload` field of a create request is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Plain JSON value, mapped structurally.
    Json,
    /// Nested number lists with a rectangular shape.
    Ndarray,
    /// Base64-encoded byte string.
    Bytes,
    /// Accepted alias of `bytes`.
    Bytearray,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::Json
    }
}

/// Request to create a new node.
#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    /// Node kind: `"Block"`, `"Point"` or `"Sphere"`.
    pub kind: String,
    /// Payload, interpreted per `data_format`.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Initial position `[x, y, z]`. Random when omitted.
    #[serde(default)]
    pub pos: Option<Vec<f64>>,
    /// Payload interpretation.
    #[serde(default)]
    pub data_format: DataFormat,
    /// Override the admission threshold.
    #[serde(default)]
    pub connection_threshold: Option<f64>,
    /// Override the geometric reach.
    #[serde(default)]
    pub influence_radius: Option<f64>,
    /// Seed the attempts counter.
    #[serde(default)]
    pub attempts: Option<u32>,
    /// Override the initial velocity `[vx, vy, vz]`.
    #[serde(default)]
    pub velocity: Option<Vec<f64>>,
    /// Override the initial gravity scalar.
    #[serde(default)]
    pub gravity: Option<f64>,
    /// Explicitly set anchor status.
    #[serde(default)]
    pub is_anchor: Option<bool>,
    /// Override the stability window.
    #[serde(default)]
    pub stability_window: Option<usize>,
    /// Override the tick interval in seconds.
    #[serde(default)]
    pub tick_interval: Option<f64>,
}

/// A node's current state on the wire.
#[derive(Debug, Serialize)]
pub struct NodeResponse {
    /// Node id.
    pub id: NodeId,
    /// Kind name.
    pub kind: NodeKind,
    /// Content digest.
    pub addr: String,
    /// Position.
    pub pos: Vec3,
    /// Velocity.
    pub velocity: Vec3,
    /// Gravity scalar.
    pub gravity: f64,
    /// Neighbor ids, adjacency order.
    pub neighbors: Vec<NodeId>,
    /// Bounded payload description.
    pub payload_summary: String,
    /// Payload variant tag.
    pub payload_type: &'static str,
    /// JSON-safe payload reconstruction.
    pub payload_json: Value,
    /// Failed linkage attempts.
    pub attempts: u32,
    /// Whether the node will evict for a stronger candidate.
    pub permissive_mode: bool,
    /// Whether the node is exempt from movement.
    pub is_anchor: bool,
    /// Admission threshold.
    pub connection_threshold: f64,
    /// Geometric reach.
    pub influence_radius: f64,
    /// Stability window.
    pub stability_window: usize,
    /// Seconds between ticks.
    pub tick_interval: f64,
}

/// Neighbor digest inside a history entry.
#[derive(Debug, Serialize)]
pub struct HistoryNeighborResponse {
    /// Neighbor id.
    pub id: NodeId,
    /// Neighbor kind.
    pub kind: NodeKind,
    /// Neighbor addr at snapshot time.
    pub addr: String,
}

/// One serialized history snapshot.
#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    /// Log index.
    pub idx: usize,
    /// UTC timestamp.
    pub timestamp: DateTime<Utc>,
    /// addr at snapshot time.
    pub addr: String,
    /// Position copy.
    pub pos: Vec3,
    /// Velocity copy.
    pub velocity: Vec3,
    /// Gravity scalar.
    pub gravity: f64,
    /// Node kind.
    pub kind: NodeKind,
    /// Neighborhood at snapshot time.
    pub neighbors: Vec<HistoryNeighborResponse>,
    /// Bounded payload description.
    pub payload_summary: String,
    /// Payload variant tag.
    pub payload_type: &'static str,
    /// Negotiation event, when one landed in this entry's tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Overall simulation status.
#[derive(Debug, Serialize)]
pub struct SimulationStatusResponse {
    /// Whether a live scheduler is attached.
    pub running: bool,
    /// Registered node count.
    pub node_count: usize,
    /// Every node's current state.
    pub nodes: Vec<NodeResponse>,
}

/// One websocket frame.
#[derive(Debug, Serialize)]
struct StreamFrame {
    node_count: usize,
    timestamp: DateTime<Utc>,
    nodes: Vec<NodeResponse>,
}

/// API error mapped onto HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    /// 404
    NotFound(String),
    /// 400
    BadRequest(String),
    /// 500
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidKind(_)
            | EngineError::InvalidVector(_)
            | EngineError::InvalidPayload(_) => ApiError::BadRequest(err.to_string()),
            EngineError::UnknownNode(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the router with CORS and request tracing layers.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/nodes", get(list_nodes).post(create_node))
        .route("/nodes/:id", get(get_node))
        .route("/nodes/:id/history", get(get_node_history))
        .route("/simulation/status", get(simulation_status))
        .route("/ws/nodes", get(ws_nodes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - service descriptor.
async fn root() -> Json<Value> {
    Json(json!({
        "service": "gravnet",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "websocket": "WS /ws/nodes",
            "nodes": {
                "list_all": "GET /nodes",
                "create": "POST /nodes",
                "get_one": "GET /nodes/{id}",
                "history": "GET /nodes/{id}/history",
            },
            "simulation": {
                "status": "GET /simulation/status",
            },
        },
    }))
}

/// GET /health - liveness.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /nodes - create a node and add it to the simulation.
async fn create_node(
    State(state): State<ApiState>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let kind: NodeKind = req.kind.parse().map_err(ApiError::from)?;
    let pos = req
        .pos
        .as_deref()
        .map(|v| vector_from(v, "pos"))
        .transpose()?;
    let velocity = req
        .velocity
        .as_deref()
        .map(|v| vector_from(v, "velocity"))
        .transpose()?;
    let payload = interpret_payload(req.payload, req.data_format)?;

    let overrides = NodeOverrides {
        connection_threshold: req.connection_threshold,
        influence_radius: req.influence_radius,
        attempts: req.attempts,
        velocity,
        gravity: req.gravity,
        is_anchor: req.is_anchor,
        stability_window: req.stability_window,
        tick_interval: req.tick_interval,
    };

    let id = state
        .registry
        .create(kind, payload, pos, overrides)
        .await
        .map_err(ApiError::from)?;

    let core = state.registry.core.read().await;
    let node = core.node(id).map_err(ApiError::from)?;
    Ok(Json(node_to_response(node)))
}

/// GET /nodes - list every node.
async fn list_nodes(State(state): State<ApiState>) -> Json<Vec<NodeResponse>> {
    let core = state.registry.core.read().await;
    Json(core.iter().map(node_to_response).collect())
}

/// GET /nodes/:id - fetch one node.
async fn get_node(
    State(state): State<ApiState>,
    Path(id): Path<NodeId>,
) -> Result<Json<NodeResponse>, ApiError> {
    let core = state.registry.core.read().await;
    let node = core.node(id).map_err(ApiError::from)?;
    Ok(Json(node_to_response(node)))
}

/// GET /nodes/:id/history - serialized snapshots.
async fn get_node_history(
    State(state): State<ApiState>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let core = state.registry.core.read().await;
    let node = core.node(id).map_err(ApiError::from)?;
    Ok(Json(node.history.iter().map(history_entry_to_response).collect()))
}

/// GET /simulation/status - overall status.
async fn simulation_status(State(state): State<ApiState>) -> Json<SimulationStatusResponse> {
    let core = state.registry.core.read().await;
    Json(SimulationStatusResponse {
        running: state.registry.is_running(),
        node_count: core.len(),
        nodes: core.iter().map(node_to_response).collect(),
    })
}

/// WS /ws/nodes - push live snapshots at the stream interval.
async fn ws_nodes(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| stream_nodes(socket, state))
}

async fn stream_nodes(socket: WebSocket, state: ApiState) {
    tracing::info!("visualizer websocket client connected");
    let interval = Duration::from_secs_f64(STREAM_UPDATE_INTERVAL);
    let (mut sender, mut receiver) = socket.split();
    loop {
        let frame = {
            let core = state.registry.core.read().await;
            StreamFrame {
                node_count: core.len(),
                timestamp: Utc::now(),
                nodes: core.iter().map(node_to_response).collect(),
            }
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "websocket frame serialization failed");
                let _ = sender
                    .send(Message::Close(Some(CloseFrame {
                        code: 1011,
                        reason: "internal error".into(),
                    })))
                    .await;
                return;
            }
        };
        if sender.send(Message::Text(text)).await.is_err() {
            tracing::info!("visualizer websocket client disconnected");
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            msg = receiver.next() => match msg {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                    tracing::info!("visualizer websocket client disconnected");
                    return;
                }
                // Pings and stray client messages just wake the loop early.
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Bind and serve until the listener errors or the process exits.
pub async fn serve(registry: Arc<Registry>, bind_addr: &str) -> Result<(), std::io::Error> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let app = create_router(ApiState { registry });
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

// --- serialization helpers ---

fn vector_from(values: &[f64], label: &'static str) -> Result<Vec3, ApiError> {
    if values.len() != 3 {
        return Err(EngineError::InvalidVector(label).into());
    }
    Ok(Vec3::new(values[0], values[1], values[2]))
}

/// Map the request payload into a [`PayloadValue`] per the data format.
fn interpret_payload(
    payload: Option<Value>,
    format: DataFormat,
) -> Result<PayloadValue, ApiError> {
    let Some(value) = payload else {
        return Ok(PayloadValue::None);
    };
    if value.is_null() {
        return Ok(PayloadValue::None);
    }
    match format {
        DataFormat::Json => Ok(payload_from_json(&value)),
        DataFormat::Ndarray => {
            if !value.is_array() {
                return Err(EngineError::InvalidPayload(
                    "ndarray payload must be a nested JSON number list".to_string(),
                )
                .into());
            }
            let (shape, data) = parse_ndarray(&value)?;
            if shape.len() == 1 {
                Ok(PayloadValue::Vector(data))
            } else {
                Ok(PayloadValue::Matrix { shape, data })
            }
        }
        DataFormat::Bytes | DataFormat::Bytearray => {
            let Value::String(encoded) = value else {
                return Err(EngineError::InvalidPayload(
                    "byte payload must be a base64-encoded string".to_string(),
                )
                .into());
            };
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| {
                    ApiError::from(EngineError::InvalidPayload(format!("bad base64: {e}")))
                })?;
            Ok(PayloadValue::Bytes(decoded))
        }
    }
}

/// Structural JSON mapping: null, strings, numbers and objects map onto
/// their payload counterparts; bools become 1/0; an all-number array is a
/// vector and any other array is kept as its canonical JSON text.
fn payload_from_json(value: &Value) -> PayloadValue {
    match value {
        Value::Null => PayloadValue::None,
        Value::Bool(b) => PayloadValue::Number(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => PayloadValue::Number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => PayloadValue::Text(s.clone()),
        Value::Array(items) => {
            let numbers: Option<Vec<f64>> =
                items.iter().map(|v| v.as_f64()).collect();
            match numbers {
                Some(data) => PayloadValue::Vector(data),
                None => PayloadValue::Text(value.to_string()),
            }
        }
        Value::Object(map) => PayloadValue::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), payload_from_json(v)))
                .collect(),
        ),
    }
}

/// Parse a rectangular nested number list into (shape, row-major data).
fn parse_ndarray(value: &Value) -> Result<(Vec<usize>, Vec<f64>), ApiError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok((vec![0], Vec::new()));
            }
            if items.iter().all(Value::is_number) {
                let data: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
                if data.len() != items.len() {
                    return Err(EngineError::InvalidPayload(
                        "ndarray entries must be finite numbers".to_string(),
                    )
                    .into());
                }
                return Ok((vec![items.len()], data));
            }

            let mut child_shape: Option<Vec<usize>> = None;
            let mut data = Vec::new();
            for item in items {
                let (shape, mut chunk) = parse_ndarray(item)?;
                match &child_shape {
                    None => child_shape = Some(shape),
                    Some(expected) if *expected == shape => {}
                    Some(_) => {
                        return Err(EngineError::InvalidPayload(
                            "ndarray payload is ragged".to_string(),
                        )
                        .into())
                    }
                }
                data.append(&mut chunk);
            }
            let mut shape = vec![items.len()];
            shape.extend(child_shape.unwrap_or_default());
            Ok((shape, data))
        }
        _ => Err(EngineError::InvalidPayload(
            "ndarray payload must be a nested JSON number list".to_string(),
        )
        .into()),
    }
}

/// JSON-safe reconstruction of a payload for responses.
fn payload_to_json(payload: &PayloadValue) -> Value {
    match payload {
        PayloadValue::None => Value::Null,
        PayloadValue::Text(s) => Value::String(s.clone()),
        PayloadValue::Number(n) => json_number(*n),
        PayloadValue::Mapping(m) => Value::Object(
            m.iter()
                .map(|(k, v)| (k.clone(), payload_to_json(v)))
                .collect(),
        ),
        PayloadValue::Vector(v) => json!({
            "format": "ndarray",
            "dtype": "float64",
            "shape": [v.len()],
            "value": v,
        }),
        PayloadValue::Matrix { shape, data } => json!({
            "format": "ndarray",
            "dtype": "float64",
            "shape": shape,
            "value": nested_from_flat(shape, data),
        }),
        PayloadValue::Bytes(b) => json!({
            "format": "bytes",
            "length": b.len(),
            "value": base64::engine::general_purpose::STANDARD.encode(b),
        }),
    }
}

fn json_number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Rebuild the nested list form of a flat row-major array.
fn nested_from_flat(shape: &[usize], data: &[f64]) -> Value {
    match shape {
        [] | [_] => Value::Array(data.iter().map(|&x| json_number(x)).collect()),
        [first, rest @ ..] => {
            let stride: usize = rest.iter().product();
            let chunks: Vec<Value> = (0..*first)
                .map(|i| {
                    let lo = (i * stride).min(data.len());
                    let hi = ((i + 1) * stride).min(data.len());
                    nested_from_flat(rest, &data[lo..hi])
                })
                .collect();
            Value::Array(chunks)
        }
    }
}

fn node_to_response(node: &Node) -> NodeResponse {
    NodeResponse {
        id: node.id,
        kind: node.kind,
        addr: node.addr.clone(),
        pos: node.pos,
        velocity: node.velocity,
        gravity: node.gravity,
        neighbors: node.neighbors.clone(),
        payload_summary: node.payload.summary(),
        payload_type: node.payload.type_name(),
        payload_json: payload_to_json(&node.payload),
        attempts: node.attempts,
        permissive_mode: node.permissive_mode,
        is_anchor: node.is_anchor,
        connection_threshold: node.params.connection_threshold,
        influence_radius: node.params.influence_radius,
        stability_window: node.params.stability_window,
        tick_interval: node.params.tick_interval,
    }
}

fn history_entry_to_response(entry: &SnapshotEntry) -> HistoryEntryResponse {
    HistoryEntryResponse {
        idx: entry.idx,
        timestamp: entry.timestamp,
        addr: entry.addr.clone(),
        pos: entry.pos,
        velocity: entry.velocity,
        gravity: entry.gravity,
        kind: entry.kind,
        neighbors: entry
            .neighbors
            .iter()
            .map(|nb| HistoryNeighborResponse {
                id: nb.id,
                kind: nb.kind,
                addr: nb.addr.clone(),
            })
            .collect(),
        payload_summary: entry.payload_summary.clone(),
        payload_type: entry.payload_type,
        event: entry
            .event
            .as_ref()
            .and_then(|e| serde_json::to_value(e).ok()),
    }
}
