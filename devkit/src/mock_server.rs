/*!
Serveur HTTP de simulation de l'API Fleet Management

Expose `MockFleetApi` sous `/api/v1` avec les mêmes chemins et enveloppes
JSON que le vrai serveur, pour tester le client reqwest de bout en bout.

ROUTES :
- GET/POST /deploy/nodes, DELETE /nodes?ip=
- POST /deploy/test-connection (503 si la sonde échoue)
- POST /deploy/discover-models, /deploy/detect-hardware, /deploy/generate
- GET /deploy/status?ip= (404 pour un agent inconnu)
- POST /agent/control
*/

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetdeck_console::config::ApiConf;
use fleetdeck_console::models::{
    ControlRequest, DeploymentConfig, DiscoverRequest, HardwareRequest, ProbeRequest,
};
use fleetdeck_console::{ApiError, FleetApi};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::fleet_stub::MockFleetApi;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
struct ServerState {
    api: Arc<MockFleetApi>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpQuery {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct NodesBody {
    nodes: Vec<String>,
}

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn failure(err: ApiError) -> (StatusCode, Json<Value>) {
    let code = match &err {
        ApiError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(json!({ "success": false, "error": err.operator_message() })))
}

async fn require_token(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.token else {
        return Ok(next.run(req).await);
    };
    let ok = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v == expected)
        .unwrap_or(false);
    if !ok {
        log::warn!("🔒 [MOCK] request without a valid bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

async fn list_nodes(State(state): State<ServerState>) -> Reply {
    let nodes = state.api.list_nodes().await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "data": nodes })))
}

async fn save_nodes(State(state): State<ServerState>, Json(body): Json<NodesBody>) -> Reply {
    state.api.save_nodes(&body.nodes).await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "message": "nodes saved" })))
}

async fn test_connection(
    State(state): State<ServerState>,
    Json(req): Json<ProbeRequest>,
) -> Response {
    match state.api.test_connection(&req).await {
        Ok(reply) if reply.is_success() => Json(reply).into_response(),
        Ok(reply) => (StatusCode::SERVICE_UNAVAILABLE, Json(reply)).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

async fn discover_models(
    State(state): State<ServerState>,
    Json(req): Json<DiscoverRequest>,
) -> Reply {
    let models = state.api.discover_models(&req).await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "data": { "object": "list", "data": models } })))
}

async fn detect_hardware(
    State(state): State<ServerState>,
    Json(req): Json<HardwareRequest>,
) -> Response {
    match state.api.detect_hardware(&req).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

async fn agent_status(State(state): State<ServerState>, Query(q): Query<IpQuery>) -> Reply {
    match state.api.agent_status(&q.ip).await.map_err(failure)? {
        Some(status) => Ok(Json(json!({ "success": true, "data": status }))),
        None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "agent not found" })))),
    }
}

async fn agent_control(State(state): State<ServerState>, Json(req): Json<ControlRequest>) -> Reply {
    let message = state.api.agent_control(&req.ip, req.action).await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "message": message })))
}

async fn generate(State(state): State<ServerState>, Json(cfg): Json<DeploymentConfig>) -> Reply {
    let data = state.api.generate(&cfg).await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "data": data })))
}

async fn remove_node(State(state): State<ServerState>, Query(q): Query<IpQuery>) -> Reply {
    state.api.remove_node(&q.ip).await.map_err(failure)?;
    Ok(Json(json!({ "success": true, "message": format!("{} removed", q.ip) })))
}

fn build_router(state: ServerState) -> Router {
    let api = Router::new()
        .route("/deploy/nodes", get(list_nodes).post(save_nodes))
        .route("/deploy/test-connection", post(test_connection))
        .route("/deploy/discover-models", post(discover_models))
        .route("/deploy/detect-hardware", post(detect_hardware))
        .route("/deploy/status", get(agent_status))
        .route("/deploy/generate", post(generate))
        .route("/agent/control", post(agent_control))
        .route("/nodes", axum::routing::delete(remove_node));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

/// Serveur lancé sur un port éphémère; arrêté quand la valeur est droppée
pub struct MockServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Démarre le serveur; avec `token`, chaque requête doit porter `Bearer <token>`
    pub async fn start(api: Arc<MockFleetApi>, token: Option<&str>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(ServerState { api, token: token.map(str::to_string) });

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ [MOCK] server stopped: {}", e);
            }
        });
        log::info!("🌐 [MOCK] Fleet API listening on http://{}", addr);
        Ok(Self { addr, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Configuration client pointant vers ce serveur
    pub fn api_conf(&self) -> ApiConf {
        ApiConf {
            base_url: self.base_url(),
            prefix: API_PREFIX.into(),
            timeout_secs: 5,
            token: None,
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Raccourci: serveur sans authentification
pub async fn spawn_mock_server(api: Arc<MockFleetApi>) -> anyhow::Result<MockServer> {
    MockServer::start(api, None).await
}
