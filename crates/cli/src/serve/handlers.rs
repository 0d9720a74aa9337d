//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nfvo_descriptor::{NsInstanceConfig, Nsd, Vnfd};
use nfvo_orchestrator::OrchestratorError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use slog::{info, Logger};

use super::json_error;
use super::state::AppState;

#[derive(Debug, Deserialize)]
struct ScaleOutRequest {
    scaling_group: String,
    #[serde(default)]
    instance_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ScaleInRequest {
    scaling_group: String,
    instance_id: u32,
}

/// Map an orchestrator error onto a status code.
fn orchestrator_error(log: &Logger, e: OrchestratorError) -> Response {
    let status = match &e {
        OrchestratorError::NotFound { .. } => StatusCode::NOT_FOUND,
        OrchestratorError::Config { .. } => StatusCode::BAD_REQUEST,
        OrchestratorError::NsrVlUpdate { .. }
        | OrchestratorError::ScalingOperation { .. }
        | OrchestratorError::DependencyNotReady { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    info!(log, "request rejected"; "status" => status.as_u16(), "error" => %e);
    json_error(status, &e.to_string()).into_response()
}

fn parse_body<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, Response> {
    serde_json::from_value(body).map_err(|e| {
        json_error(StatusCode::BAD_REQUEST, &format!("invalid {}: {}", what, e)).into_response()
    })
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "nsr_count": state.manager.context().nsrs().len(),
        "vm_requests": state.cloud.resources.created().len(),
    });
    (StatusCode::OK, Json(response))
}

// ── Catalog ─────────────────────────────────────────────────────────

/// POST /nsd
pub(crate) async fn handle_add_nsd(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let nsd: Nsd = match parse_body(body, "nsd") {
        Ok(nsd) => nsd,
        Err(response) => return response,
    };
    let id = nsd.id.clone();
    match state.manager.context().catalog().add_nsd(nsd) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// POST /vnfd
pub(crate) async fn handle_add_vnfd(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let vnfd: Vnfd = match parse_body(body, "vnfd") {
        Ok(vnfd) => vnfd,
        Err(response) => return response,
    };
    let id = vnfd.id.clone();
    match state.manager.context().catalog().add_vnfd(vnfd) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// DELETE /vnfd/{id}
pub(crate) async fn handle_delete_vnfd(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.context().catalog().delete_vnfd(&id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "id": id }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

// ── NS instances ────────────────────────────────────────────────────

/// GET /ns-instance-config
pub(crate) async fn handle_list_configs(State(state): State<Arc<AppState>>) -> Response {
    match state.manager.list_configs().await {
        Ok(configs) => {
            (StatusCode::OK, Json(json!({ "ns_instance_config": configs }))).into_response()
        }
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// POST /ns-instance-config
///
/// Creates the NSR and starts instantiating it; poll the opdata for
/// progress.
pub(crate) async fn handle_create_ns(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let config: NsInstanceConfig = match parse_body(body, "ns instance config") {
        Ok(config) => config,
        Err(response) => return response,
    };
    let nsr = match state.manager.create_nsr(config).await {
        Ok(nsr) => nsr,
        Err(e) => return orchestrator_error(&state.log, e),
    };
    match state.manager.instantiate_nsr(nsr.id()) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": nsr.id() }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// DELETE /ns-instance-config/{id}
pub(crate) async fn handle_terminate_ns(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.terminate_nsr(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "id": id, "operational_status": "terminated" })),
        )
            .into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// POST /ns-instance-config/{id}/exec-scale-out
pub(crate) async fn handle_scale_out(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let request: ScaleOutRequest = match parse_body(body, "scale-out request") {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state
        .manager
        .scale_out(&id, &request.scaling_group, request.instance_id)
        .await
    {
        Ok(instance_id) => (
            StatusCode::OK,
            Json(json!({
                "scaling_group": request.scaling_group,
                "instance_id": instance_id,
            })),
        )
            .into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// POST /ns-instance-config/{id}/exec-scale-in
pub(crate) async fn handle_scale_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let request: ScaleInRequest = match parse_body(body, "scale-in request") {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state
        .manager
        .scale_in(&id, &request.scaling_group, request.instance_id)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "scaling_group": request.scaling_group,
                "instance_id": request.instance_id,
            })),
        )
            .into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

// ── Operational data ────────────────────────────────────────────────

/// GET /ns-instance-opdata
pub(crate) async fn handle_list_opdata(State(state): State<Arc<AppState>>) -> Response {
    match state.manager.list_nsrs().await {
        Ok(nsrs) => (StatusCode::OK, Json(json!({ "ns_instance_opdata": nsrs }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// GET /ns-instance-opdata/{id}
pub(crate) async fn handle_get_opdata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.nsr_opdata(&id).await {
        Ok(Some(opdata)) => (StatusCode::OK, Json(json!(opdata))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, &format!("nsr '{}' not found", id))
            .into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// GET /vnfr-catalog
pub(crate) async fn handle_list_vnfrs(State(state): State<Arc<AppState>>) -> Response {
    match state.manager.vnf_manager().list_vnfrs().await {
        Ok(vnfrs) => (StatusCode::OK, Json(json!({ "vnfr_catalog": vnfrs }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}

/// GET /vdur/{id}/console
pub(crate) async fn handle_get_console(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.get_console(&id).await {
        Ok(url) => (StatusCode::OK, Json(json!({ "id": id, "console_url": url }))).into_response(),
        Err(e) => orchestrator_error(&state.log, e),
    }
}
