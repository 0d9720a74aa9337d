//! `nfvo serve` -- HTTP JSON API over an orchestrator running against a
//! simulated cloud.
//!
//! Endpoints:
//! - GET    /health                                   - Server status
//! - POST   /nsd                                      - Add an NSD to the catalog
//! - POST   /vnfd                                     - Add a VNFD to the catalog
//! - DELETE /vnfd/{id}                                - Remove an unreferenced VNFD
//! - GET    /ns-instance-config                       - Stored NS instance configs
//! - POST   /ns-instance-config                       - Create and instantiate an NS
//! - DELETE /ns-instance-config/{id}                  - Terminate an NS
//! - GET    /ns-instance-opdata                       - Opdata of every NSR
//! - GET    /ns-instance-opdata/{id}                  - Opdata of one NSR
//! - GET    /vnfr-catalog                             - Every VNFR
//! - POST   /ns-instance-config/{id}/exec-scale-out   - Add a scaling group instance
//! - POST   /ns-instance-config/{id}/exec-scale-in    - Remove a scaling group instance
//! - GET    /vdur/{id}/console                        - Console URL of a VDUR
//!
//! Errors are `{"error": "<message>"}` with 400, 404 or 409.

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use nfvo_orchestrator::sim::SimCloud;
use nfvo_orchestrator::NsManager;
use slog::{info, warn};
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_add_nsd, handle_add_vnfd, handle_create_ns, handle_delete_vnfd, handle_get_console,
    handle_get_opdata, handle_health, handle_list_configs, handle_list_opdata,
    handle_list_vnfrs, handle_not_found, handle_scale_in, handle_scale_out, handle_terminate_ns,
};
use self::state::AppState;
use crate::bundle::{load_bundle, load_config, logger, sim_config};

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over `state`.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/nsd", post(handle_add_nsd))
        .route("/vnfd", post(handle_add_vnfd))
        .route("/vnfd/{id}", delete(handle_delete_vnfd))
        .route(
            "/ns-instance-config",
            get(handle_list_configs).post(handle_create_ns),
        )
        .route("/ns-instance-config/{id}", delete(handle_terminate_ns))
        .route(
            "/ns-instance-config/{id}/exec-scale-out",
            post(handle_scale_out),
        )
        .route("/ns-instance-config/{id}/exec-scale-in", post(handle_scale_in))
        .route("/ns-instance-opdata", get(handle_list_opdata))
        .route("/ns-instance-opdata/{id}", get(handle_get_opdata))
        .route("/vnfr-catalog", get(handle_list_vnfrs))
        .route("/vdur/{id}/console", get(handle_get_console))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given port, pre-loading `bundle_paths`.
///
/// NS instances whose config is already in the record store are recovered
/// before the bundles' own instances are created. A bundle that fails to
/// load is skipped with a warning.
pub async fn start_server(
    port: u16,
    config_path: Option<PathBuf>,
    bundle_paths: Vec<PathBuf>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let log = logger(&config, quiet)?;
    let cloud = SimCloud::new();
    let config = sim_config(&cloud, config, config_path.is_some());
    let manager = Arc::new(NsManager::new(cloud.context(config, log.clone())));

    let dispatcher = manager.clone();
    let dispatcher_log = log.clone();
    tokio::spawn(async move {
        if let Err(e) = dispatcher.run_dispatcher().await {
            warn!(dispatcher_log, "dispatcher stopped"; "error" => %e);
        }
    });

    let mut ns_instances = Vec::new();
    for path in &bundle_paths {
        let bundle = match load_bundle(path) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(log, "skipping bundle"; "error" => %e);
                continue;
            }
        };
        if let Err(e) = manager.context().catalog().load_bundle(&bundle) {
            warn!(log, "skipping bundle"; "path" => %path.display(), "error" => %e);
            continue;
        }
        info!(log, "loaded bundle"; "path" => %path.display());
        ns_instances.extend(bundle.ns_instances);
    }

    // Stored instances come back first; a bundle instance with the same id
    // is then already running.
    match manager.recover().await {
        Ok(recovered) if !recovered.is_empty() => {
            info!(log, "recovered ns instances"; "count" => recovered.len());
        }
        Ok(_) => {}
        Err(e) => warn!(log, "recovery failed"; "error" => %e),
    }

    for ns in ns_instances {
        if manager.context().get_nsr(&ns.id).is_some() {
            continue;
        }
        let id = ns.id.clone();
        let started = match manager.create_nsr(ns).await {
            Ok(nsr) => manager.instantiate_nsr(nsr.id()),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            warn!(log, "ns instance not started"; "nsr_id" => &id, "error" => %e);
        }
    }

    let state = Arc::new(AppState {
        manager,
        cloud,
        log: log.clone(),
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("nfvo listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(log, "server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
