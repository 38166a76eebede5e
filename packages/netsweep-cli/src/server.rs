//! HTTP API for discovery jobs
//!
//! - `POST   /api/discovery`       start a job
//! - `GET    /api/discovery`       poll a job (`?jobId=`) or list recent jobs
//! - `DELETE /api/discovery`       cancel a job (`?jobId=`)
//! - `POST   /api/discovery/mac`   single-host MAC lookup
//!
//! Shuts down gracefully on SIGTERM/SIGINT; jobs still running are dropped with the process.

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use netsweep_core::discovery::{JobSnapshot, SubmitOptions, SubmittedJob};
use netsweep_core::{DiscoveryError, DiscoveryService, MacLookup};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;

#[derive(Debug, Default, Deserialize)]
pub struct StartDiscoveryBody {
    /// Comma or newline separated networks
    pub network: Option<String>,
    pub networks: Option<Vec<String>>,
    pub options: Option<StartOptions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartOptions {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub job_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LookupMacBody {
    pub ip: Option<String>,
}

/// Error body: `{ "statusCode": 400, "statusMessage": "..." }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(e: DiscoveryError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "statusCode": self.status.as_u16(),
            "statusMessage": self.message,
        }));
        (self.status, body).into_response()
    }
}

pub fn router(service: DiscoveryService) -> Router {
    Router::new()
        .route(
            "/api/discovery",
            post(start_discovery).get(get_discovery).delete(cancel_discovery),
        )
        .route("/api/discovery/mac", post(lookup_mac))
        .with_state(service)
}

/// Serve the API on `bind` until SIGTERM/SIGINT
pub async fn serve(service: DiscoveryService, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!("Discovery API listening on {}", bind);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn start_discovery(
    State(service): State<DiscoveryService>,
    Json(body): Json<StartDiscoveryBody>,
) -> Result<Json<SubmittedJob>, ApiError> {
    let inputs: Vec<String> = match (body.networks, body.network) {
        (Some(networks), _) => networks,
        (None, Some(network)) => vec![network],
        (None, None) => Vec::new(),
    };
    let options = SubmitOptions {
        concurrency: body.options.and_then(|o| o.concurrency),
    };

    // the job keeps running after the handle is dropped
    let handle = service.submit(&inputs, options)?;
    Ok(Json(handle.info))
}

async fn get_discovery(
    State(service): State<DiscoveryService>,
    Query(query): Query<JobQuery>,
) -> Result<Response, ApiError> {
    match query.job_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let snapshot: JobSnapshot = service.get_job(&id)?;
            Ok(Json(snapshot).into_response())
        }
        None => Ok(Json(json!({ "jobs": service.list_jobs() })).into_response()),
    }
}

async fn cancel_discovery(
    State(service): State<DiscoveryService>,
    Query(query): Query<JobQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .job_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("jobId is required"))?;
    let snapshot = service.cancel_job(&id)?;
    Ok(Json(json!({
        "id": snapshot.job.id,
        "status": snapshot.job.status,
        "error": snapshot.job.error,
    })))
}

async fn lookup_mac(
    State(service): State<DiscoveryService>,
    Json(body): Json<LookupMacBody>,
) -> Result<Json<MacLookup>, ApiError> {
    let lookup = service.lookup_mac(body.ip.as_deref().unwrap_or_default()).await?;
    Ok(Json(lookup))
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
