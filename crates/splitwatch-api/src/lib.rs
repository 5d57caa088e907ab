//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Networking API surface for external integrations."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---

use std::collections::HashMap;
use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, get_service};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use splitwatch_common::VersionInfo;
use splitwatch_store::{RecordStore, SharedStore, StoreError, StoreRouter, TimingRecord};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

mod error;
mod validation;

pub use error::ApiError;
pub use validation::parse_new_record;

use validation::{parse_id, parse_user_filter};

/// Shared API state exposed to handlers.
pub struct ApiState {
    store: SharedStore,
    router: Option<Arc<StoreRouter>>,
    version: VersionInfo,
    start: Instant,
}

impl ApiState {
    /// State serving records from any store implementation.
    pub fn new(store: SharedStore, version: VersionInfo) -> Self {
        Self {
            store,
            router: None,
            version,
            start: Instant::now(),
        }
    }

    /// State serving records through a [`StoreRouter`], whose primary health
    /// is reported on `/api/status`.
    pub fn with_router(router: Arc<StoreRouter>, version: VersionInfo) -> Self {
        let store: SharedStore = router.clone();
        Self {
            store,
            router: Some(router),
            version,
            start: Instant::now(),
        }
    }

    fn status(&self) -> StatusResponse {
        StatusResponse {
            version: self.version.cli_string(),
            uptime_seconds: self.start.elapsed().as_secs(),
            store_backend: match &self.router {
                Some(router) => router.serving_backend(),
                None => self.store.backend(),
            },
            primary_health: self.router.as_ref().map(|router| router.health().as_str()),
        }
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("version", &self.version)
            .field("store", &self.store.backend())
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    /// Address actually bound, including an OS-assigned port.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Build the REST routes, optionally serving browser assets for every other
/// path.
pub fn router(state: Arc<ApiState>, static_dir: Option<PathBuf>) -> Router {
    let api_routes = Router::new()
        .route("/api/status", get(get_status))
        .route(
            "/api/stopwatch-records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/stopwatch-records/:id",
            get(get_record).delete(delete_record),
        )
        .with_state(state);

    if let Some(dir) = static_dir {
        let service = get_service(ServeDir::new(dir).append_index_html_on_directories(true));
        Router::new()
            .merge(api_routes)
            .fallback_service(service)
            .layer(TraceLayer::new_for_http())
    } else {
        api_routes.layer(TraceLayer::new_for_http())
    }
}

/// Spawn the REST API with optional static asset hosting.
pub fn spawn_api_server(
    state: Arc<ApiState>,
    addr: SocketAddr,
    static_dir: Option<PathBuf>,
) -> Result<ApiServer> {
    let app = router(state, static_dir);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %local_addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %local_addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    store_backend: &'static str,
    primary_health: Option<&'static str>,
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(state.status())
}

async fn list_records(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<TimingRecord>>, ApiError> {
    let user_id = parse_user_filter(params.get("userId").map(String::as_str))
        .map_err(|_| ApiError::bad_request(&uri, "Invalid userId format"))?;
    state
        .store
        .list(user_id)
        .await
        .map(Json)
        .map_err(|err| ApiError::internal(&uri, "Failed to fetch stopwatch records", err))
}

async fn get_record(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<Json<TimingRecord>, ApiError> {
    let id = parse_id(&raw_id).ok_or_else(|| ApiError::bad_request(&uri, "Invalid ID format"))?;
    match state.store.get(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => {
            debug!(id, "stopwatch record not found");
            Err(ApiError::not_found())
        }
        Err(err) => Err(ApiError::internal(&uri, "Failed to fetch stopwatch record", err)),
    }
}

async fn create_record(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    body: Bytes,
) -> Result<(StatusCode, Json<TimingRecord>), ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|err| {
        ApiError::invalid_record(
            &uri,
            &splitwatch_store::ValidationErrors::single("body", format!("Malformed JSON: {err}")),
        )
    })?;
    let input = parse_new_record(&payload).map_err(|errors| ApiError::invalid_record(&uri, &errors))?;

    match state.store.create(input).await {
        Ok(record) => {
            info!(id = record.id, duration_ms = record.duration_ms, "stopwatch record created");
            Ok((StatusCode::CREATED, Json(record)))
        }
        Err(StoreError::Validation(errors)) => Err(ApiError::invalid_record(&uri, &errors)),
        Err(err) => Err(ApiError::internal(&uri, "Failed to create stopwatch record", err)),
    }
}

async fn delete_record(
    State(state): State<Arc<ApiState>>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id).ok_or_else(|| ApiError::bad_request(&uri, "Invalid ID format"))?;
    match state.store.delete(id).await {
        Ok(true) => {
            info!(id, "stopwatch record deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => {
            debug!(id, "stopwatch record not found for delete");
            Err(ApiError::not_found())
        }
        Err(err) => Err(ApiError::internal(&uri, "Failed to delete stopwatch record", err)),
    }
}
