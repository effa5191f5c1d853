#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use fl_client::{
    phases::{EpochMetrics, LocalTrainer},
    ClientConfig, PhaseError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Notify};

pub const GLOBAL_MODEL: &str = "/api/get-global-model";
pub const CURRENT_ROUND: &str = "/api/get-current-round";
pub const SEND_LOCAL_MODEL: &str = "/api/send-local-model";
pub const HEALTH: &str = "/health";

/// Serves `router` on an ephemeral local port and returns its base url.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base url nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Client config pointed at the given collaborators, with instant epochs.
pub fn config(server_url: &str, backend_url: &str) -> ClientConfig {
    ClientConfig {
        server_url: server_url.to_string(),
        backend_url: backend_url.to_string(),
        epoch_delay_ms: 0,
        request_timeout_secs: 5,
        ..Default::default()
    }
}

/// Aggregation server holding `model` and reporting `current_round`.
pub fn aggregation_server(model: Vec<u8>, current_round: u64) -> Router {
    let model = Bytes::from(model);
    Router::new()
        .route(
            GLOBAL_MODEL,
            get(move || {
                let model = model.clone();
                async move { model }
            }),
        )
        .route(
            CURRENT_ROUND,
            get(move || async move { Json(json!({ "current_round": current_round })) }),
        )
}

/// Client config whose collaborator requests give up after one second.
pub fn impatient_config(server_url: &str, backend_url: &str) -> ClientConfig {
    ClientConfig {
        request_timeout_secs: 1,
        ..config(server_url, backend_url)
    }
}

/// Aggregation server that parks every current round request until released.
///
/// Returns the router plus its `requested` and `release` handles.
pub fn gated_round_server(
    model: Vec<u8>,
    current_round: u64,
) -> (Router, Arc<Notify>, Arc<Notify>) {
    let requested = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let model = Bytes::from(model);

    let router = {
        let requested = requested.clone();
        let release = release.clone();
        Router::new()
            .route(
                GLOBAL_MODEL,
                get(move || {
                    let model = model.clone();
                    async move { model }
                }),
            )
            .route(
                CURRENT_ROUND,
                get(move || {
                    let requested = requested.clone();
                    let release = release.clone();
                    async move {
                        requested.notify_one();
                        release.notified().await;
                        Json(json!({ "current_round": current_round }))
                    }
                }),
            )
    };

    (router, requested, release)
}

/// Aggregation server whose model endpoint never answers in time.
pub fn stalling_server() -> Router {
    Router::new().route(
        GLOBAL_MODEL,
        get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Bytes::from_static(b"late")
        }),
    )
}

/// Aggregation server sending `first` and then going silent mid-body.
pub fn truncating_server(first: &'static [u8]) -> Router {
    Router::new().route(
        GLOBAL_MODEL,
        get(move || async move {
            let first = Ok::<_, std::io::Error>(Bytes::from_static(first));
            let stream = futures::stream::iter([first]).chain(futures::stream::pending());
            Body::from_stream(stream)
        }),
    )
}

/// Aggregation server streaming `chunks` with `gap` between each of them.
pub fn trickling_server(chunks: Vec<&'static [u8]>, gap: Duration) -> Router {
    Router::new().route(
        GLOBAL_MODEL,
        get(move || {
            let chunks = chunks.clone();
            async move {
                let stream = futures::stream::iter(chunks).then(move |c| async move {
                    tokio::time::sleep(gap).await;
                    Ok::<_, std::io::Error>(Bytes::from_static(c))
                });
                Body::from_stream(stream)
            }
        }),
    )
}

/// Aggregation server streaming the model without a declared length.
pub fn chunked_server(chunks: Vec<&'static [u8]>) -> Router {
    Router::new().route(
        GLOBAL_MODEL,
        get(move || {
            let chunks = chunks.clone();
            async move {
                let stream = futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c))),
                );
                Body::from_stream(stream)
            }
        }),
    )
}

/// Aggregation server answering every known endpoint with `status`.
pub fn failing_server(status: StatusCode) -> Router {
    Router::new()
        .route(GLOBAL_MODEL, get(move || async move { status }))
        .route(CURRENT_ROUND, get(move || async move { status }))
}

/// Aggregation server whose current round payload is `body`.
pub fn round_server(body: Value) -> Router {
    Router::new().route(
        CURRENT_ROUND,
        get(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    )
}

/// A multipart submission as seen by the local backend.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub file_len: usize,
    pub fields: HashMap<String, String>,
}

pub type Uploads = Arc<Mutex<Vec<Upload>>>;

/// Local training backend recording every upload it accepts.
pub fn backend(uploads: Uploads) -> Router {
    Router::new()
        .route(HEALTH, get(|| async { "ok" }))
        .route(SEND_LOCAL_MODEL, post(receive_upload))
        .with_state(uploads)
}

async fn receive_upload(State(uploads): State<Uploads>, mut multipart: Multipart) -> Json<Value> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            upload.file_name = field.file_name().map(str::to_string);
            upload.file_len = field.bytes().await.unwrap().len();
        } else {
            let value = field.text().await.unwrap();
            upload.fields.insert(name, value);
        }
    }

    uploads.lock().push(upload);
    Json(json!({ "success": true }))
}

/// Local training backend that is healthy but rejects uploads with `status`.
pub fn failing_backend(status: StatusCode) -> Router {
    Router::new()
        .route(HEALTH, get(|| async { "ok" }))
        .route(SEND_LOCAL_MODEL, post(move || async move { status }))
}

/// Local training backend that never answers an upload in time.
pub fn stalling_upload_backend() -> Router {
    Router::new()
        .route(HEALTH, get(|| async { "ok" }))
        .route(
            SEND_LOCAL_MODEL,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Json(json!({ "success": true }))
            }),
        )
}

/// Local training backend that accepts uploads but answers with plain text.
pub fn plain_text_backend() -> Router {
    Router::new().route(SEND_LOCAL_MODEL, post(|| async { "stored" }))
}

/// Local training backend whose health check hangs while `stall` is set.
pub fn stalling_backend(stall: Arc<AtomicBool>) -> Router {
    Router::new().route(
        HEALTH,
        get(move || {
            let stall = stall.clone();
            async move {
                if stall.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                StatusCode::OK
            }
        }),
    )
}

/// Trainer that parks inside its first epoch until released.
pub struct GatedTrainer {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedTrainer {
    /// Returns the trainer plus its `started` and `release` handles.
    pub fn new() -> (Self, Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let trainer = Self {
            started: started.clone(),
            release: release.clone(),
        };
        (trainer, started, release)
    }
}

#[async_trait]
impl LocalTrainer for GatedTrainer {
    async fn run_epoch(
        &mut self,
        _round: u64,
        epoch: usize,
        _total: usize,
    ) -> Result<EpochMetrics, PhaseError> {
        if epoch == 1 {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(EpochMetrics::new(0.5, 0.45, 0.8))
    }

    fn weights(&self, round: u64) -> Vec<u8> {
        vec![round as u8; 16]
    }
}

/// Trainer whose epoch `fail_at` fails.
pub struct FailingTrainer {
    pub fail_at: usize,
}

#[async_trait]
impl LocalTrainer for FailingTrainer {
    async fn run_epoch(
        &mut self,
        _round: u64,
        epoch: usize,
        _total: usize,
    ) -> Result<EpochMetrics, PhaseError> {
        if epoch == self.fail_at {
            return Err(PhaseError::Training("out of memory".into()));
        }
        Ok(EpochMetrics::new(0.6, 0.5, 0.77))
    }

    fn weights(&self, _round: u64) -> Vec<u8> {
        Vec::new()
    }
}
