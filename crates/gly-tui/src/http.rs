use crate::core::CoreEvent;
use crate::download_manager::DownloadManager;
use crate::transport::Transport;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use gly_proto::protocol::{Command, DownloadSnapshot, SessionSnapshot, TimerSnapshot};
use gly_proto::state::{CatalogState, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

struct HttpState<T: Transport> {
    store: Arc<StateStore>,
    downloads: Arc<DownloadManager<T>>,
    event_tx: mpsc::Sender<CoreEvent>,
}

impl<T: Transport> Clone for HttpState<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            downloads: Arc::clone(&self.downloads),
            event_tx: self.event_tx.clone(),
        }
    }
}

#[derive(Serialize)]
struct ApiState {
    rev: u64,
    session: SessionSnapshot,
    timer: TimerSnapshot,
    catalog_url: String,
    catalog_status: &'static str,
    episode_count: usize,
    download_dir: String,
    downloads: Vec<DownloadSnapshot>,
}

#[derive(Deserialize)]
struct PlayRequest {
    url: String,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct CancelRequest {
    url: String,
}

#[derive(Deserialize)]
struct DownloadRequest {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    date: String,
}

fn router<T: Transport>(state: HttpState<T>) -> Router {
    Router::new()
        .route("/api/state", get(get_state::<T>))
        .route("/api/live", post(play_live::<T>))
        .route("/api/pause", post(toggle_pause::<T>))
        .route("/api/stop", post(stop::<T>))
        .route("/api/refresh", post(refresh::<T>))
        .route("/api/timer/:minutes", post(arm_timer::<T>))
        .route("/api/download", post(toggle_download::<T>))
        .route("/api/download/cancel", post(cancel_download::<T>))
        .route("/api/play", post(play::<T>))
        .with_state(state)
}

pub fn start_server<T: Transport>(
    bind_address: String,
    port: u16,
    store: Arc<StateStore>,
    downloads: Arc<DownloadManager<T>>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(HttpState {
            store,
            downloads,
            event_tx,
        });

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state<T: Transport>(State(state): State<HttpState<T>>) -> Json<ApiState> {
    let player = state.store.get_state().await;
    let catalog_status = match &player.catalog {
        CatalogState::Idle => "idle",
        CatalogState::Loading => "loading",
        CatalogState::Ready { .. } => "ready",
        CatalogState::Failed { .. } => "failed",
    };
    let mut downloads: Vec<DownloadSnapshot> = state.downloads.snapshots().into_values().collect();
    downloads.sort_by(|a, b| a.url.cmp(&b.url));

    Json(ApiState {
        rev: player.rev,
        episode_count: player.catalog.episodes().len(),
        session: player.session,
        timer: player.timer,
        catalog_url: player.catalog_url,
        catalog_status,
        download_dir: state.downloads.download_dir().display().to_string(),
        downloads,
    })
}

async fn enqueue<T: Transport>(state: &HttpState<T>, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(CoreEvent::Intent(cmd)).await.is_err() {
        error!("HTTP API: core loop is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn play_live<T: Transport>(State(state): State<HttpState<T>>) -> StatusCode {
    enqueue(&state, Command::PlayLive).await
}

async fn toggle_pause<T: Transport>(State(state): State<HttpState<T>>) -> StatusCode {
    enqueue(&state, Command::TogglePause).await
}

async fn stop<T: Transport>(State(state): State<HttpState<T>>) -> StatusCode {
    enqueue(&state, Command::Stop).await
}

async fn refresh<T: Transport>(State(state): State<HttpState<T>>) -> StatusCode {
    enqueue(&state, Command::RefreshCatalog).await
}

async fn arm_timer<T: Transport>(
    State(state): State<HttpState<T>>,
    Path(minutes): Path<u32>,
) -> StatusCode {
    enqueue(&state, Command::ArmTimer { minutes }).await
}

async fn toggle_download<T: Transport>(
    State(state): State<HttpState<T>>,
    Json(req): Json<DownloadRequest>,
) -> StatusCode {
    if req.url.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    enqueue(
        &state,
        Command::ToggleDownload {
            url: req.url,
            title: req.title,
            date: req.date,
        },
    )
    .await
}

async fn cancel_download<T: Transport>(
    State(state): State<HttpState<T>>,
    Json(req): Json<CancelRequest>,
) -> StatusCode {
    if req.url.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    enqueue(&state, Command::CancelDownload { url: req.url }).await
}

async fn play<T: Transport>(
    State(state): State<HttpState<T>>,
    Json(req): Json<PlayRequest>,
) -> StatusCode {
    if req.url.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    enqueue(
        &state,
        Command::PlayOnDemand {
            url: req.url,
            title: req.title,
        },
    )
    .await
}
