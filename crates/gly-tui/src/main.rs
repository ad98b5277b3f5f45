mod action;
mod app;
mod core;
mod download_manager;
mod engine;
mod http;
mod live_meta;
mod mpv;
mod session;
mod sleep_timer;
#[cfg(test)]
mod testing;
mod theme;
mod transport;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use gly_proto::config::Config;
use gly_proto::protocol::Notice;
use tokio::sync::{broadcast, mpsc};

/// What the core and the download manager publish to observers.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// `PlayerState` changed; receivers read the new copy from the `StateStore`.
    StateUpdated,
    /// Some download entry changed; receivers read `DownloadManager::snapshots`.
    DownloadsUpdated,
    /// One-shot user-facing message.
    Notice(Notice),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = gly_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("gly.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for app code, quiet HTTP client internals.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("gly log: {}", log_path.display());
    tracing::info!("gly starting…");

    if let Err(e) = run().await {
        tracing::error!("gly exited with error: {:#}", e);
        let message = format!("{:#}", e);
        if app::show_fatal(&message).is_err() {
            eprintln!("gly: {}", message);
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load()?;
    if gly_proto::platform::find_mpv_binary().is_none() {
        anyhow::bail!("mpv was not found on PATH. Install mpv or set MPV_PATH.");
    }

    // ── Channels ─────────────────────────────────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);
    let (engine_tx, engine_rx) = mpsc::channel::<engine::EngineEvent>(256);

    // ── Build Core ───────────────────────────────────────────────────────────
    let transport = Arc::new(transport::HttpTransport::new(Duration::from_secs(
        config.downloads.connect_timeout_secs,
    ))?);
    let engine = Arc::new(mpv::MpvEngine::new(engine_tx));
    let core = core::Core::new(
        &config,
        engine,
        transport,
        broadcast_tx.clone(),
        event_tx.clone(),
    );
    let store = core.store();
    let downloads = core.downloads();
    core::spawn_engine_forwarder(engine_rx, event_tx.clone());

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            Arc::clone(&store),
            Arc::clone(&downloads),
            event_tx.clone(),
        );
    }

    // ── Spawn Core event loop ────────────────────────────────────────────────
    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("Core exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(
        store,
        downloads,
        event_tx.clone(),
        config.live.title.clone(),
        &config.timer.choices,
    );
    let result = app.run(broadcast_rx).await;

    let _ = event_tx.send(core::CoreEvent::Shutdown).await;
    if tokio::time::timeout(Duration::from_secs(3), core_task).await.is_err() {
        tracing::warn!("Core did not stop within 3s");
    }
    result
}
