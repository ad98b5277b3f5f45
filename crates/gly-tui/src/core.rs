//! Core: single-owner event loop for playback, sleep timer and catalog.
//!
//! The TUI, the HTTP API, the engine forwarder, the timer ticker, the live
//! metadata poller and catalog fetches all send `CoreEvent`s here.  `Core`
//! owns `PlaybackSession` and `SleepTimer` exclusively, so engine feedback
//! and user intents are applied one at a time.
//!
//! After each event that changes observable state the new snapshot is
//! written to the `StateStore` and `BroadcastMessage::StateUpdated` goes out.
//! Downloads run outside the loop; `DownloadManager` publishes for itself.
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use gly_proto::catalog::Episode;
use gly_proto::config::{Config, LiveConfig};
use gly_proto::protocol::{Command, Notice};
use gly_proto::state::{CatalogState, StateStore};
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::download_manager::DownloadManager;
use crate::engine::{AudioEngine, EngineEvent};
use crate::live_meta;
use crate::session::PlaybackSession;
use crate::sleep_timer::{ArmOutcome, SleepTimer, Tick};
use crate::transport::{fetch_catalog, Transport, TransportError};
use crate::BroadcastMessage;

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the Core loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from the TUI or HTTP API.
    Intent(Command),
    /// Position/duration feedback from the audio engine.
    Engine(EngineEvent),
    /// One second of sleep timer.  `epoch` identifies the ticker task.
    TimerTick { epoch: u64 },
    /// Result of one live metadata poll.
    LiveMetadata { generation: u64, label: Option<String> },
    CatalogLoaded {
        generation: u64,
        result: Result<Vec<Episode>, TransportError>,
    },
    Shutdown,
}

// ── Core ──────────────────────────────────────────────────────────────────────

pub struct Core<E: AudioEngine, T: Transport> {
    session: PlaybackSession<E>,
    timer: SleepTimer,
    /// Ticker feeding `TimerTick`.  `Some` exactly while the timer is armed.
    timer_task: Option<AbortHandle>,
    timer_epoch: u64,
    /// Metadata poller for the current live session.
    poller_task: Option<AbortHandle>,
    store: Arc<StateStore>,
    downloads: Arc<DownloadManager<T>>,
    transport: Arc<T>,
    live: LiveConfig,
    /// In-memory catalog source; `SetCatalogUrl` never reaches the file.
    catalog_url: String,
    catalog_timeout: Duration,
    catalog_generation: u64,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl<E: AudioEngine, T: Transport> Core<E, T> {
    pub fn new(
        config: &Config,
        engine: Arc<E>,
        transport: Arc<T>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let store = Arc::new(StateStore::new(config.catalog.url.clone()));
        let downloads = Arc::new(DownloadManager::new(
            Arc::clone(&transport),
            config.downloads.dir.clone(),
            Duration::from_secs(config.downloads.read_timeout_secs),
            broadcast_tx.clone(),
        ));
        let session = PlaybackSession::new(
            engine,
            config.live.stream_url.clone(),
            config.live.title.clone(),
        );
        Self {
            session,
            timer: SleepTimer::new(),
            timer_task: None,
            timer_epoch: 0,
            poller_task: None,
            store,
            downloads,
            transport,
            live: config.live.clone(),
            catalog_url: config.catalog.url.clone(),
            catalog_timeout: Duration::from_millis(config.catalog.timeout_ms),
            catalog_generation: 0,
            event_tx,
            broadcast_tx,
        }
    }

    /// Shared snapshot store (for the TUI and the HTTP server).
    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    pub fn downloads(&self) -> Arc<DownloadManager<T>> {
        Arc::clone(&self.downloads)
    }

    /// Run the event loop until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("Core: starting event loop");
        self.refresh_catalog().await;

        loop {
            match event_rx.recv().await {
                None => {
                    info!("Core: event channel closed, shutting down");
                    break;
                }
                Some(CoreEvent::Shutdown) => {
                    info!("Core: shutdown requested");
                    break;
                }
                Some(evt) => self.handle_event(evt).await,
            }
        }

        self.cleanup().await
    }

    async fn handle_event(&mut self, evt: CoreEvent) {
        match evt {
            CoreEvent::Intent(cmd) => {
                info!("Core: command {:?}", cmd);
                if let Err(e) = self.handle_command(cmd).await {
                    error!("Core: command error: {:#}", e);
                    self.notify(Notice::PlaybackError {
                        message: e.to_string(),
                    });
                    self.sync_poller();
                }
                self.publish_session().await;
            }

            CoreEvent::Engine(evt) => {
                let changed = match evt {
                    EngineEvent::Position(ms) => self.session.on_engine_position(ms),
                    EngineEvent::Duration(ms) => self.session.on_engine_duration(ms),
                };
                if changed {
                    self.publish_session().await;
                }
            }

            CoreEvent::TimerTick { epoch } => self.on_timer_tick(epoch).await,

            CoreEvent::LiveMetadata { generation, label } => {
                if self.session.apply_live_label(generation, label) {
                    self.publish_session().await;
                }
            }

            CoreEvent::CatalogLoaded { generation, result } => {
                self.on_catalog_loaded(generation, result).await
            }

            CoreEvent::Shutdown => {}
        }
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::PlayOnDemand { url, title } => {
                self.stop_poller();
                self.session.play_on_demand(&url, &title).await?;
            }
            Command::PlayLive => {
                self.stop_poller();
                let generation = self.session.play_live().await?;
                self.start_live_metadata(generation);
            }
            Command::TogglePause => {
                self.session.toggle_play_pause().await?;
                self.sync_poller();
            }
            Command::Stop => {
                self.stop_poller();
                self.session.stop().await?;
            }
            Command::RefreshCatalog => self.refresh_catalog().await,
            Command::ToggleDownload { url, title, date } => {
                if url.is_empty() {
                    warn!("Core: download rejected, \"{}\" has no stream URL", title);
                } else {
                    self.downloads.toggle_download(&url, &title, &date);
                }
            }
            Command::CancelDownload { url } => {
                if !self.downloads.cancel(&url) {
                    debug!("Core: nothing to cancel for {}", url);
                }
            }
            Command::ArmTimer { minutes } => self.arm_timer(minutes).await,
            Command::SetCatalogUrl { url } => {
                let url = url.trim();
                if url.is_empty() {
                    warn!("Core: empty catalog URL ignored");
                } else {
                    self.catalog_url = url.to_string();
                    self.store.set_catalog_url(self.catalog_url.clone()).await;
                    self.refresh_catalog().await;
                }
            }
        }
        Ok(())
    }

    // ── live metadata ─────────────────────────────────────────────────────────

    fn start_live_metadata(&mut self, generation: u64) {
        match self.live.metadata_url.clone() {
            Some(url) => {
                self.poller_task = Some(live_meta::spawn_poller(
                    Arc::clone(&self.transport),
                    &self.live,
                    url,
                    generation,
                    self.event_tx.clone(),
                ));
            }
            None => {
                self.session.promote_live_static(generation);
            }
        }
    }

    fn stop_poller(&mut self) {
        if let Some(task) = self.poller_task.take() {
            debug!("Core: stopping live metadata poller");
            task.abort();
        }
    }

    /// The poller runs exactly while the session is in a live mode.
    fn sync_poller(&mut self) {
        let live = self.session.mode().is_live();
        if live && self.poller_task.is_none() {
            self.start_live_metadata(self.session.live_generation());
        } else if !live {
            self.stop_poller();
        }
    }

    // ── sleep timer ───────────────────────────────────────────────────────────

    async fn arm_timer(&mut self, minutes: u32) {
        match self.timer.arm(minutes) {
            ArmOutcome::Disarmed { was_armed } => {
                self.stop_ticker();
                if was_armed {
                    info!("Core: sleep timer cancelled");
                    self.notify(Notice::TimerCancelled);
                }
            }
            ArmOutcome::Started => {
                info!("Core: sleep timer armed for {} min", minutes);
                self.start_ticker();
                self.notify(Notice::TimerArmed { minutes });
            }
            ArmOutcome::Replaced => {
                info!("Core: sleep timer reset to {} min", minutes);
                self.notify(Notice::TimerArmed { minutes });
            }
        }
        self.publish_timer().await;
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        self.timer_epoch += 1;
        let epoch = self.timer_epoch;
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(CoreEvent::TimerTick { epoch }).await.is_err() {
                    break;
                }
            }
        });
        self.timer_task = Some(task.abort_handle());
    }

    fn stop_ticker(&mut self) {
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
    }

    async fn on_timer_tick(&mut self, epoch: u64) {
        if epoch != self.timer_epoch || self.timer_task.is_none() {
            debug!("Core: stale timer tick (epoch {})", epoch);
            return;
        }
        match self.timer.tick() {
            Tick::Idle => self.stop_ticker(),
            Tick::Running(_) => self.publish_timer().await,
            Tick::Expired => {
                self.stop_ticker();
                info!("Core: sleep timer expired");
                match self.session.stop_by_timer().await {
                    Ok(true) => {}
                    Ok(false) => debug!("Core: timer expired with nothing playing"),
                    Err(e) => {
                        error!("Core: pause on timer expiry failed: {:#}", e);
                        self.notify(Notice::PlaybackError {
                            message: e.to_string(),
                        });
                    }
                }
                self.sync_poller();
                self.notify(Notice::StoppedByTimer);
                self.publish_session().await;
                self.publish_timer().await;
            }
        }
    }

    // ── catalog ───────────────────────────────────────────────────────────────

    async fn refresh_catalog(&mut self) {
        self.catalog_generation += 1;
        let generation = self.catalog_generation;
        let url = self.catalog_url.clone();
        info!("Core: fetching catalog {} (gen {})", url, generation);
        self.store.set_catalog(CatalogState::Loading).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);

        let transport = Arc::clone(&self.transport);
        let timeout = self.catalog_timeout;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = fetch_catalog(transport.as_ref(), &url, timeout).await;
            let _ = tx.send(CoreEvent::CatalogLoaded { generation, result }).await;
        });
    }

    async fn on_catalog_loaded(
        &mut self,
        generation: u64,
        result: Result<Vec<Episode>, TransportError>,
    ) {
        if generation != self.catalog_generation {
            debug!("Core: dropping superseded catalog (gen {})", generation);
            return;
        }
        let catalog = match result {
            Ok(episodes) => CatalogState::Ready {
                episodes,
                fetched_at: Local::now(),
            },
            Err(e) => {
                warn!("Core: catalog fetch failed: {}", e);
                self.notify(Notice::CatalogError {
                    message: e.to_string(),
                });
                CatalogState::Failed {
                    message: e.to_string(),
                }
            }
        };
        self.store.set_catalog(catalog).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    // ── publishing ────────────────────────────────────────────────────────────

    async fn publish_session(&self) {
        if self.store.set_session(self.session.snapshot()).await {
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    async fn publish_timer(&self) {
        if self.store.set_timer(self.timer.snapshot()).await {
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    fn notify(&self, notice: Notice) {
        info!("Core: notice: {}", notice.message());
        let _ = self.broadcast_tx.send(BroadcastMessage::Notice(notice));
    }

    async fn cleanup(&mut self) -> anyhow::Result<()> {
        self.stop_ticker();
        self.stop_poller();
        self.session.stop().await
    }
}

/// Wrap engine feedback into core events.  Ends when either side closes.
pub fn spawn_engine_forwarder(
    mut engine_rx: mpsc::Receiver<EngineEvent>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> AbortHandle {
    tokio::spawn(async move {
        while let Some(evt) = engine_rx.recv().await {
            if event_tx.send(CoreEvent::Engine(evt)).await.is_err() {
                break;
            }
        }
    })
    .abort_handle()
}
