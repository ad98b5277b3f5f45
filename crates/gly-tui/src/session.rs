//! The single playback session.
//!
//! Owned by the core loop; every mutation (user intents, engine feedback,
//! live labels, timer expiry) goes through `&mut self`, so position and
//! duration updates can never interleave with a source switch.

use std::sync::Arc;

use anyhow::bail;
use gly_proto::clock::format_clock;
use gly_proto::protocol::{PlaybackMode, SessionSnapshot};
use tracing::{debug, info};

use crate::engine::AudioEngine;

/// Title shown between `play_live` and the first metadata label.
pub const LIVE_LOADING_LABEL: &str = "Connecting to live stream…";

pub struct PlaybackSession<E: AudioEngine> {
    engine: Arc<E>,
    live_url: String,
    live_title: String,
    mode: PlaybackMode,
    resume_mode: Option<PlaybackMode>,
    current_url: Option<String>,
    current_title: String,
    position_ms: Option<u64>,
    duration_ms: Option<u64>,
    /// Bumped on every source change.  Metadata polls carry the generation
    /// they were started for, so a late result for an abandoned live
    /// session is recognisable.
    live_generation: u64,
    live_label_seen: bool,
}

impl<E: AudioEngine> PlaybackSession<E> {
    pub fn new(engine: Arc<E>, live_url: String, live_title: String) -> Self {
        Self {
            engine,
            live_url,
            live_title,
            mode: PlaybackMode::Stopped,
            resume_mode: None,
            current_url: None,
            current_title: String::new(),
            position_ms: None,
            duration_ms: None,
            live_generation: 0,
            live_label_seen: false,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn live_generation(&self) -> u64 {
        self.live_generation
    }

    pub async fn play_on_demand(&mut self, url: &str, title: &str) -> anyhow::Result<()> {
        if url.is_empty() {
            bail!("episode has no stream URL");
        }
        info!("session: on-demand {} ({})", title, url);
        let previous = self.mode;
        self.live_generation += 1;
        self.mode = PlaybackMode::PlayingOnDemand;
        self.resume_mode = None;
        self.current_url = Some(url.to_string());
        self.current_title = title.to_string();
        self.position_ms = Some(0);
        self.duration_ms = None;
        self.switch_source(previous, url).await
    }

    /// Start the live feed.  Returns the generation the metadata poller
    /// must tag its labels with.
    pub async fn play_live(&mut self) -> anyhow::Result<u64> {
        info!("session: live {}", self.live_url);
        let previous = self.mode;
        self.live_generation += 1;
        self.mode = PlaybackMode::LoadingLive;
        self.resume_mode = None;
        self.current_url = Some(self.live_url.clone());
        self.current_title = LIVE_LOADING_LABEL.to_string();
        self.position_ms = None;
        self.duration_ms = None;
        self.live_label_seen = false;
        let url = self.live_url.clone();
        self.switch_source(previous, &url).await?;
        Ok(self.live_generation)
    }

    /// Stop whatever was audible, then load and start `url`.
    async fn switch_source(&mut self, previous: PlaybackMode, url: &str) -> anyhow::Result<()> {
        let result = async {
            if previous != PlaybackMode::Stopped {
                self.engine.stop().await?;
            }
            self.engine.load(url).await?;
            self.engine.play().await
        }
        .await;
        if result.is_err() {
            self.reset();
        }
        result
    }

    pub async fn toggle_play_pause(&mut self) -> anyhow::Result<()> {
        match self.mode {
            PlaybackMode::Stopped => {
                debug!("session: toggle while stopped ignored");
            }
            PlaybackMode::Paused => {
                let Some(prior) = self.resume_mode else {
                    return Ok(());
                };
                self.engine.resume().await?;
                self.mode = prior;
                self.resume_mode = None;
                info!("session: resumed {:?}", prior);
            }
            playing => {
                self.engine.pause().await?;
                self.mode = PlaybackMode::Paused;
                self.resume_mode = Some(playing);
                info!("session: paused");
            }
        }
        Ok(())
    }

    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if self.mode == PlaybackMode::Stopped {
            return Ok(());
        }
        info!("session: stop");
        self.live_generation += 1;
        let result = self.engine.stop().await;
        self.reset();
        result
    }

    /// Sleep-timer expiry: pause output so the user can resume later.
    /// Returns false when nothing was playing.
    pub async fn stop_by_timer(&mut self) -> anyhow::Result<bool> {
        if !self.mode.is_playing() {
            return Ok(false);
        }
        self.engine.pause().await?;
        self.resume_mode = Some(self.mode);
        self.mode = PlaybackMode::Paused;
        info!("session: paused by sleep timer");
        Ok(true)
    }

    fn reset(&mut self) {
        self.mode = PlaybackMode::Stopped;
        self.resume_mode = None;
        self.current_url = None;
        self.current_title.clear();
        self.position_ms = None;
        self.duration_ms = None;
    }

    /// On-demand episodes track a timeline; live and stopped sessions don't.
    fn tracks_timeline(&self) -> bool {
        self.mode == PlaybackMode::PlayingOnDemand
            || (self.mode == PlaybackMode::Paused
                && self.resume_mode == Some(PlaybackMode::PlayingOnDemand))
    }

    pub fn on_engine_position(&mut self, ms: u64) -> bool {
        if !self.tracks_timeline() || self.position_ms == Some(ms) {
            return false;
        }
        self.position_ms = Some(ms);
        true
    }

    pub fn on_engine_duration(&mut self, ms: u64) -> bool {
        if !self.tracks_timeline() || self.duration_ms == Some(ms) {
            return false;
        }
        self.duration_ms = Some(ms);
        true
    }

    /// Apply a metadata poll result.  `None` means the poll failed or had no
    /// title; that never overwrites a label already shown.
    pub fn apply_live_label(&mut self, generation: u64, label: Option<String>) -> bool {
        if generation != self.live_generation || !self.mode.is_live() {
            debug!("session: stale live label dropped (gen {})", generation);
            return false;
        }
        match label {
            Some(label) if !label.trim().is_empty() => {
                let changed = self.current_title != label || self.mode != PlaybackMode::PlayingLive;
                self.current_title = label;
                self.mode = PlaybackMode::PlayingLive;
                self.live_label_seen = true;
                changed
            }
            _ if !self.live_label_seen && self.current_title == LIVE_LOADING_LABEL => {
                // Fall back to the static name but stay in LoadingLive.
                self.current_title = self.live_title.clone();
                true
            }
            _ => false,
        }
    }

    /// Live mode without a metadata source: the static name is the label.
    pub fn promote_live_static(&mut self, generation: u64) -> bool {
        if generation != self.live_generation || self.mode != PlaybackMode::LoadingLive {
            return false;
        }
        self.current_title = self.live_title.clone();
        self.mode = PlaybackMode::PlayingLive;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let tracks = self.tracks_timeline();
        SessionSnapshot {
            mode: self.mode,
            resume_mode: self.resume_mode,
            current_url: self.current_url.clone(),
            current_title: self.current_title.clone(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            position_display: self.position_ms.filter(|_| tracks).map(format_clock),
            duration_display: self.duration_ms.filter(|_| tracks).map(format_clock),
        }
    }
}
