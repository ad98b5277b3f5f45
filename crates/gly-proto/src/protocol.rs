use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::format_secs;

/// User intents forwarded into the core by the TUI or the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    PlayOnDemand { url: String, title: String },
    PlayLive,
    TogglePause,
    Stop,
    RefreshCatalog,
    /// Start a download, or cancel it when one is already running for `url`.
    ToggleDownload {
        url: String,
        title: String,
        date: String,
    },
    CancelDownload { url: String },
    /// `0` disarms the sleep timer.
    ArmTimer { minutes: u32 },
    /// Runtime override of the catalog source.  Not persisted.
    SetCatalogUrl { url: String },
}

/// One-off notifications surfaced to the user (toasts, API log).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice")]
pub enum Notice {
    DownloadSaved { url: String, path: PathBuf },
    DownloadFailed { url: String, reason: String },
    DownloadCancelled { url: String },
    TimerArmed { minutes: u32 },
    TimerCancelled,
    StoppedByTimer,
    PlaybackError { message: String },
    CatalogError { message: String },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::DownloadSaved { path, .. } => format!("Saved to {}", path.display()),
            Notice::DownloadFailed { reason, .. } => format!("Download failed: {}", reason),
            Notice::DownloadCancelled { .. } => "Download cancelled".to_string(),
            Notice::TimerArmed { minutes } => format!("Stopping in {} minutes", minutes),
            Notice::TimerCancelled => "Sleep timer cancelled".to_string(),
            Notice::StoppedByTimer => "Playback stopped by sleep timer".to_string(),
            Notice::PlaybackError { message } => format!("Playback error: {}", message),
            Notice::CatalogError { message } => format!("Catalog error: {}", message),
        }
    }

    /// True for notices that report a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::DownloadFailed { .. } | Notice::PlaybackError { .. } | Notice::CatalogError { .. }
        )
    }
}

/// Playback session mode.
///
/// Transitions:
///   Stopped -> LoadingLive | PlayingOnDemand
///   LoadingLive -> PlayingLive (first metadata label)
///   PlayingLive | PlayingOnDemand <-> Paused
///   any -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaybackMode {
    #[default]
    Stopped,
    LoadingLive,
    PlayingLive,
    PlayingOnDemand,
    Paused,
}

impl PlaybackMode {
    /// Live feed is loading or playing (the metadata poller is relevant).
    pub fn is_live(self) -> bool {
        matches!(self, PlaybackMode::LoadingLive | PlaybackMode::PlayingLive)
    }

    /// Audio should be coming out of the engine.
    pub fn is_playing(self) -> bool {
        matches!(
            self,
            PlaybackMode::LoadingLive | PlaybackMode::PlayingLive | PlaybackMode::PlayingOnDemand
        )
    }
}

/// Read-only view of the playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub mode: PlaybackMode,
    /// Mode that `TogglePause` restores while `mode == Paused`.
    pub resume_mode: Option<PlaybackMode>,
    pub current_url: Option<String>,
    pub current_title: String,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    /// `mm:ss` / `hh:mm:ss`.  `None` while the timeline is not tracked (live).
    pub position_display: Option<String>,
    pub duration_display: Option<String>,
}

impl SessionSnapshot {
    /// Live feed selected, whether playing, loading or paused.
    pub fn is_live_stream(&self) -> bool {
        self.mode.is_live()
            || (self.mode == PlaybackMode::Paused
                && self.resume_mode.map(PlaybackMode::is_live).unwrap_or(false))
    }

    /// Fraction of the episode played, when both ends are known.
    pub fn progress(&self) -> Option<f64> {
        match (self.position_ms, self.duration_ms) {
            (Some(pos), Some(dur)) if dur > 0 => Some((pos as f64 / dur as f64).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Sleep timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimerState {
    #[default]
    Off,
    Armed { remaining_secs: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimerSnapshot {
    pub state: TimerState,
    /// Countdown as `mm:ss`; empty when off.
    pub display: String,
}

impl TimerSnapshot {
    pub fn from_state(state: TimerState) -> Self {
        let display = match state {
            TimerState::Off => String::new(),
            TimerState::Armed { remaining_secs } => format_secs(remaining_secs),
        };
        Self { state, display }
    }
}

/// Download lifecycle.  `Idle` is what an unknown URL reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Completed,
    Failed,
}

impl DownloadState {
    pub fn is_active(self) -> bool {
        matches!(self, DownloadState::Running | DownloadState::Cancelling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadState::Completed | DownloadState::Failed)
    }
}

/// Why a download ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadFailure {
    Cancelled,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub url: String,
    pub title: String,
    pub date: String,
    pub state: DownloadState,
    pub bytes_total: Option<u64>,
    pub bytes_written: u64,
    pub target_path: PathBuf,
    pub failure: Option<DownloadFailure>,
}

impl DownloadSnapshot {
    /// 0.0..=1.0, or `None` when the total size is unknown.
    pub fn progress(&self) -> Option<f32> {
        match self.state {
            DownloadState::Completed => Some(1.0),
            DownloadState::Failed => Some(0.0),
            _ => match self.bytes_total {
                Some(total) if total > 0 => {
                    Some((self.bytes_written as f64 / total as f64).min(1.0) as f32)
                }
                _ => None,
            },
        }
    }

    /// Short status line for list rows.
    pub fn status_text(&self) -> String {
        match self.state {
            DownloadState::Idle => String::new(),
            DownloadState::Running => match self.progress() {
                Some(p) => format!("downloading {:.0}%", p * 100.0),
                None => format!("downloading {}", human_bytes(self.bytes_written)),
            },
            DownloadState::Cancelling => "cancelling…".to_string(),
            DownloadState::Completed => "saved".to_string(),
            DownloadState::Failed => match &self.failure {
                Some(DownloadFailure::Cancelled) => "cancelled".to_string(),
                Some(DownloadFailure::Error(e)) => format!("failed: {}", e),
                None => "failed".to_string(),
            },
        }
    }
}

/// `1.4 MB` style byte count.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: DownloadState, written: u64, total: Option<u64>) -> DownloadSnapshot {
        DownloadSnapshot {
            url: "https://cdn.example/ep.mp3".into(),
            title: "Ep".into(),
            date: "2024".into(),
            state,
            bytes_total: total,
            bytes_written: written,
            target_path: PathBuf::from("/tmp/2024_Ep.mp3"),
            failure: None,
        }
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::ArmTimer { minutes: 30 };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"cmd":"ArmTimer","minutes":30}"#);
        let back: Command = serde_json::from_str(r#"{"cmd":"PlayLive"}"#).unwrap();
        assert_eq!(back, Command::PlayLive);
    }

    #[test]
    fn test_download_progress() {
        assert_eq!(snapshot(DownloadState::Running, 50, Some(200)).progress(), Some(0.25));
        assert_eq!(snapshot(DownloadState::Running, 50, None).progress(), None);
        assert_eq!(snapshot(DownloadState::Running, 50, Some(0)).progress(), None);
        assert_eq!(snapshot(DownloadState::Completed, 10, None).progress(), Some(1.0));
    }

    #[test]
    fn test_download_status_text() {
        assert_eq!(
            snapshot(DownloadState::Running, 100, Some(400)).status_text(),
            "downloading 25%"
        );
        assert_eq!(
            snapshot(DownloadState::Running, 2048, None).status_text(),
            "downloading 2.0 KB"
        );
        let mut cancelled = snapshot(DownloadState::Failed, 0, None);
        cancelled.failure = Some(DownloadFailure::Cancelled);
        assert_eq!(cancelled.status_text(), "cancelled");
        cancelled.failure = Some(DownloadFailure::Error("HTTP 404".into()));
        assert_eq!(cancelled.status_text(), "failed: HTTP 404");
    }

    #[test]
    fn test_session_progress_and_live() {
        let snap = SessionSnapshot {
            mode: PlaybackMode::Paused,
            resume_mode: Some(PlaybackMode::PlayingLive),
            ..Default::default()
        };
        assert!(snap.is_live_stream());
        assert_eq!(snap.progress(), None);

        let od = SessionSnapshot {
            mode: PlaybackMode::PlayingOnDemand,
            position_ms: Some(30_000),
            duration_ms: Some(120_000),
            ..Default::default()
        };
        assert!(!od.is_live_stream());
        assert_eq!(od.progress(), Some(0.25));
    }

    #[test]
    fn test_timer_snapshot_display() {
        assert_eq!(TimerSnapshot::from_state(TimerState::Off).display, "");
        assert_eq!(
            TimerSnapshot::from_state(TimerState::Armed { remaining_secs: 899 }).display,
            "14:59"
        );
    }
}
