use crate::catalog::Episode;
use crate::protocol::{SessionSnapshot, TimerSnapshot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Catalog fetch lifecycle as seen by the list view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CatalogState {
    #[default]
    Idle,
    Loading,
    Ready {
        episodes: Vec<Episode>,
        fetched_at: DateTime<Local>,
    },
    Failed {
        message: String,
    },
}

impl CatalogState {
    pub fn episodes(&self) -> &[Episode] {
        match self {
            CatalogState::Ready { episodes, .. } => episodes,
            _ => &[],
        }
    }
}

/// Everything the presentation layer renders apart from downloads.
/// `rev` increases on every change so observers can skip redundant redraws.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    pub session: SessionSnapshot,
    pub timer: TimerSnapshot,
    pub catalog: CatalogState,
    pub catalog_url: String,
}

/// Shared, synchronized holder of [`PlayerState`].  Only the core writes;
/// the TUI and HTTP API read copies.
pub struct StateStore {
    state: Arc<RwLock<PlayerState>>,
}

impl StateStore {
    pub fn new(catalog_url: String) -> Self {
        let state = PlayerState {
            rev: 1,
            catalog_url,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    /// Returns true when the snapshot differed from the stored one.
    pub async fn set_session(&self, session: SessionSnapshot) -> bool {
        let mut state = self.state.write().await;
        if state.session == session {
            return false;
        }
        state.session = session;
        state.rev += 1;
        true
    }

    pub async fn set_timer(&self, timer: TimerSnapshot) -> bool {
        let mut state = self.state.write().await;
        if state.timer == timer {
            return false;
        }
        state.timer = timer;
        state.rev += 1;
        true
    }

    pub async fn set_catalog(&self, catalog: CatalogState) {
        let mut state = self.state.write().await;
        state.catalog = catalog;
        state.rev += 1;
    }

    pub async fn set_catalog_url(&self, url: String) {
        let mut state = self.state.write().await;
        state.catalog_url = url;
        state.rev += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlaybackMode, TimerState};

    #[tokio::test]
    async fn test_rev_only_moves_on_change() {
        let store = StateStore::new("https://example.org/p.json".into());
        assert_eq!(store.get_state().await.rev, 1);

        let session = SessionSnapshot {
            mode: PlaybackMode::PlayingOnDemand,
            ..Default::default()
        };
        assert!(store.set_session(session.clone()).await);
        assert!(!store.set_session(session).await);
        assert_eq!(store.get_state().await.rev, 2);

        let timer = TimerSnapshot::from_state(TimerState::Armed { remaining_secs: 60 });
        assert!(store.set_timer(timer).await);
        assert_eq!(store.get_state().await.timer.display, "01:00");
        assert_eq!(store.get_state().await.rev, 3);
    }

    #[tokio::test]
    async fn test_catalog_episodes_view() {
        let store = StateStore::new(String::new());
        store.set_catalog(CatalogState::Loading).await;
        assert!(store.get_state().await.catalog.episodes().is_empty());

        store
            .set_catalog(CatalogState::Ready {
                episodes: vec![Episode {
                    title: "A".into(),
                    date: "1".into(),
                    url: "u".into(),
                }],
                fetched_at: Local::now(),
            })
            .await;
        assert_eq!(store.get_state().await.catalog.episodes().len(), 1);
    }
}
