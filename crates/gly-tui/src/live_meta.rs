//! Live now-playing label poller.
//!
//! One task per live session.  It waits a short settle delay, then fetches
//! the metadata document once per interval and hands the derived label (or
//! `None` on any failure) to the core tagged with the session generation.
//! The core decides whether the label still applies.

use std::sync::Arc;
use std::time::Duration;

use gly_proto::config::LiveConfig;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::core::CoreEvent;
use crate::transport::Transport;

fn text_field(doc: &Value, key: &str) -> Option<String> {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Title alone, or title and subtitle on two lines.  `None` without a title.
pub fn derive_label(doc: &Value) -> Option<String> {
    let title = text_field(doc, "title")?;
    match text_field(doc, "subtitle") {
        Some(subtitle) => Some(format!("{}\n{}", title, subtitle)),
        None => Some(title),
    }
}

pub fn spawn_poller<T: Transport>(
    transport: Arc<T>,
    live: &LiveConfig,
    metadata_url: String,
    generation: u64,
    event_tx: mpsc::Sender<CoreEvent>,
) -> AbortHandle {
    let settle = Duration::from_millis(live.settle_delay_ms);
    let period = Duration::from_secs(live.poll_interval_secs.max(1));
    let timeout = Duration::from_millis(live.request_timeout_ms);
    info!("live meta: polling {} every {:?} (gen {})", metadata_url, period, generation);

    let task = tokio::spawn(async move {
        tokio::time::sleep(settle).await;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let label = match transport
                .fetch_json(&metadata_url, &[("Cache-Control", "no-cache")], timeout)
                .await
            {
                Ok(doc) => derive_label(&doc),
                Err(e) => {
                    debug!("live meta: fetch failed: {}", e);
                    None
                }
            };
            if event_tx
                .send(CoreEvent::LiveMetadata { generation, label })
                .await
                .is_err()
            {
                break;
            }
        }
    });
    task.abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::TransportError;
    use serde_json::json;

    const META: &str = "https://meta.example/now.json";

    #[test]
    fn test_label_title_and_subtitle() {
        assert_eq!(
            derive_label(&json!({"title": "Morning", "subtitle": "with Dana"})).as_deref(),
            Some("Morning\nwith Dana")
        );
        assert_eq!(
            derive_label(&json!({"title": "Morning", "subtitle": "  "})).as_deref(),
            Some("Morning")
        );
        assert_eq!(derive_label(&json!({"subtitle": "orphan"})), None);
        assert_eq!(derive_label(&json!({"title": ""})), None);
        assert_eq!(derive_label(&json!(["title"])), None);
    }

    fn live_config() -> LiveConfig {
        LiveConfig {
            metadata_url: Some(META.into()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_after_settle_then_on_interval() {
        let transport = FakeTransport::new();
        transport.set_json(META, Ok(json!({"title": "News"})));
        let (tx, mut rx) = mpsc::channel(8);
        let start = tokio::time::Instant::now();

        let handle = spawn_poller(transport.clone(), &live_config(), META.into(), 7, tx);

        match rx.recv().await {
            Some(CoreEvent::LiveMetadata { generation, label }) => {
                assert_eq!(generation, 7);
                assert_eq!(label.as_deref(), Some("News"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(start.elapsed() >= Duration::from_millis(1_500));
        assert!(start.elapsed() < Duration::from_secs(2));

        rx.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(31_500));
        assert_eq!(transport.json_hits(META), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_no_label() {
        let transport = FakeTransport::new();
        transport.set_json(META, Err(TransportError::Timeout));
        let (tx, mut rx) = mpsc::channel(8);

        let handle = spawn_poller(transport, &live_config(), META.into(), 1, tx);
        match rx.recv().await {
            Some(CoreEvent::LiveMetadata { label, .. }) => assert_eq!(label, None),
            other => panic!("unexpected {:?}", other),
        }
        handle.abort();
    }
}
