//! In-process fakes for the transport and audio engine adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::engine::AudioEngine;
use crate::transport::{ByteStream, Transport, TransportError};

type Chunk = Result<Vec<u8>, TransportError>;

enum StreamScript {
    Chunks { total: Option<u64>, chunks: Vec<Chunk> },
    Fed { total: Option<u64>, rx: mpsc::UnboundedReceiver<Chunk> },
    Fail(TransportError),
}

#[derive(Default)]
struct FakeInner {
    json: HashMap<String, Result<Value, TransportError>>,
    json_hits: HashMap<String, usize>,
    streams: HashMap<String, StreamScript>,
    opened: Vec<String>,
}

/// Scripted transport.  Streams registered with [`FakeTransport::feed`] hand
/// the test a sender so chunks arrive exactly when the test says so.
#[derive(Default)]
pub struct FakeTransport {
    inner: Mutex<FakeInner>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_json(&self, url: &str, result: Result<Value, TransportError>) {
        self.inner.lock().unwrap().json.insert(url.to_string(), result);
    }

    pub fn json_hits(&self, url: &str) -> usize {
        self.inner.lock().unwrap().json_hits.get(url).copied().unwrap_or(0)
    }

    pub fn with_chunks(&self, url: &str, total: Option<u64>, chunks: Vec<Chunk>) {
        self.inner
            .lock()
            .unwrap()
            .streams
            .insert(url.to_string(), StreamScript::Chunks { total, chunks });
    }

    pub fn feed(&self, url: &str, total: Option<u64>) -> mpsc::UnboundedSender<Chunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .unwrap()
            .streams
            .insert(url.to_string(), StreamScript::Fed { total, rx });
        tx
    }

    pub fn fail_stream(&self, url: &str, error: TransportError) {
        self.inner
            .lock()
            .unwrap()
            .streams
            .insert(url.to_string(), StreamScript::Fail(error));
    }

    pub fn open_count(&self, url: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .opened
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl Transport for FakeTransport {
    async fn fetch_json(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.json_hits.entry(url.to_string()).or_default() += 1;
        inner
            .json
            .get(url)
            .cloned()
            .unwrap_or(Err(TransportError::Status(404)))
    }

    async fn stream_download(&self, url: &str) -> Result<ByteStream, TransportError> {
        let script = {
            let mut inner = self.inner.lock().unwrap();
            inner.opened.push(url.to_string());
            inner.streams.remove(url)
        };
        match script {
            Some(StreamScript::Chunks { total, chunks }) => Ok(ByteStream {
                total_len: total,
                chunks: futures_util::stream::iter(chunks).boxed(),
            }),
            Some(StreamScript::Fed { total, rx }) => Ok(ByteStream {
                total_len: total,
                chunks: futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|chunk| (chunk, rx))
                })
                .boxed(),
            }),
            Some(StreamScript::Fail(e)) => Err(e),
            None => Err(TransportError::Status(404)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    Resume,
    Stop,
}

#[derive(Default)]
struct EngineInner {
    calls: Vec<EngineCall>,
    outputting: bool,
    overlaps: usize,
    fail_loads: bool,
}

/// Records every command and flags a `load` issued while another source is
/// still producing sound.
#[derive(Default)]
pub struct RecordingEngine {
    inner: Mutex<EngineInner>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn overlaps(&self) -> usize {
        self.inner.lock().unwrap().overlaps
    }

    pub fn is_outputting(&self) -> bool {
        self.inner.lock().unwrap().outputting
    }

    pub fn fail_loads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_loads = fail;
    }

    fn record(&self, call: EngineCall) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match &call {
            EngineCall::Load(_) => {
                if inner.fail_loads {
                    inner.calls.push(call);
                    anyhow::bail!("load refused");
                }
                if inner.outputting {
                    inner.overlaps += 1;
                }
            }
            EngineCall::Play | EngineCall::Resume => inner.outputting = true,
            EngineCall::Pause | EngineCall::Stop => inner.outputting = false,
        }
        inner.calls.push(call);
        Ok(())
    }
}

impl AudioEngine for RecordingEngine {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.record(EngineCall::Load(url.to_string()))
    }

    async fn play(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Play)
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Pause)
    }

    async fn resume(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Resume)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Stop)
    }
}
