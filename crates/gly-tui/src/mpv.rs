/// mpv-backed audio engine.
///
/// ```text
///   MpvEngine::connection()  (lazy, respawns after mpv died)
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── property-change time-pos/duration → EngineEvent
/// ```
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use crate::engine::{AudioEngine, EngineEvent};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// observe_property IDs matched in property-change events.
const OBS_TIME_POS: u64 = 1;
const OBS_DURATION: u64 = 2;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, newline included
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// Translate an unsolicited mpv message into engine feedback.
fn property_event(msg: &Value) -> Option<EngineEvent> {
    if msg.get("event")?.as_str()? != "property-change" {
        return None;
    }
    let secs = msg.get("data")?.as_f64()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let ms = (secs * 1000.0).round() as u64;
    match msg.get("id")?.as_u64()? {
        OBS_TIME_POS => Some(EngineEvent::Position(ms)),
        OBS_DURATION => Some(EngineEvent::Duration(ms)),
        _ => None,
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn observe_timeline(&self) {
        for (id, name) in [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<EngineEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, Arc::clone(&pending)));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── engine ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Connection {
    process: Option<tokio::process::Child>,
    handle: Option<MpvHandle>,
}

pub struct MpvEngine {
    socket_name: String,
    conn: Mutex<Connection>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl MpvEngine {
    /// Nothing is spawned until the first command.
    pub fn new(event_tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            socket_name: gly_proto::platform::mpv_socket_name(),
            conn: Mutex::new(Connection::default()),
            event_tx,
        }
    }

    /// Current handle, spawning mpv when there is none or the old one died.
    async fn connection(&self) -> anyhow::Result<MpvHandle> {
        let mut conn = self.conn.lock().await;
        let alive = match conn.process.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    warn!("mpv: process exited ({})", status);
                    false
                }
                Err(e) => {
                    warn!("mpv: liveness check failed: {}", e);
                    false
                }
            },
            None => false,
        };
        if alive {
            if let Some(handle) = conn.handle.as_ref().filter(|h| h.is_connected()) {
                return Ok(handle.clone());
            }
        }

        conn.handle = None;
        if let Some(mut old) = conn.process.take() {
            let _ = old.kill().await;
        }
        let child = self.spawn_process()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        conn.process = Some(child);

        let handle = self.connect().await?;
        handle.observe_timeline().await;
        conn.handle = Some(handle.clone());
        Ok(handle)
    }

    fn spawn_process(&self) -> anyhow::Result<tokio::process::Child> {
        let mpv_binary = gly_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found (set MPV_PATH)"))?;

        #[cfg(unix)]
        let _ = std::fs::remove_file(&self.socket_name);

        let data_dir = gly_proto::platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        debug!("mpv: logging stderr to {:?}", stderr_path);

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(gly_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }

    #[cfg(unix)]
    async fn connect(&self) -> anyhow::Result<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, self.event_tx.clone()))
    }

    #[cfg(windows)]
    async fn connect(&self) -> anyhow::Result<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, self.event_tx.clone()));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    async fn command(&self, command: Value) -> anyhow::Result<Value> {
        let handle = self.connection().await?;
        handle.send(command).await
    }

    async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.command(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }
}

impl AudioEngine for MpvEngine {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        // Paused first so output starts on the explicit play.
        self.set_pause(true).await?;
        self.command(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    async fn play(&self) -> anyhow::Result<()> {
        self.set_pause(false).await
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.set_pause(true).await
    }

    async fn resume(&self) -> anyhow::Result<()> {
        self.set_pause(false).await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self.conn.lock().await.handle.clone();
        match handle {
            // Never spawn mpv just to stop it.
            Some(handle) if handle.is_connected() => {
                handle.send(json!(["stop"])).await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<EngineEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else if let Some(evt) = property_event(&val) {
                    if event_tx.send(evt).await.is_err() {
                        debug!("mpv reader: engine event receiver gone");
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split};

    #[test]
    fn test_property_changes_become_engine_events() {
        let pos = json!({"event": "property-change", "id": OBS_TIME_POS, "name": "time-pos", "data": 125.0});
        assert_eq!(property_event(&pos), Some(EngineEvent::Position(125_000)));

        let dur = json!({"event": "property-change", "id": OBS_DURATION, "data": 3725.4});
        assert_eq!(property_event(&dur), Some(EngineEvent::Duration(3_725_400)));

        let unset = json!({"event": "property-change", "id": OBS_DURATION, "data": null});
        assert_eq!(property_event(&unset), None);
        assert_eq!(property_event(&json!({"event": "end-file"})), None);
    }

    /// Minimal mpv: answers every request with success and pushes one
    /// time-pos change after the first reply.
    async fn fake_mpv(server: tokio::io::DuplexStream) {
        let (read_half, mut write_half) = split(server);
        let mut lines = BufReader::new(read_half).lines();
        let mut first = true;
        while let Ok(Some(line)) = lines.next_line().await {
            let req: Value = serde_json::from_str(&line).unwrap();
            let reply = json!({"request_id": req["request_id"], "error": "success", "data": null});
            let mut out = serde_json::to_string(&reply).unwrap();
            out.push('\n');
            if first {
                out.push_str(r#"{"event":"property-change","id":1,"name":"time-pos","data":2.5}"#);
                out.push('\n');
                first = false;
            }
            write_half.write_all(out.as_bytes()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_io_tasks_match_replies_and_forward_events() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_mpv(server));
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (read_half, write_half) = split(client);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        let reply = handle.send(json!(["set_property", "pause", true])).await.unwrap();
        assert_eq!(reply["error"], "success");
        assert_eq!(event_rx.recv().await, Some(EngineEvent::Position(2_500)));
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending_requests() {
        let (client, server) = duplex(4096);
        drop(server);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let (read_half, write_half) = split(client);
        let handle = start_io_tasks(read_half, write_half, event_tx);
        assert!(handle.send(json!(["stop"])).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let (event_tx, _event_rx) = mpsc::channel(8);
        let engine = MpvEngine::new(event_tx);
        engine.stop().await.unwrap();
        assert!(engine.conn.lock().await.process.is_none());
    }
}
