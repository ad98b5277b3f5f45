//! Download manager for catalog episodes
//!
//! One entry per source URL.  Each started download gets its own worker task
//! and its own `CancellationToken`; the map behind the mutex is the only
//! record of which downloads exist.  Workers write into `<target>.<id>.part` and
//! only rename onto the target name once the body is complete, so a cancelled
//! or failed transfer never leaves a half-written file under that name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use gly_proto::protocol::{DownloadFailure, DownloadSnapshot, DownloadState, Notice};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::transport::{Transport, TransportError};
use crate::BroadcastMessage;

/// Extension given to every saved episode.
pub const FILE_EXTENSION: &str = "mp3";

/// Publish progress at least this often when the total size is unknown.
const UNKNOWN_LENGTH_STEP: u64 = 256 * 1024;
/// Floor for the per-chunk read timeout; zero would fail every transfer.
const MIN_READ_TIMEOUT: Duration = Duration::from_secs(1);

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cancelled by user")]
    Cancelled,
    #[error("could not remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

struct Entry {
    id: u64,
    snapshot: DownloadSnapshot,
    cancel: CancellationToken,
    /// Bytes written at the last published progress update.
    last_published: u64,
}

type EntryMap = Arc<Mutex<HashMap<String, Entry>>>;

pub struct DownloadManager<T: Transport> {
    transport: Arc<T>,
    download_dir: PathBuf,
    read_timeout: Duration,
    entries: EntryMap,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl<T: Transport> DownloadManager<T> {
    pub fn new(
        transport: Arc<T>,
        download_dir: PathBuf,
        read_timeout: Duration,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) -> Self {
        Self {
            transport,
            download_dir,
            read_timeout: read_timeout.max(MIN_READ_TIMEOUT),
            entries: Arc::new(Mutex::new(HashMap::new())),
            broadcast_tx,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Start a download for `url`, or request cancellation when one is
    /// already running.  Returns the entry's state after the call.
    pub fn toggle_download(&self, url: &str, title: &str, date: &str) -> DownloadState {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(url) {
            match entry.snapshot.state {
                DownloadState::Running => {
                    info!("download: cancel requested for {}", url);
                    entry.snapshot.state = DownloadState::Cancelling;
                    entry.cancel.cancel();
                    drop(entries);
                    let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
                    return DownloadState::Cancelling;
                }
                DownloadState::Cancelling => {
                    debug!("download: {} already cancelling", url);
                    return DownloadState::Cancelling;
                }
                _ => {}
            }
        }

        let target = target_path(&self.download_dir, date, title);
        let id = NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        info!("download: starting {} -> {}", url, target.display());
        entries.insert(
            url.to_string(),
            Entry {
                id,
                snapshot: DownloadSnapshot {
                    url: url.to_string(),
                    title: title.to_string(),
                    date: date.to_string(),
                    state: DownloadState::Running,
                    bytes_total: None,
                    bytes_written: 0,
                    target_path: target.clone(),
                    failure: None,
                },
                cancel: cancel.clone(),
                last_published: 0,
            },
        );
        drop(entries);

        let worker = Worker {
            id,
            url: url.to_string(),
            target,
            download_dir: self.download_dir.clone(),
            read_timeout: self.read_timeout,
            cancel,
            entries: Arc::clone(&self.entries),
            broadcast_tx: self.broadcast_tx.clone(),
        };
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move { worker.run(transport).await });

        let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
        DownloadState::Running
    }

    /// Request cancellation without the start half of `toggle_download`.
    /// A no-op unless the download is running.
    pub fn cancel(&self, url: &str) -> bool {
        let mut entries = lock(&self.entries);
        match entries.get_mut(url) {
            Some(entry) if entry.snapshot.state == DownloadState::Running => {
                info!("download: cancel requested for {}", url);
                entry.snapshot.state = DownloadState::Cancelling;
                entry.cancel.cancel();
                drop(entries);
                let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
                true
            }
            _ => false,
        }
    }

    pub fn snapshots(&self) -> HashMap<String, DownloadSnapshot> {
        lock(&self.entries)
            .iter()
            .map(|(url, e)| (url.clone(), e.snapshot.clone()))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.entries)
            .values()
            .filter(|e| e.snapshot.state.is_active())
            .count()
    }
}

fn lock(entries: &EntryMap) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── filename derivation ───────────────────────────────────────────────────────

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).expect("static regex"))
}

/// `<dir>/<date>_<title>.mp3` with filesystem-unsafe characters removed.
pub fn target_path(dir: &Path, date: &str, title: &str) -> PathBuf {
    let raw = format!("{}_{}", date, title);
    let clean = unsafe_chars().replace_all(&raw, "");
    let clean = clean.trim();
    dir.join(format!("{}.{}", clean, FILE_EXTENSION))
}

/// Partial file for one entry.  The id keeps two URLs that map to the same
/// target from writing into one file.
fn part_path(target: &Path, id: u64) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".{}.part", id));
    PathBuf::from(name)
}

// ── worker ────────────────────────────────────────────────────────────────────

struct Worker {
    id: u64,
    url: String,
    target: PathBuf,
    download_dir: PathBuf,
    read_timeout: Duration,
    cancel: CancellationToken,
    entries: EntryMap,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Worker {
    async fn run<T: Transport>(self, transport: Arc<T>) {
        let part = part_path(&self.target, self.id);
        match self.transfer(transport.as_ref(), &part).await {
            Ok(()) => self.complete().await,
            Err(e) => {
                // The part file may or may not exist depending on where we failed.
                let cleanup = remove_if_present(&part).await;
                self.fail(e, cleanup);
            }
        }
    }

    async fn transfer<T: Transport>(&self, transport: &T, part: &Path) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            opened = transport.stream_download(&self.url) => opened?,
        };
        let mut chunks = stream.chunks;
        self.update(|s| s.bytes_total = stream.total_len);
        debug!(
            "download: {} opened, length {:?}",
            self.url, stream.total_len
        );

        let mut file = tokio::fs::File::create(part).await?;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = tokio::time::timeout(self.read_timeout, chunks.next()) => next,
            };
            let chunk = match next {
                Err(_) => return Err(TransportError::Timeout.into()),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk?,
            };
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;

            let state = self.record_chunk(chunk.len() as u64);
            if state != DownloadState::Running || self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(part, &self.target).await?;
        Ok(())
    }

    /// Account for a written chunk and return the entry's state.
    fn record_chunk(&self, len: u64) -> DownloadState {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get_mut(&self.url).filter(|e| e.id == self.id) else {
            return DownloadState::Failed;
        };
        entry.snapshot.bytes_written += len;
        let written = entry.snapshot.bytes_written;
        let publish = match entry.snapshot.bytes_total {
            Some(total) if total > 0 => {
                written * 100 / total != entry.last_published * 100 / total
            }
            _ => written - entry.last_published >= UNKNOWN_LENGTH_STEP,
        };
        if publish {
            entry.last_published = written;
        }
        let state = entry.snapshot.state;
        drop(entries);
        if publish {
            let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
        }
        state
    }

    async fn complete(&self) {
        // Check-and-set under one lock so a late toggle either lands before
        // (and is honoured below) or after (and sees a terminal entry).
        let completed = {
            let mut entries = lock(&self.entries);
            match entries.get_mut(&self.url).filter(|e| e.id == self.id) {
                Some(entry) if entry.snapshot.state == DownloadState::Running => {
                    entry.snapshot.state = DownloadState::Completed;
                    let written = entry.snapshot.bytes_written;
                    entry.snapshot.bytes_total = Some(written);
                    true
                }
                _ => false,
            }
        };

        if completed {
            info!("download: complete {}", self.target.display());
            let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
            let _ = self
                .broadcast_tx
                .send(BroadcastMessage::Notice(Notice::DownloadSaved {
                    url: self.url.clone(),
                    path: self.target.clone(),
                }));
        } else {
            let cleanup = remove_if_present(&self.target).await;
            self.fail(DownloadError::Cancelled, cleanup);
        }
    }

    fn fail(&self, error: DownloadError, cleanup: Result<(), DownloadError>) {
        let failure = match (&error, cleanup) {
            (DownloadError::Cancelled, Ok(())) => DownloadFailure::Cancelled,
            (_, Ok(())) => DownloadFailure::Error(error.to_string()),
            (_, Err(cleanup_err)) => {
                error!("download: {}", cleanup_err);
                DownloadFailure::Error(format!("{}; {}", error, cleanup_err))
            }
        };
        match &failure {
            DownloadFailure::Cancelled => info!("download: cancelled {}", self.url),
            DownloadFailure::Error(msg) => warn!("download: failed {}: {}", self.url, msg),
        }

        self.update(|s| {
            s.state = DownloadState::Failed;
            s.bytes_written = 0;
            s.failure = Some(failure.clone());
        });

        let notice = match failure {
            DownloadFailure::Cancelled => Notice::DownloadCancelled {
                url: self.url.clone(),
            },
            DownloadFailure::Error(reason) => Notice::DownloadFailed {
                url: self.url.clone(),
                reason,
            },
        };
        let _ = self.broadcast_tx.send(BroadcastMessage::DownloadsUpdated);
        let _ = self.broadcast_tx.send(BroadcastMessage::Notice(notice));
    }

    fn update(&self, f: impl FnOnce(&mut DownloadSnapshot)) {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(&self.url).filter(|e| e.id == self.id) {
            f(&mut entry.snapshot);
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("download: removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DownloadError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
