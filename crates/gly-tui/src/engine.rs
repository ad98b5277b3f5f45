//! Audio engine adapter seam.  The runtime implementation is `mpv::MpvEngine`.

use std::future::Future;

/// Asynchronous feedback from the engine after a `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Position(u64),
    Duration(u64),
}

pub trait AudioEngine: Send + Sync + 'static {
    /// Replace the current source.  Output starts on `play`.
    fn load(&self, url: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn play(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn pause(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn resume(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    /// Halt and unload whatever is playing.
    fn stop(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}
