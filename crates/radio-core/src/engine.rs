//! Playback engine boundary.
//!
//! The controller only ever talks to the player through this trait. Every
//! call must return promptly: `play` issues the load and returns, the probes
//! read a snapshot that the engine's own I/O task keeps up to date.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The player process is gone. Fatal: the controller shuts down.
    #[error("playback engine shut down: {0}")]
    Shutdown(String),
    /// The stream stayed in buffering past the start timeout. Recoverable.
    #[error("stream did not start within {0:?}")]
    StartTimeout(Duration),
}

impl EngineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Shutdown(_))
    }
}

pub trait PlaybackEngine {
    /// Start loading `url`. Does not wait for the player.
    fn play(&mut self, url: &str) -> Result<(), EngineError>;

    /// Halt playback. Calling it while stopped is fine.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// True while a URL is accepted but no audio is flowing yet.
    fn is_buffering(&self) -> Result<bool, EngineError>;

    /// Last known stream title. `None` and `Some("")` both mean nothing to show.
    fn current_metadata(&self) -> Option<Arc<str>>;

    /// `Err(EngineError::Shutdown)` once the engine has died.
    fn ensure_running(&self) -> Result<(), EngineError>;
}

/// Trim a raw title and drop the ones that carry nothing to show.
pub fn normalize_title(raw: Option<&str>) -> Option<&str> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.trim_matches('-').trim().is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
