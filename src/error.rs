use crate::audio::TrackId;
use thiserror::Error;

/// Errors raised by the routing and metering core
///
/// Per-track failures are recoverable: the public controller operations log
/// them and return `false`/`None` instead of propagating. Only
/// `DeviceInitialization` is treated as fatal.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("audio device unavailable: {0}")]
    DeviceInitialization(String),

    #[error("failed to decode audio for track {track_id}: {reason}")]
    BufferDecode { track_id: TrackId, reason: String },

    #[error("cannot start playback on track {track_id}: {reason}")]
    PlaybackStart { track_id: TrackId, reason: String },

    #[error("no analysis tap connected")]
    MeteringUnavailable,

    #[error("engine command queue is full")]
    CommandQueueFull,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
