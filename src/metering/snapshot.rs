use crate::audio::TrackId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Block peak and RMS of one track's node set, in dB
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackMetrics {
    pub peak_db: f32,
    pub rms_db: f32,
}

/// Loudness figures of the master mix
///
/// LUFS values are an RMS-based approximation without K-weighting or
/// gating; they track BS.1770 loudness loosely and are not conformant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessMetrics {
    /// Approximate loudness of the latest block
    pub short_term_lufs: f32,
    /// Approximate loudness over the rolling integration window
    pub integrated_lufs: f32,
    /// `integrated_lufs` relative to the configured target
    pub relative_lu: f32,
    /// Held true peak, dBTP
    pub true_peak: f32,
    /// `0 - true_peak`
    pub headroom: f32,
    /// -1.0 (inverted) to 1.0 (identical)
    pub phase_correlation: f32,
}

/// Sample-level readings of the master mix, in dB
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelMetrics {
    /// Loudest channel of the latest block
    pub peak_db: f32,
    /// Per-channel peak of the latest block
    pub channel_peak_db: Vec<f32>,
    pub peak_hold_db: f32,
    pub true_peak_db: f32,
    pub true_peak_hold_db: f32,
    /// Per-channel RMS of the latest block
    pub rms_db: Vec<f32>,
}

/// One metering result; never mutated after it is published
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeteringSnapshot {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub loudness: LoudnessMetrics,
    pub levels: LevelMetrics,
    pub per_track_metrics: BTreeMap<TrackId, TrackMetrics>,
    /// Byte-normalized magnitude bins, lowest frequency first
    pub spectrum_bins: Vec<u8>,
}
