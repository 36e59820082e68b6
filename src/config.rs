//! Engine configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```json
//! { "smooth_ramp_ms": 20.0, "metering": { "fft_size": 4096 } }
//! ```

use crate::audio::metronome::MetronomeSettings;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred device sample rate (device default when absent)
    pub sample_rate: Option<u32>,
    /// Preferred output channel count, 1 or 2 (device default when absent)
    pub channels: Option<u16>,
    /// Capacity of the control → audio command queue
    pub command_queue_capacity: usize,
    /// Capacity of the audio → control event queue
    pub event_queue_capacity: usize,
    /// Ramp time used by the smoothed volume/pan setters
    pub smooth_ramp_ms: f32,
    /// Default waveform overview resolution
    pub waveform_samples: usize,
    /// Metronome state at startup
    pub metronome: MetronomeSettings,
    pub metering: MeteringConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: None,
            command_queue_capacity: 256,
            event_queue_capacity: 256,
            smooth_ramp_ms: 30.0,
            waveform_samples: 1024,
            metronome: MetronomeSettings::default(),
            metering: MeteringConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// FFT size for the spectrum snapshot (power of two)
    pub fft_size: usize,
    /// Frames analysed per metering cycle
    pub block_frames: usize,
    /// Length of the rolling "integrated" loudness window
    pub integrated_window_secs: f32,
    /// Loudness reference used for `relative_lu`
    pub target_lufs: f32,
    /// Spectrum byte scaling floor
    pub min_decibels: f32,
    /// Spectrum byte scaling ceiling
    pub max_decibels: f32,
    /// Spectrum smoothing between snapshots (0 = none)
    pub smoothing: f32,
    /// Capacity of the analysis tap ring, in samples
    pub tap_capacity: usize,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            block_frames: 1024,
            integrated_window_secs: 60.0,
            target_lufs: -23.0,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
            tap_capacity: 1 << 16,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_queue_capacity == 0 || self.event_queue_capacity == 0 {
            return Err(EngineError::Config("queue capacities must be non-zero".into()));
        }
        if let Some(channels) = self.channels {
            if !(1..=2).contains(&channels) {
                return Err(EngineError::Config(format!(
                    "channels must be 1 or 2, got {}",
                    channels
                )));
            }
        }
        if self.smooth_ramp_ms < 0.0 {
            return Err(EngineError::Config("smooth_ramp_ms must not be negative".into()));
        }
        self.metering.validate()
    }
}

impl MeteringConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            return Err(EngineError::Config(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        if self.block_frames == 0 {
            return Err(EngineError::Config("block_frames must be non-zero".into()));
        }
        if self.integrated_window_secs <= 0.0 {
            return Err(EngineError::Config("integrated_window_secs must be positive".into()));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(EngineError::Config("min_decibels must be below max_decibels".into()));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(EngineError::Config("smoothing must be in [0, 1)".into()));
        }
        if self.tap_capacity == 0 {
            return Err(EngineError::Config("tap_capacity must be non-zero".into()));
        }
        Ok(())
    }
}
