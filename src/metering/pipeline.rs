//! Master-bus metering
//!
//! The pipeline is Idle until an analysis tap is attached, then Measuring
//! until the tap is detached (or the audio side drops it). Each processed
//! block produces one immutable `MeteringSnapshot`, published to listeners
//! in subscription order.

use super::loudness::{approximate_lufs, RollingLoudness};
use super::snapshot::{LevelMetrics, LoudnessMetrics, MeteringSnapshot};
use super::spectrum::SpectrumAnalyzer;
use super::tap::AnalysisTap;
use crate::audio::NodeRegistry;
use crate::config::MeteringConfig;
use crate::dsp::linear_to_db;
use crate::error::{EngineError, Result};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

pub type MeteringListener = Arc<dyn Fn(&MeteringSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeteringState {
    Idle,
    Measuring,
}

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    entries: Vec<(u64, MeteringListener)>,
}

/// Handle returned by `on_metering_update`
///
/// Dropping it leaves the listener registered; call `unsubscribe` to remove it.
pub struct Subscription {
    listeners: Weak<Mutex<ListenerList>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener; a no-op if the pipeline is gone
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Per-channel statistics of one block
struct BlockStats {
    channel_peaks: Vec<f32>,
    peak: f32,
    true_peak: f32,
    sum_squares: Vec<f64>,
    correlation: f32,
}

pub struct MeteringPipeline {
    config: MeteringConfig,
    state: MeteringState,
    tap: Option<AnalysisTap>,
    registry: Option<NodeRegistry>,
    listeners: Arc<Mutex<ListenerList>>,

    // Holds, linear
    peak_hold: f32,
    true_peak_hold: f32,

    integrated: RollingLoudness,
    spectrum: SpectrumAnalyzer,
    block: Vec<f32>,
    latest: Option<Arc<MeteringSnapshot>>,
}

impl MeteringPipeline {
    pub fn new(config: MeteringConfig, sample_rate: u32) -> Self {
        let spectrum = SpectrumAnalyzer::new(
            config.fft_size,
            config.smoothing,
            config.min_decibels,
            config.max_decibels,
        );
        let integrated = RollingLoudness::new(config.integrated_window_secs, sample_rate);
        Self {
            config,
            state: MeteringState::Idle,
            tap: None,
            registry: None,
            listeners: Arc::new(Mutex::new(ListenerList::default())),
            peak_hold: 0.0,
            true_peak_hold: 0.0,
            integrated,
            spectrum,
            block: Vec::new(),
            latest: None,
        }
    }

    /// Include per-track meter values from `registry` in every snapshot
    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn state(&self) -> MeteringState {
        self.state
    }

    pub fn is_measuring(&self) -> bool {
        self.state == MeteringState::Measuring
    }

    /// Attach an analysis tap and start measuring
    ///
    /// Replaces any tap already attached.
    pub fn start_metering_on_audio_source(&mut self, tap: AnalysisTap) {
        self.tap = Some(tap);
        self.state = MeteringState::Measuring;
        log::info!("Metering started");
    }

    /// Detach and drop the analysis tap
    pub fn stop_metering(&mut self) {
        if self.tap.take().is_some() {
            log::info!("Metering stopped");
        }
        self.state = MeteringState::Idle;
    }

    /// Drain the tap in analysis blocks, returning the number of snapshots made
    pub fn pump(&mut self) -> usize {
        let Some(channels) = self.tap.as_ref().map(|t| t.channels()) else {
            return 0;
        };
        let block_samples = self.config.block_frames.max(1) * channels;
        let mut produced = 0;

        loop {
            let Some(tap) = self.tap.as_mut() else {
                break;
            };
            if tap.available() < block_samples {
                if tap.is_disconnected() {
                    log::debug!("Analysis tap writer dropped");
                    self.stop_metering();
                }
                break;
            }
            let mut block = std::mem::take(&mut self.block);
            block.clear();
            tap.read_into(&mut block, block_samples);
            self.process_audio(&block, channels);
            self.block = block;
            produced += 1;
        }
        produced
    }

    /// Measure one block of interleaved audio and publish the snapshot
    pub fn process_audio(&mut self, samples: &[f32], channels: usize) -> Arc<MeteringSnapshot> {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let stats = Self::block_stats(samples, channels);

        self.peak_hold = self.peak_hold.max(stats.peak);
        self.true_peak_hold = self.true_peak_hold.max(stats.true_peak);

        let mean_squares: Vec<f64> = stats
            .sum_squares
            .iter()
            .map(|s| if frames > 0 { s / frames as f64 } else { 0.0 })
            .collect();
        self.integrated.push(&stats.sum_squares, frames);
        let integrated_lufs = self.integrated.integrated_lufs();
        let true_peak = linear_to_db(self.true_peak_hold);

        self.spectrum.push_samples(samples, channels);
        let spectrum_bins = self.spectrum.analyze().to_vec();

        let per_track_metrics = self
            .registry
            .as_ref()
            .map(|r| r.track_metrics().into_iter().collect())
            .unwrap_or_default();

        let snapshot = Arc::new(MeteringSnapshot {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            loudness: LoudnessMetrics {
                short_term_lufs: approximate_lufs(&mean_squares),
                integrated_lufs,
                relative_lu: integrated_lufs - self.config.target_lufs,
                true_peak,
                headroom: 0.0 - true_peak,
                phase_correlation: stats.correlation,
            },
            levels: LevelMetrics {
                peak_db: linear_to_db(stats.peak),
                channel_peak_db: stats.channel_peaks.iter().map(|&p| linear_to_db(p)).collect(),
                peak_hold_db: linear_to_db(self.peak_hold),
                true_peak_db: linear_to_db(stats.true_peak),
                true_peak_hold_db: true_peak,
                rms_db: mean_squares
                    .iter()
                    .map(|ms| linear_to_db(ms.sqrt() as f32))
                    .collect(),
            },
            per_track_metrics,
            spectrum_bins,
        });

        self.latest = Some(Arc::clone(&snapshot));
        self.notify(&snapshot);
        snapshot
    }

    fn block_stats(samples: &[f32], channels: usize) -> BlockStats {
        let frames = samples.len() / channels;
        let mut channel_peaks = vec![0.0f32; channels];
        let mut true_peak = 0.0f32;
        let mut sum_squares = vec![0.0f64; channels];

        for ch in 0..channels {
            for i in 0..frames {
                let current = samples[i * channels + ch];
                let abs = current.abs();
                channel_peaks[ch] = channel_peaks[ch].max(abs);
                sum_squares[ch] += (current as f64) * (current as f64);

                // Linear estimate of the inter-sample peak
                let estimate = match samples.get((i + 1) * channels + ch) {
                    Some(&next) if i + 1 < frames => abs.max(((current + next) * 0.5).abs()),
                    _ => abs,
                };
                true_peak = true_peak.max(estimate);
            }
        }

        let correlation = if channels < 2 {
            1.0
        } else {
            let mut sum_lr = 0.0f64;
            for frame in samples.chunks_exact(channels) {
                sum_lr += frame[0] as f64 * frame[1] as f64;
            }
            let (sum_l2, sum_r2) = (sum_squares[0], sum_squares[1]);
            if sum_l2 <= 0.0 || sum_r2 <= 0.0 {
                0.0
            } else {
                (sum_lr / (sum_l2 * sum_r2).sqrt()).clamp(-1.0, 1.0) as f32
            }
        };

        let peak = channel_peaks.iter().copied().fold(0.0f32, f32::max);

        BlockStats {
            channel_peaks,
            peak,
            true_peak,
            sum_squares,
            correlation,
        }
    }

    /// Call every listener; a panicking listener is logged and skipped
    fn notify(&self, snapshot: &MeteringSnapshot) {
        // Clone the list so listeners may (un)subscribe from inside a callback
        let listeners: Vec<MeteringListener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                log::error!("Metering listener panicked; continuing with the rest");
            }
        }
    }

    /// Register a listener for every future snapshot
    pub fn on_metering_update<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MeteringSnapshot) + Send + Sync + 'static,
    {
        let mut list = self.listeners.lock();
        list.next_id += 1;
        let id = list.next_id;
        list.entries.push((id, Arc::new(listener)));
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Clear peak holds and the integrated window; listeners stay
    pub fn reset_meters(&mut self) {
        self.peak_hold = 0.0;
        self.true_peak_hold = 0.0;
        self.integrated.reset();
    }

    /// Latest spectrum bins, or `MeteringUnavailable` without a tap
    pub fn audio_levels(&self) -> Result<&[u8]> {
        if self.is_measuring() {
            Ok(self.spectrum.bins())
        } else {
            Err(EngineError::MeteringUnavailable)
        }
    }

    /// Latest spectrum bins; `None` when no tap is connected
    pub fn get_audio_levels(&self) -> Option<Vec<u8>> {
        self.audio_levels().ok().map(|bins| bins.to_vec())
    }

    pub fn latest_snapshot(&self) -> Option<Arc<MeteringSnapshot>> {
        self.latest.clone()
    }
}
