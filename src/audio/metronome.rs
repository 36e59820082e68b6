//! Click track: settings on the control side, click synthesis and beat
//! scheduling on the audio side
//!
//! The metronome keeps its own beat clock, started when it is enabled, so it
//! runs whether or not any track is playing.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

pub const MIN_BPM: f32 = 1.0;
pub const MAX_BPM: f32 = 300.0;
pub const MIN_BEATS: u32 = 1;
pub const MAX_BEATS: u32 = 16;

/// Attack ramp of a click
pub const CLICK_ATTACK_SECS: f32 = 0.005;
/// Decay ramp of a click, following the attack
pub const CLICK_DECAY_SECS: f32 = 0.050;
pub const DOWNBEAT_FREQ: f32 = 1000.0;
pub const BEAT_FREQ: f32 = 800.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    pub enabled: bool,
    pub bpm: f32,
    /// Beats per measure; beat 1 gets the accented click
    pub time_signature_beats: u32,
    /// Linear click volume, 0.0 to 1.0
    pub volume: f32,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bpm: 120.0,
            time_signature_beats: 4,
            volume: 0.5,
        }
    }
}

impl MetronomeSettings {
    /// Copy with every field pulled into range
    pub fn clamped(self) -> Self {
        Self {
            enabled: self.enabled,
            bpm: clamp_bpm(self.bpm),
            time_signature_beats: self.time_signature_beats.clamp(MIN_BEATS, MAX_BEATS),
            volume: clamp_volume(self.volume),
        }
    }

    /// Beat interval in samples
    pub fn samples_per_beat(&self, sample_rate: u32) -> f64 {
        60.0 / self.bpm as f64 * sample_rate as f64
    }
}

fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_nan() {
        return MetronomeSettings::default().bpm;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Control-plane view of the metronome
///
/// Every setter clamps, stores, and returns the resulting settings so the
/// caller can forward them to the audio thread.
#[derive(Debug, Clone, Default)]
pub struct MetronomeScheduler {
    settings: MetronomeSettings,
}

impl MetronomeScheduler {
    pub fn new(settings: MetronomeSettings) -> Self {
        Self {
            settings: settings.clamped(),
        }
    }

    pub fn settings(&self) -> MetronomeSettings {
        self.settings
    }

    pub fn set_enabled(&mut self, enabled: bool) -> MetronomeSettings {
        self.settings.enabled = enabled;
        self.settings
    }

    pub fn set_bpm(&mut self, bpm: f32) -> MetronomeSettings {
        self.settings.bpm = clamp_bpm(bpm);
        self.settings
    }

    pub fn set_time_signature(&mut self, beats: u32) -> MetronomeSettings {
        self.settings.time_signature_beats = beats.clamp(MIN_BEATS, MAX_BEATS);
        self.settings
    }

    pub fn set_volume(&mut self, volume: f32) -> MetronomeSettings {
        self.settings.volume = clamp_volume(volume);
        self.settings
    }
}

/// Synthesize one click at unit amplitude
///
/// Linear attack then linear decay over a sine tone; the downbeat click is
/// pitched higher than the other beats.
pub fn generate_click(sample_rate: u32, is_downbeat: bool) -> Vec<f32> {
    let sr = sample_rate as f32;
    let attack = ((CLICK_ATTACK_SECS * sr) as usize).max(1);
    let decay = ((CLICK_DECAY_SECS * sr) as usize).max(1);
    let freq = if is_downbeat { DOWNBEAT_FREQ } else { BEAT_FREQ };

    (0..attack + decay)
        .map(|i| {
            let envelope = if i < attack {
                i as f32 / attack as f32
            } else {
                1.0 - (i - attack) as f32 / decay as f32
            };
            let t = i as f32 / sr;
            (2.0 * PI * freq * t).sin() * envelope
        })
        .collect()
}

/// Audio-thread metronome, mixing clicks into the output buffer
pub struct Metronome {
    settings: MetronomeSettings,
    sample_rate: u32,

    // Pre-generated clicks so nothing is synthesized in the callback
    downbeat_click: Vec<f32>,
    beat_click: Vec<f32>,

    /// Samples left until the next scheduled beat
    samples_until_beat: f64,
    beat_index: u64,

    /// Currently sounding click: (is_downbeat, position)
    active: Option<(bool, usize)>,
}

impl Metronome {
    pub fn new(sample_rate: u32, settings: MetronomeSettings) -> Self {
        Self {
            settings: settings.clamped(),
            sample_rate,
            downbeat_click: generate_click(sample_rate, true),
            beat_click: generate_click(sample_rate, false),
            samples_until_beat: 0.0,
            beat_index: 0,
            active: None,
        }
    }

    pub fn settings(&self) -> MetronomeSettings {
        self.settings
    }

    pub fn apply_settings(&mut self, settings: MetronomeSettings) {
        let settings = settings.clamped();
        if settings.enabled && !self.settings.enabled {
            // Enabling starts a fresh measure right away
            self.samples_until_beat = 0.0;
            self.beat_index = 0;
        } else if !settings.enabled {
            self.active = None;
        }
        self.settings = settings;
    }

    /// Start a one-off click now, independent of the beat clock
    pub fn trigger_click(&mut self, is_downbeat: bool) {
        self.active = Some((is_downbeat, 0));
    }

    pub fn is_sounding(&self) -> bool {
        self.active.is_some()
    }

    /// Mix clicks into an interleaved buffer
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if !self.settings.enabled && self.active.is_none() {
            return;
        }
        let channels = channels.max(1);
        let interval = self.settings.samples_per_beat(self.sample_rate);
        let beats = self.settings.time_signature_beats as u64;

        for frame in output.chunks_exact_mut(channels) {
            if self.settings.enabled {
                if self.samples_until_beat <= 0.0 {
                    let is_downbeat = self.beat_index % beats == 0;
                    self.active = Some((is_downbeat, 0));
                    self.beat_index += 1;
                    self.samples_until_beat += interval;
                }
                self.samples_until_beat -= 1.0;
            }

            if let Some((is_downbeat, position)) = self.active {
                let click = if is_downbeat {
                    &self.downbeat_click
                } else {
                    &self.beat_click
                };
                match click.get(position) {
                    Some(&sample) => {
                        let sample = sample * self.settings.volume;
                        frame.iter_mut().for_each(|s| *s += sample);
                        self.active = Some((is_downbeat, position + 1));
                    }
                    None => self.active = None,
                }
            }
        }
    }
}
