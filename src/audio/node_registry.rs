//! Per-track gain stages and the registry that owns them
//!
//! A `GainStage` holds the live scalar parameters of one playing track as
//! atomics. The control thread writes them through the `NodeRegistry`; the
//! audio thread reads them through the nodes of the track's effect chain,
//! which each hold their own `Arc<GainStage>`. The registry lock only guards
//! structural changes to the map and is never taken on the audio thread.

use super::track::TrackId;
use crate::dsp::{db_to_linear, linear_to_db, LinearRamp};
use crate::effects::{Effect, EffectChain};
use crate::metering::TrackMetrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A single f32 parameter shared between threads
///
/// The value is one atomic word, so the audio thread never observes a torn
/// update. `ramp_ms` tells the reading node how to approach a new value.
#[derive(Debug)]
pub struct SharedParam {
    bits: AtomicU32,
    ramp_ms: AtomicU32,
}

impl SharedParam {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
            ramp_ms: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Store a new value, applied at the start of the next block
    pub fn set(&self, value: f32) {
        self.set_ramped(value, 0.0);
    }

    /// Store a new value that the audio thread ramps to over `ramp_ms`
    pub fn set_ramped(&self, value: f32, ramp_ms: f32) {
        self.ramp_ms.store(ramp_ms.max(0.0).to_bits(), Ordering::Relaxed);
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn ramp_ms(&self) -> f32 {
        f32::from_bits(self.ramp_ms.load(Ordering::Relaxed))
    }
}

/// Block-level meter values published by a track's meter node
#[derive(Debug, Default)]
pub struct TrackMeter {
    peak: AtomicU32,
    rms: AtomicU32,
}

impl TrackMeter {
    fn publish(&self, peak: f32, rms: f32) {
        self.peak.store(peak.to_bits(), Ordering::Relaxed);
        self.rms.store(rms.to_bits(), Ordering::Relaxed);
    }

    /// Latest block peak/RMS in dB
    pub fn metrics(&self) -> TrackMetrics {
        TrackMetrics {
            peak_db: linear_to_db(f32::from_bits(self.peak.load(Ordering::Relaxed))),
            rms_db: linear_to_db(f32::from_bits(self.rms.load(Ordering::Relaxed))),
        }
    }
}

/// Live parameters of one track's node set
#[derive(Debug)]
pub struct GainStage {
    track_id: TrackId,
    /// Pre-fader gain, linear
    input_gain: SharedParam,
    /// -1.0 (left) to +1.0 (right)
    pan: SharedParam,
    /// Stereo width as a fraction (1.0 = 100%)
    width: SharedParam,
    /// Post-pan fader gain, linear; a negative value means phase is flipped
    fader_gain: SharedParam,
    meter: TrackMeter,
}

/// Initial values for a new gain stage
#[derive(Debug, Clone, Copy)]
pub struct GainSettings {
    pub input_gain_db: f32,
    pub fader_gain_db: f32,
    pub pan: f32,
    pub stereo_width_percent: f32,
    pub phase_flip: bool,
}

impl Default for GainSettings {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            fader_gain_db: 0.0,
            pan: 0.0,
            stereo_width_percent: 100.0,
            phase_flip: false,
        }
    }
}

impl GainStage {
    pub fn new(track_id: TrackId, settings: GainSettings) -> Self {
        let fader = db_to_linear(settings.fader_gain_db);
        Self {
            track_id,
            input_gain: SharedParam::new(db_to_linear(settings.input_gain_db)),
            pan: SharedParam::new(settings.pan.clamp(-1.0, 1.0)),
            width: SharedParam::new(settings.stereo_width_percent.clamp(0.0, 200.0) / 100.0),
            fader_gain: SharedParam::new(if settings.phase_flip { -fader } else { fader }),
            meter: TrackMeter::default(),
        }
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Set the fader gain, keeping the current phase sign
    pub fn set_volume_db(&self, db: f32, ramp_ms: f32) {
        let magnitude = db_to_linear(db);
        let signed = if self.phase_flipped() { -magnitude } else { magnitude };
        self.fader_gain.set_ramped(signed, ramp_ms);
    }

    pub fn set_pan(&self, pan: f32, ramp_ms: f32) {
        self.pan.set_ramped(pan.clamp(-1.0, 1.0), ramp_ms);
    }

    pub fn set_input_gain_db(&self, db: f32) {
        self.input_gain.set(db_to_linear(db));
    }

    pub fn set_stereo_width(&self, percent: f32) {
        self.width.set(percent.clamp(0.0, 200.0) / 100.0);
    }

    /// Flip polarity by negating the fader gain; the magnitude is preserved
    pub fn set_phase_flip(&self, enabled: bool) {
        let magnitude = self.fader_gain.get().abs();
        self.fader_gain.set(if enabled { -magnitude } else { magnitude });
    }

    pub fn phase_flipped(&self) -> bool {
        self.fader_gain.get().is_sign_negative()
    }

    pub fn volume_db(&self) -> f32 {
        linear_to_db(self.fader_gain.get())
    }

    pub fn pan(&self) -> f32 {
        self.pan.get()
    }

    pub fn input_gain_db(&self) -> f32 {
        linear_to_db(self.input_gain.get())
    }

    pub fn stereo_width_percent(&self) -> f32 {
        self.width.get() * 100.0
    }

    pub fn meter(&self) -> &TrackMeter {
        &self.meter
    }

    /// Build the gain section of the node set: input gain → width → pan → fader
    pub fn build_nodes(self: &Arc<Self>) -> EffectChain {
        EffectChain::new()
            .with(Box::new(InputGainNode::new(Arc::clone(self))))
            .with(Box::new(WidthNode::new(Arc::clone(self))))
            .with(Box::new(PanNode::new(Arc::clone(self))))
            .with(Box::new(FaderNode::new(Arc::clone(self))))
    }

    /// Terminal per-track meter node, placed after any plugins
    pub fn meter_node(self: &Arc<Self>) -> Box<dyn Effect> {
        Box::new(TrackMeterNode {
            stage: Arc::clone(self),
        })
    }
}

/// Follows a `SharedParam` on the audio thread, ramping when asked to
struct ParamFollower {
    ramp: LinearRamp,
}

impl ParamFollower {
    fn new(param: &SharedParam) -> Self {
        Self {
            ramp: LinearRamp::new(param.get()),
        }
    }

    /// Pick up the latest stored value at block start
    #[inline]
    fn begin_block(&mut self, param: &SharedParam, sample_rate: u32) {
        let target = param.get();
        if target != self.ramp.target() {
            let ramp_samples = (param.ramp_ms() / 1000.0 * sample_rate as f32) as u32;
            self.ramp.set_target(target, ramp_samples);
        }
    }
}

/// Applies a ramped scalar gain to every channel
fn apply_gain(follower: &mut ParamFollower, buffer: &mut [f32], channels: usize) {
    if !follower.ramp.is_ramping() {
        let gain = follower.ramp.current();
        if gain != 1.0 {
            buffer.iter_mut().for_each(|s| *s *= gain);
        }
        return;
    }
    for frame in buffer.chunks_exact_mut(channels.max(1)) {
        let gain = follower.ramp.next_value();
        frame.iter_mut().for_each(|s| *s *= gain);
    }
}

struct InputGainNode {
    stage: Arc<GainStage>,
    gain: ParamFollower,
}

impl InputGainNode {
    fn new(stage: Arc<GainStage>) -> Self {
        let gain = ParamFollower::new(&stage.input_gain);
        Self { stage, gain }
    }
}

impl Effect for InputGainNode {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        self.gain.begin_block(&self.stage.input_gain, sample_rate);
        apply_gain(&mut self.gain, buffer, channels);
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == 0 {
            self.stage.set_input_gain_db(value);
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        if id == 0 {
            self.stage.input_gain_db()
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "InputGain"
    }
}

struct FaderNode {
    stage: Arc<GainStage>,
    gain: ParamFollower,
}

impl FaderNode {
    fn new(stage: Arc<GainStage>) -> Self {
        let gain = ParamFollower::new(&stage.fader_gain);
        Self { stage, gain }
    }
}

impl Effect for FaderNode {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        self.gain.begin_block(&self.stage.fader_gain, sample_rate);
        apply_gain(&mut self.gain, buffer, channels);
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == 0 {
            self.stage.set_volume_db(value, 0.0);
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        if id == 0 {
            self.stage.volume_db()
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Fader"
    }
}

/// Stereo balance panner
///
/// Unity at centre. Moving off centre fades the far channel with a
/// constant-power curve and folds it into the near one, so a hard-panned
/// stereo source keeps both sides.
struct PanNode {
    stage: Arc<GainStage>,
    pan: ParamFollower,
}

impl PanNode {
    fn new(stage: Arc<GainStage>) -> Self {
        let pan = ParamFollower::new(&stage.pan);
        Self { stage, pan }
    }

    #[inline]
    fn apply(frame: &mut [f32], pan: f32) {
        use std::f32::consts::FRAC_PI_2;
        let (left, right) = (frame[0], frame[1]);
        if pan <= 0.0 {
            let x = (pan + 1.0) * FRAC_PI_2;
            frame[0] = left + right * x.cos();
            frame[1] = right * x.sin();
        } else {
            let x = pan * FRAC_PI_2;
            frame[0] = left * x.cos();
            frame[1] = right + left * x.sin();
        }
    }
}

impl Effect for PanNode {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        self.pan.begin_block(&self.stage.pan, sample_rate);
        if channels != 2 {
            // Mono output: nothing to pan
            return;
        }

        if self.pan.ramp.is_ramping() {
            for frame in buffer.chunks_exact_mut(2) {
                Self::apply(frame, self.pan.ramp.next_value());
            }
        } else {
            let pan = self.pan.ramp.current();
            if pan == 0.0 {
                return;
            }
            for frame in buffer.chunks_exact_mut(2) {
                Self::apply(frame, pan);
            }
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == 0 {
            self.stage.set_pan(value, 0.0);
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        if id == 0 {
            self.stage.pan()
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Pan"
    }
}

/// Mid/side stereo width (0% = mono, 100% = unchanged, 200% = doubled side)
struct WidthNode {
    stage: Arc<GainStage>,
    width: ParamFollower,
}

impl WidthNode {
    fn new(stage: Arc<GainStage>) -> Self {
        let width = ParamFollower::new(&stage.width);
        Self { stage, width }
    }
}

impl Effect for WidthNode {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        self.width.begin_block(&self.stage.width, sample_rate);
        if channels != 2 {
            return;
        }
        let width = self.width.ramp.current();
        if width == 1.0 {
            return;
        }
        for frame in buffer.chunks_exact_mut(2) {
            let mid = (frame[0] + frame[1]) * 0.5;
            let side = (frame[0] - frame[1]) * 0.5 * width;
            frame[0] = mid + side;
            frame[1] = mid - side;
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == 0 {
            self.stage.set_stereo_width(value);
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        if id == 0 {
            self.stage.stereo_width_percent()
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Width"
    }
}

/// Metering tap at the end of a track's chain; passes audio through untouched
struct TrackMeterNode {
    stage: Arc<GainStage>,
}

impl Effect for TrackMeterNode {
    fn process(&mut self, buffer: &mut [f32], _channels: usize, _sample_rate: u32) {
        if buffer.is_empty() {
            return;
        }
        let mut peak = 0.0f32;
        let mut sum_sq = 0.0f32;
        for &sample in buffer.iter() {
            peak = peak.max(sample.abs());
            sum_sq += sample * sample;
        }
        let rms = (sum_sq / buffer.len() as f32).sqrt();
        self.stage.meter.publish(peak, rms);
    }

    fn set_parameter(&mut self, _id: u32, _value: f32) {}

    fn get_parameter(&self, _id: u32) -> f32 {
        0.0
    }

    fn reset(&mut self) {
        self.stage.meter.publish(0.0, 0.0);
    }

    fn name(&self) -> &str {
        "TrackMeter"
    }
}

/// Registry of gain stages for tracks that currently have a source
#[derive(Clone, Default)]
pub struct NodeRegistry {
    stages: Arc<RwLock<HashMap<TrackId, Arc<GainStage>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, returning the one it replaces
    pub fn register(&self, stage: Arc<GainStage>) -> Option<Arc<GainStage>> {
        self.stages.write().insert(stage.track_id(), stage)
    }

    pub fn unregister(&self, track_id: TrackId) -> Option<Arc<GainStage>> {
        self.stages.write().remove(&track_id)
    }

    pub fn get(&self, track_id: TrackId) -> Option<Arc<GainStage>> {
        self.stages.read().get(&track_id).cloned()
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.stages.read().contains_key(&track_id)
    }

    pub fn len(&self) -> usize {
        self.stages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.read().is_empty()
    }

    pub fn clear(&self) {
        self.stages.write().clear();
    }

    /// Run `apply` on the track's stage; a missing stage is a logged no-op
    fn with_stage(&self, track_id: TrackId, what: &str, apply: impl FnOnce(&GainStage)) -> bool {
        match self.stages.read().get(&track_id) {
            Some(stage) => {
                apply(stage);
                true
            }
            None => {
                log::debug!("Track {} has no active nodes, ignoring {} change", track_id, what);
                false
            }
        }
    }

    pub fn set_volume(&self, track_id: TrackId, db: f32, ramp_ms: f32) -> bool {
        self.with_stage(track_id, "volume", |s| s.set_volume_db(db, ramp_ms))
    }

    pub fn set_pan(&self, track_id: TrackId, pan: f32, ramp_ms: f32) -> bool {
        self.with_stage(track_id, "pan", |s| s.set_pan(pan, ramp_ms))
    }

    pub fn set_input_gain(&self, track_id: TrackId, db: f32) -> bool {
        self.with_stage(track_id, "input gain", |s| s.set_input_gain_db(db))
    }

    pub fn set_stereo_width(&self, track_id: TrackId, percent: f32) -> bool {
        self.with_stage(track_id, "stereo width", |s| s.set_stereo_width(percent))
    }

    pub fn set_phase_flip(&self, track_id: TrackId, enabled: bool) -> bool {
        self.with_stage(track_id, "phase", |s| s.set_phase_flip(enabled))
    }

    /// Latest per-track meter values, sorted by track id
    pub fn track_metrics(&self) -> Vec<(TrackId, TrackMetrics)> {
        let mut metrics: Vec<_> = self
            .stages
            .read()
            .iter()
            .map(|(&id, stage)| (id, stage.meter().metrics()))
            .collect();
        metrics.sort_by_key(|(id, _)| *id);
        metrics
    }
}
