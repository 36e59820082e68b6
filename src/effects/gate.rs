use super::Effect;
use crate::dsp::db_to_linear;

/// Noise gate: opens above threshold, closes below with smoothed gain
///
/// Parameters:
/// - 0: Threshold in dB (-100.0 to 0.0, default -60)
/// - 1: Attack in ms (default 1)
/// - 2: Release in ms (default 100)
pub struct Gate {
    threshold_db: f32,
    threshold_linear: f32,
    attack_ms: f32,
    release_ms: f32,
    gain: f32,
    sample_rate: u32,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            threshold_db: -60.0,
            threshold_linear: db_to_linear(-60.0),
            attack_ms: 1.0,
            release_ms: 100.0,
            gain: 1.0,
            sample_rate: 44100,
        }
    }

    fn coeff(time_ms: f32, sample_rate: u32) -> f32 {
        let samples = (time_ms / 1000.0) * sample_rate as f32;
        (-1.0 / samples.max(1.0)).exp()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Gate {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        self.sample_rate = sample_rate;
        let attack = Self::coeff(self.attack_ms, sample_rate);
        let release = Self::coeff(self.release_ms, sample_rate);

        for frame in buffer.chunks_exact_mut(channels.max(1)) {
            let level = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            let target = if level >= self.threshold_linear { 1.0 } else { 0.0 };
            let coeff = if target > self.gain { attack } else { release };
            self.gain = target + coeff * (self.gain - target);
            for sample in frame.iter_mut() {
                *sample *= self.gain;
            }
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            0 => {
                self.threshold_db = value.clamp(-100.0, 0.0);
                self.threshold_linear = db_to_linear(self.threshold_db);
            }
            1 => self.attack_ms = value.clamp(0.0, 500.0),
            2 => self.release_ms = value.clamp(0.0, 5000.0),
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            0 => self.threshold_db,
            1 => self.attack_ms,
            2 => self.release_ms,
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn name(&self) -> &str {
        "Gate"
    }
}
