use super::Effect;
use crate::dsp::{db_to_linear, linear_to_db};

const PARAM_THRESHOLD: u32 = 0;
const PARAM_RATIO: u32 = 1;
const PARAM_ATTACK: u32 = 2;
const PARAM_RELEASE: u32 = 3;
const PARAM_MAKEUP_GAIN: u32 = 4;
const PARAM_KNEE: u32 = 5;

/// Feed-forward compressor with soft knee, stereo-linked detection
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup_gain_db: f32,
    knee_db: f32,

    // State
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: u32,
}

impl Compressor {
    pub fn new() -> Self {
        let sample_rate = 44100;
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            attack_ms: 3.0,
            release_ms: 250.0,
            makeup_gain_db: 0.0,
            knee_db: 6.0,
            envelope: 1.0,
            attack_coeff: Self::ms_to_coeff(3.0, sample_rate),
            release_coeff: Self::ms_to_coeff(250.0, sample_rate),
            sample_rate,
        }
    }

    /// Convert milliseconds to exponential smoothing coefficient
    fn ms_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
        let samples = (time_ms / 1000.0) * sample_rate as f32;
        (-1.0 / samples.max(1.0)).exp()
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = Self::ms_to_coeff(self.attack_ms, self.sample_rate);
        self.release_coeff = Self::ms_to_coeff(self.release_ms, self.sample_rate);
    }

    /// Gain reduction in dB for a given detector level
    fn calculate_gain_reduction(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let knee = self.knee_db;
        let slope = 1.0 - 1.0 / self.ratio;

        if input_db < threshold - knee / 2.0 {
            0.0
        } else if knee <= 0.0 || input_db > threshold + knee / 2.0 {
            (input_db - threshold) * slope
        } else {
            // Quadratic interpolation through the knee
            let overshoot = input_db - threshold + knee / 2.0;
            slope * overshoot * overshoot / (2.0 * knee)
        }
    }

    #[inline]
    fn next_gain(&mut self, detector: f32) -> f32 {
        let target_gr_db = self.calculate_gain_reduction(linear_to_db(detector));
        let target = db_to_linear(-target_gr_db);

        // Attack when more reduction is needed, release otherwise
        let coeff = if target < self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = target + coeff * (self.envelope - target);
        self.envelope
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.update_coefficients();
        }

        let makeup = db_to_linear(self.makeup_gain_db);
        for frame in buffer.chunks_exact_mut(channels.max(1)) {
            let detector = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            let gain = self.next_gain(detector) * makeup;
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            PARAM_THRESHOLD => self.threshold_db = value.clamp(-100.0, 0.0),
            PARAM_RATIO => self.ratio = value.clamp(1.0, 20.0),
            PARAM_ATTACK => {
                self.attack_ms = value.clamp(0.0, 1000.0);
                self.update_coefficients();
            }
            PARAM_RELEASE => {
                self.release_ms = value.clamp(0.0, 1000.0);
                self.update_coefficients();
            }
            PARAM_MAKEUP_GAIN => self.makeup_gain_db = value.clamp(0.0, 24.0),
            PARAM_KNEE => self.knee_db = value.clamp(0.0, 40.0),
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_THRESHOLD => self.threshold_db,
            PARAM_RATIO => self.ratio,
            PARAM_ATTACK => self.attack_ms,
            PARAM_RELEASE => self.release_ms,
            PARAM_MAKEUP_GAIN => self.makeup_gain_db,
            PARAM_KNEE => self.knee_db,
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        self.envelope = 1.0;
    }

    fn name(&self) -> &str {
        "Compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_signal_untouched() {
        let mut comp = Compressor::new();
        let mut buffer = vec![0.01f32; 2048];
        comp.process(&mut buffer, 2, 44100);
        assert!((buffer[2047] - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_loud_signal_reduced() {
        let mut comp = Compressor::new();
        let mut buffer = vec![0.9f32; 44100];
        comp.process(&mut buffer, 1, 44100);
        // -0.9 dBFS against a -24 dB threshold at 4:1 settles near -18 dB of reduction
        assert!(buffer[44099] < 0.9 * 0.2);
    }
}
