use super::Effect;
use crate::dsp::BiquadFilter;

/// Two-band shelving EQ (low shelf + high shelf)
///
/// Parameters:
/// - 0: Low shelf gain in dB (-12.0 to +12.0)
/// - 1: High shelf gain in dB (-12.0 to +12.0)
/// - 2: Low shelf frequency in Hz (default: 250)
/// - 3: High shelf frequency in Hz (default: 8000)
pub struct ShelfEQ {
    low_gain: f32,
    high_gain: f32,
    low_freq: f32,
    high_freq: f32,

    low_filter: BiquadFilter,
    high_filter: BiquadFilter,

    sample_rate: f32,
}

impl ShelfEQ {
    /// Create a new ShelfEQ with flat response
    pub fn new() -> Self {
        let mut eq = Self {
            low_gain: 0.0,
            high_gain: 0.0,
            low_freq: 250.0,
            high_freq: 8000.0,
            low_filter: BiquadFilter::new(),
            high_filter: BiquadFilter::new(),
            sample_rate: 48000.0, // Default, will be updated on first process
        };
        eq.update_filters();
        eq
    }

    /// Set low shelf gain in decibels
    pub fn set_low_gain(&mut self, gain_db: f32) {
        self.low_gain = gain_db.clamp(-12.0, 12.0);
        self.update_filters();
    }

    /// Set high shelf gain in decibels
    pub fn set_high_gain(&mut self, gain_db: f32) {
        self.high_gain = gain_db.clamp(-12.0, 12.0);
        self.update_filters();
    }

    pub fn set_low_freq(&mut self, freq: f32) {
        self.low_freq = freq.clamp(20.0, 1000.0);
        self.update_filters();
    }

    pub fn set_high_freq(&mut self, freq: f32) {
        self.high_freq = freq.clamp(1000.0, 20000.0);
        self.update_filters();
    }

    /// Update filter coefficients based on current parameters
    fn update_filters(&mut self) {
        self.low_filter
            .set_low_shelf(self.low_freq, self.low_gain, self.sample_rate);
        self.high_filter
            .set_high_shelf(self.high_freq, self.high_gain, self.sample_rate);
    }
}

impl Default for ShelfEQ {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ShelfEQ {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        // Update sample rate if it changed
        let sr = sample_rate as f32;
        if (self.sample_rate - sr).abs() > 0.1 {
            self.sample_rate = sr;
            self.update_filters();
        }

        self.low_filter.process_buffer(buffer, channels);
        self.high_filter.process_buffer(buffer, channels);
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            0 => self.set_low_gain(value),
            1 => self.set_high_gain(value),
            2 => self.set_low_freq(value),
            3 => self.set_high_freq(value),
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            0 => self.low_gain,
            1 => self.high_gain,
            2 => self.low_freq,
            3 => self.high_freq,
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        self.low_filter.reset();
        self.high_filter.reset();
    }

    fn name(&self) -> &str {
        "EQ"
    }
}
