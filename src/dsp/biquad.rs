use std::f32::consts::PI;

/// Biquad filter implementation (2-pole IIR filter)
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Clone)]
pub struct BiquadFilter {
    // Filter coefficients
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // Transposed direct form state, one slot per channel (mono or stereo)
    z1: [f32; 2],
    z2: [f32; 2],
}

impl BiquadFilter {
    /// Create a new biquad filter with unity gain (pass-through)
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: [0.0; 2],
            z2: [0.0; 2],
        }
    }

    /// Create a low shelf filter
    ///
    /// # Arguments
    /// * `frequency` - Shelf corner frequency in Hz
    /// * `gain_db` - Shelf gain in decibels
    /// * `sample_rate` - Sample rate in Hz
    pub fn low_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let mut filter = Self::new();
        filter.set_low_shelf(frequency, gain_db, sample_rate);
        filter
    }

    /// Create a high shelf filter
    pub fn high_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let mut filter = Self::new();
        filter.set_high_shelf(frequency, gain_db, sample_rate);
        filter
    }

    /// Set coefficients for a low shelf (RBJ cookbook, shelf slope S = 1)
    pub fn set_low_shelf(&mut self, frequency: f32, gain_db: f32, sample_rate: f32) {
        let (a, cos_omega, alpha) = Self::shelf_terms(frequency, gain_db, sample_rate);
        let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_omega + sqrt_a_alpha;
        self.b0 = (a * ((a + 1.0) - (a - 1.0) * cos_omega + sqrt_a_alpha)) / a0;
        self.b1 = (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0;
        self.b2 = (a * ((a + 1.0) - (a - 1.0) * cos_omega - sqrt_a_alpha)) / a0;
        self.a1 = (-2.0 * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0;
        self.a2 = ((a + 1.0) + (a - 1.0) * cos_omega - sqrt_a_alpha) / a0;
    }

    /// Set coefficients for a high shelf (RBJ cookbook, shelf slope S = 1)
    pub fn set_high_shelf(&mut self, frequency: f32, gain_db: f32, sample_rate: f32) {
        let (a, cos_omega, alpha) = Self::shelf_terms(frequency, gain_db, sample_rate);
        let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_omega + sqrt_a_alpha;
        self.b0 = (a * ((a + 1.0) + (a - 1.0) * cos_omega + sqrt_a_alpha)) / a0;
        self.b1 = (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0;
        self.b2 = (a * ((a + 1.0) + (a - 1.0) * cos_omega - sqrt_a_alpha)) / a0;
        self.a1 = (2.0 * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0;
        self.a2 = ((a + 1.0) - (a - 1.0) * cos_omega - sqrt_a_alpha) / a0;
    }

    fn shelf_terms(frequency: f32, gain_db: f32, sample_rate: f32) -> (f32, f32, f32) {
        let frequency = frequency.clamp(10.0, sample_rate * 0.49);
        let omega = 2.0 * PI * frequency / sample_rate;
        let a = 10.0_f32.powf(gain_db / 40.0);
        // S = 1 reduces the shelf alpha to sin(w)/2 * sqrt(2)
        let alpha = omega.sin() / 2.0 * std::f32::consts::SQRT_2;
        (a, omega.cos(), alpha)
    }

    /// Process a single sample
    ///
    /// # Arguments
    /// * `input` - Input sample
    /// * `channel` - Channel index (0 or 1)
    #[inline]
    pub fn process_sample(&mut self, input: f32, channel: usize) -> f32 {
        let channel = channel.min(1);

        // Direct Form II Transposed implementation
        let output = self.b0 * input + self.z1[channel];

        self.z1[channel] = self.b1 * input - self.a1 * output + self.z2[channel];
        self.z2[channel] = self.b2 * input - self.a2 * output;

        output
    }

    /// Process a buffer of interleaved samples
    ///
    /// # Arguments
    /// * `buffer` - Interleaved audio samples
    /// * `channels` - Number of channels
    pub fn process_buffer(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 1 {
            for sample in buffer.iter_mut() {
                *sample = self.process_sample(*sample, 0);
            }
        } else if channels == 2 {
            for frame in buffer.chunks_exact_mut(2) {
                frame[0] = self.process_sample(frame[0], 0);
                frame[1] = self.process_sample(frame[1], 1);
            }
        }
    }

    /// Reset filter state (clear delay lines)
    pub fn reset(&mut self) {
        self.z1 = [0.0; 2];
        self.z2 = [0.0; 2];
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}
