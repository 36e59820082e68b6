//! Byte-normalized magnitude spectrum for display
//!
//! Mirrors the usual analyser-node behaviour: Hann window, magnitude
//! smoothing between frames, dB scaled linearly onto 0..=255.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    /// Last `fft_size` mono samples, oldest first once `filled`
    history: Vec<f32>,
    write_pos: usize,
    filled: bool,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bins: Vec<u8>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl SpectrumAnalyzer {
    /// `fft_size` must be a power of two
    pub fn new(fft_size: usize, smoothing: f32, min_db: f32, max_db: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        // Hann window
        let window = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        Self {
            fft,
            fft_size,
            window,
            history: vec![0.0; fft_size],
            write_pos: 0,
            filled: false,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; fft_size / 2],
            bins: vec![0; fft_size / 2],
            smoothing: smoothing.clamp(0.0, 1.0),
            min_db,
            max_db,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Feed interleaved audio; channels are averaged to mono
    pub fn push_samples(&mut self, samples: &[f32], channels: usize) {
        let channels = channels.max(1);
        for frame in samples.chunks_exact(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            self.history[self.write_pos] = mono;
            self.write_pos += 1;
            if self.write_pos == self.fft_size {
                self.write_pos = 0;
                self.filled = true;
            }
        }
    }

    /// Run one FFT over the latest samples and return the byte bins
    pub fn analyze(&mut self) -> &[u8] {
        // Unroll the ring so the oldest sample lines up with window[0]
        let start = if self.filled { self.write_pos } else { 0 };
        for i in 0..self.fft_size {
            let sample = self.history[(start + i) % self.fft_size];
            self.buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let range = (self.max_db - self.min_db).max(f32::EPSILON);
        let norm = 1.0 / self.fft_size as f32;
        for (i, bin) in self.bins.iter_mut().enumerate() {
            let magnitude = self.buffer[i].norm() * norm;
            let smoothed = self.smoothing * self.smoothed[i] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[i] = smoothed;

            let db = if smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                self.min_db
            };
            let scaled = 255.0 * (db - self.min_db) / range;
            *bin = scaled.clamp(0.0, 255.0) as u8;
        }
        &self.bins
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.bins.iter_mut().for_each(|b| *b = 0);
        self.write_pos = 0;
        self.filled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 48000.0;
        let fft_size = 1024;
        let mut analyzer = SpectrumAnalyzer::new(fft_size, 0.0, -100.0, -30.0);

        // Bin 64 of a 1024-point FFT at 48 kHz = 3000 Hz
        let freq = 64.0 * sample_rate / fft_size as f32;
        let samples: Vec<f32> = (0..fft_size)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();
        analyzer.push_samples(&samples, 1);
        let bins = analyzer.analyze().to_vec();

        assert_eq!(bins.len(), 512);
        let loudest = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, b)| **b)
            .map(|(i, _)| i)
            .unwrap();
        assert!((63..=65).contains(&loudest));
        assert_eq!(bins[400], 0);
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut analyzer = SpectrumAnalyzer::new(256, 0.8, -100.0, -30.0);
        analyzer.push_samples(&[0.0; 512], 2);
        assert!(analyzer.analyze().iter().all(|&b| b == 0));
    }
}
