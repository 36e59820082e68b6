//! Approximate loudness
//!
//! No K-weighting filter and no gating: each channel's mean square is taken
//! as-is. Good enough for a meter, not for delivery specs.

use crate::dsp::power_to_db;
use std::collections::VecDeque;

/// Offset applied to channel power before summation
pub const LUFS_OFFSET_DB: f64 = 0.691;

/// Approximate loudness from per-channel mean squares
///
/// Each channel is converted to dB, offset, back to linear power, averaged
/// across channels, and returned to the log domain with the offset removed.
pub fn approximate_lufs(mean_squares: &[f64]) -> f32 {
    if mean_squares.is_empty() {
        return f32::NEG_INFINITY;
    }
    let total_power: f64 = mean_squares
        .iter()
        .map(|&ms| {
            let db = power_to_db(ms) + LUFS_OFFSET_DB;
            10f64.powf(db / 10.0)
        })
        .sum();
    let average = total_power / mean_squares.len() as f64;
    (power_to_db(average) - LUFS_OFFSET_DB) as f32
}

/// Per-channel sums of squares over a block of frames
#[derive(Debug, Clone)]
struct Block {
    frames: usize,
    sum_squares: Vec<f64>,
}

/// Rolling window of block energies
///
/// Frames past the cap are evicted oldest first. A block straddling the
/// window edge is trimmed in proportion, so the newest frames always remain.
#[derive(Debug)]
pub struct RollingLoudness {
    capacity_frames: usize,
    blocks: VecDeque<Block>,
    totals: Vec<f64>,
    total_frames: usize,
}

impl RollingLoudness {
    pub fn new(window_secs: f32, sample_rate: u32) -> Self {
        Self {
            capacity_frames: ((window_secs.max(0.0) as f64) * sample_rate as f64) as usize,
            blocks: VecDeque::new(),
            totals: Vec::new(),
            total_frames: 0,
        }
    }

    /// Add one block's per-channel sums of squares
    pub fn push(&mut self, sum_squares: &[f64], frames: usize) {
        if frames == 0 {
            return;
        }
        if self.totals.len() != sum_squares.len() {
            // Channel layout changed: start over
            self.reset();
            self.totals = vec![0.0; sum_squares.len()];
        }
        for (total, &s) in self.totals.iter_mut().zip(sum_squares) {
            *total += s;
        }
        self.total_frames += frames;
        self.blocks.push_back(Block {
            frames,
            sum_squares: sum_squares.to_vec(),
        });

        while self.total_frames > self.capacity_frames {
            let excess = self.total_frames - self.capacity_frames;
            let Some(oldest) = self.blocks.front_mut() else {
                break;
            };
            if oldest.frames <= excess {
                self.total_frames -= oldest.frames;
                for (total, s) in self.totals.iter_mut().zip(&oldest.sum_squares) {
                    *total = (*total - s).max(0.0);
                }
                self.blocks.pop_front();
            } else {
                let removed = excess as f64 / oldest.frames as f64;
                for (total, s) in self.totals.iter_mut().zip(oldest.sum_squares.iter_mut()) {
                    let dropped = *s * removed;
                    *s -= dropped;
                    *total = (*total - dropped).max(0.0);
                }
                oldest.frames -= excess;
                self.total_frames -= excess;
            }
        }
    }

    /// Frames currently inside the window
    pub fn frames(&self) -> usize {
        self.total_frames
    }

    pub fn integrated_lufs(&self) -> f32 {
        if self.total_frames == 0 {
            return f32::NEG_INFINITY;
        }
        let mean_squares: Vec<f64> = self
            .totals
            .iter()
            .map(|t| t / self.total_frames as f64)
            .collect();
        approximate_lufs(&mean_squares)
    }

    pub fn reset(&mut self) {
        self.blocks.clear();
        self.totals.iter_mut().for_each(|t| *t = 0.0);
        self.total_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_full_scale_square_reads_zero() {
        assert_abs_diff_eq!(approximate_lufs(&[1.0, 1.0]), 0.0, epsilon = 1e-5);
        assert_eq!(approximate_lufs(&[0.0, 0.0]), f32::NEG_INFINITY);
    }

    #[test]
    fn test_channels_average_in_power_domain() {
        // One silent channel halves the power: -3.01 dB
        assert_abs_diff_eq!(approximate_lufs(&[1.0, 0.0]), -3.0103, epsilon = 1e-3);
    }

    #[test]
    fn test_window_evicts_oldest_frames() {
        let mut rolling = RollingLoudness::new(1.0, 100);
        rolling.push(&[100.0], 100);
        assert_abs_diff_eq!(rolling.integrated_lufs(), 0.0, epsilon = 1e-5);

        // Half the loud block is trimmed away: half power, -3.01 dB
        rolling.push(&[0.0], 50);
        assert_eq!(rolling.frames(), 100);
        assert_abs_diff_eq!(rolling.integrated_lufs(), -3.0103, epsilon = 1e-3);

        // Silence fills the whole window
        rolling.push(&[0.0], 100);
        assert_eq!(rolling.frames(), 100);
        assert_eq!(rolling.integrated_lufs(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_block_longer_than_window_keeps_newest_frames() {
        let mut rolling = RollingLoudness::new(1.0, 1000);
        // 1500 frames at amplitude 0.5
        rolling.push(&[0.25 * 1500.0], 1500);
        assert_eq!(rolling.frames(), 1000);
        assert_abs_diff_eq!(rolling.integrated_lufs(), -6.0206, epsilon = 1e-3);

        rolling.push(&[0.25 * 1024.0], 1024);
        assert_eq!(rolling.frames(), 1000);
        assert_abs_diff_eq!(rolling.integrated_lufs(), -6.0206, epsilon = 1e-3);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut rolling = RollingLoudness::new(60.0, 48000);
        rolling.push(&[10.0, 10.0], 480);
        rolling.reset();
        assert_eq!(rolling.frames(), 0);
        assert_eq!(rolling.integrated_lufs(), f32::NEG_INFINITY);
    }
}
