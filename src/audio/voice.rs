//! One-shot playback source
//!
//! A `Voice` is built on the control thread, moved to the audio thread with
//! `Command::StartSource`, and dropped there when it stops or runs out.
//! Voices are never restarted; playing a track again builds a new one.

use super::track::TrackId;
use crate::effects::EffectChain;
use crate::io::AudioBuffer;
use std::sync::Arc;

pub type VoiceId = u64;

/// Largest block rendered through a voice's chain at once (interleaved samples)
const SCRATCH_SAMPLES: usize = 4096;

/// Cubic Hermite interpolation between p1 and p2, `x` in 0.0..1.0
#[inline]
fn hermite_interpolate(p0: f32, p1: f32, p2: f32, p3: f32, x: f32) -> f32 {
    let c0 = p1;
    let c1 = 0.5 * (p2 - p0);
    let c2 = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c3 = 0.5 * (p3 - p0) + 1.5 * (p1 - p2);

    ((c3 * x + c2) * x + c1) * x + c0
}

/// What happened to a voice during one render call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatus {
    pub ended: bool,
    /// Loop wraps during this call
    pub loops: u32,
}

pub struct Voice {
    id: VoiceId,
    track_id: TrackId,
    buffer: Arc<AudioBuffer>,
    /// Read position in source frames
    position: f64,
    /// Loop start/end in source frames
    loop_frames: Option<(f64, f64)>,
    chain: EffectChain,
    scratch: Vec<f32>,
}

impl Voice {
    /// `loop_bounds` are in seconds and must already lie within the buffer
    pub fn new(
        id: VoiceId,
        track_id: TrackId,
        buffer: Arc<AudioBuffer>,
        offset_seconds: f64,
        loop_bounds: Option<(f64, f64)>,
        chain: EffectChain,
    ) -> Self {
        let sr = buffer.sample_rate as f64;
        let loop_frames = loop_bounds
            .map(|(start, end)| (start * sr, end * sr))
            .filter(|(start, end)| end > start);
        Self {
            id,
            track_id,
            buffer,
            position: offset_seconds.max(0.0) * sr,
            loop_frames,
            chain,
            scratch: vec![0.0; SCRATCH_SAMPLES],
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Current read position in seconds
    pub fn position_seconds(&self) -> f64 {
        self.position / self.buffer.sample_rate as f64
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    /// Swap chains in place; `chain` comes back holding the old one
    pub fn swap_chain(&mut self, chain: &mut EffectChain) {
        std::mem::swap(&mut self.chain, chain);
    }

    /// Render through the chain and mix into `output`
    pub fn render(&mut self, output: &mut [f32], channels: usize, sample_rate: u32) -> RenderStatus {
        let channels = channels.max(1);
        let mut status = RenderStatus::default();
        let block = (SCRATCH_SAMPLES / channels) * channels;

        for out_chunk in output.chunks_mut(block) {
            if status.ended {
                break;
            }
            let scratch = &mut self.scratch[..out_chunk.len()];
            scratch.fill(0.0);

            let chunk_status = Self::read_source(
                &self.buffer,
                &mut self.position,
                self.loop_frames,
                scratch,
                channels,
                sample_rate,
            );
            status.loops += chunk_status.loops;
            status.ended = chunk_status.ended;

            self.chain.process(scratch, channels, sample_rate);
            for (out, s) in out_chunk.iter_mut().zip(scratch.iter()) {
                *out += *s;
            }
        }
        status
    }

    /// Fill `dst` from the buffer with rate and channel conversion
    fn read_source(
        buffer: &AudioBuffer,
        position: &mut f64,
        loop_frames: Option<(f64, f64)>,
        dst: &mut [f32],
        dst_channels: usize,
        sample_rate: u32,
    ) -> RenderStatus {
        let mut status = RenderStatus::default();
        let frames = buffer.frames as f64;
        let rate_ratio = buffer.sample_rate as f64 / sample_rate as f64;

        if let Some((start, end)) = loop_frames {
            if *position >= end {
                *position = start;
            }
        }

        for frame in dst.chunks_exact_mut(dst_channels) {
            if *position >= frames {
                status.ended = true;
                break;
            }
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = Self::sample_at(buffer, *position, ch, dst_channels);
            }

            *position += rate_ratio;
            if let Some((start, end)) = loop_frames {
                if *position >= end {
                    *position = start + (*position - end);
                    status.loops += 1;
                }
            }
        }
        status
    }

    /// Source value for one output channel at a fractional frame position
    #[inline]
    fn sample_at(buffer: &AudioBuffer, position: f64, dst_ch: usize, dst_channels: usize) -> f32 {
        let src_channels = buffer.channels as usize;
        if src_channels == dst_channels {
            Self::interpolate(buffer, position, dst_ch)
        } else if src_channels == 1 {
            // Mono to multi-channel: duplicate
            Self::interpolate(buffer, position, 0)
        } else if dst_channels == 1 {
            // Multi-channel to mono: average
            let sum: f32 = (0..src_channels)
                .map(|ch| Self::interpolate(buffer, position, ch))
                .sum();
            sum / src_channels as f32
        } else {
            Self::interpolate(buffer, position, dst_ch % src_channels)
        }
    }

    #[inline]
    fn interpolate(buffer: &AudioBuffer, position: f64, ch: usize) -> f32 {
        let channels = buffer.channels as usize;
        let last = (buffer.frames as usize).saturating_sub(1);
        let p1 = (position as usize).min(last);
        let frac = (position - p1 as f64) as f32;
        let at = |frame: usize| buffer.data[frame * channels + ch];

        if frac <= 0.0 {
            return at(p1);
        }
        let p0 = p1.saturating_sub(1);
        let p2 = (p1 + 1).min(last);
        let p3 = (p1 + 2).min(last);
        hermite_interpolate(at(p0), at(p1), at(p2), at(p3), frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(frames: usize, channels: u32, sample_rate: u32) -> Arc<AudioBuffer> {
        let data = (0..frames * channels as usize)
            .map(|i| (i / channels as usize) as f32 / frames as f32)
            .collect();
        Arc::new(AudioBuffer::from_interleaved(data, channels, sample_rate))
    }

    #[test]
    fn test_hermite_passes_through_points() {
        assert_eq!(hermite_interpolate(0.0, 1.0, 2.0, 3.0, 0.0), 1.0);
        assert!((hermite_interpolate(0.0, 1.0, 2.0, 3.0, 1.0) - 2.0).abs() < 1e-6);
        assert!((hermite_interpolate(0.0, 1.0, 2.0, 3.0, 0.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_voice_ends_at_buffer_end() {
        let buffer = ramp_buffer(100, 1, 48000);
        let mut voice = Voice::new(1, 1, buffer, 0.0, None, EffectChain::new());
        let mut output = vec![0.0f32; 256];
        let status = voice.render(&mut output, 1, 48000);
        assert!(status.ended);
        assert!((output[50] - 0.5).abs() < 1e-6);
        assert!(output[100..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_voice_loops_within_region() {
        let buffer = ramp_buffer(1000, 1, 1000);
        // Loop 0.1s..0.2s = frames 100..200
        let mut voice = Voice::new(1, 1, buffer, 0.0, Some((0.1, 0.2)), EffectChain::new());
        let mut output = vec![0.0f32; 500];
        let status = voice.render(&mut output, 1, 1000);
        assert!(!status.ended);
        // First wrap after 200 frames, then one every 100
        assert_eq!(status.loops, 4);
        assert!((output[250] - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_mono_source_fills_both_channels() {
        let buffer = ramp_buffer(10, 1, 48000);
        let mut voice = Voice::new(1, 1, buffer, 0.0, None, EffectChain::new());
        let mut output = vec![0.0f32; 8];
        voice.render(&mut output, 2, 48000);
        for frame in output.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!((output[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_source_downmixed_to_mono() {
        let data = vec![1.0f32, 0.0, 1.0, 0.0];
        let buffer = Arc::new(AudioBuffer::from_interleaved(data, 2, 48000));
        let mut voice = Voice::new(1, 1, buffer, 0.0, None, EffectChain::new());
        let mut output = vec![0.0f32; 2];
        voice.render(&mut output, 1, 48000);
        assert_eq!(output, vec![0.5, 0.5]);
    }
}
