#![allow(dead_code)]

use mixbus::{create_engine, Engine, EngineConfig, EngineController};
use std::io::Cursor;

/// Encode interleaved samples as a 32-bit float WAV file in memory
pub fn wav_bytes(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Mono sine as WAV bytes
pub fn sine_wav(freq: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<u8> {
    let frames = (seconds * sample_rate as f32) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect();
    wav_bytes(&samples, 1, sample_rate)
}

/// Constant-valued WAV, handy for checking gain maths
pub fn constant_wav(value: f32, frames: usize, channels: u16, sample_rate: u32) -> Vec<u8> {
    wav_bytes(&vec![value; frames * channels as usize], channels, sample_rate)
}

pub fn engine(sample_rate: u32, channels: u32) -> (Engine, EngineController) {
    create_engine(sample_rate, channels, &EngineConfig::default())
}

/// Run the engine for `frames` frames in 512-frame callbacks, returning the output
pub fn render(engine: &mut Engine, frames: usize) -> Vec<f32> {
    let channels = engine.channels() as usize;
    let mut output = Vec::with_capacity(frames * channels);
    let mut block = vec![0.0f32; 512 * channels];
    let mut remaining = frames;
    while remaining > 0 {
        let n = remaining.min(512);
        let slice = &mut block[..n * channels];
        engine.process(slice);
        output.extend_from_slice(slice);
        remaining -= n;
    }
    output
}
