use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio, interleaved f32 samples
#[derive(Clone)]
pub struct AudioBuffer {
    pub data: Vec<f32>,
    pub channels: u32,
    pub sample_rate: u32,
    pub frames: u64,
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .finish()
    }
}

impl AudioBuffer {
    /// Wrap already-decoded interleaved samples
    pub fn from_interleaved(data: Vec<f32>, channels: u32, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = (data.len() / channels as usize) as u64;
        Self {
            data,
            channels,
            sample_rate,
            frames,
        }
    }

    /// Decode an in-memory encoded file (any container symphonia can probe)
    pub fn decode(bytes: Vec<u8>) -> Result<Self, String> {
        Self::decode_source(Box::new(Cursor::new(bytes)), Hint::new())
    }

    /// Load an audio file from disk and decode it to interleaved f32 samples
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        let file = std::fs::File::open(path)
            .map_err(|e| format!("Failed to open file: {}", e))?;

        // Create a probe hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        Self::decode_source(Box::new(file), hint)
    }

    fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self, String> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| format!("Failed to probe audio: {}", e))?;

        let mut format = probed.format;

        // Find the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| "No audio tracks found".to_string())?;

        let track_id = track.id;

        let codec_params = &track.codec_params;
        let channels = codec_params
            .channels
            .ok_or_else(|| "Channel count not specified".to_string())?
            .count() as u32;
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| "Sample rate not specified".to_string())?;

        let mut decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| format!("Failed to create decoder: {}", e))?;

        // Decode all packets
        let mut audio_data = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut sample_buf_frames = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::ResetRequired) => {
                    return Err("Decoder reset required (not supported)".to_string());
                }
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // End of stream
                    break;
                }
                Err(e) => {
                    return Err(format!("Failed to read packet: {}", e));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    // Packets can grow; reallocate the conversion buffer when they do
                    if sample_buf.is_none() || decoded.capacity() > sample_buf_frames {
                        let spec = *decoded.spec();
                        sample_buf_frames = decoded.capacity();
                        sample_buf = Some(SampleBuffer::<f32>::new(sample_buf_frames as u64, spec));
                    }

                    if let Some(ref mut buf) = sample_buf {
                        buf.copy_interleaved_ref(decoded);
                        audio_data.extend_from_slice(buf.samples());
                    }
                }
                Err(Error::DecodeError(e)) => {
                    // Corrupt packet: skip it and keep going
                    log::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(format!("Decode failed: {}", e));
                }
            }
        }

        if audio_data.is_empty() {
            return Err("Stream contained no audio frames".to_string());
        }

        Ok(Self::from_interleaved(audio_data, channels, sample_rate))
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Downsampled waveform: one peak magnitude (0..1) per bucket
    ///
    /// Each bucket covers `frames / samples` frames and reports the largest
    /// absolute sample across all channels in it.
    pub fn waveform_magnitudes(&self, samples: usize) -> Vec<f32> {
        if self.frames == 0 || samples == 0 {
            return Vec::new();
        }

        let total_frames = self.frames as usize;
        let channels = self.channels as usize;
        let mut peaks = Vec::with_capacity(samples);

        for bucket in 0..samples {
            let start_frame = bucket * total_frames / samples;
            let end_frame = ((bucket + 1) * total_frames / samples)
                .max(start_frame + 1)
                .min(total_frames);

            let mut peak = 0.0f32;
            if start_frame < total_frames {
                for sample in &self.data[start_frame * channels..end_frame * channels] {
                    peak = peak.max(sample.abs());
                }
            }
            peaks.push(peak);
        }

        peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_has_requested_length() {
        let data: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0) - 0.5).collect();
        let buffer = AudioBuffer::from_interleaved(data, 1, 44100);
        let waveform = buffer.waveform_magnitudes(100);
        assert_eq!(waveform.len(), 100);
        assert!(waveform.iter().all(|&m| (0.0..=0.5).contains(&m)));
        assert!((waveform[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_waveform_with_more_buckets_than_frames() {
        let buffer = AudioBuffer::from_interleaved(vec![0.1, -0.2, 0.3, -0.4], 2, 44100);
        let waveform = buffer.waveform_magnitudes(8);
        assert_eq!(waveform.len(), 8);
        assert!((waveform[7] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let result = AudioBuffer::decode(vec![0x13, 0x37, 0x00, 0x42, 0x99]);
        assert!(result.is_err());
    }
}
