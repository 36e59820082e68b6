use crate::audio::engine::{create_engine, Engine, EngineController};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Engine wired to the default output device
///
/// Dropping it stops the stream.
pub struct AudioSystem {
    pub controller: EngineController,
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u32,
}

impl AudioSystem {
    /// Open the default output device and start the engine on it
    ///
    /// This is the one hard failure in the crate: without a device nothing
    /// can play.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::DeviceInitialization("no output device available".into()))?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let default_config = device
            .default_output_config()
            .map_err(|e| EngineError::DeviceInitialization(e.to_string()))?;
        let sample_format = default_config.sample_format();

        // The engine renders mono or stereo only
        let channels = config
            .channels
            .unwrap_or(default_config.channels())
            .clamp(1, 2);
        let sample_rate = config.sample_rate.unwrap_or(default_config.sample_rate().0);
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (engine, controller) = create_engine(sample_rate, channels as u32, config);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, engine),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, engine),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, engine),
            other => Err(EngineError::DeviceInitialization(format!(
                "unsupported sample format {:?}",
                other
            ))),
        }?;
        stream
            .play()
            .map_err(|e| EngineError::DeviceInitialization(e.to_string()))?;

        log::info!(
            "Audio device '{}' running at {} Hz, {} ch, {:?}",
            name,
            sample_rate,
            channels,
            sample_format
        );

        Ok(Self {
            controller,
            stream,
            sample_rate,
            channels: channels as u32,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Pause the device stream without tearing the engine down
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| EngineError::DeviceInitialization(e.to_string()))
    }
}

fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, mut engine: Engine) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let err_fn = |err| log::error!("Audio stream error: {}", err);

    // Preallocated so the callback never allocates; larger device buffers
    // are rendered in several passes
    let mut conversion_buffer = vec![0.0f32; 16384];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.chunks_mut(conversion_buffer.len()) {
                    let buffer = &mut conversion_buffer[..out.len()];
                    engine.process(buffer);
                    for (sample, value) in out.iter_mut().zip(buffer.iter()) {
                        *sample = T::from_sample(*value);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| EngineError::DeviceInitialization(e.to_string()))
}
