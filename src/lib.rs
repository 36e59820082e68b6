// mixbus - real-time audio routing and metering core
//
// Per-track node sets (gain, pan, width, phase, plugins) driven from a
// control thread, one-shot playback sources with loop regions, a metronome,
// and a master-bus metering pipeline. Uses lock-free command queues between
// threads, cpal for audio I/O, and symphonia for decoding.

pub mod audio;
pub mod command;
pub mod config;
pub mod dsp;
pub mod effects;
pub mod error;
pub mod io;
pub mod metering;

// Re-export commonly used types
pub use audio::{
    create_engine, AudioSystem, Engine, EngineController, LoopRegion, MetronomeSettings, NodeRegistry,
    PluginChainRouter, PluginKind, TrackId, TrackPlayState,
};
pub use command::{AudioEvent, Command};
pub use config::{EngineConfig, MeteringConfig};
pub use error::{EngineError, Result};
pub use io::AudioBuffer;
pub use metering::{MeteringPipeline, MeteringService, MeteringSnapshot, Subscription};
