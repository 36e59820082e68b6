pub mod engine;
pub mod loop_region;
pub mod metronome;
pub mod node_registry;
pub mod playback;
pub mod plugin_chain;
pub mod system;
pub mod track;
pub mod voice;

pub use engine::{create_engine, Engine, EngineController};
pub use loop_region::{LoopController, LoopRegion};
pub use metronome::{MetronomeScheduler, MetronomeSettings};
pub use node_registry::{GainSettings, GainStage, NodeRegistry};
pub use playback::{PlaybackScheduler, TrackPlayState};
pub use plugin_chain::{PluginChainRouter, PluginKind};
pub use system::AudioSystem;
pub use track::{TrackAudioState, TrackId, TrackStore};
pub use voice::{Voice, VoiceId};
