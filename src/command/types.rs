use crate::audio::metronome::MetronomeSettings;
use crate::audio::{TrackId, Voice, VoiceId};
use crate::effects::EffectChain;
use crate::metering::TapWriter;

/// Commands sent from the control thread to the audio thread
///
/// Anything that allocates (voices, chains, taps) is built on the control
/// side and moved across whole.
pub enum Command {
    // Source commands
    /// Start a new source, replacing any source already playing on its track
    StartSource(Box<Voice>),
    /// Stop and drop the source playing on a track
    StopSource(TrackId),
    /// Stop every source
    StopAll,
    /// Swap the node chain of a playing source
    ReplaceChain(TrackId, Box<EffectChain>),

    // Metronome commands
    SetMetronome(MetronomeSettings),
    /// Play a single click now (true = downbeat)
    TriggerClick(bool),

    // Metering commands
    /// Start copying the master mix into an analysis tap
    ConnectMasterTap(TapWriter),
    DisconnectMasterTap,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::StartSource(voice) => f
                .debug_tuple("StartSource")
                .field(&voice.track_id())
                .field(&voice.id())
                .finish(),
            Command::StopSource(track_id) => f.debug_tuple("StopSource").field(track_id).finish(),
            Command::StopAll => f.write_str("StopAll"),
            Command::ReplaceChain(track_id, chain) => f
                .debug_tuple("ReplaceChain")
                .field(track_id)
                .field(chain)
                .finish(),
            Command::SetMetronome(settings) => f.debug_tuple("SetMetronome").field(settings).finish(),
            Command::TriggerClick(downbeat) => f.debug_tuple("TriggerClick").field(downbeat).finish(),
            Command::ConnectMasterTap(_) => f.write_str("ConnectMasterTap"),
            Command::DisconnectMasterTap => f.write_str("DisconnectMasterTap"),
        }
    }
}

/// Allocations the audio thread hands back to be freed on the control thread
pub enum Retired {
    Voice(Box<Voice>),
    Chain(Box<EffectChain>),
    Tap(TapWriter),
}

impl std::fmt::Debug for Retired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retired::Voice(voice) => f.debug_tuple("Voice").field(&voice.track_id()).finish(),
            Retired::Chain(chain) => f.debug_tuple("Chain").field(chain).finish(),
            Retired::Tap(_) => f.write_str("Tap"),
        }
    }
}

/// Events sent from the audio thread back to the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// A non-looping source reached the end of its buffer and was dropped
    SourceEnded { track_id: TrackId, voice_id: VoiceId },
    /// A looping source wrapped around `count` times since the last event
    SourceLooped { track_id: TrackId, voice_id: VoiceId, count: u32 },
    /// A command arrived for a track with no source (already ended)
    SourceMissing(TrackId),
}
