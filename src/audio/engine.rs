use crate::audio::loop_region::{LoopController, LoopRegion};
use crate::audio::metronome::{Metronome, MetronomeScheduler, MetronomeSettings};
use crate::audio::node_registry::{GainStage, NodeRegistry};
use crate::audio::playback::{PlaybackScheduler, TrackPlayState};
use crate::audio::plugin_chain::{PluginChainRouter, PluginKind};
use crate::audio::track::{TrackId, TrackStore};
use crate::audio::voice::{Voice, VoiceId};
use crate::command::{AudioEvent, Command, Retired};
use crate::config::EngineConfig;
use crate::effects::EffectChain;
use crate::error::{EngineError, Result};
use crate::io::AudioBuffer;
use crate::metering::{analysis_tap, MeteringPipeline, TapWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Most sources the audio thread holds at once; its voice list never grows past this
pub const MAX_VOICES: usize = 128;

/// Audio-thread half of the engine
///
/// Owns the live sources, the metronome and the master analysis tap. Moved
/// into the device callback by value; everything reaches it through the
/// command queue.
pub struct Engine {
    sample_rate: u32,
    channels: u32,
    voices: Vec<Box<Voice>>,
    metronome: Metronome,
    master_tap: Option<TapWriter>,

    // Lock-free communication
    command_rx: rtrb::Consumer<Command>,
    event_tx: rtrb::Producer<AudioEvent>,
    retired_tx: rtrb::Producer<Retired>,

    /// Frames rendered since start, shared with the controller
    clock: Arc<AtomicU64>,
    frames_rendered: u64,
}

impl Engine {
    pub fn new(
        sample_rate: u32,
        channels: u32,
        metronome: MetronomeSettings,
        command_rx: rtrb::Consumer<Command>,
        event_tx: rtrb::Producer<AudioEvent>,
        retired_tx: rtrb::Producer<Retired>,
    ) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            voices: Vec::with_capacity(MAX_VOICES),
            metronome: Metronome::new(sample_rate, metronome),
            master_tap: None,
            command_rx,
            event_tx,
            retired_tx,
            clock: Arc::new(AtomicU64::new(0)),
            frames_rendered: 0,
        }
    }

    /// Get a handle for controlling the engine from the control thread
    pub fn get_controller(
        &self,
        command_tx: rtrb::Producer<Command>,
        event_rx: rtrb::Consumer<AudioEvent>,
        retired_rx: rtrb::Consumer<Retired>,
        config: &EngineConfig,
    ) -> EngineController {
        EngineController {
            command_tx,
            event_rx,
            retired_rx,
            clock: Arc::clone(&self.clock),
            sample_rate: self.sample_rate,
            channels: self.channels,
            tracks: TrackStore::new(),
            registry: NodeRegistry::new(),
            scheduler: PlaybackScheduler::new(),
            loop_controller: LoopController::new(),
            metronome: MetronomeScheduler::new(config.metronome),
            smooth_ramp_ms: config.smooth_ramp_ms,
            waveform_samples: config.waveform_samples,
            tap_capacity: config.metering.tap_capacity,
        }
    }

    /// Process audio callback - called from the audio thread
    pub fn process(&mut self, output: &mut [f32]) {
        while let Ok(cmd) = self.command_rx.pop() {
            self.handle_command(cmd);
        }

        output.fill(0.0);
        let channels = self.channels as usize;

        let mut i = 0;
        while i < self.voices.len() {
            let status = self.voices[i].render(output, channels, self.sample_rate);
            let (track_id, voice_id) = (self.voices[i].track_id(), self.voices[i].id());
            if status.loops > 0 {
                let _ = self.event_tx.push(AudioEvent::SourceLooped {
                    track_id,
                    voice_id,
                    count: status.loops,
                });
            }
            if status.ended {
                let voice = self.voices.swap_remove(i);
                self.retire(Retired::Voice(voice));
                let _ = self.event_tx.push(AudioEvent::SourceEnded { track_id, voice_id });
            } else {
                i += 1;
            }
        }

        self.metronome.process(output, channels);

        if let Some(tap) = self.master_tap.as_mut() {
            if !tap.write(output) {
                if let Some(tap) = self.master_tap.take() {
                    self.retire(Retired::Tap(tap));
                }
            }
        }

        self.frames_rendered += (output.len() / channels) as u64;
        self.clock.store(self.frames_rendered, Ordering::Relaxed);
    }

    /// Handle a command from the control thread
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::StartSource(voice) => {
                if let Some(old) = self.take_voice(voice.track_id()) {
                    self.retire(Retired::Voice(old));
                }
                if self.voices.len() < self.voices.capacity() {
                    self.voices.push(voice);
                } else {
                    let track_id = voice.track_id();
                    self.retire(Retired::Voice(voice));
                    let _ = self.event_tx.push(AudioEvent::SourceMissing(track_id));
                }
            }
            Command::StopSource(track_id) => match self.take_voice(track_id) {
                Some(voice) => self.retire(Retired::Voice(voice)),
                None => {
                    let _ = self.event_tx.push(AudioEvent::SourceMissing(track_id));
                }
            },
            Command::StopAll => {
                while let Some(voice) = self.voices.pop() {
                    self.retire(Retired::Voice(voice));
                }
            }
            Command::ReplaceChain(track_id, mut chain) => {
                match self.voices.iter_mut().find(|v| v.track_id() == track_id) {
                    Some(voice) => voice.swap_chain(&mut *chain),
                    None => {
                        let _ = self.event_tx.push(AudioEvent::SourceMissing(track_id));
                    }
                }
                self.retire(Retired::Chain(chain));
            }
            Command::SetMetronome(settings) => {
                self.metronome.apply_settings(settings);
            }
            Command::TriggerClick(is_downbeat) => {
                self.metronome.trigger_click(is_downbeat);
            }
            Command::ConnectMasterTap(writer) => {
                if let Some(old) = self.master_tap.replace(writer) {
                    self.retire(Retired::Tap(old));
                }
            }
            Command::DisconnectMasterTap => {
                if let Some(old) = self.master_tap.take() {
                    self.retire(Retired::Tap(old));
                }
            }
        }
    }

    fn take_voice(&mut self, track_id: TrackId) -> Option<Box<Voice>> {
        let index = self.voices.iter().position(|v| v.track_id() == track_id)?;
        Some(self.voices.swap_remove(index))
    }

    /// Hand an allocation back to the control thread for freeing
    fn retire(&mut self, item: Retired) {
        // Full queue: the item is freed here instead
        let _ = self.retired_tx.push(item);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Number of sources currently rendering
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }
}

/// Build a connected engine/controller pair
pub fn create_engine(sample_rate: u32, channels: u32, config: &EngineConfig) -> (Engine, EngineController) {
    let (command_tx, command_rx) = rtrb::RingBuffer::new(config.command_queue_capacity);
    let (event_tx, event_rx) = rtrb::RingBuffer::new(config.event_queue_capacity);
    let (retired_tx, retired_rx) = rtrb::RingBuffer::new(config.event_queue_capacity);
    let engine = Engine::new(sample_rate, channels, config.metronome, command_rx, event_tx, retired_tx);
    let controller = engine.get_controller(command_tx, event_rx, retired_rx, config);
    (engine, controller)
}

/// Control-thread half of the engine
///
/// Owns all track state. Per-track operations never fail loudly: problems
/// are logged and reported through `bool`/`Option` return values.
pub struct EngineController {
    command_tx: rtrb::Producer<Command>,
    event_rx: rtrb::Consumer<AudioEvent>,
    retired_rx: rtrb::Consumer<Retired>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u32,

    tracks: TrackStore,
    registry: NodeRegistry,
    scheduler: PlaybackScheduler,
    loop_controller: LoopController,
    metronome: MetronomeScheduler,

    smooth_ramp_ms: f32,
    waveform_samples: usize,
    tap_capacity: usize,
}

impl EngineController {
    fn send(&mut self, cmd: Command) -> Result<()> {
        self.collect_retired();
        self.command_tx
            .push(cmd)
            .map_err(|_| EngineError::CommandQueueFull)
    }

    // Loading

    /// Decode an in-memory audio file into a track and cache its waveform
    pub fn load_audio_file(&mut self, track_id: TrackId, bytes: Vec<u8>) -> bool {
        let decoded = AudioBuffer::decode(bytes);
        self.install_buffer(track_id, decoded)
    }

    /// Decode an audio file from disk into a track
    pub fn load_audio_path<P: AsRef<Path>>(&mut self, track_id: TrackId, path: P) -> bool {
        let decoded = AudioBuffer::load(path.as_ref());
        self.install_buffer(track_id, decoded)
    }

    fn install_buffer(&mut self, track_id: TrackId, decoded: std::result::Result<AudioBuffer, String>) -> bool {
        let buffer = match decoded {
            Ok(buffer) => buffer,
            Err(reason) => {
                log::warn!("{}", EngineError::BufferDecode { track_id, reason });
                return false;
            }
        };
        log::info!(
            "Loaded track {}: {} frames, {} ch, {} Hz",
            track_id,
            buffer.frames,
            buffer.channels,
            buffer.sample_rate
        );
        self.tracks.insert_buffer(track_id, Arc::new(buffer));
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.waveform(self.waveform_samples);
        }
        true
    }

    /// Waveform overview with `samples` points, computed once per size
    pub fn get_waveform_data(&mut self, track_id: TrackId, samples: usize) -> Option<Arc<[f32]>> {
        self.tracks.get_mut(track_id).map(|track| track.waveform(samples))
    }

    pub fn has_track(&self, track_id: TrackId) -> bool {
        self.tracks.contains(track_id)
    }

    pub fn track_buffer(&self, track_id: TrackId) -> Option<Arc<AudioBuffer>> {
        self.tracks.get(track_id).map(|t| Arc::clone(&t.buffer))
    }

    /// Stop a track and drop its record, buffer and waveform caches
    ///
    /// Fails (keeping everything) if the stop could not be queued.
    pub fn remove_track(&mut self, track_id: TrackId) -> bool {
        if let Err(e) = self.try_stop_audio(track_id) {
            log::warn!("Removing track {}: {}", track_id, e);
            return false;
        }
        match self.tracks.remove(track_id) {
            Some(_) => {
                log::info!("Track {} removed", track_id);
                true
            }
            None => {
                log::debug!("Track {} not loaded, nothing to remove", track_id);
                false
            }
        }
    }

    /// Duration of a track's decoded buffer in seconds
    pub fn track_duration(&self, track_id: TrackId) -> Option<f64> {
        self.tracks.get(track_id).map(|t| t.buffer.duration())
    }

    // Playback

    /// Start a track from `start_time` seconds, replacing any source it already has
    pub fn play_audio(&mut self, track_id: TrackId, start_time: f64, volume_db: f32, pan: f32) -> bool {
        match self.try_play_audio(track_id, start_time, volume_db, pan) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    fn try_play_audio(&mut self, track_id: TrackId, start_time: f64, volume_db: f32, pan: f32) -> Result<VoiceId> {
        // A restart replaces the running source on the audio thread
        if !self.scheduler.is_active(track_id) && self.scheduler.active_tracks().len() >= MAX_VOICES {
            return Err(EngineError::PlaybackStart {
                track_id,
                reason: format!("{} sources already playing", MAX_VOICES),
            });
        }

        let track = self.tracks.get_mut(track_id).ok_or_else(|| EngineError::PlaybackStart {
            track_id,
            reason: "no decoded buffer".into(),
        })?;
        track.gain.fader_gain_db = volume_db;
        track.gain.pan = pan.clamp(-1.0, 1.0);

        let stage = Arc::new(GainStage::new(track_id, track.gain));
        let chain = Self::build_node_set(&stage, track_id, &track.plugin_chain);

        let duration = track.buffer.duration();
        let loop_bounds = self.loop_controller.loop_region().bounds_for(duration);
        let mut offset = start_time.max(0.0);
        if let Some((loop_start, loop_end)) = loop_bounds {
            if offset >= loop_end {
                offset = loop_start;
            }
        }

        let voice_id = self.scheduler.next_voice_id();
        let voice = Voice::new(voice_id, track_id, Arc::clone(&track.buffer), offset, loop_bounds, chain);
        self.send(Command::StartSource(Box::new(voice)))
            .map_err(|e| EngineError::PlaybackStart {
                track_id,
                reason: e.to_string(),
            })?;

        self.registry.register(stage);
        self.scheduler.begin(
            track_id,
            TrackPlayState {
                is_playing: true,
                current_offset: offset,
                engine_start_time: self.engine_time(),
                loop_count: 0,
                voice_id,
                loop_bounds,
                duration,
            },
        );
        log::info!("Track {} playing from {:.3}s (loop: {:?})", track_id, offset, loop_bounds);
        Ok(voice_id)
    }

    /// source → gain nodes → plugins → track meter
    fn build_node_set(stage: &Arc<GainStage>, track_id: TrackId, plugins: &[PluginKind]) -> EffectChain {
        let mut chain = PluginChainRouter::build(track_id, stage.build_nodes(), plugins);
        chain.push(stage.meter_node());
        chain
    }

    /// Stop a track's source; stopping an idle track is a logged no-op
    ///
    /// Returns false if the stop could not be queued; the track then keeps
    /// playing and its state is left intact for a retry.
    pub fn stop_audio(&mut self, track_id: TrackId) -> bool {
        match self.try_stop_audio(track_id) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Stopping track {}: {}", track_id, e);
                false
            }
        }
    }

    fn try_stop_audio(&mut self, track_id: TrackId) -> Result<()> {
        if !self.scheduler.is_active(track_id) {
            log::debug!("Track {} already stopped", track_id);
            return Ok(());
        }
        self.send(Command::StopSource(track_id))?;
        self.scheduler.end(track_id);
        self.registry.unregister(track_id);
        log::info!("Track {} stopped", track_id);
        Ok(())
    }

    /// Stop every source
    ///
    /// Falls back to per-track stops if the queue is full; only tracks whose
    /// stop was queued lose their state.
    pub fn stop_all_audio(&mut self) {
        match self.send(Command::StopAll) {
            Ok(()) => {
                self.scheduler.clear();
                self.registry.clear();
            }
            Err(e) => {
                log::warn!("Stop all: {}", e);
                for track_id in self.scheduler.active_tracks() {
                    self.stop_audio(track_id);
                }
            }
        }
    }

    pub fn is_playing(&self, track_id: TrackId) -> bool {
        self.scheduler.is_active(track_id)
    }

    pub fn play_state(&self, track_id: TrackId) -> Option<TrackPlayState> {
        self.scheduler.state(track_id).copied()
    }

    /// Current position inside the track's buffer in seconds, loop-aware
    pub fn track_position(&self, track_id: TrackId) -> Option<f64> {
        let now = self.engine_time();
        self.scheduler.state(track_id).map(|s| s.position_at(now))
    }

    pub fn active_tracks(&self) -> Vec<TrackId> {
        self.scheduler.active_tracks()
    }

    /// Free whatever the audio thread has handed back, returning the count
    pub fn collect_retired(&mut self) -> usize {
        let mut freed = 0;
        while let Ok(item) = self.retired_rx.pop() {
            drop(item);
            freed += 1;
        }
        freed
    }

    /// Drain audio-thread events and fold them into the play state
    pub fn poll_events(&mut self) -> Vec<AudioEvent> {
        self.collect_retired();
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.pop() {
            match event {
                AudioEvent::SourceEnded { track_id, voice_id } => {
                    if self.scheduler.source_ended(track_id, voice_id) {
                        self.registry.unregister(track_id);
                        log::info!("Track {} reached the end", track_id);
                    }
                }
                AudioEvent::SourceLooped { track_id, voice_id, count } => {
                    self.scheduler.source_looped(track_id, voice_id, count);
                }
                AudioEvent::SourceMissing(track_id) => {
                    log::debug!("Track {} had no source on the audio thread", track_id);
                }
            }
            events.push(event);
        }
        events
    }

    // Gain stage

    pub fn set_track_volume(&mut self, track_id: TrackId, db: f32) -> bool {
        self.set_volume_ramped(track_id, db, 0.0)
    }

    /// Volume change ramped over the configured smoothing time
    pub fn set_track_volume_smooth(&mut self, track_id: TrackId, db: f32) -> bool {
        self.set_volume_ramped(track_id, db, self.smooth_ramp_ms)
    }

    fn set_volume_ramped(&mut self, track_id: TrackId, db: f32, ramp_ms: f32) -> bool {
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.gain.fader_gain_db = db;
        }
        self.registry.set_volume(track_id, db, ramp_ms)
    }

    pub fn set_track_pan(&mut self, track_id: TrackId, pan: f32) -> bool {
        self.set_pan_ramped(track_id, pan, 0.0)
    }

    pub fn set_track_pan_smooth(&mut self, track_id: TrackId, pan: f32) -> bool {
        self.set_pan_ramped(track_id, pan, self.smooth_ramp_ms)
    }

    fn set_pan_ramped(&mut self, track_id: TrackId, pan: f32, ramp_ms: f32) -> bool {
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.gain.pan = pan.clamp(-1.0, 1.0);
        }
        self.registry.set_pan(track_id, pan, ramp_ms)
    }

    pub fn set_track_input_gain(&mut self, track_id: TrackId, db: f32) -> bool {
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.gain.input_gain_db = db;
        }
        self.registry.set_input_gain(track_id, db)
    }

    pub fn set_stereo_width(&mut self, track_id: TrackId, percent: f32) -> bool {
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.gain.stereo_width_percent = percent.clamp(0.0, 200.0);
        }
        self.registry.set_stereo_width(track_id, percent)
    }

    pub fn set_phase_flip(&mut self, track_id: TrackId, enabled: bool) -> bool {
        if let Some(track) = self.tracks.get_mut(track_id) {
            track.gain.phase_flip = enabled;
        }
        self.registry.set_phase_flip(track_id, enabled)
    }

    /// Shared registry of live gain stages
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    // Plugins

    /// Append plugin stages to `source` by type name
    pub fn process_plugin_chain<S: AsRef<str>>(
        &self,
        track_id: TrackId,
        source: EffectChain,
        plugin_types: &[S],
    ) -> EffectChain {
        PluginChainRouter::process_plugin_chain(track_id, source, plugin_types)
    }

    /// Set a track's plugin list; a playing source gets the new chain at once
    pub fn set_plugin_chain<S: AsRef<str>>(&mut self, track_id: TrackId, plugin_types: &[S]) -> bool {
        let kinds = PluginChainRouter::resolve(plugin_types);
        match self.tracks.get_mut(track_id) {
            Some(track) => track.plugin_chain = kinds.clone(),
            None => {
                log::debug!("Track {} not loaded, ignoring plugin chain", track_id);
                return false;
            }
        }

        let Some(stage) = self.registry.get(track_id) else {
            return true;
        };
        let chain = Self::build_node_set(&stage, track_id, &kinds);
        match self.send(Command::ReplaceChain(track_id, Box::new(chain))) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Plugin chain for track {}: {}", track_id, e);
                false
            }
        }
    }

    // Loop

    pub fn set_loop_region(&mut self, start: f64, end: f64, enabled: bool) -> LoopRegion {
        let region = self.loop_controller.set_loop_region(start, end, enabled);
        log::debug!("Loop region {:?}", region);
        region
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_controller.toggle_loop()
    }

    pub fn get_loop_region(&self) -> LoopRegion {
        self.loop_controller.loop_region()
    }

    // Metronome

    fn send_metronome(&mut self, settings: MetronomeSettings) {
        if let Err(e) = self.send(Command::SetMetronome(settings)) {
            log::warn!("Metronome update dropped: {}", e);
        }
    }

    pub fn set_metronome_enabled(&mut self, enabled: bool) {
        let settings = self.metronome.set_enabled(enabled);
        self.send_metronome(settings);
    }

    pub fn set_metronome_volume(&mut self, volume: f32) {
        let settings = self.metronome.set_volume(volume);
        self.send_metronome(settings);
    }

    pub fn set_metronome_bpm(&mut self, bpm: f32) -> f32 {
        let settings = self.metronome.set_bpm(bpm);
        self.send_metronome(settings);
        settings.bpm
    }

    pub fn set_metronome_time_signature(&mut self, beats: u32) -> u32 {
        let settings = self.metronome.set_time_signature(beats);
        self.send_metronome(settings);
        settings.time_signature_beats
    }

    pub fn metronome_settings(&self) -> MetronomeSettings {
        self.metronome.settings()
    }

    /// Sound one click now, whether or not the metronome is running
    pub fn play_metronome_click(&mut self, is_downbeat: bool) {
        if let Err(e) = self.send(Command::TriggerClick(is_downbeat)) {
            log::warn!("Click dropped: {}", e);
        }
    }

    // Metering

    /// Tap the master mix into `pipeline`
    pub fn start_metering(&mut self, pipeline: &mut MeteringPipeline) -> Result<()> {
        let (writer, tap) = analysis_tap(self.tap_capacity, self.channels as usize);
        self.send(Command::ConnectMasterTap(writer))?;
        pipeline.start_metering_on_audio_source(tap);
        Ok(())
    }

    pub fn stop_metering(&mut self, pipeline: &mut MeteringPipeline) {
        pipeline.stop_metering();
        // A dropped reader also disconnects the writer, so a full queue is harmless
        let _ = self.send(Command::DisconnectMasterTap);
    }

    // Clock

    /// Engine time in seconds, from frames rendered
    pub fn engine_time(&self) -> f64 {
        self.clock.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }
}
