use super::node_registry::GainSettings;
use super::plugin_chain::PluginKind;
use crate::io::AudioBuffer;
use std::collections::HashMap;
use std::sync::Arc;

/// Track ID type
pub type TrackId = u32;

/// Everything the engine keeps about a track between plays
///
/// Gain settings are cached here so they survive stop/play; the live copies
/// only exist in the track's `GainStage` while a source is playing.
#[derive(Debug)]
pub struct TrackAudioState {
    pub track_id: TrackId,
    pub buffer: Arc<AudioBuffer>,
    /// Waveform overviews keyed by sample count, computed on first request
    waveforms: HashMap<usize, Arc<[f32]>>,
    pub gain: GainSettings,
    pub plugin_chain: Vec<PluginKind>,
}

impl TrackAudioState {
    pub fn new(track_id: TrackId, buffer: Arc<AudioBuffer>) -> Self {
        Self {
            track_id,
            buffer,
            waveforms: HashMap::new(),
            gain: GainSettings::default(),
            plugin_chain: Vec::new(),
        }
    }

    /// Install a new decoded buffer, dropping overviews of the old one
    pub fn replace_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.buffer = buffer;
        self.waveforms.clear();
    }

    /// Downsampled waveform, cached per sample count
    pub fn waveform(&mut self, samples: usize) -> Arc<[f32]> {
        let buffer = &self.buffer;
        Arc::clone(
            self.waveforms
                .entry(samples)
                .or_insert_with(|| buffer.waveform_magnitudes(samples).into()),
        )
    }

    pub fn has_waveform(&self, samples: usize) -> bool {
        self.waveforms.contains_key(&samples)
    }
}

/// Owner of every loaded track's state
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: HashMap<TrackId, TrackAudioState>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a buffer for a track, keeping existing settings if the track is known
    pub fn insert_buffer(&mut self, track_id: TrackId, buffer: Arc<AudioBuffer>) {
        match self.tracks.get_mut(&track_id) {
            Some(track) => track.replace_buffer(buffer),
            None => {
                self.tracks.insert(track_id, TrackAudioState::new(track_id, buffer));
            }
        }
    }

    pub fn get(&self, track_id: TrackId) -> Option<&TrackAudioState> {
        self.tracks.get(&track_id)
    }

    pub fn get_mut(&mut self, track_id: TrackId) -> Option<&mut TrackAudioState> {
        self.tracks.get_mut(&track_id)
    }

    pub fn remove(&mut self, track_id: TrackId) -> Option<TrackAudioState> {
        self.tracks.remove(&track_id)
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.tracks.contains_key(&track_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<_> = self.tracks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(value: f32) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::from_interleaved(vec![value; 4096], 1, 48000))
    }

    #[test]
    fn test_waveform_cached_per_size() {
        let mut track = TrackAudioState::new(1, buffer(0.5));
        assert!(!track.has_waveform(64));
        let first = track.waveform(64);
        let second = track.waveform(64);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 64);

        let other = track.waveform(32);
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_reload_keeps_settings_and_drops_waveforms() {
        let mut store = TrackStore::new();
        store.insert_buffer(3, buffer(0.5));
        let track = store.get_mut(3).unwrap();
        track.gain.pan = -0.5;
        track.waveform(16);

        store.insert_buffer(3, buffer(0.25));
        let track = store.get_mut(3).unwrap();
        assert_eq!(track.gain.pan, -0.5);
        assert!(!track.has_waveform(16));
        assert!((track.waveform(16)[0] - 0.25).abs() < 1e-6);
    }
}
