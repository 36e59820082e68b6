//! Control-side record of which tracks have a live source
//!
//! The audio thread owns the sources themselves; this scheduler keeps the
//! matching `TrackPlayState` so positions can be derived from the shared
//! sample clock without asking the audio thread.

use super::track::TrackId;
use super::voice::VoiceId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPlayState {
    pub is_playing: bool,
    /// Source offset the playback started from, in seconds
    pub current_offset: f64,
    /// Engine clock (seconds) when the source was started
    pub engine_start_time: f64,
    pub loop_count: u32,
    #[serde(skip)]
    pub voice_id: VoiceId,
    /// Effective loop region in source seconds, if looping
    pub loop_bounds: Option<(f64, f64)>,
    /// Buffer duration in seconds
    pub duration: f64,
}

impl TrackPlayState {
    /// Source position at engine time `now`, in seconds
    pub fn position_at(&self, now: f64) -> f64 {
        let raw = self.current_offset + (now - self.engine_start_time).max(0.0);
        match self.loop_bounds {
            Some((start, end)) if end > start && raw >= end => start + (raw - end) % (end - start),
            _ => raw.min(self.duration),
        }
    }
}

#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    states: HashMap<TrackId, TrackPlayState>,
    next_voice_id: VoiceId,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new source
    pub fn next_voice_id(&mut self) -> VoiceId {
        self.next_voice_id += 1;
        self.next_voice_id
    }

    /// Record a started source, returning the state it replaced
    pub fn begin(&mut self, track_id: TrackId, state: TrackPlayState) -> Option<TrackPlayState> {
        self.states.insert(track_id, state)
    }

    /// Forget a track's source
    pub fn end(&mut self, track_id: TrackId) -> Option<TrackPlayState> {
        self.states.remove(&track_id)
    }

    pub fn is_active(&self, track_id: TrackId) -> bool {
        self.states.contains_key(&track_id)
    }

    pub fn state(&self, track_id: TrackId) -> Option<&TrackPlayState> {
        self.states.get(&track_id)
    }

    pub fn active_tracks(&self) -> Vec<TrackId> {
        let mut ids: Vec<_> = self.states.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Handle a natural end; ignored if the track has since been restarted
    pub fn source_ended(&mut self, track_id: TrackId, voice_id: VoiceId) -> bool {
        match self.states.get(&track_id) {
            Some(state) if state.voice_id == voice_id => {
                self.states.remove(&track_id);
                true
            }
            _ => false,
        }
    }

    pub fn source_looped(&mut self, track_id: TrackId, voice_id: VoiceId, count: u32) {
        if let Some(state) = self.states.get_mut(&track_id) {
            if state.voice_id == voice_id {
                state.loop_count += count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(voice_id: VoiceId, loop_bounds: Option<(f64, f64)>) -> TrackPlayState {
        TrackPlayState {
            is_playing: true,
            current_offset: 0.5,
            engine_start_time: 10.0,
            loop_count: 0,
            voice_id,
            loop_bounds,
            duration: 4.0,
        }
    }

    #[test]
    fn test_position_without_loop() {
        let s = state(1, None);
        assert_eq!(s.position_at(10.0), 0.5);
        assert_eq!(s.position_at(11.0), 1.5);
        assert_eq!(s.position_at(20.0), 4.0);
    }

    #[test]
    fn test_position_wraps_in_loop() {
        let s = state(1, Some((1.0, 2.0)));
        assert_eq!(s.position_at(11.0), 1.5);
        assert!((s.position_at(12.25) - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_stale_end_event_ignored() {
        let mut scheduler = PlaybackScheduler::new();
        let first = scheduler.next_voice_id();
        let second = scheduler.next_voice_id();
        scheduler.begin(1, state(second, None));

        assert!(!scheduler.source_ended(1, first));
        assert!(scheduler.is_active(1));
        assert!(scheduler.source_ended(1, second));
        assert!(!scheduler.is_active(1));
    }

    #[test]
    fn test_loop_count_accumulates() {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.begin(2, state(5, Some((0.0, 1.0))));
        scheduler.source_looped(2, 5, 2);
        scheduler.source_looped(2, 4, 9);
        assert_eq!(scheduler.state(2).unwrap().loop_count, 2);
    }
}
