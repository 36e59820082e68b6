use serde::{Deserialize, Serialize};

/// Transport loop region, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopRegion {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    /// Region clamped to a buffer of `duration` seconds, as (start, end)
    ///
    /// Returns `None` when looping is disabled. An empty clamped range means
    /// the whole buffer loops.
    pub fn bounds_for(&self, duration: f64) -> Option<(f64, f64)> {
        if !self.enabled {
            return None;
        }
        let start = self.start.clamp(0.0, duration);
        let end = self.end.clamp(0.0, duration);
        if end <= start {
            Some((0.0, duration))
        } else {
            Some((start, end))
        }
    }
}

/// Holds the global loop region
///
/// Only read when a source is started; editing the region does not touch
/// sources that are already playing.
#[derive(Debug, Clone, Default)]
pub struct LoopController {
    region: LoopRegion,
}

impl LoopController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the region with `start >= 0` and `end >= start`
    pub fn set_loop_region(&mut self, start: f64, end: f64, enabled: bool) -> LoopRegion {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = if end.is_finite() { end.max(start) } else { start };
        self.region = LoopRegion { enabled, start, end };
        self.region
    }

    /// Flip the enable flag, keeping the region
    pub fn toggle_loop(&mut self) -> bool {
        self.region.enabled = !self.region.enabled;
        self.region.enabled
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.region
    }
}
