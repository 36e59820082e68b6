use super::Effect;
use crate::dsp::db_to_linear;

/// Utility stage: unity gain pass-through with an optional trim
///
/// Also stands in for any plugin type the router does not recognise.
///
/// Parameters:
/// - 0: Trim in dB (-24.0 to +24.0, default 0)
pub struct UtilityEffect {
    trim_db: f32,
    trim_linear: f32,
}

impl UtilityEffect {
    pub fn new() -> Self {
        Self {
            trim_db: 0.0,
            trim_linear: 1.0,
        }
    }
}

impl Default for UtilityEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for UtilityEffect {
    fn process(&mut self, buffer: &mut [f32], _channels: usize, _sample_rate: u32) {
        if self.trim_linear == 1.0 {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= self.trim_linear;
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == 0 {
            self.trim_db = value.clamp(-24.0, 24.0);
            self.trim_linear = db_to_linear(self.trim_db);
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        if id == 0 {
            self.trim_db
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Utility"
    }
}
