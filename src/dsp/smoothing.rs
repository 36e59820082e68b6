/// Linear parameter ramp
///
/// Moves from the current value to a target over a fixed number of samples.
/// A ramp length of zero jumps immediately.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl LinearRamp {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Start moving towards `target` over `ramp_samples` samples
    pub fn set_target(&mut self, target: f32, ramp_samples: u32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if ramp_samples == 0 {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / ramp_samples as f32;
            self.remaining = ramp_samples;
        }
    }

    /// Advance one sample and return the value for that sample
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_without_ramp() {
        let mut ramp = LinearRamp::new(0.0);
        ramp.set_target(1.0, 0);
        assert_eq!(ramp.next_value(), 1.0);
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn test_ramp_reaches_target_exactly() {
        let mut ramp = LinearRamp::new(0.0);
        ramp.set_target(1.0, 4);
        let values: Vec<f32> = (0..6).map(|_| ramp.next_value()).collect();
        assert!((values[0] - 0.25).abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert_eq!(values[3], 1.0);
        assert_eq!(values[5], 1.0);
    }

    #[test]
    fn test_retarget_mid_ramp_starts_from_current() {
        let mut ramp = LinearRamp::new(0.0);
        ramp.set_target(1.0, 10);
        for _ in 0..5 {
            ramp.next_value();
        }
        ramp.set_target(0.0, 5);
        let first = ramp.next_value();
        assert!((first - 0.4).abs() < 1e-5);
    }
}
