use super::Effect;
use std::fmt;

/// Ordered chain of effect stages, output of each feeding the next
///
/// A track's node set is one of these: the gain stages first, then any
/// plugins, then the per-track meter.
#[derive(Default)]
pub struct EffectChain {
    stages: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to the end of the chain
    pub fn push(&mut self, stage: Box<dyn Effect>) {
        self.stages.push(stage);
    }

    /// Builder-style append
    pub fn with(mut self, stage: Box<dyn Effect>) -> Self {
        self.push(stage);
        self
    }

    /// Run the buffer through every stage in order
    pub fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        for stage in self.stages.iter_mut() {
            stage.process(buffer, channels, sample_rate);
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|s| s.name())).finish()
    }
}
