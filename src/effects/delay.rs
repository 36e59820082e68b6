use super::Effect;

const PARAM_DELAY_TIME: u32 = 0;
const PARAM_FEEDBACK: u32 = 1;
const PARAM_WET_DRY: u32 = 2;

const MAX_DELAY_SECONDS: f32 = 2.0;

/// Fixed-time delay line with feedback (mono or stereo)
pub struct Delay {
    delay_time: f32, // seconds
    feedback: f32,   // 0.0 to 0.95
    wet_dry: f32,    // 0.0 = dry only, 1.0 = wet only

    // One delay line per channel
    lines: [Vec<f32>; 2],
    write_position: usize,
    max_delay_samples: usize,
    sample_rate: u32,
}

impl Delay {
    pub fn new() -> Self {
        // Sized for 48kHz, reallocated when the real rate is known
        let max_delay_samples = (MAX_DELAY_SECONDS * 48000.0) as usize;
        Self {
            delay_time: 0.3,
            feedback: 0.3,
            wet_dry: 0.3,
            lines: [vec![0.0; max_delay_samples], vec![0.0; max_delay_samples]],
            write_position: 0,
            max_delay_samples,
            sample_rate: 48000,
        }
    }

    fn delay_samples(&self) -> usize {
        ((self.delay_time * self.sample_rate as f32) as usize).clamp(1, self.max_delay_samples - 1)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Delay {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.max_delay_samples = (MAX_DELAY_SECONDS * sample_rate as f32) as usize;
            for line in self.lines.iter_mut() {
                line.clear();
                line.resize(self.max_delay_samples, 0.0);
            }
            self.write_position = 0;
        }

        let channels = channels.clamp(1, 2);
        let delay = self.delay_samples();
        let dry_gain = 1.0 - self.wet_dry;
        let wet_gain = self.wet_dry;

        for frame in buffer.chunks_exact_mut(channels) {
            let read_pos = (self.write_position + self.max_delay_samples - delay) % self.max_delay_samples;
            for (ch, sample) in frame.iter_mut().enumerate() {
                let line = &mut self.lines[ch];
                let delayed = line[read_pos];
                let input = *sample;
                *sample = input * dry_gain + delayed * wet_gain;
                line[self.write_position] = input + delayed * self.feedback;
            }
            self.write_position = (self.write_position + 1) % self.max_delay_samples;
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            PARAM_DELAY_TIME => self.delay_time = value.clamp(0.001, MAX_DELAY_SECONDS),
            PARAM_FEEDBACK => self.feedback = value.clamp(0.0, 0.95),
            PARAM_WET_DRY => self.wet_dry = value.clamp(0.0, 1.0),
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_DELAY_TIME => self.delay_time,
            PARAM_FEEDBACK => self.feedback,
            PARAM_WET_DRY => self.wet_dry,
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        for line in self.lines.iter_mut() {
            line.fill(0.0);
        }
        self.write_position = 0;
    }

    fn name(&self) -> &str {
        "Delay"
    }
}
