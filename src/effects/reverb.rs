use super::Effect;

const PARAM_ROOM_SIZE: u32 = 0;
const PARAM_DAMPING: u32 = 1;
const PARAM_WET_DRY: u32 = 2;

// Reduced Schroeder network: four parallel combs into two series all-passes
// Delays in samples at 48kHz
const COMB_DELAYS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_DELAYS: [usize; 2] = [225, 556];
// Right channel is detuned slightly for width
const STEREO_SPREAD: usize = 23;

/// Feedback comb filter with one-pole damping in the loop
struct CombFilter {
    buffer: Vec<f32>,
    filter_store: f32,
    write_pos: usize,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            filter_store: 0.0,
            write_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.write_pos];
        self.filter_store = output * (1.0 - damp) + self.filter_store * damp;
        self.buffer[self.write_pos] = input + self.filter_store * feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.filter_store = 0.0;
    }
}

struct AllPassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl AllPassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            write_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -input + delayed;
        self.buffer[self.write_pos] = input + delayed * 0.5;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
    }
}

struct ReverbChannel {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllPassFilter>,
}

impl ReverbChannel {
    fn new(sample_rate: u32, spread: usize) -> Self {
        let scale = |d: usize| (d + spread) * sample_rate as usize / 48000;
        Self {
            combs: COMB_DELAYS.iter().map(|&d| CombFilter::new(scale(d))).collect(),
            allpasses: ALLPASS_DELAYS.iter().map(|&d| AllPassFilter::new(scale(d))).collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut output = 0.0;
        for comb in self.combs.iter_mut() {
            output += comb.process(input, feedback, damp);
        }
        output *= 0.25;
        for allpass in self.allpasses.iter_mut() {
            output = allpass.process(output);
        }
        output
    }

    fn mute(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::mute);
        self.allpasses.iter_mut().for_each(AllPassFilter::mute);
    }
}

/// Simplified feedback reverb
///
/// Parameters:
/// - 0: Room size (0.0 to 1.0), mapped to comb feedback
/// - 1: Damping (0.0 to 1.0)
/// - 2: Wet/dry (0.0 = dry only, 1.0 = wet only)
pub struct Reverb {
    room_size: f32,
    damping: f32,
    wet_dry: f32,
    channels: [ReverbChannel; 2],
    sample_rate: u32,
}

impl Reverb {
    pub fn new() -> Self {
        Self::with_sample_rate(48000)
    }

    fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet_dry: 0.25,
            channels: [
                ReverbChannel::new(sample_rate, 0),
                ReverbChannel::new(sample_rate, STEREO_SPREAD),
            ],
            sample_rate,
        }
    }

    fn feedback(&self) -> f32 {
        0.7 + self.room_size * 0.28
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Reverb {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        if self.sample_rate != sample_rate {
            self.channels = [
                ReverbChannel::new(sample_rate, 0),
                ReverbChannel::new(sample_rate, STEREO_SPREAD),
            ];
            self.sample_rate = sample_rate;
        }

        let channels = channels.clamp(1, 2);
        let feedback = self.feedback();
        let damp = self.damping * 0.4;
        let dry_gain = 1.0 - self.wet_dry;

        for frame in buffer.chunks_exact_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let wet = self.channels[ch].process(*sample, feedback, damp);
                *sample = *sample * dry_gain + wet * self.wet_dry;
            }
        }
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            PARAM_ROOM_SIZE => self.room_size = value.clamp(0.0, 1.0),
            PARAM_DAMPING => self.damping = value.clamp(0.0, 1.0),
            PARAM_WET_DRY => self.wet_dry = value.clamp(0.0, 1.0),
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_ROOM_SIZE => self.room_size,
            PARAM_DAMPING => self.damping,
            PARAM_WET_DRY => self.wet_dry,
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        self.channels.iter_mut().for_each(ReverbChannel::mute);
    }

    fn name(&self) -> &str {
        "Reverb"
    }
}
