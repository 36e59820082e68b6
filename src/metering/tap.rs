//! Analysis tap: a lock-free ring carrying interleaved audio from the audio
//! thread to the metering side

/// Audio-thread end of a tap
pub struct TapWriter {
    producer: rtrb::Producer<f32>,
    channels: usize,
}

/// Metering-side end of a tap
pub struct AnalysisTap {
    consumer: rtrb::Consumer<f32>,
    channels: usize,
}

/// Create a connected tap holding up to `capacity` samples
pub fn analysis_tap(capacity: usize, channels: usize) -> (TapWriter, AnalysisTap) {
    let channels = channels.max(1);
    // Whole frames only, so a reader never lands mid-frame
    let capacity = (capacity.max(channels) / channels) * channels;
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (
        TapWriter { producer, channels },
        AnalysisTap { consumer, channels },
    )
}

impl TapWriter {
    /// Copy as many whole frames as fit; the rest of the block is dropped
    ///
    /// Returns false once the reading side has gone away.
    pub fn write(&mut self, samples: &[f32]) -> bool {
        if self.producer.is_abandoned() {
            return false;
        }
        let fit = self.producer.slots().min(samples.len());
        let fit = fit - fit % self.channels;
        if fit > 0 {
            if let Ok(chunk) = self.producer.write_chunk_uninit(fit) {
                chunk.fill_from_iter(samples[..fit].iter().copied());
            }
        }
        true
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

impl AnalysisTap {
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// Move up to `max_samples` (rounded down to whole frames) into `out`
    pub fn read_into(&mut self, out: &mut Vec<f32>, max_samples: usize) -> usize {
        let n = self.consumer.slots().min(max_samples);
        let n = n - n % self.channels;
        if n == 0 {
            return 0;
        }
        match self.consumer.read_chunk(n) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                out.extend_from_slice(first);
                out.extend_from_slice(second);
                chunk.commit_all();
                n
            }
            Err(_) => 0,
        }
    }

    /// True once the audio side has dropped its writer
    pub fn is_disconnected(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_whole_frames_only() {
        let (mut writer, mut tap) = analysis_tap(5, 2);
        // Capacity rounds down to 4 samples
        assert!(writer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(tap.available(), 4);

        let mut out = Vec::new();
        assert_eq!(tap.read_into(&mut out, 3), 2);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn test_writer_notices_dropped_reader() {
        let (mut writer, tap) = analysis_tap(64, 1);
        drop(tap);
        assert!(!writer.write(&[0.0; 8]));
    }
}
