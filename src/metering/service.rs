use super::pipeline::MeteringPipeline;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread pumping a `MeteringPipeline` at a fixed interval
///
/// Snapshots are computed and delivered on this thread, never on the audio
/// callback.
pub struct MeteringService {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MeteringService {
    pub fn spawn(pipeline: Arc<Mutex<MeteringPipeline>>, interval: Duration) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("metering".into())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    pipeline.lock().pump();
                    thread::sleep(interval);
                }
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop before its next pump; callable from any thread
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop and wait for the thread to exit
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Metering thread panicked");
            }
        }
    }
}

impl Drop for MeteringService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeteringConfig;
    use crate::metering::analysis_tap;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_service_delivers_snapshots_until_stopped() {
        let config = MeteringConfig {
            block_frames: 64,
            ..MeteringConfig::default()
        };
        let mut pipeline = MeteringPipeline::new(config, 48000);
        let (mut writer, tap) = analysis_tap(8192, 2);
        pipeline.start_metering_on_audio_source(tap);

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = pipeline.on_metering_update(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        writer.write(&[0.1; 512]);
        let pipeline = Arc::new(Mutex::new(pipeline));
        let service = MeteringService::spawn(Arc::clone(&pipeline), Duration::from_millis(1)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 4 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        service.stop();
        assert!(!service.is_running());
        service.join();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}
