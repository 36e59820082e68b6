pub mod loudness;
pub mod pipeline;
pub mod service;
pub mod snapshot;
pub mod spectrum;
pub mod tap;

pub use pipeline::{MeteringListener, MeteringPipeline, MeteringState, Subscription};
pub use service::MeteringService;
pub use snapshot::{LevelMetrics, LoudnessMetrics, MeteringSnapshot, TrackMetrics};
pub use tap::{analysis_tap, AnalysisTap, TapWriter};
