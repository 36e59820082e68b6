pub mod biquad;
pub mod level;
pub mod smoothing;

pub use biquad::BiquadFilter;
pub use level::{db_to_linear, linear_to_db, power_to_db};
pub use smoothing::LinearRamp;
