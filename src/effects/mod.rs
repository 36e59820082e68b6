pub mod chain;
pub mod compressor;
pub mod delay;
pub mod effect_trait;
pub mod eq;
pub mod gate;
pub mod reverb;
pub mod utility;

pub use chain::EffectChain;
pub use compressor::Compressor;
pub use delay::Delay;
pub use effect_trait::Effect;
pub use eq::ShelfEQ;
pub use gate::Gate;
pub use reverb::Reverb;
pub use utility::UtilityEffect;
