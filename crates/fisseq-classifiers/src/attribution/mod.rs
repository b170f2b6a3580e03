pub mod aggregate;
pub mod engine;

pub use aggregate::{compute_attributions, AttributionTable};
pub use engine::{Attribution, AttributionEngine, SamplingShapley};
