//! Pure curve primitives: `t ∈ [0,1] → v ∈ [0,1]`, stateless.

pub mod easing;
pub mod envelope;
pub mod form;
pub mod noise;
pub mod points;
pub mod wave;

pub use easing::Ease;
pub use form::{CurveForm, RampShape, WaveShape};
pub use points::SampledCurve;
