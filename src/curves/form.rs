use serde::{Deserialize, Serialize};

use super::points::SampledCurve;
use super::wave;

/// Shapes in the center+amplitude family: value swings symmetrically
/// around a center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveShape {
    Sine,
    AbsSine,
    Parabola,
}

/// Shapes in the min+max family: value travels between two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampShape {
    /// Straight line from `min` to `max`.
    Ramp,
    /// Repeated rising ramp, `cycles` teeth.
    Sawtooth,
    /// Slow start, steep finish.
    Exponential,
    /// Steep start, slow finish.
    Logarithmic,
}

/// A channel curve in one of the small parametric families, or an
/// explicit point list when no family fits. Values are normalized to
/// [0, 1] of the channel's travel.
///
/// `amplitude` may be negative: that encodes a time-reversed traversal
/// of the same shape. Range computations always use its magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveForm {
    Flat {
        value: f64,
    },
    CenterAmplitude {
        shape: WaveShape,
        center: f64,
        amplitude: f64,
        cycles: f64,
        phase: f64,
    },
    Span {
        shape: RampShape,
        min: f64,
        max: f64,
        cycles: f64,
    },
    Points {
        curve: SampledCurve,
    },
}

impl CurveForm {
    pub fn flat(value: f64) -> Self {
        CurveForm::Flat { value }
    }

    /// Evaluate at normalized time `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            CurveForm::Flat { value } => *value,
            CurveForm::CenterAmplitude {
                shape,
                center,
                amplitude,
                cycles,
                phase,
            } => {
                // Unit swing in [-1, 1], then scaled and recentered.
                let u = match shape {
                    WaveShape::Sine => 2.0 * wave::sine(t, *cycles, *phase) - 1.0,
                    WaveShape::AbsSine => 2.0 * wave::abs_sine(t, *cycles, *phase) - 1.0,
                    WaveShape::Parabola => 2.0 * wave::parabola(t) - 1.0,
                };
                center + amplitude * u
            }
            CurveForm::Span {
                shape,
                min,
                max,
                cycles,
            } => {
                let base = match shape {
                    RampShape::Ramp => t.clamp(0.0, 1.0),
                    RampShape::Sawtooth => wave::sawtooth(t, *cycles, 0.0),
                    RampShape::Exponential => {
                        let t = t.clamp(0.0, 1.0);
                        if t <= 0.0 {
                            0.0
                        } else {
                            (2.0f64).powf(10.0 * (t - 1.0))
                        }
                    }
                    RampShape::Logarithmic => {
                        let t = t.clamp(0.0, 1.0);
                        (1.0 + 9.0 * t).log10()
                    }
                };
                min + (max - min) * base
            }
            CurveForm::Points { curve } => curve.evaluate(t),
        }
    }

    /// The value range the curve covers, as (low, high).
    pub fn range(&self) -> (f64, f64) {
        match self {
            CurveForm::Flat { value } => (*value, *value),
            CurveForm::CenterAmplitude {
                center, amplitude, ..
            } => {
                let a = amplitude.abs();
                (center - a, center + a)
            }
            CurveForm::Span { min, max, .. } => (min.min(*max), min.max(*max)),
            CurveForm::Points { curve } => curve.range(),
        }
    }

    /// Shift the curve so the offset-centered neutral (0.5) lands on
    /// `base`. This is how a movement shape gets anchored to a pose.
    pub fn recentered(&self, base: f64) -> CurveForm {
        let shift = base - 0.5;
        match self {
            CurveForm::Flat { value } => CurveForm::Flat {
                value: value + shift,
            },
            CurveForm::CenterAmplitude {
                shape,
                center,
                amplitude,
                cycles,
                phase,
            } => CurveForm::CenterAmplitude {
                shape: *shape,
                center: center + shift,
                amplitude: *amplitude,
                cycles: *cycles,
                phase: *phase,
            },
            CurveForm::Span {
                shape,
                min,
                max,
                cycles,
            } => CurveForm::Span {
                shape: *shape,
                min: min + shift,
                max: max + shift,
                cycles: *cycles,
            },
            CurveForm::Points { curve } => CurveForm::Points {
                curve: curve.map(|v| v + shift),
            },
        }
    }

    /// Mirror the curve across the channel midpoint (`v → 1 − v`). Used
    /// for inverted channels; stays within the same family.
    pub fn inverted(&self) -> CurveForm {
        match self {
            CurveForm::Flat { value } => CurveForm::Flat { value: 1.0 - value },
            CurveForm::CenterAmplitude {
                shape,
                center,
                amplitude,
                cycles,
                phase,
            } => CurveForm::CenterAmplitude {
                shape: *shape,
                center: 1.0 - center,
                amplitude: -amplitude,
                cycles: *cycles,
                phase: *phase,
            },
            CurveForm::Span {
                shape,
                min,
                max,
                cycles,
            } => CurveForm::Span {
                shape: *shape,
                min: 1.0 - min,
                max: 1.0 - max,
                cycles: *cycles,
            },
            CurveForm::Points { curve } => CurveForm::Points {
                curve: curve.map(|v| 1.0 - v),
            },
        }
    }

    /// The curve traversed backwards in time. Exact for the
    /// center+amplitude family, flats, points, and straight ramps;
    /// sawtooth and exponential/logarithmic ramps keep their shape with
    /// endpoints swapped.
    pub fn time_reversed(&self) -> CurveForm {
        match self {
            CurveForm::Flat { value } => CurveForm::Flat { value: *value },
            CurveForm::CenterAmplitude {
                shape,
                center,
                amplitude,
                cycles,
                phase,
            } => {
                // sin(c·(1−t)+p) = −sin(c·t − (c+p)); |sin| and the
                // symmetric parabola only need the phase flip.
                let flipped_phase = -(cycles + phase);
                let amplitude = match shape {
                    WaveShape::Sine => -amplitude,
                    WaveShape::AbsSine | WaveShape::Parabola => *amplitude,
                };
                CurveForm::CenterAmplitude {
                    shape: *shape,
                    center: *center,
                    amplitude,
                    cycles: *cycles,
                    phase: flipped_phase,
                }
            }
            CurveForm::Span {
                shape,
                min,
                max,
                cycles,
            } => CurveForm::Span {
                shape: *shape,
                min: *max,
                max: *min,
                cycles: *cycles,
            },
            CurveForm::Points { curve } => CurveForm::Points {
                curve: curve.time_reversed(),
            },
        }
    }
}
