use crate::curves::form::WaveShape;
use crate::curves::{wave, CurveForm, SampledCurve};
use crate::model::{Direction, PatternId, PatternParams};

use super::catalog::PatternCatalog;
use super::{HandlerNotFound, RegistryKind};

/// A movement resolved to per-axis curves in the offset-centered
/// convention: 0.5 is the neutral pose, amplitude swings around it. The
/// channel mapper recenters onto the step's actual pose later.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementShape {
    pub pan: CurveForm,
    pub tilt: CurveForm,
}

impl MovementShape {
    fn still() -> Self {
        Self {
            pan: CurveForm::flat(0.5),
            tilt: CurveForm::flat(0.5),
        }
    }
}

/// Built-in movement patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementHandler {
    /// Side-to-side pan sweep.
    Sweep,
    /// Pan/tilt a quarter cycle apart: a circle.
    Circle,
    /// Tilt runs twice per pan cycle: a lying eight.
    Figure8,
    /// Vertical bounce off the bottom of the travel.
    Bounce,
    /// Gentle vertical nod.
    Nod,
    /// Slow triangular pan drift.
    Sway,
    /// Compound pan roll with a tilt lift.
    Wave,
    /// No movement at all.
    Still,
}

impl MovementHandler {
    pub const BUILTIN_IDS: [&'static str; 8] = [
        "sweep", "circle", "figure8", "bounce", "nod", "sway", "wave", "still",
    ];

    pub fn from_id(id: &PatternId) -> Option<Self> {
        match id.0.as_str() {
            "sweep" => Some(Self::Sweep),
            "circle" => Some(Self::Circle),
            "figure8" => Some(Self::Figure8),
            "bounce" => Some(Self::Bounce),
            "nod" => Some(Self::Nod),
            "sway" => Some(Self::Sway),
            "wave" => Some(Self::Wave),
            "still" => Some(Self::Still),
            _ => None,
        }
    }

    /// Generate the per-axis curves. `level` scales amplitude (an
    /// intensity token already resolved to a number); `sample_count`
    /// only matters for shapes that need explicit points.
    pub fn generate(
        self,
        params: &PatternParams,
        sample_count: usize,
        cycles: f64,
        level: f64,
    ) -> MovementShape {
        let cycles = if cycles > 0.0 { cycles } else { 1.0 };
        let phase = params.phase_or(0.0);
        // Half-travel at full level; width/height trim per-axis reach.
        let pan_amp = 0.5 * level * params.width_or(1.0);
        let tilt_amp = 0.5 * level * params.height_or(1.0);

        let sine = |amplitude: f64, cycles: f64, phase: f64| CurveForm::CenterAmplitude {
            shape: WaveShape::Sine,
            center: 0.5,
            amplitude,
            cycles,
            phase,
        };
        let abs_sine = |amplitude: f64, cycles: f64| CurveForm::CenterAmplitude {
            shape: WaveShape::AbsSine,
            center: 0.5,
            amplitude,
            cycles,
            phase,
        };

        let shape = match self {
            Self::Sweep => MovementShape {
                pan: sine(pan_amp, cycles, phase),
                tilt: CurveForm::flat(0.5),
            },
            Self::Circle => MovementShape {
                pan: sine(pan_amp, cycles, phase),
                tilt: sine(tilt_amp, cycles, phase + 0.25),
            },
            Self::Figure8 => MovementShape {
                pan: sine(pan_amp, cycles, phase),
                tilt: sine(tilt_amp, cycles * 2.0, phase),
            },
            Self::Bounce => MovementShape {
                pan: CurveForm::flat(0.5),
                tilt: abs_sine(tilt_amp, cycles),
            },
            Self::Nod => MovementShape {
                pan: CurveForm::flat(0.5),
                tilt: sine(tilt_amp, cycles, phase),
            },
            Self::Sway => {
                // Triangle has no parametric family; emit points.
                let pan = SampledCurve::from_fn(sample_count.max(2), |t| {
                    wave::scale_about_neutral(
                        wave::triangle(t, cycles, phase),
                        (2.0 * pan_amp).min(1.0),
                    )
                })
                .map(|curve| CurveForm::Points { curve })
                .unwrap_or_else(|| CurveForm::flat(0.5));
                MovementShape {
                    pan,
                    tilt: CurveForm::flat(0.5),
                }
            }
            Self::Wave => MovementShape {
                pan: sine(pan_amp, cycles, phase),
                tilt: abs_sine(tilt_amp * 0.5, cycles),
            },
            Self::Still => MovementShape::still(),
        };

        match params.direction_or(Direction::Forward) {
            Direction::Forward => shape,
            Direction::Reverse => MovementShape {
                pan: shape.pan.time_reversed(),
                tilt: shape.tilt.time_reversed(),
            },
        }
    }
}

/// Movement registry: built-ins first, catalog as the default fallback.
pub struct MovementRegistry<'a> {
    catalog: &'a PatternCatalog,
}

impl<'a> MovementRegistry<'a> {
    pub fn new(catalog: &'a PatternCatalog) -> Self {
        Self { catalog }
    }

    pub fn generate(
        &self,
        id: &PatternId,
        params: &PatternParams,
        sample_count: usize,
        cycles: f64,
        level: f64,
    ) -> Result<MovementShape, HandlerNotFound> {
        if let Some(handler) = MovementHandler::from_id(id) {
            return Ok(handler.generate(params, sample_count, cycles, level));
        }
        if let Some(entry) = self.catalog.movement(id) {
            let merged = entry.params.merged_with(params);
            return Ok(entry.handler.generate(&merged, sample_count, cycles, level));
        }
        Err(HandlerNotFound {
            kind: RegistryKind::Movement,
            id: id.clone(),
            known: self.known_ids(),
        })
    }

    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = MovementHandler::BUILTIN_IDS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        ids.extend(self.catalog.movement_ids().map(|id| id.0.clone()));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sweep_pans_and_holds_tilt() {
        let shape =
            MovementHandler::Sweep.generate(&PatternParams::default(), 32, 1.0, 0.5);
        assert!(approx(shape.pan.evaluate(0.0), 0.5));
        assert!(approx(shape.pan.evaluate(0.25), 0.75));
        assert!(approx(shape.tilt.evaluate(0.25), 0.5));
        assert_eq!(shape.pan.range(), (0.25, 0.75));
    }

    #[test]
    fn circle_offsets_tilt_a_quarter_cycle() {
        let shape =
            MovementHandler::Circle.generate(&PatternParams::default(), 32, 1.0, 1.0);
        // Tilt leads: at t=0 it sits at its peak while pan is neutral.
        assert!(approx(shape.pan.evaluate(0.0), 0.5));
        assert!(approx(shape.tilt.evaluate(0.0), 1.0));
    }

    #[test]
    fn intensity_scales_amplitude() {
        let subtle =
            MovementHandler::Sweep.generate(&PatternParams::default(), 32, 1.0, 0.25);
        let strong =
            MovementHandler::Sweep.generate(&PatternParams::default(), 32, 1.0, 0.85);
        let (s_lo, s_hi) = subtle.pan.range();
        let (g_lo, g_hi) = strong.pan.range();
        assert!(g_hi - g_lo > s_hi - s_lo);
    }

    #[test]
    fn sway_emits_explicit_points() {
        let shape =
            MovementHandler::Sway.generate(&PatternParams::default(), 16, 1.0, 0.5);
        assert!(matches!(shape.pan, CurveForm::Points { .. }));
    }

    #[test]
    fn reverse_direction_plays_backwards() {
        let params = PatternParams {
            direction: Some(Direction::Reverse),
            ..PatternParams::default()
        };
        let fwd = MovementHandler::Sweep.generate(&PatternParams::default(), 32, 1.0, 0.5);
        let rev = MovementHandler::Sweep.generate(&params, 32, 1.0, 0.5);
        for t in [0.0, 0.2, 0.7, 1.0] {
            assert!(approx(rev.pan.evaluate(t), fwd.pan.evaluate(1.0 - t)));
        }
    }

    #[test]
    fn sweep_is_loop_ready_for_whole_cycles() {
        let shape =
            MovementHandler::Sweep.generate(&PatternParams::default(), 32, 2.0, 0.5);
        assert!(approx(shape.pan.evaluate(0.0), shape.pan.evaluate(1.0)));
    }

    #[test]
    fn registry_reports_unknown_patterns() {
        let catalog = PatternCatalog::standard();
        let registry = MovementRegistry::new(&catalog);
        let err = registry
            .generate(&"teleport".into(), &PatternParams::default(), 32, 1.0, 0.5)
            .unwrap_err();
        assert_eq!(err.kind, RegistryKind::Movement);
        assert!(err.known.iter().any(|k| k == "sweep"));
    }
}
