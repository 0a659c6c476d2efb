use crate::curves::form::{RampShape, WaveShape};
use crate::curves::{envelope, noise, CurveForm, SampledCurve};
use crate::model::{PatternId, PatternParams};

use super::catalog::PatternCatalog;
use super::{HandlerNotFound, RegistryKind};

/// A resolved dimmer curve. Unlike movement, dimmer values are absolute:
/// the curve already lives inside the step's [min, max] window.
#[derive(Debug, Clone, PartialEq)]
pub struct DimmerShape {
    pub curve: CurveForm,
}

/// Built-in dimmer patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DimmerHandler {
    /// Steady level for the whole step.
    Hold,
    /// On-beat bump: sharp attack, eased decay.
    Pulse,
    /// Slow sinusoidal rise and fall.
    Breathe,
    /// Hard on/off flashes.
    Strobe,
    RampUp,
    RampDown,
    /// Noise-driven shimmer.
    Flicker,
}

impl DimmerHandler {
    pub const BUILTIN_IDS: [&'static str; 7] = [
        "hold", "pulse", "breathe", "strobe", "ramp_up", "ramp_down", "flicker",
    ];

    pub fn from_id(id: &PatternId) -> Option<Self> {
        match id.0.as_str() {
            "hold" => Some(Self::Hold),
            "pulse" => Some(Self::Pulse),
            "breathe" => Some(Self::Breathe),
            "strobe" => Some(Self::Strobe),
            "ramp_up" => Some(Self::RampUp),
            "ramp_down" => Some(Self::RampDown),
            "flicker" => Some(Self::Flicker),
            _ => None,
        }
    }

    /// Generate the dimmer curve inside `[min, max]`, with `level`
    /// (an intensity token already resolved to a number) scaling how
    /// much of that window the pattern actually uses.
    pub fn generate(
        self,
        params: &PatternParams,
        sample_count: usize,
        cycles: f64,
        level: f64,
        min: f64,
        max: f64,
    ) -> DimmerShape {
        let cycles = if cycles > 0.0 { cycles } else { 1.0 };
        let min = min.clamp(0.0, 1.0);
        let max = max.clamp(0.0, 1.0).max(min);
        let hi = min + (max - min) * level.clamp(0.0, 1.0);
        let span = hi - min;

        let points = |f: &dyn Fn(f64) -> f64| {
            SampledCurve::from_fn(sample_count.max(2), |t| min + span * f(t))
                .map(|curve| CurveForm::Points { curve })
                .unwrap_or_else(|| CurveForm::flat(min))
        };

        let curve = match self {
            Self::Hold => CurveForm::flat(hi),
            Self::Pulse => {
                let attack = params.duty_cycle_or(0.15);
                points(&|t| envelope::beat_pulse(t, cycles, attack))
            }
            Self::Breathe => CurveForm::CenterAmplitude {
                shape: WaveShape::Sine,
                center: (min + hi) / 2.0,
                amplitude: span / 2.0,
                cycles,
                // Start dark so the breath swells in.
                phase: -0.25,
            },
            Self::Strobe => {
                let rate = params.rate_or(cycles.max(4.0));
                let duty = params.duty_cycle_or(0.5);
                points(&|t| envelope::gate(t, rate, duty))
            }
            Self::RampUp => CurveForm::Span {
                shape: RampShape::Ramp,
                min,
                max: hi,
                cycles,
            },
            Self::RampDown => CurveForm::Span {
                shape: RampShape::Ramp,
                min: hi,
                max: min,
                cycles,
            },
            Self::Flicker => {
                let seed = params.seed_or(0x5EED);
                let grain = params.rate_or(cycles * 8.0);
                points(&|t| noise::value_noise(t, grain, seed))
            }
        };

        DimmerShape { curve }
    }
}

/// Dimmer registry: built-ins first, catalog as the default fallback.
pub struct DimmerRegistry<'a> {
    catalog: &'a PatternCatalog,
}

impl<'a> DimmerRegistry<'a> {
    pub fn new(catalog: &'a PatternCatalog) -> Self {
        Self { catalog }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        id: &PatternId,
        params: &PatternParams,
        sample_count: usize,
        cycles: f64,
        level: f64,
        min: f64,
        max: f64,
    ) -> Result<DimmerShape, HandlerNotFound> {
        if let Some(handler) = DimmerHandler::from_id(id) {
            return Ok(handler.generate(params, sample_count, cycles, level, min, max));
        }
        if let Some(entry) = self.catalog.dimmer(id) {
            let merged = entry.params.merged_with(params);
            return Ok(entry
                .handler
                .generate(&merged, sample_count, cycles, level, min, max));
        }
        Err(HandlerNotFound {
            kind: RegistryKind::Dimmer,
            id: id.clone(),
            known: self.known_ids(),
        })
    }

    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = DimmerHandler::BUILTIN_IDS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        ids.extend(self.catalog.dimmer_ids().map(|id| id.0.clone()));
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
    fn hold_sits_at_scaled_ceiling() {
        let shape =
            DimmerHandler::Hold.generate(&PatternParams::default(), 32, 1.0, 0.5, 0.0, 1.0);
        assert!(approx(shape.curve.evaluate(0.3), 0.5));
    }

    #[test]
    fn breathe_stays_inside_window() {
        let shape =
            DimmerHandler::Breathe.generate(&PatternParams::default(), 32, 2.0, 1.0, 0.2, 0.8);
        let (lo, hi) = shape.curve.range();
        assert!(approx(lo, 0.2));
        assert!(approx(hi, 0.8));
        // Starts at the bottom of the breath.
        assert!(approx(shape.curve.evaluate(0.0), 0.2));
    }

    #[test]
    fn ramps_travel_the_window() {
        let up = DimmerHandler::RampUp.generate(&PatternParams::default(), 32, 1.0, 1.0, 0.1, 0.9);
        assert!(approx(up.curve.evaluate(0.0), 0.1));
        assert!(approx(up.curve.evaluate(1.0), 0.9));
        let down =
            DimmerHandler::RampDown.generate(&PatternParams::default(), 32, 1.0, 1.0, 0.1, 0.9);
        assert!(approx(down.curve.evaluate(0.0), 0.9));
        assert!(approx(down.curve.evaluate(1.0), 0.1));
    }

    #[test]
    fn strobe_emits_points() {
        let shape =
            DimmerHandler::Strobe.generate(&PatternParams::default(), 64, 4.0, 1.0, 0.0, 1.0);
        assert!(matches!(shape.curve, CurveForm::Points { .. }));
    }

    #[test]
    fn flicker_is_deterministic() {
        let a = DimmerHandler::Flicker.generate(&PatternParams::default(), 32, 1.0, 1.0, 0.0, 1.0);
        let b = DimmerHandler::Flicker.generate(&PatternParams::default(), 32, 1.0, 1.0, 0.0, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn inverted_window_collapses_not_panics() {
        // max below min clamps up to min: a flat zero-span window.
        let shape =
            DimmerHandler::Hold.generate(&PatternParams::default(), 32, 1.0, 1.0, 0.6, 0.2);
        assert!(approx(shape.curve.evaluate(0.5), 0.6));
    }

    #[test]
    fn registry_reports_unknown_patterns() {
        let catalog = PatternCatalog::standard();
        let registry = DimmerRegistry::new(&catalog);
        let err = registry
            .generate(
                &"supernova".into(),
                &PatternParams::default(),
                32,
                1.0,
                0.5,
                0.0,
                1.0,
            )
            .unwrap_err();
        assert_eq!(err.kind, RegistryKind::Dimmer);
        assert!(err.known.iter().any(|k| k == "breathe"));
    }
}
