//! Channel mapping and curve tuning: logical channels onto a fixture's
//! DMX patch, and parametric curves into device limits without
//! resampling.

use serde::{Deserialize, Serialize};

use crate::curves::CurveForm;
use crate::model::rig::ChannelMap;
use crate::model::{BlendMode, DmxAddress, FixtureId, LogicalChannel, NormBounds};
use crate::schedule::TimeSpan;

/// DMX-domain clamp bounds for one output segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmxBounds {
    pub floor: u8,
    pub ceiling: u8,
}

impl DmxBounds {
    pub const FULL: DmxBounds = DmxBounds {
        floor: 0,
        ceiling: 255,
    };

    fn from_norm(bounds: NormBounds) -> Self {
        Self {
            floor: norm_to_dmx(bounds.floor),
            ceiling: norm_to_dmx(bounds.ceiling),
        }
    }
}

/// Convert a normalized value to a DMX byte, clamped to [0, 255].
pub fn norm_to_dmx(v: f64) -> u8 {
    let scaled = (v * 255.0).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= 255.0 {
        255
    } else {
        scaled as u8
    }
}

/// What one output segment carries: a held value or a curve. Curves stay
/// normalized to [0, 1] of the channel's travel; the exporter scales by
/// 255 and clamps to the segment's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelValue {
    Static(u8),
    Curve(CurveForm),
}

/// The final output unit: one fixture, one channel, one time span.
/// The sole artifact the file-format exporter consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEffect {
    pub fixture: FixtureId,
    pub channel: LogicalChannel,
    pub address: DmxAddress,
    pub span: TimeSpan,
    pub value: ChannelValue,
    pub bounds: DmxBounds,
    pub blend: BlendMode,
}

impl CurveForm {
    /// Does the curve already sit inside [floor, ceiling]?
    pub fn fits(&self, floor: f64, ceiling: f64) -> bool {
        let (lo, hi) = self.range();
        lo >= floor - 1e-9 && hi <= ceiling + 1e-9
    }

    /// Refit curve parameters so the value range sits inside
    /// [floor, ceiling], preserving the shape and never resampling.
    ///
    /// A curve that already fits is returned unchanged (tuning is
    /// idempotent). Center+amplitude curves wider than the window are
    /// refit to exactly fill it; narrower ones are shifted the minimal
    /// distance in. Span curves clamp their endpoints independently;
    /// flats clamp the value. Point curves are generated in [0, 1] and
    /// scaled once into [floor, ceiling] - never clipped.
    pub fn tuned(&self, floor: f64, ceiling: f64) -> CurveForm {
        let (floor, ceiling) = if floor <= ceiling {
            (floor, ceiling)
        } else {
            (ceiling, floor)
        };
        if self.fits(floor, ceiling) {
            return self.clone();
        }
        match self {
            CurveForm::Flat { value } => CurveForm::Flat {
                value: value.clamp(floor, ceiling),
            },
            CurveForm::CenterAmplitude {
                shape,
                center,
                amplitude,
                cycles,
                phase,
            } => {
                let half_window = (ceiling - floor) / 2.0;
                let magnitude = amplitude.abs();
                let (new_center, new_magnitude) = if magnitude >= half_window {
                    (floor + half_window, half_window)
                } else {
                    (
                        center.clamp(floor + magnitude, ceiling - magnitude),
                        magnitude,
                    )
                };
                CurveForm::CenterAmplitude {
                    shape: *shape,
                    center: new_center,
                    amplitude: new_magnitude.copysign(*amplitude),
                    cycles: *cycles,
                    phase: *phase,
                }
            }
            CurveForm::Span {
                shape,
                min,
                max,
                cycles,
            } => CurveForm::Span {
                shape: *shape,
                min: min.clamp(floor, ceiling),
                max: max.clamp(floor, ceiling),
                cycles: *cycles,
            },
            CurveForm::Points { curve } => CurveForm::Points {
                curve: curve.map(|v| floor + v * (ceiling - floor)),
            },
        }
    }
}

/// Map one resolved channel curve onto a fixture's patch.
///
/// Returns None when the fixture simply doesn't have the channel - not
/// every fixture has every channel, so this is a skip, not an error.
/// Applies declared inversion (value → 255 − value, in curve space
/// v → 1 − v) and clamps bounds to [0, 255] after inversion.
pub fn map_channel(
    fixture: &FixtureId,
    channels: &ChannelMap,
    channel: LogicalChannel,
    span: TimeSpan,
    form: &CurveForm,
    bounds: NormBounds,
    blend: BlendMode,
) -> Option<RenderedEffect> {
    let address = channels.address(channel)?;

    let tuned = form.tuned(bounds.floor, bounds.ceiling);
    let (tuned, bounds) = if channels.is_inverted(channel) {
        (
            tuned.inverted(),
            NormBounds {
                floor: 1.0 - bounds.ceiling,
                ceiling: 1.0 - bounds.floor,
            },
        )
    } else {
        (tuned, bounds)
    };

    let value = match tuned {
        CurveForm::Flat { value } => ChannelValue::Static(norm_to_dmx(value)),
        other => ChannelValue::Curve(other),
    };

    Some(RenderedEffect {
        fixture: fixture.clone(),
        channel,
        address,
        span,
        value,
        bounds: DmxBounds::from_norm(bounds),
        blend,
    })
}
