//! Advisory physics checks: can the hardware actually do what the
//! timeline asks? Violations are reported, never enforced.

use serde::{Deserialize, Serialize};

use crate::channels::{ChannelValue, RenderedEffect};
use crate::report::Advisory;

/// Mechanical limits to check movement channels against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsLimits {
    pub max_speed_deg_per_s: f64,
    pub max_accel_deg_per_s2: f64,
    /// How long the head needs to be still before a segment ends.
    pub min_settle_ms: f64,
}

impl Default for PhysicsLimits {
    fn default() -> Self {
        Self {
            max_speed_deg_per_s: 360.0,
            max_accel_deg_per_s2: 2400.0,
            min_settle_ms: 100.0,
        }
    }
}

/// Movement below this many degrees between samples counts as "still".
const STILL_EPSILON_DEG: f64 = 0.1;

/// Check one movement-channel segment against the limits.
///
/// `degree_range` is the physical span of the channel's full normalized
/// travel. At most one warning per metric is emitted per segment (the
/// worst offender), so a fast sweep doesn't flood the report.
pub fn validate_effect(
    effect: &RenderedEffect,
    degree_range: f64,
    limits: &PhysicsLimits,
    samples: usize,
) -> Vec<Advisory> {
    let curve = match &effect.value {
        ChannelValue::Curve(form) => form,
        // A held value cannot violate motion limits.
        ChannelValue::Static(_) => return Vec::new(),
    };

    let n = samples.max(3);
    let duration_s = effect.span.duration_ms() / 1000.0;
    if duration_s <= 0.0 {
        return Vec::new();
    }
    let dt = duration_s / (n - 1) as f64;

    let degrees: Vec<f64> = (0..n)
        .map(|i| curve.evaluate(i as f64 / (n - 1) as f64) * degree_range)
        .collect();

    let velocities: Vec<f64> = degrees
        .windows(2)
        .map(|pair| match pair {
            [a, b] => (b - a) / dt,
            _ => 0.0,
        })
        .collect();

    let mut warnings = Vec::new();

    let mut worst_speed: Option<(usize, f64)> = None;
    for (i, v) in velocities.iter().enumerate() {
        let speed = v.abs();
        if speed > limits.max_speed_deg_per_s
            && worst_speed.is_none_or(|(_, s)| speed > s)
        {
            worst_speed = Some((i, speed));
        }
    }
    if let Some((i, speed)) = worst_speed {
        warnings.push(Advisory::AngularSpeed {
            fixture: effect.fixture.clone(),
            channel: effect.channel,
            at_ms: effect.span.start_ms() + i as f64 * dt * 1000.0,
            speed_deg_per_s: speed,
            limit_deg_per_s: limits.max_speed_deg_per_s,
        });
    }

    let mut worst_accel: Option<(usize, f64)> = None;
    for (i, pair) in velocities.windows(2).enumerate() {
        if let [v0, v1] = pair {
            let accel = ((v1 - v0) / dt).abs();
            if accel > limits.max_accel_deg_per_s2
                && worst_accel.is_none_or(|(_, a)| accel > a)
            {
                worst_accel = Some((i, accel));
            }
        }
    }
    if let Some((i, accel)) = worst_accel {
        warnings.push(Advisory::AngularAcceleration {
            fixture: effect.fixture.clone(),
            channel: effect.channel,
            at_ms: effect.span.start_ms() + (i + 1) as f64 * dt * 1000.0,
            accel_deg_per_s2: accel,
            limit_deg_per_s2: limits.max_accel_deg_per_s2,
        });
    }

    // Settle: how long before the segment end does motion stop?
    let last_moving = degrees
        .windows(2)
        .rposition(|pair| match pair {
            [a, b] => (b - a).abs() > STILL_EPSILON_DEG,
            _ => false,
        });
    if let Some(idx) = last_moving {
        let observed_ms = (n - 2 - idx) as f64 * dt * 1000.0;
        if observed_ms < limits.min_settle_ms {
            warnings.push(Advisory::SettleTime {
                fixture: effect.fixture.clone(),
                channel: effect.channel,
                end_ms: effect.span.end_ms(),
                required_ms: limits.min_settle_ms,
                observed_ms,
            });
        }
    }

    warnings
}
