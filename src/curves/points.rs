use serde::{Deserialize, Serialize};

/// A curve stored as uniformly spaced samples over normalized time,
/// values in [0, 1]. The explicit-point fallback for shapes with no
/// small parametric form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampledCurveRaw")]
pub struct SampledCurve {
    samples: Vec<f64>,
}

#[derive(Deserialize)]
struct SampledCurveRaw {
    samples: Vec<f64>,
}

impl TryFrom<SampledCurveRaw> for SampledCurve {
    type Error = String;
    fn try_from(raw: SampledCurveRaw) -> Result<Self, String> {
        SampledCurve::from_samples(raw.samples)
            .ok_or_else(|| "SampledCurve requires at least 2 samples".to_owned())
    }
}

impl SampledCurve {
    /// Build from raw samples. Requires at least 2; values are clamped
    /// into [0, 1].
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        for v in &mut samples {
            *v = v.clamp(0.0, 1.0);
        }
        Some(Self { samples })
    }

    /// Sample a function at `count` evenly spaced positions over [0, 1].
    pub fn from_fn(count: usize, f: impl Fn(f64) -> f64) -> Option<Self> {
        if count < 2 {
            return None;
        }
        let last = (count - 1) as f64;
        let samples = (0..count).map(|i| f(i as f64 / last)).collect();
        Self::from_samples(samples)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn first(&self) -> f64 {
        self.samples.first().copied().unwrap_or(0.0)
    }

    pub fn last(&self) -> f64 {
        self.samples.last().copied().unwrap_or(0.0)
    }

    /// Smallest and largest sample.
    pub fn range(&self) -> (f64, f64) {
        self.samples.iter().fold((1.0, 0.0), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
    }

    /// Evaluate at normalized time `t` (clamped), interpolating linearly
    /// between neighboring samples.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let last = (self.samples.len() - 1) as f64;
        let pos = t * last;
        let idx = pos.floor() as usize;
        let a = self.samples.get(idx).copied().unwrap_or(0.0);
        let b = self.samples.get(idx + 1).copied().unwrap_or(a);
        let frac = pos - pos.floor();
        a + (b - a) * frac
    }

    /// Apply a pointwise transform, re-clamping into [0, 1].
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            samples: self.samples.iter().map(|&v| f(v).clamp(0.0, 1.0)).collect(),
        }
    }

    /// The same curve traversed backwards in time.
    pub fn time_reversed(&self) -> Self {
        let mut samples = self.samples.clone();
        samples.reverse();
        Self { samples }
    }
}
