//! What a compilation run hands back besides the segments themselves:
//! skipped-instruction diagnostics and advisory warnings, as data rather
//! than side-channel logging.

use serde::Serialize;

use crate::channels::RenderedEffect;
use crate::model::{FixtureId, LogicalChannel, StepId, TemplateId};

/// One instruction that could not be resolved and was skipped. The rest
/// of the run proceeds; these accumulate so the caller can see exactly
/// what fell out and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedInstruction {
    pub section: String,
    pub template: TemplateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<LogicalChannel>,
    pub reason: String,
}

/// Advisory findings. Informational only - none of these ever block
/// output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// A movement axis exceeds the configured maximum angular speed.
    AngularSpeed {
        fixture: FixtureId,
        channel: LogicalChannel,
        at_ms: f64,
        speed_deg_per_s: f64,
        limit_deg_per_s: f64,
    },
    /// A movement axis exceeds the configured maximum angular
    /// acceleration.
    AngularAcceleration {
        fixture: FixtureId,
        channel: LogicalChannel,
        at_ms: f64,
        accel_deg_per_s2: f64,
        limit_deg_per_s2: f64,
    },
    /// The segment keeps moving too close to its end for the head to
    /// settle before whatever comes next.
    SettleTime {
        fixture: FixtureId,
        channel: LogicalChannel,
        end_ms: f64,
        required_ms: f64,
        observed_ms: f64,
    },
    /// A looped curve does not end where it began.
    LoopDiscontinuity {
        fixture: FixtureId,
        step: StepId,
        channel: LogicalChannel,
        delta: f64,
        threshold: f64,
    },
    /// A tuned dimmer window collapsed to nearly nothing.
    LimitedDynamicRange {
        fixture: FixtureId,
        step: StepId,
        span: f64,
        threshold: f64,
    },
}

/// The complete result of a compilation run.
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    /// Flat, fixture-agnostic list of output segments, ordered by rig
    /// fixture order, then start time, then channel.
    pub effects: Vec<RenderedEffect>,
    /// Recorded section/step adjacencies, handy for exporters that mark
    /// cue points.
    pub boundaries: Vec<crate::timeline::Boundary>,
    pub skipped: Vec<SkippedInstruction>,
    pub warnings: Vec<Advisory>,
}
