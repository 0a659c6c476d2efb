use std::fmt;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::beat::Quantize;
use super::rig::{FixtureId, GroupName, LogicalChannel, OrderName};

/// Newtype for template identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Newtype for step identity within a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Newtype for role identity (declared per template, bound to a group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(pub String);

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Newtype for pattern identity (geometry/movement/dimmer handler lookup).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub String);

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PatternId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// What a step aims at: the whole rig, a named group, a declared role,
/// or one specific fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetToken {
    All,
    Group(GroupName),
    Role(RoleName),
    Fixture(FixtureId),
}

/// How an output segment combines with whatever else lands on the same
/// channel. Carried through to the exporter, never applied internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Top layer fully replaces the layer below.
    #[default]
    Override,
    /// Additive blend (clamped at 255 per channel).
    Add,
    /// Per-channel maximum.
    Max,
    /// Per-channel average.
    Average,
}

/// Author-facing energy level. Unknown tokens deserialize to `Unknown`,
/// which resolves to the same level as `Medium` - template authoring
/// stays forgiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Subtle,
    #[default]
    Medium,
    Strong,
    #[serde(other)]
    Unknown,
}

impl Intensity {
    /// Normalized amplitude scale for this level.
    pub fn level(self) -> f64 {
        match self {
            Intensity::Subtle => 0.25,
            Intensity::Medium | Intensity::Unknown => 0.5,
            Intensity::Strong => 0.85,
        }
    }
}

/// Traversal direction for directional patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// The closed set of optional knobs a pattern handler may read.
/// Validated once at template load, never re-parsed per access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    /// Horizontal extent of a pose or figure, normalized.
    pub width: Option<f64>,
    /// Vertical extent of a pose or figure, normalized.
    pub height: Option<f64>,
    /// Pan anchor of the pose, normalized.
    pub center_pan: Option<f64>,
    /// Tilt anchor of the pose, normalized.
    pub center_tilt: Option<f64>,
    pub direction: Option<Direction>,
    /// Phase shift in cycles.
    pub phase: Option<f64>,
    /// Gate/flash rate in cycles over the step.
    pub rate: Option<f64>,
    /// On-fraction of each gate cycle.
    pub duty_cycle: Option<f64>,
    /// Seed for noise-based patterns.
    pub seed: Option<u64>,
}

impl PatternParams {
    pub fn width_or(&self, default: f64) -> f64 {
        self.width.unwrap_or(default)
    }

    pub fn height_or(&self, default: f64) -> f64 {
        self.height.unwrap_or(default)
    }

    pub fn center_pan_or(&self, default: f64) -> f64 {
        self.center_pan.unwrap_or(default)
    }

    pub fn center_tilt_or(&self, default: f64) -> f64 {
        self.center_tilt.unwrap_or(default)
    }

    pub fn direction_or(&self, default: Direction) -> Direction {
        self.direction.unwrap_or(default)
    }

    pub fn phase_or(&self, default: f64) -> f64 {
        self.phase.unwrap_or(default)
    }

    pub fn rate_or(&self, default: f64) -> f64 {
        self.rate.unwrap_or(default)
    }

    pub fn duty_cycle_or(&self, default: f64) -> f64 {
        self.duty_cycle.unwrap_or(default)
    }

    pub fn seed_or(&self, default: u64) -> u64 {
        self.seed.unwrap_or(default)
    }

    /// Right-biased merge: fields set on `over` win.
    pub fn merged_with(&self, over: &PatternParams) -> PatternParams {
        PatternParams {
            width: over.width.or(self.width),
            height: over.height.or(self.height),
            center_pan: over.center_pan.or(self.center_pan),
            center_tilt: over.center_tilt.or(self.center_tilt),
            direction: over.direction.or(self.direction),
            phase: over.phase.or(self.phase),
            rate: over.rate.or(self.rate),
            duty_cycle: over.duty_cycle.or(self.duty_cycle),
            seed: over.seed.or(self.seed),
        }
    }
}

/// Static pose resolution spec: which pose pattern and its knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySpec {
    pub pattern: PatternId,
    #[serde(default)]
    pub params: PatternParams,
}

/// Time-varying pan/tilt spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSpec {
    pub pattern: PatternId,
    #[serde(default)]
    pub intensity: Intensity,
    /// Full traversals of the figure over the step duration.
    #[serde(default = "default_cycles")]
    pub cycles: f64,
    #[serde(default)]
    pub params: PatternParams,
}

/// Time-varying dimmer spec. Output is confined to `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimmerSpec {
    pub pattern: PatternId,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_dimmer_max")]
    pub max: f64,
    #[serde(default = "default_cycles")]
    pub cycles: f64,
    #[serde(default)]
    pub params: PatternParams,
}

fn default_cycles() -> f64 {
    1.0
}

fn default_dimmer_max() -> f64 {
    1.0
}

/// How a boundary between segments is bridged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Jump at the boundary, no motion in between.
    Snap,
    /// Eased move from the previous anchor to the next.
    Crossfade,
    /// Dip through the neutral pose with the dimmer pulled down.
    FadeThroughNeutral,
}

/// A transition request attached to a step's entry or exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub mode: TransitionMode,
    pub duration_bars: f64,
}

/// How phase offsets are distributed across a fixture group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    #[default]
    None,
    GroupOrder,
}

/// Distribution shape for phase offsets. Linear is the only shape today;
/// the enum keeps the wire format open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionShape {
    #[default]
    Linear,
}

/// Per-fixture start-time shifts that turn one step into a chase.
///
/// Offsets are computed in the spread's own unit and wrapped after
/// scaling: `wrap=false` gives `i/(n-1)·spread` with the endpoint
/// inclusive; `wrap=true` gives `(i·spread/n) mod spread`, half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOffsetSpec {
    #[serde(default)]
    pub mode: PhaseMode,
    #[serde(default)]
    pub group: Option<GroupName>,
    #[serde(default)]
    pub order: Option<OrderName>,
    #[serde(default)]
    pub spread_bars: f64,
    #[serde(default)]
    pub shape: DistributionShape,
    #[serde(default)]
    pub wrap: bool,
}

/// Bar-relative placement of a step inside its section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTiming {
    /// Offset from the section start, in bars.
    #[serde(default)]
    pub start_bar: f64,
    pub duration_bars: f64,
    #[serde(default)]
    pub quantize: Quantize,
    #[serde(default)]
    pub phase_offset: Option<PhaseOffsetSpec>,
}

/// Repeat traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Always replay forward from the first loop step.
    #[default]
    Joiner,
    /// Alternate forward/backward traversal each cycle.
    PingPong,
}

/// What happens to the partial final cycle of a repeat window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Freeze the last resolved pose/value for the remaining time.
    #[default]
    HoldLastPose,
    /// Hold position, ramp dimmer linearly to zero over the remainder.
    FadeOut,
    /// End early, leaving the remainder to gap resolution.
    Truncate,
}

/// The policy governing how a template loops to fill a longer window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepeatContract {
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub mode: RepeatMode,
    #[serde(default)]
    pub cycle_bars: f64,
    #[serde(default)]
    pub loop_steps: Vec<StepId>,
    #[serde(default)]
    pub remainder: RemainderPolicy,
}

/// Normalized floor/ceiling pair for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for NormBounds {
    fn default() -> Self {
        Self {
            floor: 0.0,
            ceiling: 1.0,
        }
    }
}

/// Advisory metadata carried on a template. Never drives scheduling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateMetadata {
    /// Expected energy range of the look, 0–1.
    pub energy: Option<(f64, f64)>,
    pub tags: Vec<String>,
}

/// One scheduled unit within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub target: TargetToken,
    pub timing: BaseTiming,
    pub geometry: GeometrySpec,
    #[serde(default)]
    pub movement: Option<MovementSpec>,
    #[serde(default)]
    pub dimmer: Option<DimmerSpec>,
    #[serde(default)]
    pub entry: Option<TransitionSpec>,
    #[serde(default)]
    pub exit: Option<TransitionSpec>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub blend: BlendMode,
}

/// Everything invalid a template's content can be. Distinct from the
/// library's not-found/load failures.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum TemplateError {
    #[error("template `{template}` declares no steps")]
    EmptySteps { template: TemplateId },
    #[error("template `{template}` declares step `{step}` more than once")]
    DuplicateStepId { template: TemplateId, step: StepId },
    #[error("template `{template}` step `{step}`: {reason}")]
    BadTiming {
        template: TemplateId,
        step: StepId,
        reason: String,
    },
    #[error("template `{template}` step `{step}`: group-order phase offset requires a group")]
    PhaseOffsetMissingGroup { template: TemplateId, step: StepId },
    #[error("template `{template}` step `{step}`: group-order phase offset requires an order")]
    PhaseOffsetMissingOrder { template: TemplateId, step: StepId },
    #[error("template `{template}` is repeatable but declares no loop steps")]
    MissingLoopSteps { template: TemplateId },
    #[error("template `{template}` loops unknown step `{step}`")]
    UnknownLoopStep { template: TemplateId, step: StepId },
    #[error("template `{template}` repeat cycle must be positive, got {cycle_bars}")]
    BadCycleLength { template: TemplateId, cycle_bars: f64 },
    #[error("template `{template}` bounds for `{channel}`: floor {floor} above ceiling {ceiling}")]
    BadBounds {
        template: TemplateId,
        channel: LogicalChannel,
        floor: f64,
        ceiling: f64,
    },
}

/// A reusable, declarative choreography unit: ordered steps plus the
/// policies for looping and channel limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    #[serde(default)]
    pub version: u32,
    /// Role → group bindings the steps may target.
    #[serde(default)]
    pub roles: IndexMap<RoleName, GroupName>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub repeat: RepeatContract,
    /// Default floor/ceiling per channel, normalized.
    #[serde(default)]
    pub channel_bounds: IndexMap<LogicalChannel, NormBounds>,
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

impl Template {
    /// Validate template content. Run once at load time.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.steps.is_empty() {
            return Err(TemplateError::EmptySteps {
                template: self.id.clone(),
            });
        }

        let mut seen: Vec<&StepId> = Vec::new();
        for step in &self.steps {
            if seen.contains(&&step.id) {
                return Err(TemplateError::DuplicateStepId {
                    template: self.id.clone(),
                    step: step.id.clone(),
                });
            }
            seen.push(&step.id);

            if !(step.timing.duration_bars > 0.0) {
                return Err(TemplateError::BadTiming {
                    template: self.id.clone(),
                    step: step.id.clone(),
                    reason: format!(
                        "duration must be positive, got {}",
                        step.timing.duration_bars
                    ),
                });
            }
            if step.timing.start_bar < 0.0 {
                return Err(TemplateError::BadTiming {
                    template: self.id.clone(),
                    step: step.id.clone(),
                    reason: format!("start offset must be >= 0, got {}", step.timing.start_bar),
                });
            }

            if let Some(phase) = &step.timing.phase_offset {
                if phase.mode == PhaseMode::GroupOrder {
                    if phase.group.is_none() {
                        return Err(TemplateError::PhaseOffsetMissingGroup {
                            template: self.id.clone(),
                            step: step.id.clone(),
                        });
                    }
                    if phase.order.is_none() {
                        return Err(TemplateError::PhaseOffsetMissingOrder {
                            template: self.id.clone(),
                            step: step.id.clone(),
                        });
                    }
                }
            }
        }

        if self.repeat.repeatable {
            if self.repeat.loop_steps.is_empty() {
                return Err(TemplateError::MissingLoopSteps {
                    template: self.id.clone(),
                });
            }
            if !(self.repeat.cycle_bars > 0.0) {
                return Err(TemplateError::BadCycleLength {
                    template: self.id.clone(),
                    cycle_bars: self.repeat.cycle_bars,
                });
            }
            for id in &self.repeat.loop_steps {
                if !self.steps.iter().any(|s| &s.id == id) {
                    return Err(TemplateError::UnknownLoopStep {
                        template: self.id.clone(),
                        step: id.clone(),
                    });
                }
            }
        }

        for (channel, bounds) in &self.channel_bounds {
            if !(bounds.floor <= bounds.ceiling)
                || bounds.floor < 0.0
                || bounds.ceiling > 1.0
            {
                return Err(TemplateError::BadBounds {
                    template: self.id.clone(),
                    channel: *channel,
                    floor: bounds.floor,
                    ceiling: bounds.ceiling,
                });
            }
        }

        Ok(())
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Bounds for a channel, defaulting to the full [0, 1] span.
    pub fn bounds_for(&self, channel: LogicalChannel) -> NormBounds {
        self.channel_bounds
            .get(&channel)
            .copied()
            .unwrap_or_default()
    }
}
