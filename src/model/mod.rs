pub mod beat;
pub mod plan;
pub mod rig;
pub mod template;

// Re-export commonly used types at the model level.
pub use beat::{BeatGrid, Quantize, TempoMark};
pub use plan::{ChoreographyPlan, SectionOverrides, SectionPlan};
pub use rig::{
    AxisCalibration, Calibration, ChannelMap, DmxAddress, FixtureId, FixtureProfile, GroupName,
    LogicalChannel, OrderName, RigError, RigProfile, ALL_GROUP,
};
pub use template::{
    BaseTiming, BlendMode, DimmerSpec, Direction, DistributionShape, GeometrySpec, Intensity,
    MovementSpec, NormBounds, PatternId, PatternParams, PhaseMode, PhaseOffsetSpec, RemainderPolicy,
    RepeatContract, RepeatMode, RoleName, Step, StepId, TargetToken, Template, TemplateError,
    TemplateId, TemplateMetadata, TransitionMode, TransitionSpec,
};
