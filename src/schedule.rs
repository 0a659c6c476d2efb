//! Template scheduling: bar-relative steps onto the absolute-ms grid,
//! with repeat unrolling and phase-offset distribution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::template::{PhaseMode, PhaseOffsetSpec, RemainderPolicy, RepeatMode};
use crate::model::{
    BeatGrid, FixtureId, RigProfile, SectionOverrides, SectionPlan, Step, StepId, TargetToken,
    Template, TemplateId, ALL_GROUP,
};
use crate::report::SkippedInstruction;

/// An absolute millisecond span. Start must be < end, both non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimeSpanRaw")]
pub struct TimeSpan {
    start_ms: f64,
    end_ms: f64,
}

#[derive(Deserialize)]
struct TimeSpanRaw {
    start_ms: f64,
    end_ms: f64,
}

impl TryFrom<TimeSpanRaw> for TimeSpan {
    type Error = String;
    fn try_from(raw: TimeSpanRaw) -> Result<Self, String> {
        TimeSpan::new(raw.start_ms, raw.end_ms).ok_or_else(|| {
            format!("Invalid TimeSpan: start={}, end={}", raw.start_ms, raw.end_ms)
        })
    }
}

impl TimeSpan {
    /// Create a span. Returns None if start >= end or either is negative.
    pub fn new(start_ms: f64, end_ms: f64) -> Option<Self> {
        if start_ms >= 0.0 && end_ms > start_ms {
            Some(Self { start_ms, end_ms })
        } else {
            None
        }
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Why a remainder-policy tail segment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TailKind {
    /// Freeze the source step's final pose and dimmer value.
    HoldLastPose,
    /// Hold the pose, ramp the dimmer to zero.
    FadeOut,
}

/// One step landed on the absolute timeline for one fixture.
///
/// Repeat unrolling and phase offsets multiply a template step into many
/// of these; each carries everything rendering needs.
#[derive(Debug, Clone)]
pub struct StepInstance {
    pub section: String,
    pub template_id: TemplateId,
    pub step: Step,
    pub fixture: FixtureId,
    /// 0-based position of this fixture within the step's resolved
    /// target set, and that set's size. Pose handlers spread with these.
    pub order_index: usize,
    pub order_count: usize,
    pub span: TimeSpan,
    pub start_bar: f64,
    pub end_bar: f64,
    /// Which repeat cycle produced this instance (0 for unrepeated).
    pub cycle: u32,
    /// True on the backward pass of a ping-pong repeat.
    pub reversed: bool,
    /// Set when this instance is a remainder-policy tail, not a real
    /// traversal of the step.
    pub tail: Option<TailKind>,
    /// Merged preset + section overrides, carried through to rendering.
    pub overrides: SectionOverrides,
}

/// Everything scheduling produced for one section.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub instances: Vec<StepInstance>,
    pub skipped: Vec<SkippedInstruction>,
}

/// Resolve a step target token to concrete fixtures, in rig order for
/// groups and template-declared role bindings.
fn resolve_target(
    target: &TargetToken,
    template: &Template,
    rig: &RigProfile,
) -> Result<Vec<FixtureId>, String> {
    match target {
        TargetToken::All => rig
            .group(&ALL_GROUP.into())
            .map(<[FixtureId]>::to_vec)
            .ok_or_else(|| "rig has no ALL group".to_owned()),
        TargetToken::Group(name) => rig
            .group(name)
            .map(<[FixtureId]>::to_vec)
            .ok_or_else(|| format!("unknown group `{name}`")),
        TargetToken::Role(role) => {
            let group = template
                .roles
                .get(role)
                .ok_or_else(|| format!("role `{role}` is not bound by the template"))?;
            rig.group(group)
                .map(<[FixtureId]>::to_vec)
                .ok_or_else(|| format!("role `{role}` binds unknown group `{group}`"))
        }
        TargetToken::Fixture(id) => {
            if rig.fixture(id).is_some() {
                Ok(vec![id.clone()])
            } else {
                Err(format!("unknown fixture `{id}`"))
            }
        }
    }
}

/// Compute per-fixture start offsets in bars.
///
/// Offsets are computed in the spread's own unit and wrapped after
/// scaling: `wrap=false` spans `[0, spread]` inclusive of the endpoint
/// (`i/(n-1)·spread`); `wrap=true` wraps `i·spread/n` into `[0, spread)`.
/// Fixtures outside the named order keep offset 0.
fn phase_offsets(
    spec: &PhaseOffsetSpec,
    fixtures: &[FixtureId],
    rig: &RigProfile,
    spread_override: Option<f64>,
) -> Result<IndexMap<FixtureId, f64>, String> {
    let mut offsets: IndexMap<FixtureId, f64> =
        fixtures.iter().map(|f| (f.clone(), 0.0)).collect();

    if spec.mode != PhaseMode::GroupOrder {
        return Ok(offsets);
    }

    let order_name = spec
        .order
        .as_ref()
        .ok_or_else(|| "group-order phase offset without an order".to_owned())?;
    let group_name = spec
        .group
        .as_ref()
        .ok_or_else(|| "group-order phase offset without a group".to_owned())?;

    let order = rig
        .order(order_name)
        .ok_or_else(|| format!("unknown order `{order_name}`"))?;
    let group = rig
        .group(group_name)
        .ok_or_else(|| format!("unknown group `{group_name}`"))?;

    // The order gives the traversal; the group filters it.
    let permutation: Vec<&FixtureId> = order.iter().filter(|id| group.contains(*id)).collect();
    let n = permutation.len();
    if n == 0 {
        return Ok(offsets);
    }

    let spread = spread_override.unwrap_or(spec.spread_bars).max(0.0);
    for (i, id) in permutation.iter().enumerate() {
        let offset = if spread <= 0.0 {
            0.0
        } else if spec.wrap {
            (i as f64 * spread / n as f64) % spread
        } else if n > 1 {
            i as f64 / (n - 1) as f64 * spread
        } else {
            0.0
        };
        if let Some(slot) = offsets.get_mut(*id) {
            *slot = offset;
        }
    }

    Ok(offsets)
}

/// Context for scheduling one section.
pub struct SectionContext<'a> {
    pub section: &'a SectionPlan,
    pub template: &'a Template,
    /// Preset and section params already merged (section wins).
    pub overrides: SectionOverrides,
}

struct Placement<'a> {
    step: &'a Step,
    /// Bar offset from the section start to the cycle origin.
    cycle_origin: f64,
    cycle: u32,
    reversed: bool,
    /// Clip the resulting span to the section window.
    clip: bool,
}

/// Schedule one section: place every step (unrolling repeats), resolve
/// targets, distribute phase offsets, and emit per-fixture instances.
///
/// Target and order resolution failures skip the affected step and are
/// reported; they never abort the section.
pub fn schedule_section(
    ctx: &SectionContext<'_>,
    rig: &RigProfile,
    grid: &BeatGrid,
) -> ScheduleOutcome {
    let section = ctx.section;
    let template = ctx.template;
    let window_bars = section.end_bar - section.start_bar;
    let mut out = ScheduleOutcome::default();

    let mut placements: Vec<Placement<'_>> = Vec::new();
    let mut tails: Vec<(StepId, f64, bool, TailKind)> = Vec::new();

    if template.repeat.repeatable {
        let loop_ids = &template.repeat.loop_steps;
        let loop_steps: Vec<&Step> = template
            .steps
            .iter()
            .filter(|s| loop_ids.contains(&s.id))
            .collect();
        let other_steps = template.steps.iter().filter(|s| !loop_ids.contains(&s.id));

        for step in other_steps {
            placements.push(Placement {
                step,
                cycle_origin: 0.0,
                cycle: 0,
                reversed: false,
                clip: false,
            });
        }

        let cycle_bars = template.repeat.cycle_bars;
        let full_cycles = ((window_bars / cycle_bars) + 1e-9).floor().max(0.0) as u32;
        let remainder = window_bars - f64::from(full_cycles) * cycle_bars;

        for cycle in 0..full_cycles {
            let reversed =
                template.repeat.mode == RepeatMode::PingPong && cycle % 2 == 1;
            for &step in &loop_steps {
                placements.push(Placement {
                    step,
                    cycle_origin: f64::from(cycle) * cycle_bars,
                    cycle,
                    reversed,
                    clip: false,
                });
            }
        }

        if remainder > 1e-9 {
            // A partial final cycle. With no complete cycle behind it
            // there is no "last pose" to hold, so truncation is the only
            // sensible reading regardless of policy.
            let policy = if full_cycles == 0 {
                RemainderPolicy::Truncate
            } else {
                template.repeat.remainder
            };
            match policy {
                RemainderPolicy::Truncate => {
                    let cycle = full_cycles;
                    let reversed =
                        template.repeat.mode == RepeatMode::PingPong && cycle % 2 == 1;
                    for &step in &loop_steps {
                        placements.push(Placement {
                            step,
                            cycle_origin: f64::from(cycle) * cycle_bars,
                            cycle,
                            reversed,
                            clip: true,
                        });
                    }
                }
                RemainderPolicy::HoldLastPose | RemainderPolicy::FadeOut => {
                    let prev_reversed = template.repeat.mode == RepeatMode::PingPong
                        && (full_cycles - 1) % 2 == 1;
                    // The step whose pose the tail freezes: the one the
                    // previous cycle traversed last.
                    let source = if prev_reversed {
                        loop_steps.first()
                    } else {
                        loop_steps.last()
                    };
                    if let Some(step) = source {
                        let kind = if policy == RemainderPolicy::FadeOut {
                            TailKind::FadeOut
                        } else {
                            TailKind::HoldLastPose
                        };
                        tails.push((
                            step.id.clone(),
                            f64::from(full_cycles) * cycle_bars,
                            prev_reversed,
                            kind,
                        ));
                    }
                }
            }
        }
    } else {
        for step in &template.steps {
            placements.push(Placement {
                step,
                cycle_origin: 0.0,
                cycle: 0,
                reversed: false,
                clip: false,
            });
        }
    }

    for placement in &placements {
        place_step(ctx, rig, grid, placement, &mut out);
    }

    for (step_id, origin_bars, reversed, kind) in tails {
        if let Some(step) = template.step(&step_id) {
            place_tail(ctx, rig, grid, step, origin_bars, reversed, kind, &mut out);
        }
    }

    out.instances.sort_by(|a, b| {
        a.span
            .start_ms()
            .partial_cmp(&b.span.start_ms())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

fn place_step(
    ctx: &SectionContext<'_>,
    rig: &RigProfile,
    grid: &BeatGrid,
    placement: &Placement<'_>,
    out: &mut ScheduleOutcome,
) {
    let section = ctx.section;
    let template = ctx.template;
    let step = placement.step;

    let fixtures = match resolve_target(&step.target, template, rig) {
        Ok(fixtures) => fixtures,
        Err(reason) => {
            out.skipped.push(SkippedInstruction {
                section: section.section_name.clone(),
                template: template.id.clone(),
                step: Some(step.id.clone()),
                fixture: None,
                channel: None,
                reason,
            });
            return;
        }
    };
    if fixtures.is_empty() {
        return;
    }

    let offsets = match &step.timing.phase_offset {
        Some(spec) => {
            match phase_offsets(spec, &fixtures, rig, ctx.overrides.spread_bars) {
                Ok(offsets) => offsets,
                Err(reason) => {
                    out.skipped.push(SkippedInstruction {
                        section: section.section_name.clone(),
                        template: template.id.clone(),
                        step: Some(step.id.clone()),
                        fixture: None,
                        channel: None,
                        reason,
                    });
                    return;
                }
            }
        }
        None => fixtures.iter().map(|f| (f.clone(), 0.0)).collect(),
    };

    // Within a reversed ping-pong cycle the step plays mirrored: its
    // slot counts back from the end of the cycle.
    let local_start = if placement.reversed {
        (ctx.template.repeat.cycle_bars - step.timing.start_bar - step.timing.duration_bars)
            .max(0.0)
    } else {
        step.timing.start_bar
    };

    let unquantized = section.start_bar + placement.cycle_origin + local_start;
    let base_start_bar = grid.quantize(unquantized, step.timing.quantize);

    for (order_index, fixture) in fixtures.iter().enumerate() {
        let offset = offsets.get(fixture).copied().unwrap_or(0.0);
        let mut start_bar = base_start_bar + offset;
        let mut end_bar = start_bar + step.timing.duration_bars;

        if placement.clip {
            start_bar = start_bar.min(section.end_bar);
            end_bar = end_bar.min(section.end_bar);
        }
        if end_bar - start_bar <= 1e-9 {
            continue;
        }

        let span = TimeSpan::new(grid.bar_to_ms(start_bar), grid.bar_to_ms(end_bar));
        let Some(span) = span else { continue };

        out.instances.push(StepInstance {
            section: section.section_name.clone(),
            template_id: template.id.clone(),
            step: step.clone(),
            fixture: fixture.clone(),
            order_index,
            order_count: fixtures.len(),
            span,
            start_bar,
            end_bar,
            cycle: placement.cycle,
            reversed: placement.reversed,
            tail: None,
            overrides: ctx.overrides,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn place_tail(
    ctx: &SectionContext<'_>,
    rig: &RigProfile,
    grid: &BeatGrid,
    step: &Step,
    origin_bars: f64,
    reversed: bool,
    kind: TailKind,
    out: &mut ScheduleOutcome,
) {
    let section = ctx.section;
    let fixtures = match resolve_target(&step.target, ctx.template, rig) {
        Ok(fixtures) => fixtures,
        Err(reason) => {
            out.skipped.push(SkippedInstruction {
                section: section.section_name.clone(),
                template: ctx.template.id.clone(),
                step: Some(step.id.clone()),
                fixture: None,
                channel: None,
                reason,
            });
            return;
        }
    };

    let start_bar = section.start_bar + origin_bars;
    let end_bar = section.end_bar;
    let span = TimeSpan::new(grid.bar_to_ms(start_bar), grid.bar_to_ms(end_bar));
    let Some(span) = span else { return };

    for (order_index, fixture) in fixtures.iter().enumerate() {
        out.instances.push(StepInstance {
            section: section.section_name.clone(),
            template_id: ctx.template.id.clone(),
            step: step.clone(),
            fixture: fixture.clone(),
            order_index,
            order_count: fixtures.len(),
            span,
            start_bar,
            end_bar,
            cycle: 0,
            reversed,
            tail: Some(kind),
            overrides: ctx.overrides,
        });
    }
}
