//! The top-level compilation pass: plan + rig + grid + templates in,
//! flat channel-segment list plus diagnostics out.

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::channels::{map_channel, RenderedEffect};
use crate::curves::{CurveForm, Ease, SampledCurve};
use crate::error::CompileError;
use crate::library::{LibraryError, TemplateLibrary};
use crate::model::rig::FixtureProfile;
use crate::model::{
    AxisCalibration, BeatGrid, Calibration, ChoreographyPlan, LogicalChannel, NormBounds,
    RigProfile, SectionOverrides, SectionPlan, TargetToken, Template, TemplateId,
};
use crate::physics::{validate_effect, PhysicsLimits};
use crate::report::{Advisory, CompileOutput, SkippedInstruction};
use crate::resolve::{
    DimmerRegistry, FixtureContext, GeometryRegistry, MovementRegistry, PanTilt, PatternCatalog,
};
use crate::schedule::{schedule_section, SectionContext, StepInstance, TailKind, TimeSpan};
use crate::timeline::{assemble, detect_boundaries, FixtureTimeline, Segment};
use crate::transition::{
    resolve_gap, Anchor, ResolvedTransition, TimelineEffect, TimelineGap, TransitionHandlerId,
};

/// Knobs for a compilation run. The defaults are what the rest of the
/// system assumes; override sparingly.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Samples for curves that need explicit points.
    pub sample_count: usize,
    /// Mechanical limits for the advisory physics pass; None skips it.
    pub physics: Option<PhysicsLimits>,
    /// Samples per segment for the physics pass.
    pub physics_samples: usize,
    /// Max |first − last| for a looped curve to count as continuous.
    pub loop_continuity_threshold: f64,
    /// Minimum tuned dimmer span before warning about crushed range.
    pub dynamic_range_threshold: f64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            sample_count: 32,
            physics: Some(PhysicsLimits::default()),
            physics_samples: 64,
            loop_continuity_threshold: 0.05,
            dynamic_range_threshold: 0.05,
        }
    }
}

/// Per-fixture render accumulator.
#[derive(Default)]
struct FixtureRender {
    effects: Vec<RenderedEffect>,
    skipped: Vec<SkippedInstruction>,
    warnings: Vec<Advisory>,
}

/// The compiler: drives scheduling, assembly, transition resolution,
/// and channel mapping for every section and fixture.
///
/// Rig, grid, catalog, and library are read-only for the run and shared
/// freely across the per-fixture workers.
pub struct Compiler<'a> {
    rig: &'a RigProfile,
    grid: &'a BeatGrid,
    library: &'a dyn TemplateLibrary,
    catalog: &'a PatternCatalog,
    presets: IndexMap<String, SectionOverrides>,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(
        rig: &'a RigProfile,
        grid: &'a BeatGrid,
        library: &'a dyn TemplateLibrary,
        catalog: &'a PatternCatalog,
    ) -> Self {
        Self {
            rig,
            grid,
            library,
            catalog,
            presets: IndexMap::new(),
            options: CompileOptions::default(),
        }
    }

    pub fn with_presets(mut self, presets: IndexMap<String, SectionOverrides>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile a plan into the flat output segment list.
    ///
    /// Structural problems (empty plan, bad section windows, missing
    /// template or preset) abort; per-instruction failures degrade to
    /// diagnostics in the output.
    pub fn compile(&self, plan: &ChoreographyPlan) -> Result<CompileOutput, CompileError> {
        let sections = self.validate_plan(plan)?;
        let templates = self.load_templates(&sections)?;

        let mut instances: Vec<StepInstance> = Vec::new();
        let mut skipped: Vec<SkippedInstruction> = Vec::new();

        for &section in &sections {
            let overrides = self.section_overrides(section)?;
            let template = templates
                .get(&section.template_id)
                .ok_or_else(|| CompileError::Template {
                    section: section.section_name.clone(),
                    source: LibraryError::TemplateNotFound {
                        id: section.template_id.clone(),
                    },
                })?;
            let outcome = schedule_section(
                &SectionContext {
                    section,
                    template,
                    overrides,
                },
                self.rig,
                self.grid,
            );
            instances.extend(outcome.instances);
            skipped.extend(outcome.skipped);
        }

        let last_section_end = sections.iter().map(|s| s.end_bar).fold(0.0f64, f64::max);
        let song_end_bar = plan
            .song_duration_bars
            .unwrap_or(last_section_end)
            .max(last_section_end);
        let song_end_ms = instances
            .iter()
            .map(|i| i.span.end_ms())
            .fold(self.grid.bar_to_ms(song_end_bar), f64::max);

        let timelines = assemble(self.rig, instances, song_end_ms);

        let section_marks: Vec<(String, f64)> = sections
            .iter()
            .map(|s| (s.section_name.clone(), s.start_bar))
            .collect();
        let boundaries = detect_boundaries(&timelines, &section_marks, self.grid);
        log::debug!(
            "assembled {} fixture timelines, {} boundaries",
            timelines.len(),
            boundaries.len()
        );

        let rendered: Vec<FixtureRender> = timelines
            .par_iter()
            .map(|timeline| self.render_fixture(timeline, &templates))
            .collect();

        let mut effects = Vec::new();
        let mut warnings = Vec::new();
        for mut render in rendered {
            effects.append(&mut render.effects);
            skipped.append(&mut render.skipped);
            warnings.append(&mut render.warnings);
        }
        for skip in &skipped {
            log::warn!(
                "skipped instruction in `{}` ({}): {}",
                skip.section,
                skip.template,
                skip.reason
            );
        }

        Ok(CompileOutput {
            effects,
            boundaries,
            skipped,
            warnings,
        })
    }

    fn validate_plan<'p>(
        &self,
        plan: &'p ChoreographyPlan,
    ) -> Result<Vec<&'p SectionPlan>, CompileError> {
        if plan.sections.is_empty() {
            return Err(CompileError::EmptyPlan);
        }
        for section in &plan.sections {
            if !(section.end_bar > section.start_bar) {
                return Err(CompileError::MalformedSection {
                    section: section.section_name.clone(),
                    start_bar: section.start_bar,
                    end_bar: section.end_bar,
                });
            }
        }
        let mut sections: Vec<&SectionPlan> = plan.sections.iter().collect();
        sections.sort_by(|a, b| {
            a.start_bar
                .partial_cmp(&b.start_bar)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for pair in sections.windows(2) {
            if let [a, b] = pair {
                if b.start_bar < a.end_bar - 1e-9 {
                    return Err(CompileError::OverlappingSections {
                        first: a.section_name.clone(),
                        second: b.section_name.clone(),
                        at_bar: b.start_bar,
                    });
                }
            }
        }
        Ok(sections)
    }

    fn load_templates(
        &self,
        sections: &[&SectionPlan],
    ) -> Result<IndexMap<TemplateId, Template>, CompileError> {
        let mut templates = IndexMap::new();
        for section in sections {
            if templates.contains_key(&section.template_id) {
                continue;
            }
            let template =
                self.library
                    .get(&section.template_id)
                    .map_err(|source| CompileError::Template {
                        section: section.section_name.clone(),
                        source,
                    })?;
            // A custom library may not validate on load; the compiler
            // always does.
            template
                .validate()
                .map_err(|source| CompileError::Template {
                    section: section.section_name.clone(),
                    source: LibraryError::TemplateInvalid {
                        id: section.template_id.clone(),
                        source,
                    },
                })?;
            templates.insert(section.template_id.clone(), template);
        }
        Ok(templates)
    }

    fn section_overrides(&self, section: &SectionPlan) -> Result<SectionOverrides, CompileError> {
        match &section.preset_id {
            None => Ok(section.params),
            Some(preset_id) => {
                let preset =
                    self.presets
                        .get(preset_id)
                        .ok_or_else(|| CompileError::PresetNotFound {
                            section: section.section_name.clone(),
                            preset: preset_id.clone(),
                        })?;
                Ok(section.params.merged_over(preset))
            }
        }
    }

    // ── Per-fixture rendering ───────────────────────────────────────

    fn render_fixture(
        &self,
        timeline: &FixtureTimeline,
        templates: &IndexMap<TemplateId, Template>,
    ) -> FixtureRender {
        let mut out = FixtureRender::default();
        let Some(profile) = self.rig.fixture(&timeline.fixture) else {
            return out;
        };
        let cal = self.rig.calibration(&timeline.fixture);

        let geometry = GeometryRegistry::new(self.catalog);
        let movement = MovementRegistry::new(self.catalog);
        let dimmer = DimmerRegistry::new(self.catalog);

        // First pass: render every step segment in start order, keeping
        // its anchor view for the gap pass.
        let mut views: Vec<Option<TimelineEffect>> = vec![None; timeline.segments.len()];
        for (idx, segment) in timeline.segments.iter().enumerate() {
            let Segment::Step(instance) = segment else {
                continue;
            };
            match self.render_step(
                instance, profile, &cal, templates, &geometry, &movement, &dimmer, &mut out,
            ) {
                Ok(view) => {
                    if let Some(slot) = views.get_mut(idx) {
                        *slot = Some(view);
                    }
                }
                Err(reason) => out.skipped.push(SkippedInstruction {
                    section: instance.section.clone(),
                    template: instance.template_id.clone(),
                    step: Some(instance.step.id.clone()),
                    fixture: Some(instance.fixture.clone()),
                    channel: None,
                    reason,
                }),
            }
        }

        // Second pass: gaps, in order. Each resolution reads the
        // already-rendered neighbors' anchors.
        for segment in &timeline.segments {
            let Segment::Gap(gap) = segment else {
                continue;
            };
            let before_view = gap.before.and_then(|i| views.get(i).copied().flatten());
            let after_view = gap.after.and_then(|i| views.get(i).copied().flatten());
            let outbound = gap
                .before
                .and_then(|i| step_at(timeline, i))
                .and_then(|s| s.step.exit);
            let inbound = gap
                .after
                .and_then(|i| step_at(timeline, i))
                .and_then(|s| s.step.entry);

            let view_gap = TimelineGap {
                span: gap.span,
                class: gap.class,
                inbound,
                outbound,
                before: before_view.map(|v| v.end),
                after: after_view.map(|v| v.start),
            };
            let bar_ms = self
                .grid
                .ms_per_bar_at(self.grid.ms_to_bar(gap.span.start_ms()));
            let resolved = resolve_gap(&view_gap, Anchor::neutral(&cal), bar_ms);
            self.render_transition(&resolved, profile, &cal, &mut out);
        }

        if let Some(limits) = self.options.physics {
            for effect in &out.effects {
                if let Some(range_deg) = cal.degree_range(effect.channel) {
                    out.warnings.extend(validate_effect(
                        effect,
                        range_deg,
                        &limits,
                        self.options.physics_samples,
                    ));
                }
            }
        }

        out
    }

    #[allow(clippy::too_many_arguments)]
    fn render_step(
        &self,
        instance: &StepInstance,
        profile: &FixtureProfile,
        cal: &Calibration,
        templates: &IndexMap<TemplateId, Template>,
        geometry: &GeometryRegistry<'_>,
        movement: &MovementRegistry<'_>,
        dimmer: &DimmerRegistry<'_>,
        out: &mut FixtureRender,
    ) -> Result<TimelineEffect, String> {
        let step = &instance.step;
        let template = templates
            .get(&instance.template_id)
            .ok_or_else(|| format!("template `{}` missing from run", instance.template_id))?;

        let role = match &step.target {
            TargetToken::Role(role) => Some(role),
            _ => None,
        };
        let ctx = FixtureContext {
            fixture: &instance.fixture,
            role,
            index: instance.order_index,
            count: instance.order_count,
        };

        let pose = geometry
            .resolve(&step.geometry.pattern, &ctx, &step.geometry.params, cal)
            .map_err(|e| e.to_string())?;

        let level_override = instance.overrides.intensity;

        // Movement: offset-centered shape, recentered onto the pose. A
        // failed movement degrades to the static pose.
        let (pan_form, tilt_form) = match &step.movement {
            Some(spec) => {
                let level = level_override.unwrap_or(spec.intensity).level();
                match movement.generate(
                    &spec.pattern,
                    &spec.params,
                    self.options.sample_count,
                    spec.cycles,
                    level,
                ) {
                    Ok(shape) => {
                        let (pan, tilt) = if instance.reversed {
                            (shape.pan.time_reversed(), shape.tilt.time_reversed())
                        } else {
                            (shape.pan, shape.tilt)
                        };
                        (pan.recentered(pose.pan), tilt.recentered(pose.tilt))
                    }
                    Err(err) => {
                        out.skipped.push(SkippedInstruction {
                            section: instance.section.clone(),
                            template: instance.template_id.clone(),
                            step: Some(step.id.clone()),
                            fixture: Some(instance.fixture.clone()),
                            channel: Some(LogicalChannel::Pan),
                            reason: err.to_string(),
                        });
                        (CurveForm::flat(pose.pan), CurveForm::flat(pose.tilt))
                    }
                }
            }
            None => (CurveForm::flat(pose.pan), CurveForm::flat(pose.tilt)),
        };

        let dimmer_form = match &step.dimmer {
            Some(spec) => {
                let level = level_override.unwrap_or(spec.intensity).level();
                let min = instance.overrides.dimmer_min.unwrap_or(spec.min);
                let max = instance.overrides.dimmer_max.unwrap_or(spec.max);
                match dimmer.generate(
                    &spec.pattern,
                    &spec.params,
                    self.options.sample_count,
                    spec.cycles,
                    level,
                    min,
                    max,
                ) {
                    Ok(shape) => {
                        if instance.reversed {
                            Some(shape.curve.time_reversed())
                        } else {
                            Some(shape.curve)
                        }
                    }
                    Err(err) => {
                        out.skipped.push(SkippedInstruction {
                            section: instance.section.clone(),
                            template: instance.template_id.clone(),
                            step: Some(step.id.clone()),
                            fixture: Some(instance.fixture.clone()),
                            channel: Some(LogicalChannel::Dimmer),
                            reason: err.to_string(),
                        });
                        None
                    }
                }
            }
            None => None,
        };

        // Remainder-policy tails freeze the source step's final state.
        let (pan_form, tilt_form, dimmer_form) = match instance.tail {
            None => (pan_form, tilt_form, dimmer_form),
            Some(TailKind::HoldLastPose) => (
                CurveForm::flat(pan_form.evaluate(1.0)),
                CurveForm::flat(tilt_form.evaluate(1.0)),
                dimmer_form.map(|d| CurveForm::flat(d.evaluate(1.0))),
            ),
            Some(TailKind::FadeOut) => (
                CurveForm::flat(pan_form.evaluate(1.0)),
                CurveForm::flat(tilt_form.evaluate(1.0)),
                dimmer_form.map(|d| CurveForm::Span {
                    shape: crate::curves::RampShape::Ramp,
                    min: d.evaluate(1.0),
                    max: 0.0,
                    cycles: 1.0,
                }),
            ),
        };

        let pan_bounds = intersect_axis(template.bounds_for(LogicalChannel::Pan), &cal.pan);
        let tilt_bounds = intersect_axis(template.bounds_for(LogicalChannel::Tilt), &cal.tilt);
        let dimmer_bounds = template.bounds_for(LogicalChannel::Dimmer);

        // Tune up front so anchors reflect what actually plays.
        let pan_tuned = pan_form.tuned(pan_bounds.floor, pan_bounds.ceiling);
        let tilt_tuned = tilt_form.tuned(tilt_bounds.floor, tilt_bounds.ceiling);
        let dimmer_tuned =
            dimmer_form.map(|d| d.tuned(dimmer_bounds.floor, dimmer_bounds.ceiling));

        self.check_loop_continuity(instance, template, &pan_tuned, &tilt_tuned, out);

        if let (Some(raw), Some(tuned)) = (&step.dimmer, &dimmer_tuned) {
            let original_span =
                (instance.overrides.dimmer_max.unwrap_or(raw.max)
                    - instance.overrides.dimmer_min.unwrap_or(raw.min))
                    .abs();
            let (lo, hi) = tuned.range();
            let threshold = self.options.dynamic_range_threshold;
            if original_span >= threshold && hi - lo < threshold {
                out.warnings.push(Advisory::LimitedDynamicRange {
                    fixture: instance.fixture.clone(),
                    step: step.id.clone(),
                    span: hi - lo,
                    threshold,
                });
            }
        }

        let channel_plan = [
            (LogicalChannel::Pan, Some(&pan_tuned), pan_bounds),
            (LogicalChannel::Tilt, Some(&tilt_tuned), tilt_bounds),
            (
                LogicalChannel::Dimmer,
                dimmer_tuned.as_ref(),
                dimmer_bounds,
            ),
        ];
        for (channel, form, bounds) in channel_plan {
            let Some(form) = form else { continue };
            if let Some(effect) = map_channel(
                &instance.fixture,
                &profile.channels,
                channel,
                instance.span,
                form,
                bounds,
                step.blend,
            ) {
                out.effects.push(effect);
            }
        }

        let anchor_at = |t: f64| Anchor {
            pose: PanTilt::new(pan_tuned.evaluate(t), tilt_tuned.evaluate(t)),
            dimmer: dimmer_tuned
                .as_ref()
                .map_or(cal.dimmer_floor, |d| d.evaluate(t)),
        };

        Ok(TimelineEffect {
            span: instance.span,
            start: anchor_at(0.0),
            end: anchor_at(1.0),
        })
    }

    fn check_loop_continuity(
        &self,
        instance: &StepInstance,
        template: &Template,
        pan: &CurveForm,
        tilt: &CurveForm,
        out: &mut FixtureRender,
    ) {
        let looped = template.repeat.repeatable
            && template.repeat.loop_steps.contains(&instance.step.id)
            && instance.tail.is_none();
        if !looped {
            return;
        }
        let threshold = self.options.loop_continuity_threshold;
        for (channel, form) in [(LogicalChannel::Pan, pan), (LogicalChannel::Tilt, tilt)] {
            let delta = (form.evaluate(1.0) - form.evaluate(0.0)).abs();
            if delta > threshold {
                out.warnings.push(Advisory::LoopDiscontinuity {
                    fixture: instance.fixture.clone(),
                    step: instance.step.id.clone(),
                    channel,
                    delta,
                    threshold,
                });
            }
        }
    }

    // ── Transition rendering ────────────────────────────────────────

    fn render_transition(
        &self,
        resolved: &ResolvedTransition,
        profile: &FixtureProfile,
        cal: &Calibration,
        out: &mut FixtureRender,
    ) {
        let pan_bounds = NormBounds {
            floor: cal.pan.min,
            ceiling: cal.pan.max,
        };
        let tilt_bounds = NormBounds {
            floor: cal.tilt.min,
            ceiling: cal.tilt.max,
        };
        let dimmer_bounds = NormBounds::default();
        let neutral = Anchor::neutral(cal);
        let n = self.options.sample_count.max(2);

        let mut emit = |span: TimeSpan, pan: CurveForm, tilt: CurveForm, dim: CurveForm| {
            let plan = [
                (LogicalChannel::Pan, pan, pan_bounds),
                (LogicalChannel::Tilt, tilt, tilt_bounds),
                (LogicalChannel::Dimmer, dim, dimmer_bounds),
            ];
            for (channel, form, bounds) in plan {
                if let Some(effect) = map_channel(
                    &profile.id,
                    &profile.channels,
                    channel,
                    span,
                    &form,
                    bounds,
                    crate::model::BlendMode::Override,
                ) {
                    out.effects.push(effect);
                }
            }
        };

        let hold = |anchor: &Anchor| {
            (
                CurveForm::flat(anchor.pose.pan),
                CurveForm::flat(anchor.pose.tilt),
                CurveForm::flat(anchor.dimmer),
            )
        };

        let gap_start = resolved.span.start_ms();
        let gap_end = resolved.span.end_ms();
        let move_ms = resolved.move_ms.clamp(0.0, resolved.span.duration_ms());
        let (move_start, move_end) = if resolved.inbound_wins {
            (gap_end - move_ms, gap_end)
        } else {
            (gap_start, gap_start + move_ms)
        };

        match resolved.handler {
            TransitionHandlerId::GapFill => {
                let (pan, tilt, dim) = hold(&neutral);
                emit(resolved.span, pan, tilt, dim);
            }
            TransitionHandlerId::Snap => {
                // No motion inside the gap; the jump happens at the edge.
                let (pan, tilt, dim) = hold(&resolved.from);
                emit(resolved.span, pan, tilt, dim);
            }
            TransitionHandlerId::Crossfade => {
                if let Some(span) = span_of(gap_start, move_start) {
                    let (pan, tilt, dim) = hold(&resolved.from);
                    emit(span, pan, tilt, dim);
                }
                if let Some(span) = span_of(move_start, move_end) {
                    emit(
                        span,
                        eased_points(
                            resolved.from.pose.pan,
                            resolved.to.pose.pan,
                            resolved.ease,
                            n,
                        ),
                        eased_points(
                            resolved.from.pose.tilt,
                            resolved.to.pose.tilt,
                            resolved.ease,
                            n,
                        ),
                        eased_points(resolved.from.dimmer, resolved.to.dimmer, resolved.ease, n),
                    );
                }
                if let Some(span) = span_of(move_end, gap_end) {
                    let (pan, tilt, dim) = hold(&resolved.to);
                    emit(span, pan, tilt, dim);
                }
            }
            TransitionHandlerId::FadeThroughNeutral => {
                let midpoint = (move_start + move_end) / 2.0;
                if let Some(span) = span_of(gap_start, move_start) {
                    let (pan, tilt, dim) = hold(&resolved.from);
                    emit(span, pan, tilt, dim);
                }
                if let Some(span) = span_of(move_start, midpoint) {
                    emit(
                        span,
                        eased_points(
                            resolved.from.pose.pan,
                            neutral.pose.pan,
                            resolved.ease,
                            n,
                        ),
                        eased_points(
                            resolved.from.pose.tilt,
                            neutral.pose.tilt,
                            resolved.ease,
                            n,
                        ),
                        eased_points(resolved.from.dimmer, neutral.dimmer, resolved.ease, n),
                    );
                }
                if let Some(span) = span_of(midpoint, move_end) {
                    emit(
                        span,
                        eased_points(neutral.pose.pan, resolved.to.pose.pan, resolved.ease, n),
                        eased_points(
                            neutral.pose.tilt,
                            resolved.to.pose.tilt,
                            resolved.ease,
                            n,
                        ),
                        eased_points(neutral.dimmer, resolved.to.dimmer, resolved.ease, n),
                    );
                }
                if let Some(span) = span_of(move_end, gap_end) {
                    let (pan, tilt, dim) = hold(&resolved.to);
                    emit(span, pan, tilt, dim);
                }
            }
        }
    }
}

fn step_at(timeline: &FixtureTimeline, idx: usize) -> Option<&StepInstance> {
    match timeline.segments.get(idx) {
        Some(Segment::Step(instance)) => Some(instance),
        _ => None,
    }
}

fn span_of(start: f64, end: f64) -> Option<TimeSpan> {
    if end - start > 1e-6 {
        TimeSpan::new(start, end)
    } else {
        None
    }
}

/// Tightest bounds satisfying both the template's channel limits and the
/// fixture's calibrated travel.
fn intersect_axis(bounds: NormBounds, axis: &AxisCalibration) -> NormBounds {
    let floor = bounds.floor.max(axis.min);
    let ceiling = bounds.ceiling.min(axis.max).max(floor);
    NormBounds { floor, ceiling }
}

/// An eased move between two values: flat when they already agree,
/// otherwise explicit points (eased ramps have no parametric family).
fn eased_points(from: f64, to: f64, ease: Ease, n: usize) -> CurveForm {
    if (from - to).abs() < 1e-9 {
        return CurveForm::flat(from);
    }
    SampledCurve::from_fn(n.max(2), |t| ease.lerp(from, to, t))
        .map(|curve| CurveForm::Points { curve })
        .unwrap_or_else(|| CurveForm::flat(to))
}
