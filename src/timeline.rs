//! Timeline assembly: per-fixture chronological segments with every gap
//! made explicit, plus the read-only boundary pass.

use serde::Serialize;

use crate::model::{BeatGrid, FixtureId, RigProfile};
use crate::schedule::{StepInstance, TimeSpan};

/// Positional classification of a gap. Never inferred from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    /// Before the first segment.
    Start,
    /// Between two segments of the same section.
    MidSequence,
    /// Between segments of different sections.
    InterSection,
    /// After the last segment, up to the declared song end.
    End,
}

/// A span of timeline with no active step.
#[derive(Debug, Clone)]
pub struct GapSegment {
    pub span: TimeSpan,
    pub class: GapClass,
    /// Index into the fixture's segment list of the step before the gap.
    pub before: Option<usize>,
    /// Index of the step after the gap.
    pub after: Option<usize>,
}

/// One element of a fixture's exploded timeline.
#[derive(Debug, Clone)]
pub enum Segment {
    Step(StepInstance),
    Gap(GapSegment),
}

impl Segment {
    pub fn span(&self) -> TimeSpan {
        match self {
            Segment::Step(instance) => instance.span,
            Segment::Gap(gap) => gap.span,
        }
    }
}

/// A single fixture's contiguous, non-overlapping timeline from 0 to the
/// song end.
#[derive(Debug, Clone)]
pub struct FixtureTimeline {
    pub fixture: FixtureId,
    pub segments: Vec<Segment>,
}

/// Sort instances chronologically and resolve overlaps deterministically:
/// the higher-priority step keeps its span, the other is trimmed (and
/// dropped if nothing remains). Equal priorities favor the earlier step.
fn sort_and_trim(mut instances: Vec<StepInstance>) -> Vec<StepInstance> {
    instances.sort_by(|a, b| {
        a.span
            .start_ms()
            .partial_cmp(&b.span.start_ms())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.step.priority.cmp(&a.step.priority))
    });

    let mut out: Vec<StepInstance> = Vec::with_capacity(instances.len());
    for mut next in instances {
        let Some(prev) = out.last_mut() else {
            out.push(next);
            continue;
        };
        if next.span.start_ms() >= prev.span.end_ms() - 1e-9 {
            out.push(next);
            continue;
        }
        // Overlap. Higher priority wins the contested span.
        if next.step.priority > prev.step.priority {
            match TimeSpan::new(prev.span.start_ms(), next.span.start_ms()) {
                Some(trimmed) => {
                    prev.span = trimmed;
                    out.push(next);
                }
                None => {
                    // Fully covered; replace.
                    *prev = next;
                }
            }
        } else {
            match TimeSpan::new(prev.span.end_ms(), next.span.end_ms()) {
                Some(trimmed) => {
                    next.span = trimmed;
                    out.push(next);
                }
                None => {} // swallowed entirely
            }
        }
    }
    out
}

/// Build one fixture's timeline: chronological step segments with gap
/// segments inserted wherever time is unaccounted for, from 0 ms to
/// `song_end_ms`.
pub fn assemble_fixture(
    fixture: &FixtureId,
    instances: Vec<StepInstance>,
    song_end_ms: f64,
) -> FixtureTimeline {
    let instances = sort_and_trim(instances);
    let mut segments: Vec<Segment> = Vec::with_capacity(instances.len() * 2 + 2);
    let mut cursor = 0.0;
    let mut last_step_idx: Option<usize> = None;
    let mut pending_gap: Option<(TimeSpan, Option<usize>)> = None;

    for instance in instances {
        let start = instance.span.start_ms();
        if let Some(gap_span) = TimeSpan::new(cursor, start) {
            if gap_span.duration_ms() > 1e-6 {
                pending_gap = Some((gap_span, last_step_idx));
            }
        }
        cursor = instance.span.end_ms();

        if let Some((gap_span, before)) = pending_gap.take() {
            let after_idx = segments.len() + 1;
            let class = classify_gap(before, &segments, &instance);
            segments.push(Segment::Gap(GapSegment {
                span: gap_span,
                class,
                before,
                after: Some(after_idx),
            }));
        }

        last_step_idx = Some(segments.len());
        segments.push(Segment::Step(instance));
    }

    if let Some(end_gap) = TimeSpan::new(cursor, song_end_ms) {
        if end_gap.duration_ms() > 1e-6 {
            let class = if last_step_idx.is_none() {
                GapClass::Start
            } else {
                GapClass::End
            };
            segments.push(Segment::Gap(GapSegment {
                span: end_gap,
                class,
                before: last_step_idx,
                after: None,
            }));
        }
    }

    FixtureTimeline {
        fixture: fixture.clone(),
        segments,
    }
}

/// Positional gap classification: before anything → start; between two
/// steps → mid-sequence within one section, inter-section across two.
fn classify_gap(before: Option<usize>, segments: &[Segment], next: &StepInstance) -> GapClass {
    match before {
        None => GapClass::Start,
        Some(idx) => match segments.get(idx) {
            Some(Segment::Step(prev)) if prev.section == next.section => GapClass::MidSequence,
            Some(Segment::Step(_)) => GapClass::InterSection,
            _ => GapClass::MidSequence,
        },
    }
}

/// Assemble timelines for every rig fixture (in rig order), including
/// fixtures no instance targets - their whole timeline is one gap.
pub fn assemble(
    rig: &RigProfile,
    instances: Vec<StepInstance>,
    song_end_ms: f64,
) -> Vec<FixtureTimeline> {
    let mut per_fixture: Vec<(FixtureId, Vec<StepInstance>)> = rig
        .fixtures()
        .iter()
        .map(|f| (f.id.clone(), Vec::new()))
        .collect();

    for instance in instances {
        if let Some((_, bucket)) = per_fixture.iter_mut().find(|(id, _)| *id == instance.fixture)
        {
            bucket.push(instance);
        }
    }

    per_fixture
        .into_iter()
        .map(|(fixture, bucket)| assemble_fixture(&fixture, bucket, song_end_ms))
        .collect()
}

// ── Boundaries ──────────────────────────────────────────────────────

/// What two things a boundary separates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    SectionToSection,
    StepToStep,
}

/// A recorded adjacency, for transition decisions. Produced by a
/// read-only pass; building these never mutates the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureId>,
    pub at_ms: f64,
    pub at_bar: f64,
}

/// Record a boundary for every adjacent pair of sections (by plan order)
/// and every adjacent pair of step instances (per fixture timeline).
pub fn detect_boundaries(
    timelines: &[FixtureTimeline],
    sections: &[(String, f64)],
    grid: &BeatGrid,
) -> Vec<Boundary> {
    let mut boundaries = Vec::new();

    for pair in sections.windows(2) {
        if let [(a, _), (b, start_bar)] = pair {
            boundaries.push(Boundary {
                kind: BoundaryKind::SectionToSection,
                source: a.clone(),
                target: b.clone(),
                fixture: None,
                at_ms: grid.bar_to_ms(*start_bar),
                at_bar: *start_bar,
            });
        }
    }

    for timeline in timelines {
        let steps: Vec<&StepInstance> = timeline
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Step(instance) => Some(instance),
                Segment::Gap(_) => None,
            })
            .collect();
        for pair in steps.windows(2) {
            if let [a, b] = pair {
                let at_ms = b.span.start_ms();
                boundaries.push(Boundary {
                    kind: BoundaryKind::StepToStep,
                    source: a.step.id.0.clone(),
                    target: b.step.id.0.clone(),
                    fixture: Some(timeline.fixture.clone()),
                    at_ms,
                    at_bar: grid.ms_to_bar(at_ms),
                });
            }
        }
    }

    boundaries
}
