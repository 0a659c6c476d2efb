//! Gap resolution: which transition bridges each gap and between which
//! anchors.
//!
//! Anchors come from the neighboring effects' actual curves - never from
//! an assumed "home" pose. A fixture that ends a sweep stage-left starts
//! its transition stage-left.

use serde::Serialize;

use crate::curves::Ease;
use crate::model::{Calibration, TransitionMode, TransitionSpec};
use crate::resolve::PanTilt;
use crate::schedule::TimeSpan;
use crate::timeline::GapClass;

/// A resolved position/value snapshot at one edge of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub pose: PanTilt,
    pub dimmer: f64,
}

impl Anchor {
    /// The fallback anchor: calibration-center pose, dimmer at the
    /// fixture's floor.
    pub fn neutral(cal: &Calibration) -> Self {
        Self {
            pose: PanTilt::neutral(cal),
            dimmer: cal.dimmer_floor,
        }
    }
}

/// The transition-resolution view of one effect: its span and both edge
/// anchors, derived from the curve it actually plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEffect {
    pub span: TimeSpan,
    pub start: Anchor,
    pub end: Anchor,
}

/// The transition-resolution view of one gap: its span, class, and the
/// 0–2 transition configs contributed by its neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineGap {
    pub span: TimeSpan,
    pub class: GapClass,
    /// Entry config of the step that starts after the gap.
    pub inbound: Option<TransitionSpec>,
    /// Exit config of the step that ends before the gap.
    pub outbound: Option<TransitionSpec>,
    /// End anchor of the preceding effect, if any.
    pub before: Option<Anchor>,
    /// Start anchor of the following effect, if any.
    pub after: Option<Anchor>,
}

/// Concrete handler a transition config resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionHandlerId {
    Snap,
    Crossfade,
    FadeThroughNeutral,
    /// The implicit fallback: hold at neutral.
    GapFill,
}

impl TransitionHandlerId {
    fn from_mode(mode: TransitionMode) -> Self {
        match mode {
            TransitionMode::Snap => Self::Snap,
            TransitionMode::Crossfade => Self::Crossfade,
            TransitionMode::FadeThroughNeutral => Self::FadeThroughNeutral,
        }
    }
}

/// A gap fully resolved: handler, anchors, and how much of the gap the
/// move itself occupies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTransition {
    pub handler: TransitionHandlerId,
    pub span: TimeSpan,
    pub from: Anchor,
    pub to: Anchor,
    /// The moving part of the gap, in ms. The rest of the gap holds:
    /// before the move for an inbound config (arrive on time), after it
    /// for an outbound one. Equal to the gap length when no config
    /// constrains it.
    pub move_ms: f64,
    /// True when the configured duration came from the inbound side.
    pub inbound_wins: bool,
    pub ease: Ease,
}

/// Resolve one gap. Priority is strict: inbound config, else outbound
/// config, else the implicit gap-fill.
///
/// `bar_ms` converts the config's bar-denominated duration; `neutral` is
/// the fixture's fallback anchor for missing neighbors.
pub fn resolve_gap(gap: &TimelineGap, neutral: Anchor, bar_ms: f64) -> ResolvedTransition {
    let from = gap.before.unwrap_or(neutral);
    let to = gap.after.unwrap_or(neutral);
    let gap_ms = gap.span.duration_ms();

    let (config, inbound_wins) = match (gap.inbound, gap.outbound) {
        (Some(inbound), _) => (Some(inbound), true),
        (None, Some(outbound)) => (Some(outbound), false),
        (None, None) => (None, false),
    };

    match config {
        Some(spec) => {
            let requested_ms = (spec.duration_bars * bar_ms).max(0.0);
            ResolvedTransition {
                handler: TransitionHandlerId::from_mode(spec.mode),
                span: gap.span,
                from,
                to,
                move_ms: requested_ms.min(gap_ms),
                inbound_wins,
                ease: Ease::InOutSine,
            }
        }
        None => ResolvedTransition {
            handler: TransitionHandlerId::GapFill,
            span: gap.span,
            from,
            to,
            move_ms: gap_ms,
            inbound_wins: false,
            ease: Ease::Linear,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Calibration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn anchor(pan: f64, dimmer: f64) -> Anchor {
        Anchor {
            pose: PanTilt::new(pan, 0.5),
            dimmer,
        }
    }

    fn gap_with(
        inbound: Option<TransitionSpec>,
        outbound: Option<TransitionSpec>,
    ) -> TimelineGap {
        TimelineGap {
            span: TimeSpan::new(1000.0, 3000.0).unwrap(),
            class: GapClass::MidSequence,
            inbound,
            outbound,
            before: Some(anchor(0.2, 0.8)),
            after: Some(anchor(0.9, 0.4)),
        }
    }

    fn spec(mode: TransitionMode, bars: f64) -> TransitionSpec {
        TransitionSpec {
            mode,
            duration_bars: bars,
        }
    }

    fn neutral() -> Anchor {
        Anchor::neutral(&Calibration::default())
    }

    #[test]
    fn inbound_beats_outbound() {
        let gap = gap_with(
            Some(spec(TransitionMode::Crossfade, 0.5)),
            Some(spec(TransitionMode::Snap, 1.0)),
        );
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert_eq!(resolved.handler, TransitionHandlerId::Crossfade);
        assert!(resolved.inbound_wins);
    }

    #[test]
    fn outbound_used_when_no_inbound() {
        let gap = gap_with(None, Some(spec(TransitionMode::Snap, 1.0)));
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert_eq!(resolved.handler, TransitionHandlerId::Snap);
        assert!(!resolved.inbound_wins);
    }

    #[test]
    fn inbound_alone_used() {
        let gap = gap_with(
            Some(spec(TransitionMode::FadeThroughNeutral, 0.25)),
            None,
        );
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert_eq!(resolved.handler, TransitionHandlerId::FadeThroughNeutral);
    }

    #[test]
    fn neither_falls_back_to_gap_fill() {
        let gap = gap_with(None, None);
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert_eq!(resolved.handler, TransitionHandlerId::GapFill);
        assert!(approx(resolved.move_ms, 2000.0));
    }

    #[test]
    fn anchors_come_from_neighbors_not_home() {
        let gap = gap_with(Some(spec(TransitionMode::Crossfade, 0.5)), None);
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert!(approx(resolved.from.pose.pan, 0.2));
        assert!(approx(resolved.to.pose.pan, 0.9));
        assert!(approx(resolved.from.dimmer, 0.8));
    }

    #[test]
    fn missing_neighbors_use_neutral_anchor() {
        let mut gap = gap_with(None, None);
        gap.before = None;
        gap.after = None;
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert!(approx(resolved.from.pose.pan, 0.5));
        assert!(approx(resolved.to.dimmer, 0.0));
    }

    #[test]
    fn move_duration_capped_by_gap() {
        let gap = gap_with(Some(spec(TransitionMode::Crossfade, 10.0)), None);
        let resolved = resolve_gap(&gap, neutral(), 2000.0);
        assert!(approx(resolved.move_ms, 2000.0));
        let short = gap_with(Some(spec(TransitionMode::Crossfade, 0.5)), None);
        let resolved = resolve_gap(&short, neutral(), 2000.0);
        assert!(approx(resolved.move_ms, 1000.0));
    }
}
