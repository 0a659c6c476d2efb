//! End-to-end compilation scenarios: plan + rig + grid in, segment list
//! and diagnostics out.

use indexmap::IndexMap;

use beamweaver::channels::ChannelValue;
use beamweaver::engine::Compiler;
use beamweaver::error::CompileError;
use beamweaver::library::InMemoryTemplateLibrary;
use beamweaver::model::rig::{ChannelMap, DmxAddress};
use beamweaver::model::template::{
    BaseTiming, DistributionShape, GeometrySpec, MovementSpec, PatternParams, PhaseMode,
    PhaseOffsetSpec, RemainderPolicy, RepeatContract, RepeatMode, Step, TargetToken,
    TemplateMetadata,
};
use beamweaver::model::{
    BeatGrid, Calibration, ChoreographyPlan, FixtureId, FixtureProfile, Intensity, LogicalChannel,
    Quantize, RigProfile, SectionOverrides, SectionPlan, Template, ALL_GROUP,
};
use beamweaver::resolve::PatternCatalog;
use beamweaver::RenderedEffect;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1.0 // ms tolerance
}

fn fixture(id: &str, base_address: u16) -> FixtureProfile {
    let mut channels = IndexMap::new();
    channels.insert(LogicalChannel::Pan, DmxAddress::new(base_address).unwrap());
    channels.insert(
        LogicalChannel::Tilt,
        DmxAddress::new(base_address + 1).unwrap(),
    );
    channels.insert(
        LogicalChannel::Dimmer,
        DmxAddress::new(base_address + 2).unwrap(),
    );
    FixtureProfile {
        id: id.into(),
        name: id.to_uppercase(),
        channels: ChannelMap {
            channels,
            inverted: Default::default(),
        },
        calibration: None,
    }
}

fn rig4() -> RigProfile {
    RigProfile::new(
        vec![
            fixture("mh1", 1),
            fixture("mh2", 11),
            fixture("mh3", 21),
            fixture("mh4", 31),
        ],
        IndexMap::new(),
        IndexMap::from([(
            "left_to_right".into(),
            vec!["mh1".into(), "mh2".into(), "mh3".into(), "mh4".into()],
        )]),
        Calibration::default(),
    )
    .unwrap()
}

fn sweep_step(id: &str, duration_bars: f64, phase: Option<PhaseOffsetSpec>) -> Step {
    Step {
        id: id.into(),
        target: TargetToken::All,
        timing: BaseTiming {
            start_bar: 0.0,
            duration_bars,
            quantize: Quantize::None,
            phase_offset: phase,
        },
        geometry: GeometrySpec {
            pattern: "fan".into(),
            params: PatternParams::default(),
        },
        movement: Some(MovementSpec {
            pattern: "sweep".into(),
            intensity: Intensity::Medium,
            cycles: 1.0,
            params: PatternParams::default(),
        }),
        dimmer: None,
        entry: None,
        exit: None,
        priority: 0,
        blend: Default::default(),
    }
}

fn template(id: &str, steps: Vec<Step>, repeat: RepeatContract) -> Template {
    Template {
        id: id.into(),
        version: 1,
        roles: IndexMap::new(),
        steps,
        repeat,
        channel_bounds: IndexMap::new(),
        metadata: TemplateMetadata::default(),
    }
}

fn section(name: &str, start_bar: f64, end_bar: f64, template_id: &str) -> SectionPlan {
    SectionPlan {
        section_name: name.into(),
        start_bar,
        end_bar,
        template_id: template_id.into(),
        preset_id: None,
        params: SectionOverrides::default(),
    }
}

fn compile(
    rig: &RigProfile,
    grid: &BeatGrid,
    library: &InMemoryTemplateLibrary,
    plan: &ChoreographyPlan,
) -> Result<beamweaver::CompileOutput, CompileError> {
    let catalog = PatternCatalog::standard();
    Compiler::new(rig, grid, library, &catalog).compile(plan)
}

fn pan_steps(effects: &[RenderedEffect], fixture: &str) -> Vec<RenderedEffect> {
    effects
        .iter()
        .filter(|e| {
            e.fixture == FixtureId::from(fixture)
                && e.channel == LogicalChannel::Pan
                && matches!(e.value, ChannelValue::Curve(_))
        })
        .cloned()
        .collect()
}

#[test]
fn sweep_chase_with_phase_offsets() {
    // One section, one SWEEP step of 4 bars at 120 BPM (2000 ms/bar) on
    // 4 fixtures, group-order phase offset with a half-bar (1000 ms)
    // spread: expect 4 step segments of 8000 ms starting at 0, 333,
    // 667, 1000 ms.
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_chase",
            vec![sweep_step(
                "a",
                4.0,
                Some(PhaseOffsetSpec {
                    mode: PhaseMode::GroupOrder,
                    group: Some(ALL_GROUP.into()),
                    order: Some("left_to_right".into()),
                    spread_bars: 0.5,
                    shape: DistributionShape::Linear,
                    wrap: false,
                }),
            )],
            RepeatContract::default(),
        ))
        .unwrap();

    let plan = ChoreographyPlan {
        sections: vec![section("drop", 0.0, 5.0, "sweep_chase")],
        song_duration_bars: Some(5.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    assert!(out.skipped.is_empty());

    let mut starts = Vec::new();
    for id in ["mh1", "mh2", "mh3", "mh4"] {
        let steps = pan_steps(&out.effects, id);
        assert_eq!(steps.len(), 1, "{id} should carry one sweep segment");
        assert!(
            approx(steps[0].span.duration_ms(), 8000.0),
            "{id} sweep should last 4 bars"
        );
        starts.push(steps[0].span.start_ms());
    }
    assert!(approx(starts[0], 0.0));
    assert!(approx(starts[1], 1000.0 / 3.0));
    assert!(approx(starts[2], 2000.0 / 3.0));
    assert!(approx(starts[3], 1000.0));
}

#[test]
fn pan_timeline_tiles_the_whole_song() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_once",
            vec![sweep_step("a", 4.0, None)],
            RepeatContract::default(),
        ))
        .unwrap();

    // Section sits in the middle of the song: start gap, step,
    // end gap - all of it must be covered on every fixture.
    let plan = ChoreographyPlan {
        sections: vec![section("verse", 2.0, 6.0, "sweep_once")],
        song_duration_bars: Some(8.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    for id in ["mh1", "mh2", "mh3", "mh4"] {
        let mut spans: Vec<(f64, f64)> = out
            .effects
            .iter()
            .filter(|e| e.fixture == FixtureId::from(id) && e.channel == LogicalChannel::Pan)
            .map(|e| (e.span.start_ms(), e.span.end_ms()))
            .collect();
        spans.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let mut cursor = 0.0;
        for (start, end) in &spans {
            assert!(
                approx(*start, cursor),
                "{id}: segment starts at {start}, expected {cursor}"
            );
            cursor = *end;
        }
        assert!(approx(cursor, 16_000.0), "{id}: timeline ends at {cursor}");
    }
}

#[test]
fn ping_pong_repeat_fills_ten_bar_window() {
    // repeat.mode=ping_pong, cycle_bars=4, in a 10-bar section: 2 full
    // cycles (one forward, one backward) plus a 2-bar remainder held as
    // the last pose. Total per-fixture duration = 10 bars = 20 000 ms.
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "bouncer",
            vec![sweep_step("a", 4.0, None)],
            RepeatContract {
                repeatable: true,
                mode: RepeatMode::PingPong,
                cycle_bars: 4.0,
                loop_steps: vec!["a".into()],
                remainder: RemainderPolicy::HoldLastPose,
            },
        ))
        .unwrap();

    let plan = ChoreographyPlan {
        sections: vec![section("chorus", 0.0, 10.0, "bouncer")],
        song_duration_bars: Some(10.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    assert!(out.skipped.is_empty());

    for id in ["mh1", "mh2", "mh3", "mh4"] {
        let pan: Vec<RenderedEffect> = out
            .effects
            .iter()
            .filter(|e| e.fixture == FixtureId::from(id) && e.channel == LogicalChannel::Pan)
            .cloned()
            .collect();
        // Two curve segments (forward + backward cycles) and one static
        // hold for the remainder.
        assert_eq!(pan.len(), 3, "{id}");
        let total: f64 = pan.iter().map(|e| e.span.duration_ms()).sum();
        assert!(approx(total, 20_000.0), "{id}: total {total}");
        let holds = pan
            .iter()
            .filter(|e| matches!(e.value, ChannelValue::Static(_)))
            .count();
        assert_eq!(holds, 1, "{id}: remainder should be a held pose");
        let hold = pan
            .iter()
            .find(|e| matches!(e.value, ChannelValue::Static(_)))
            .unwrap();
        assert!(approx(hold.span.start_ms(), 16_000.0));
        assert!(approx(hold.span.end_ms(), 20_000.0));
    }
}

#[test]
fn empty_plan_is_structural() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let library = InMemoryTemplateLibrary::new();
    let plan = ChoreographyPlan {
        sections: vec![],
        song_duration_bars: None,
    };
    assert!(matches!(
        compile(&rig, &grid, &library, &plan),
        Err(CompileError::EmptyPlan)
    ));
}

#[test]
fn missing_template_is_structural() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let library = InMemoryTemplateLibrary::new();
    let plan = ChoreographyPlan {
        sections: vec![section("verse", 0.0, 4.0, "ghost")],
        song_duration_bars: None,
    };
    assert!(matches!(
        compile(&rig, &grid, &library, &plan),
        Err(CompileError::Template { .. })
    ));
}

#[test]
fn malformed_section_is_structural() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_once",
            vec![sweep_step("a", 4.0, None)],
            RepeatContract::default(),
        ))
        .unwrap();
    let plan = ChoreographyPlan {
        sections: vec![section("verse", 4.0, 4.0, "sweep_once")],
        song_duration_bars: None,
    };
    assert!(matches!(
        compile(&rig, &grid, &library, &plan),
        Err(CompileError::MalformedSection { .. })
    ));
}

#[test]
fn unknown_preset_is_structural() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_once",
            vec![sweep_step("a", 4.0, None)],
            RepeatContract::default(),
        ))
        .unwrap();
    let mut sec = section("verse", 0.0, 4.0, "sweep_once");
    sec.preset_id = Some("big_room".into());
    let plan = ChoreographyPlan {
        sections: vec![sec],
        song_duration_bars: None,
    };
    assert!(matches!(
        compile(&rig, &grid, &library, &plan),
        Err(CompileError::PresetNotFound { .. })
    ));
}

#[test]
fn unknown_pattern_skips_but_run_succeeds() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();

    let mut bad = sweep_step("broken", 2.0, None);
    bad.geometry.pattern = "hypercube".into();
    let good = sweep_step("fine", 2.0, None);
    let mut bad_timing = bad.timing.clone();
    bad_timing.start_bar = 2.0;
    bad.timing = bad_timing;

    library
        .insert(template(
            "mixed",
            vec![good, bad],
            RepeatContract::default(),
        ))
        .unwrap();

    let plan = ChoreographyPlan {
        sections: vec![section("verse", 0.0, 4.0, "mixed")],
        song_duration_bars: Some(4.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    // The good step rendered on all four fixtures.
    for id in ["mh1", "mh2", "mh3", "mh4"] {
        assert_eq!(pan_steps(&out.effects, id).len(), 1, "{id}");
    }
    // The broken one reported once per fixture, naming the pattern.
    assert_eq!(out.skipped.len(), 4);
    assert!(out.skipped.iter().all(|s| s.reason.contains("hypercube")));
}

#[test]
fn preset_overrides_apply_under_section_params() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();

    let mut step = sweep_step("a", 4.0, None);
    step.dimmer = Some(beamweaver::model::template::DimmerSpec {
        pattern: "hold".into(),
        intensity: Intensity::Strong,
        min: 0.0,
        max: 1.0,
        cycles: 1.0,
        params: PatternParams::default(),
    });
    library
        .insert(template("lit", vec![step], RepeatContract::default()))
        .unwrap();

    let mut sec = section("verse", 0.0, 4.0, "lit");
    sec.preset_id = Some("dim_room".into());
    let plan = ChoreographyPlan {
        sections: vec![sec],
        song_duration_bars: Some(4.0),
    };

    let catalog = PatternCatalog::standard();
    let presets = IndexMap::from([(
        "dim_room".to_owned(),
        SectionOverrides {
            intensity: Some(Intensity::Subtle),
            dimmer_max: Some(0.4),
            ..SectionOverrides::default()
        },
    )]);
    let out = Compiler::new(&rig, &grid, &library, &catalog)
        .with_presets(presets)
        .compile(&plan)
        .unwrap();

    let dimmer = out
        .effects
        .iter()
        .find(|e| {
            e.fixture == FixtureId::from("mh1")
                && e.channel == LogicalChannel::Dimmer
                && approx(e.span.duration_ms(), 8000.0)
        })
        .unwrap();
    // hold at min + (max−min)·level = 0 + 0.4·0.25 = 0.1 → 26.
    assert_eq!(dimmer.value, ChannelValue::Static(26));
}

#[test]
fn gap_fill_holds_neutral_between_sections() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_once",
            vec![sweep_step("a", 2.0, None)],
            RepeatContract::default(),
        ))
        .unwrap();

    let plan = ChoreographyPlan {
        sections: vec![
            section("verse", 0.0, 2.0, "sweep_once"),
            section("chorus", 6.0, 8.0, "sweep_once"),
        ],
        song_duration_bars: Some(8.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    // The inter-section gap (bars 2..6 → 4000..12000 ms) holds neutral
    // pan on every fixture.
    let hold = out
        .effects
        .iter()
        .find(|e| {
            e.fixture == FixtureId::from("mh1")
                && e.channel == LogicalChannel::Pan
                && approx(e.span.start_ms(), 4000.0)
        })
        .unwrap();
    assert!(approx(hold.span.end_ms(), 12_000.0));
    assert_eq!(hold.value, ChannelValue::Static(128));
}

#[test]
fn boundaries_are_reported() {
    let rig = rig4();
    let grid = BeatGrid::constant(120.0, 4).unwrap();
    let mut library = InMemoryTemplateLibrary::new();
    library
        .insert(template(
            "sweep_once",
            vec![sweep_step("a", 2.0, None)],
            RepeatContract::default(),
        ))
        .unwrap();

    let plan = ChoreographyPlan {
        sections: vec![
            section("verse", 0.0, 2.0, "sweep_once"),
            section("chorus", 4.0, 6.0, "sweep_once"),
        ],
        song_duration_bars: Some(6.0),
    };

    let out = compile(&rig, &grid, &library, &plan).unwrap();
    assert!(out
        .boundaries
        .iter()
        .any(|b| b.source == "verse" && b.target == "chorus"));
}
