use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::template::{Intensity, TemplateId};

/// Parameter overrides a section (or preset) may apply on top of its
/// template. Closed, explicitly enumerated fields; absent fields leave
/// the template's own values in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SectionOverrides {
    /// Overrides every movement/dimmer intensity in the section.
    pub intensity: Option<Intensity>,
    /// Overrides the dimmer floor (normalized) of every dimmer spec.
    pub dimmer_min: Option<f64>,
    /// Overrides the dimmer ceiling (normalized) of every dimmer spec.
    pub dimmer_max: Option<f64>,
    /// Overrides every phase-offset spread, in bars.
    pub spread_bars: Option<f64>,
}

impl SectionOverrides {
    /// Layer `self` over `base`: fields set here win.
    pub fn merged_over(&self, base: &SectionOverrides) -> SectionOverrides {
        SectionOverrides {
            intensity: self.intensity.or(base.intensity),
            dimmer_min: self.dimmer_min.or(base.dimmer_min),
            dimmer_max: self.dimmer_max.or(base.dimmer_max),
            spread_bars: self.spread_bars.or(base.spread_bars),
        }
    }
}

/// One planned section: a bar window bound to a template, with optional
/// preset and overrides. Produced by the external planner; consumed
/// read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionPlan {
    pub section_name: String,
    pub start_bar: f64,
    pub end_bar: f64,
    pub template_id: TemplateId,
    #[serde(default)]
    pub preset_id: Option<String>,
    #[serde(default)]
    pub params: SectionOverrides,
}

impl SectionPlan {
    pub fn duration_bars(&self) -> f64 {
        self.end_bar - self.start_bar
    }
}

/// The full choreography plan for one song: ordered sections plus the
/// declared song length (so the tail of the timeline can be classified).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoreographyPlan {
    pub sections: Vec<SectionPlan>,
    /// Declared song duration in bars. When absent, the timeline ends at
    /// the last section's end.
    #[serde(default)]
    pub song_duration_bars: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_merge_right_biased() {
        let preset = SectionOverrides {
            intensity: Some(Intensity::Strong),
            dimmer_max: Some(0.8),
            ..SectionOverrides::default()
        };
        let section = SectionOverrides {
            dimmer_max: Some(0.6),
            ..SectionOverrides::default()
        };
        let merged = section.merged_over(&preset);
        assert_eq!(merged.intensity, Some(Intensity::Strong));
        assert_eq!(merged.dimmer_max, Some(0.6));
        assert_eq!(merged.dimmer_min, None);
    }

    #[test]
    fn plan_serde_roundtrip() {
        let plan = ChoreographyPlan {
            sections: vec![SectionPlan {
                section_name: "chorus".into(),
                start_bar: 8.0,
                end_bar: 16.0,
                template_id: "sweep_chase".into(),
                preset_id: None,
                params: SectionOverrides::default(),
            }],
            song_duration_bars: Some(64.0),
        };
        let json = serde_json::to_string(&plan).unwrap();
        let back: ChoreographyPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
