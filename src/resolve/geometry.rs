use serde::Serialize;

use crate::model::rig::Calibration;
use crate::model::{FixtureId, PatternId, PatternParams, RoleName};

use super::catalog::PatternCatalog;
use super::{HandlerNotFound, RegistryKind};

/// A static normalized pose: pan and tilt in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanTilt {
    pub pan: f64,
    pub tilt: f64,
}

impl PanTilt {
    pub fn new(pan: f64, tilt: f64) -> Self {
        Self {
            pan: pan.clamp(0.0, 1.0),
            tilt: tilt.clamp(0.0, 1.0),
        }
    }

    /// The neutral pose for a fixture's calibration.
    pub fn neutral(cal: &Calibration) -> Self {
        Self {
            pan: cal.pan.center,
            tilt: cal.tilt.center,
        }
    }
}

/// Where one fixture sits inside the set a step targets. Pose handlers
/// use this to spread a look across the group.
#[derive(Debug, Clone, Copy)]
pub struct FixtureContext<'a> {
    pub fixture: &'a FixtureId,
    pub role: Option<&'a RoleName>,
    /// 0-based position within the targeted set.
    pub index: usize,
    /// Size of the targeted set.
    pub count: usize,
}

impl FixtureContext<'_> {
    /// Normalized position across the set: 0 for the first fixture,
    /// 1 for the last; 0.5 for a set of one.
    pub fn spread_frac(&self) -> f64 {
        if self.count < 2 {
            0.5
        } else {
            self.index as f64 / (self.count - 1) as f64
        }
    }
}

/// Built-in pose patterns. Pure functions: context + params → pose;
/// never any time variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryHandler {
    /// Pans spread evenly across the group, shared tilt.
    Fan,
    /// Everything at the calibration center.
    Center,
    /// One explicit pose for the whole group.
    Pose,
    /// Outer fixtures angle inward toward a shared focal pose.
    Mirror,
    /// Pan and tilt both spread, corner to corner.
    Diagonal,
}

impl GeometryHandler {
    pub const BUILTIN_IDS: [&'static str; 5] = ["fan", "center", "pose", "mirror", "diagonal"];

    pub fn from_id(id: &PatternId) -> Option<Self> {
        match id.0.as_str() {
            "fan" => Some(Self::Fan),
            "center" => Some(Self::Center),
            "pose" => Some(Self::Pose),
            "mirror" => Some(Self::Mirror),
            "diagonal" => Some(Self::Diagonal),
            _ => None,
        }
    }

    /// Resolve the pose for one fixture. Output is clamped into the
    /// fixture's calibrated travel.
    pub fn resolve(
        self,
        ctx: &FixtureContext<'_>,
        params: &PatternParams,
        cal: &Calibration,
    ) -> PanTilt {
        let cp = params.center_pan_or(cal.pan.center);
        let ct = params.center_tilt_or(cal.tilt.center);
        let width = params.width_or(0.6);
        let height = params.height_or(0.3);
        let frac = ctx.spread_frac();

        let (pan, tilt) = match self {
            Self::Fan => (cp + (frac - 0.5) * width, ct),
            Self::Center => (cal.pan.center, cal.tilt.center),
            Self::Pose => (cp, ct),
            Self::Mirror => {
                // Symmetric: distance from the middle of the group sets
                // how far the head turns toward the focal pose.
                let lean = (frac - 0.5).abs() * width;
                let side = if frac < 0.5 { 1.0 } else { -1.0 };
                (cp + side * lean, ct)
            }
            Self::Diagonal => (cp + (frac - 0.5) * width, ct + (frac - 0.5) * height),
        };

        PanTilt::new(cal.pan.clamp(pan), cal.tilt.clamp(tilt))
    }
}

/// Pose registry: built-ins first, catalog as the default fallback.
pub struct GeometryRegistry<'a> {
    catalog: &'a PatternCatalog,
}

impl<'a> GeometryRegistry<'a> {
    pub fn new(catalog: &'a PatternCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(
        &self,
        id: &PatternId,
        ctx: &FixtureContext<'_>,
        params: &PatternParams,
        cal: &Calibration,
    ) -> Result<PanTilt, HandlerNotFound> {
        if let Some(handler) = GeometryHandler::from_id(id) {
            return Ok(handler.resolve(ctx, params, cal));
        }
        if let Some(entry) = self.catalog.geometry(id) {
            let merged = entry.params.merged_with(params);
            return Ok(entry.handler.resolve(ctx, &merged, cal));
        }
        Err(HandlerNotFound {
            kind: RegistryKind::Geometry,
            id: id.clone(),
            known: self.known_ids(),
        })
    }

    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = GeometryHandler::BUILTIN_IDS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        ids.extend(self.catalog.geometry_ids().map(|id| id.0.clone()));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(fixture: &'a FixtureId, index: usize, count: usize) -> FixtureContext<'a> {
        FixtureContext {
            fixture,
            role: None,
            index,
            count,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fan_spreads_pan_across_group() {
        let cal = Calibration::default();
        let id = FixtureId::from("mh1");
        let params = PatternParams {
            width: Some(0.4),
            ..PatternParams::default()
        };
        let left = GeometryHandler::Fan.resolve(&ctx(&id, 0, 4), &params, &cal);
        let right = GeometryHandler::Fan.resolve(&ctx(&id, 3, 4), &params, &cal);
        assert!(approx(left.pan, 0.3));
        assert!(approx(right.pan, 0.7));
        assert!(approx(left.tilt, 0.5));
    }

    #[test]
    fn fan_of_one_sits_at_center() {
        let cal = Calibration::default();
        let id = FixtureId::from("solo");
        let pose = GeometryHandler::Fan.resolve(&ctx(&id, 0, 1), &PatternParams::default(), &cal);
        assert!(approx(pose.pan, 0.5));
    }

    #[test]
    fn mirror_is_symmetric() {
        let cal = Calibration::default();
        let id = FixtureId::from("mh1");
        let params = PatternParams {
            width: Some(0.4),
            ..PatternParams::default()
        };
        let a = GeometryHandler::Mirror.resolve(&ctx(&id, 0, 4), &params, &cal);
        let b = GeometryHandler::Mirror.resolve(&ctx(&id, 3, 4), &params, &cal);
        assert!(approx(a.pan - 0.5, -(b.pan - 0.5)));
    }

    #[test]
    fn poses_respect_calibrated_travel() {
        let mut cal = Calibration::default();
        cal.pan.min = 0.3;
        cal.pan.max = 0.7;
        let id = FixtureId::from("mh1");
        let params = PatternParams {
            width: Some(1.0),
            ..PatternParams::default()
        };
        let left = GeometryHandler::Fan.resolve(&ctx(&id, 0, 2), &params, &cal);
        assert!(approx(left.pan, 0.3));
    }

    #[test]
    fn registry_falls_back_to_catalog() {
        let catalog = PatternCatalog::standard();
        let registry = GeometryRegistry::new(&catalog);
        let cal = Calibration::default();
        let id = FixtureId::from("mh1");
        // "spread_wide" is a catalog alias for a wide fan.
        let pose = registry
            .resolve(
                &"spread_wide".into(),
                &ctx(&id, 0, 2),
                &PatternParams::default(),
                &cal,
            )
            .unwrap();
        assert!(pose.pan < 0.5);
    }

    #[test]
    fn unknown_pattern_names_known_ids() {
        let catalog = PatternCatalog::standard();
        let registry = GeometryRegistry::new(&catalog);
        let cal = Calibration::default();
        let id = FixtureId::from("mh1");
        let err = registry
            .resolve(
                &"martian_orbit".into(),
                &ctx(&id, 0, 1),
                &PatternParams::default(),
                &cal,
            )
            .unwrap_err();
        assert_eq!(err.kind, RegistryKind::Geometry);
        assert_eq!(err.id, "martian_orbit".into());
        assert!(err.known.iter().any(|k| k == "fan"));
    }
}
