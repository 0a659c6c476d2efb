use indexmap::IndexMap;

use crate::model::{PatternId, PatternParams};

use super::dimmer::DimmerHandler;
use super::geometry::GeometryHandler;
use super::movement::MovementHandler;

/// A catalog entry: which built-in family handles the id, preloaded with
/// the params that give the alias its character. Step params still win
/// over these.
#[derive(Debug, Clone)]
pub struct CatalogEntry<H> {
    pub handler: H,
    pub params: PatternParams,
}

/// The broader pattern library the default handlers consult when a step
/// names something outside the built-in set.
///
/// Constructed once and passed into the resolvers - deliberately a
/// value, not module-level state, so alternative catalogs can be
/// injected wholesale.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    geometry: IndexMap<PatternId, CatalogEntry<GeometryHandler>>,
    movement: IndexMap<PatternId, CatalogEntry<MovementHandler>>,
    dimmer: IndexMap<PatternId, CatalogEntry<DimmerHandler>>,
}

impl PatternCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock catalog: the aliases templates in the wild actually use.
    pub fn standard() -> Self {
        let mut catalog = Self::new();

        catalog.add_geometry(
            "spread_wide",
            GeometryHandler::Fan,
            PatternParams {
                width: Some(0.9),
                ..PatternParams::default()
            },
        );
        catalog.add_geometry(
            "audience_scan",
            GeometryHandler::Fan,
            PatternParams {
                width: Some(0.7),
                center_tilt: Some(0.35),
                ..PatternParams::default()
            },
        );
        catalog.add_geometry(
            "crossed_beams",
            GeometryHandler::Mirror,
            PatternParams {
                width: Some(0.8),
                ..PatternParams::default()
            },
        );
        catalog.add_geometry(
            "skyward",
            GeometryHandler::Pose,
            PatternParams {
                center_tilt: Some(0.95),
                ..PatternParams::default()
            },
        );

        catalog.add_movement(
            "searchlight",
            MovementHandler::Sweep,
            PatternParams {
                width: Some(0.8),
                ..PatternParams::default()
            },
        );
        catalog.add_movement(
            "lazy_circle",
            MovementHandler::Circle,
            PatternParams {
                width: Some(0.5),
                height: Some(0.5),
                ..PatternParams::default()
            },
        );
        catalog.add_movement(
            "headbang",
            MovementHandler::Nod,
            PatternParams {
                height: Some(0.6),
                ..PatternParams::default()
            },
        );

        catalog.add_dimmer(
            "heartbeat",
            DimmerHandler::Pulse,
            PatternParams {
                duty_cycle: Some(0.1),
                ..PatternParams::default()
            },
        );
        catalog.add_dimmer(
            "candle",
            DimmerHandler::Flicker,
            PatternParams {
                rate: Some(12.0),
                ..PatternParams::default()
            },
        );
        catalog.add_dimmer("blinder", DimmerHandler::Hold, PatternParams::default());

        catalog
    }

    pub fn add_geometry(
        &mut self,
        id: &str,
        handler: GeometryHandler,
        params: PatternParams,
    ) -> &mut Self {
        self.geometry
            .insert(id.into(), CatalogEntry { handler, params });
        self
    }

    pub fn add_movement(
        &mut self,
        id: &str,
        handler: MovementHandler,
        params: PatternParams,
    ) -> &mut Self {
        self.movement
            .insert(id.into(), CatalogEntry { handler, params });
        self
    }

    pub fn add_dimmer(
        &mut self,
        id: &str,
        handler: DimmerHandler,
        params: PatternParams,
    ) -> &mut Self {
        self.dimmer
            .insert(id.into(), CatalogEntry { handler, params });
        self
    }

    pub fn geometry(&self, id: &PatternId) -> Option<&CatalogEntry<GeometryHandler>> {
        self.geometry.get(id)
    }

    pub fn movement(&self, id: &PatternId) -> Option<&CatalogEntry<MovementHandler>> {
        self.movement.get(id)
    }

    pub fn dimmer(&self, id: &PatternId) -> Option<&CatalogEntry<DimmerHandler>> {
        self.dimmer.get(id)
    }

    pub fn geometry_ids(&self) -> impl Iterator<Item = &PatternId> {
        self.geometry.keys()
    }

    pub fn movement_ids(&self) -> impl Iterator<Item = &PatternId> {
        self.movement.keys()
    }

    pub fn dimmer_ids(&self) -> impl Iterator<Item = &PatternId> {
        self.dimmer.keys()
    }
}
