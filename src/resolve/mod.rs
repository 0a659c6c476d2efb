//! Semantic resolvers: named patterns + parameters → numbers.
//!
//! Three registries (geometry, movement, dimmer), each keyed by pattern
//! id. Lookup tries the built-in handlers first, then falls back to the
//! injected [`PatternCatalog`]; only when both miss does resolution fail,
//! naming the id, the registry kind, and everything it does know.

pub mod catalog;
pub mod dimmer;
pub mod geometry;
pub mod movement;

use std::fmt;

use serde::Serialize;

use crate::model::PatternId;

pub use catalog::PatternCatalog;
pub use dimmer::{DimmerHandler, DimmerRegistry, DimmerShape};
pub use geometry::{FixtureContext, GeometryHandler, GeometryRegistry, PanTilt};
pub use movement::{MovementHandler, MovementRegistry, MovementShape};

/// Which registry a resolution failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Geometry,
    Movement,
    Dimmer,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryKind::Geometry => "geometry",
            RegistryKind::Movement => "movement",
            RegistryKind::Dimmer => "dimmer",
        };
        write!(f, "{name}")
    }
}

/// A pattern id that neither the built-in handlers nor the catalog
/// recognize.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("no {kind} handler for pattern `{id}` (known: {known:?})")]
pub struct HandlerNotFound {
    pub kind: RegistryKind,
    pub id: PatternId,
    pub known: Vec<String>,
}
