use serde::Serialize;

use crate::library::LibraryError;
use crate::model::{RigError, TemplateError};

/// Structural failures that abort a compilation run. Everything
/// recoverable is reported through the run's diagnostics instead; these
/// are the cases where continuing would compile the wrong show.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum CompileError {
    #[error("the choreography plan has no sections")]
    EmptyPlan,
    #[error("section `{section}`: end bar {end_bar} is not after start bar {start_bar}")]
    MalformedSection {
        section: String,
        start_bar: f64,
        end_bar: f64,
    },
    #[error("sections `{first}` and `{second}` overlap at bar {at_bar}")]
    OverlappingSections {
        first: String,
        second: String,
        at_bar: f64,
    },
    #[error("section `{section}`: preset `{preset}` not found")]
    PresetNotFound { section: String, preset: String },
    #[error("section `{section}`: {source}")]
    Template {
        section: String,
        #[source]
        source: LibraryError,
    },
    #[error(transparent)]
    TemplateContent(#[from] TemplateError),
    #[error(transparent)]
    Rig(#[from] RigError),
}
