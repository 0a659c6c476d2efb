//! beamweaver - a template-to-timeline compiler for moving-light
//! choreography.
//!
//! Given a declarative choreography plan (ordered sections bound to
//! named templates), a rig description, and a musical beat grid, the
//! compiler produces a fully resolved, time-ordered set of per-fixture
//! DMX channel curves ready for export:
//!
//! 1. Semantic resolution - role/pose tokens become normalized
//!    positions and curves ([`resolve`], [`curves`]).
//! 2. Temporal scheduling - bar-relative steps land on the absolute
//!    grid, repeats unroll, phase offsets fan out ([`schedule`]).
//! 3. Assembly and transitions - one contiguous per-fixture timeline
//!    with every gap resolved against its neighbors' actual anchors
//!    ([`timeline`], [`transition`]).
//! 4. Channel fitting - curves reparametrized into device limits and
//!    mapped onto the DMX patch ([`channels`]).
//!
//! [`engine::Compiler`] drives the whole pass and returns the flat
//! segment list plus structured diagnostics; nothing here does file or
//! network I/O, and a run either completes or fails with a
//! [`error::CompileError`] naming the offending plan entry.

pub mod channels;
pub mod curves;
pub mod engine;
pub mod error;
pub mod library;
pub mod model;
pub mod physics;
pub mod report;
pub mod resolve;
pub mod schedule;
pub mod timeline;
pub mod transition;

pub use channels::{ChannelValue, DmxBounds, RenderedEffect};
pub use engine::{CompileOptions, Compiler};
pub use error::CompileError;
pub use library::{InMemoryTemplateLibrary, LibraryError, TemplateLibrary};
pub use model::{BeatGrid, ChoreographyPlan, RigProfile, SectionPlan, Template};
pub use report::{Advisory, CompileOutput, SkippedInstruction};
pub use resolve::PatternCatalog;
