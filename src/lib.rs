//! Card Sheet Compositor - print-ready ID card imposition
//!
//! # Guarantees
//! 1. Geometry is computed once per build and never changes during it
//! 2. Placement order follows request order, never acquisition order
//! 3. A page is only emitted once it is closed
//! 4. Back pages mirror columns so a long-edge flip aligns both faces
//! 5. Missing artifacts degrade the build, bad configuration refuses it

pub mod print;
pub mod geometry;
pub mod validation;
pub mod artifacts;
pub mod compose;
pub mod hashing;
pub mod roster;
pub mod pipeline;
pub mod pdf;

pub use print::{PrintConfig, PageFormat, Orientation, CardSpec, BackDesign};
pub use geometry::{compute_geometry, PageGeometry, GeometryError, Rect, Segment};
pub use artifacts::{ArtifactProvider, ArtifactError, CardId, Face, RasterImage, RasterFormat, MemoryProvider, DirectoryProvider};
pub use compose::{CellAssignment, Page, PageComposer, Placement};
pub use roster::{Roster, Selection, Employee, Company};
pub use pipeline::{build, BuildError, BuildOutput, BuildReport, Document, DocumentAssembler, PrintRequest};
pub use pdf::{render_pdf, write_pdf, ExportError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
