//! Diagram subsystem: view composition, auto-layout, raster export and
//! connection routing.

pub mod composer;
pub mod export;
pub mod layout;
pub mod router;

pub use composer::{AddToViewParams, DecorationParams};
pub use export::{ExportFormat, ExportParams, export_view};
pub use layout::{Algorithm, LayoutParams, RankDir, layout_view};
pub use router::apply_router;
