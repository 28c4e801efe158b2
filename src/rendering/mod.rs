//! Rendering for the software capture backend: fonts, layout, paint and raster

pub mod fonts;
pub mod layout;
pub mod paint;
pub mod raster;

pub use fonts::{FaceKind, FontSet};
pub use layout::{layout_document, DocumentLayout};
pub use paint::{paint_layout, Palette, PaintCommand};
pub use raster::rasterize;
