//! mdslice
//!
//! Turns a rendered markdown surface into a fixed-page-size, image-backed PDF.
//! The surface is captured once as a single tall bitmap, sliced into page-sized
//! segments and every segment is composited onto a background-filled page with
//! the same margins.
//!
//! # Features
//!
//! - **Software capture** (default): built-in block layout and rasterizer, no browser needed
//! - **CDP capture** (`cdp`): headless Chrome via the DevTools protocol
//! - **Injected collaborators**: capture backend, markdown renderer and artifact sink are traits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mdslice::{Backend, ExportConfig, Exporter, FileSink};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let capturer = mdslice::new_capturer(Backend::Software)?;
//! let sink = Arc::new(FileSink::new("out"));
//! let exporter = Exporter::new(ExportConfig::default(), capturer, sink)?
//!     .on_notice(|notice| println!("{}", notice));
//!
//! let artifact = exporter.export_markdown("# Hello\n\nWorld", "hello").await?;
//! println!("wrote {}", artifact.name);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod color;
pub mod geometry;
pub mod units;

pub mod markdown;
pub mod surface;

// Capture backends and the worker thread that drives them
pub mod async_api;
pub mod capture;

// Layout, paint and raster for the software backend
#[cfg(feature = "software")]
pub mod rendering;

pub mod compose;
pub mod paginate;
pub mod pdf;

pub mod config;
pub mod document;
pub mod export;
pub mod sink;

pub use capture::{new_capturer, Backend, CaptureConfig, RasterBitmap, SurfaceCapturer};
pub use color::Rgb;
pub use config::{ExportConfig, InsetCompensation};
pub use document::Document;
pub use export::{Exporter, Notice, NoticeLevel};
pub use geometry::{Margins, Orientation, PageFormat, PageGeometry};
pub use markdown::{CommonMarkRenderer, MarkdownRenderer};
pub use pdf::ImageEncoding;
pub use sink::{artifact_name, Artifact, ArtifactSink, FileSink, MemorySink};
pub use surface::{Surface, SurfaceStyle};
