//! Surface capture: backends that turn a normalized surface into one bitmap.
//!
//! A backend implements [`SurfaceCapturer`]. Opening it on a
//! [`NormalizedSurface`] yields a [`CaptureSession`] which owns the clone and
//! whatever the backend needed to lay it out (a browser tab, a parsed DOM).
//! Dropping the session releases all of it.

use crate::color::Rgb;
use crate::surface::NormalizedSurface;
use crate::{Error, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};

#[cfg(feature = "software")]
pub mod software;

#[cfg(feature = "cdp")]
pub mod cdp;

/// Laid-out size of a surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceMetrics {
    pub width_px: u32,
    pub height_px: u32,
}

impl SurfaceMetrics {
    pub fn is_empty(&self) -> bool {
        self.width_px == 0 || self.height_px == 0
    }
}

/// Immutable per-export capture parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Bitmap pixels per CSS pixel
    pub scale: f64,
    pub background: Rgb,
    /// Must equal the surface's laid-out width
    pub width_px: u32,
    /// Must equal the surface's laid-out height
    pub height_px: u32,
}

impl CaptureConfig {
    pub fn new(scale: f64, background: Rgb, metrics: SurfaceMetrics) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "capture scale must be positive, got {}",
                scale
            )));
        }
        if metrics.is_empty() {
            return Err(Error::EmptySurface);
        }
        Ok(Self {
            scale,
            background,
            width_px: metrics.width_px,
            height_px: metrics.height_px,
        })
    }

    /// Expected bitmap size: the laid-out size multiplied by the scale.
    pub fn bitmap_size(&self) -> (u32, u32) {
        (
            (self.width_px as f64 * self.scale).round() as u32,
            (self.height_px as f64 * self.scale).round() as u32,
        )
    }
}

/// The captured raster of a full surface.
#[derive(Debug, Clone)]
pub struct RasterBitmap {
    image: RgbImage,
    scale: f64,
}

impl RasterBitmap {
    pub fn new(image: RgbImage, scale: f64) -> Self {
        Self { image, scale }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Raw RGB bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width() as usize * 3;
        let start = y as usize * stride;
        &self.image.as_raw()[start..start + stride]
    }

    /// Hex SHA-256 of dimensions and pixel data.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_le_bytes());
        hasher.update(self.height().to_le_bytes());
        hasher.update(self.image.as_raw());
        hex::encode(hasher.finalize())
    }
}

/// A capture backend.
pub trait SurfaceCapturer: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Take ownership of the normalized clone and prepare it for capture.
    ///
    /// Fails with [`Error::CaptureUnavailable`] when the backend cannot run.
    fn open(&self, surface: NormalizedSurface) -> Result<Box<dyn CaptureSession>>;
}

/// One surface opened in a backend.
pub trait CaptureSession {
    /// Measure the laid-out surface.
    fn layout(&mut self) -> Result<SurfaceMetrics>;

    /// Rasterize the full surface at `config.scale`.
    fn rasterize(&mut self, config: &CaptureConfig) -> Result<RasterBitmap>;
}

/// Which built-in backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Built-in block-layout rasterizer
    #[default]
    Software,
    /// Headless Chrome over the DevTools protocol
    Cdp,
}

/// Create a built-in capturer.
///
/// A backend that was not compiled in is reported as unavailable rather than
/// silently replaced by another one.
pub fn new_capturer(backend: Backend) -> Result<std::sync::Arc<dyn SurfaceCapturer>> {
    match backend {
        #[cfg(feature = "software")]
        Backend::Software => Ok(std::sync::Arc::new(software::SoftwareCapturer::new())),
        #[cfg(feature = "cdp")]
        Backend::Cdp => Ok(std::sync::Arc::new(cdp::CdpCapturer::new())),
        #[allow(unreachable_patterns)]
        other => Err(Error::CaptureUnavailable(format!(
            "{:?} backend is not compiled into this build",
            other
        ))),
    }
}
