//! Built-in capture backend.
//!
//! Needs no browser: the normalized HTML is laid out with the block layout in
//! [`crate::rendering`] and painted straight into the bitmap. Text is set in
//! the surface's font family as found on the system (or in a caller-supplied
//! font database) and drawn as anti-aliased glyph outlines. Layout is a block
//! flow without shaping or kerning, so line breaks can differ from a browser's.

use crate::capture::{CaptureConfig, CaptureSession, RasterBitmap, SurfaceCapturer, SurfaceMetrics};
use crate::rendering::fonts::system_database;
use crate::rendering::{layout_document, paint_layout, rasterize, DocumentLayout, FontSet, Palette};
use crate::surface::NormalizedSurface;
use crate::{Error, Result};
use fontdb::Database;
use log::{debug, warn};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SoftwareCapturer {
    fonts: Arc<Database>,
}

impl SoftwareCapturer {
    /// Capture with the system's fonts.
    pub fn new() -> Self {
        Self::with_fonts(system_database())
    }

    /// Capture with the faces in `fonts` only.
    pub fn with_fonts(fonts: Arc<Database>) -> Self {
        Self { fonts }
    }
}

impl Default for SoftwareCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceCapturer for SoftwareCapturer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn open(&self, surface: NormalizedSurface) -> Result<Box<dyn CaptureSession>> {
        let fonts = FontSet::resolve(&self.fonts, &surface.style().font_family);
        if fonts.is_empty() {
            warn!("no usable font faces; text will be drawn as placeholder bars");
        }
        Ok(Box::new(SoftwareSession {
            surface,
            fonts,
            layout: None,
        }))
    }
}

struct SoftwareSession {
    surface: NormalizedSurface,
    fonts: FontSet,
    layout: Option<DocumentLayout>,
}

impl SoftwareSession {
    fn ensure_layout(&mut self) -> &DocumentLayout {
        let surface = &self.surface;
        let fonts = &self.fonts;
        self.layout.get_or_insert_with(|| layout_document(surface, fonts))
    }
}

impl CaptureSession for SoftwareSession {
    fn layout(&mut self) -> Result<SurfaceMetrics> {
        let layout = self.ensure_layout();
        debug!("software layout: {} nodes, {}x{}px", layout.nodes.len(), layout.width, layout.height);
        Ok(SurfaceMetrics {
            width_px: layout.width,
            height_px: layout.height,
        })
    }

    fn rasterize(&mut self, config: &CaptureConfig) -> Result<RasterBitmap> {
        let palette = Palette::for_surface(self.surface.style());
        let layout = self.ensure_layout();
        if (config.width_px, config.height_px) != (layout.width, layout.height) {
            return Err(Error::RenderError(format!(
                "capture size {}x{} does not match the laid-out surface {}x{}",
                config.width_px, config.height_px, layout.width, layout.height
            )));
        }
        let commands = paint_layout(layout, &palette);
        rasterize(&commands, config, &self.fonts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::surface::{StyleNormalizer, Surface, SurfaceStyle};

    fn open(html: &str) -> Box<dyn CaptureSession> {
        let surface = Surface::from_html(html, SurfaceStyle::default());
        let clone = StyleNormalizer::default().normalize(&surface);
        SoftwareCapturer::new().open(clone).unwrap()
    }

    #[test]
    fn captures_at_scale() {
        let mut session = open("<h1>Title</h1><p>Body text</p>");
        let metrics = session.layout().unwrap();
        assert_eq!(metrics, SurfaceMetrics { width_px: 794, height_px: 1123 });
        let cfg = CaptureConfig::new(2.0, Rgb::new(0xfa, 0xf9, 0xf5), metrics).unwrap();
        let bmp = session.rasterize(&cfg).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (1588, 2246));
        // top-left corner lies inside the padding
        assert_eq!(bmp.image().get_pixel(0, 0).0, [0xfa, 0xf9, 0xf5]);
        assert!(bmp.image().pixels().any(|p| p.0 == [0x14, 0x14, 0x13]));
    }

    #[test]
    fn mismatched_capture_size_is_rejected() {
        let mut session = open("<p>x</p>");
        let metrics = session.layout().unwrap();
        let cfg = CaptureConfig::new(
            1.0,
            Rgb::WHITE,
            SurfaceMetrics { width_px: metrics.width_px + 1, height_px: metrics.height_px },
        )
        .unwrap();
        assert!(matches!(session.rasterize(&cfg), Err(Error::RenderError(_))));
    }

    #[test]
    fn missing_fonts_still_capture() {
        let surface = Surface::from_html("<p>no fonts here</p>", SurfaceStyle::default());
        let clone = StyleNormalizer::default().normalize(&surface);
        let capturer = SoftwareCapturer::with_fonts(Arc::new(Database::new()));
        let mut session = capturer.open(clone).unwrap();
        let metrics = session.layout().unwrap();
        let bmp = session.rasterize(&CaptureConfig::new(1.0, Rgb::WHITE, metrics).unwrap()).unwrap();
        assert!(bmp.image().pixels().any(|p| p.0 == [0x14, 0x14, 0x13]));
    }

    #[test]
    fn capture_is_deterministic() {
        let html = "<p>same <code>input</code></p><pre><code>fn a() {}\n</code></pre>";
        let digest = |html: &str| {
            let mut s = open(html);
            let m = s.layout().unwrap();
            s.rasterize(&CaptureConfig::new(1.0, Rgb::WHITE, m).unwrap()).unwrap().digest()
        };
        assert_eq!(digest(html), digest(html));
    }
}
