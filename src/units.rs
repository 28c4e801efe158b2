//! Conversions between raster pixels, millimetres, page fractions and PDF points.
//!
//! Capture happens at a scale factor (bitmap pixels per CSS pixel). The
//! millimetre-per-pixel factor is derived horizontally, from the printable
//! content width and the bitmap width, and reused for vertical distances: the
//! capture is assumed to have no skew between axes.

use crate::{Error, Result};

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;
/// PDF user-space points per inch.
pub const PT_PER_INCH: f64 = 72.0;

/// Convert a pixel distance to millimetres given a pixel density.
pub fn px_to_mm(px: f64, px_per_mm: f64) -> f64 {
    px / px_per_mm
}

/// Convert a millimetre distance to pixels given a pixel density.
pub fn mm_to_px(mm: f64, px_per_mm: f64) -> f64 {
    mm * px_per_mm
}

/// Express `mm` as a fraction of `extent_mm` (e.g. of the page height).
pub fn mm_to_fraction(mm: f64, extent_mm: f64) -> f64 {
    if extent_mm == 0.0 {
        0.0
    } else {
        mm / extent_mm
    }
}

pub fn fraction_to_mm(fraction: f64, extent_mm: f64) -> f64 {
    fraction * extent_mm
}

/// Millimetres to PDF points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm / MM_PER_INCH * PT_PER_INCH
}

/// Pixel/millimetre converter for one captured bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    /// Millimetres covered by one CSS pixel of the captured surface
    mm_per_px: f64,
    /// Bitmap pixels per CSS pixel
    scale: f64,
}

impl UnitConverter {
    pub fn new(mm_per_px: f64, scale: f64) -> Result<Self> {
        if !(mm_per_px.is_finite() && mm_per_px > 0.0) {
            return Err(Error::ConfigError(format!(
                "mm per pixel must be positive, got {}",
                mm_per_px
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "capture scale must be positive, got {}",
                scale
            )));
        }
        Ok(Self { mm_per_px, scale })
    }

    /// Build the converter that maps a bitmap of `bitmap_width_px` exactly onto
    /// `content_width_mm`: `mm_per_px = content_width_mm / (bitmap_width_px / scale)`.
    pub fn for_capture(content_width_mm: f64, bitmap_width_px: u32, scale: f64) -> Result<Self> {
        if bitmap_width_px == 0 {
            return Err(Error::EmptySurface);
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "capture scale must be positive, got {}",
                scale
            )));
        }
        let css_width = bitmap_width_px as f64 / scale;
        Self::new(content_width_mm / css_width, scale)
    }

    pub fn mm_per_px(&self) -> f64 {
        self.mm_per_px
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Bitmap pixels per millimetre.
    pub fn px_per_mm(&self) -> f64 {
        self.scale / self.mm_per_px
    }

    /// Millimetres covered by one bitmap pixel.
    pub fn mm_per_bitmap_px(&self) -> f64 {
        self.mm_per_px / self.scale
    }

    /// Bitmap pixels to millimetres.
    pub fn px_to_mm(&self, px: f64) -> f64 {
        px_to_mm(px, self.px_per_mm())
    }

    /// Millimetres to (fractional) bitmap pixels.
    pub fn mm_to_px(&self, mm: f64) -> f64 {
        mm_to_px(mm, self.px_per_mm())
    }

    /// CSS pixels of the source surface to millimetres.
    pub fn css_px_to_mm(&self, css_px: f64) -> f64 {
        css_px * self.mm_per_px
    }

    /// Millimetres to whole bitmap pixels, rounded to the nearest pixel.
    pub fn mm_to_px_rounded(&self, mm: f64) -> u32 {
        self.mm_to_px(mm).round().max(0.0) as u32
    }

    /// Number of whole bitmap pixels that fit in `mm`.
    ///
    /// A tiny epsilon keeps exact quotients such as 1199.9999999 at 1200.
    pub fn mm_to_px_floor(&self, mm: f64) -> u32 {
        (self.mm_to_px(mm) + 1e-6).floor().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capture_factor_matches_content_width() {
        // 794 CSS px captured at 3x onto 170mm of printable width
        let conv = UnitConverter::for_capture(170.0, 2382, 3.0).unwrap();
        assert!((conv.mm_per_px() - 170.0 / 794.0).abs() < 1e-12);
        assert!((conv.px_to_mm(2382.0) - 170.0).abs() < 1e-9);
        assert!((conv.css_px_to_mm(794.0) - 170.0).abs() < 1e-9);
    }

    #[test]
    fn round_trips_within_tolerance() {
        let conv = UnitConverter::for_capture(190.0, 1588, 2.0).unwrap();
        for px in [1.0, 17.5, 1200.0, 33333.0] {
            let back = conv.mm_to_px(conv.px_to_mm(px));
            assert!(conv.px_to_mm((back - px).abs()) < 0.01);
        }
    }

    #[test]
    fn floor_keeps_exact_quotients() {
        let conv = UnitConverter::new(0.25, 1.0).unwrap();
        assert_eq!(conv.mm_to_px_floor(300.0), 1200);
        assert_eq!(conv.mm_to_px_floor(300.2), 1200);
        assert_eq!(conv.mm_to_px_rounded(300.2), 1201);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(matches!(
            UnitConverter::for_capture(170.0, 0, 2.0),
            Err(Error::EmptySurface)
        ));
        assert!(UnitConverter::new(0.2, 0.0).is_err());
        assert!(UnitConverter::new(-1.0, 1.0).is_err());
    }

    #[test]
    fn fractions_and_points() {
        assert_eq!(mm_to_fraction(148.5, 297.0), 0.5);
        assert_eq!(mm_to_fraction(1.0, 0.0), 0.0);
        assert_eq!(fraction_to_mm(0.25, 200.0), 50.0);
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-12);
        assert!((mm_to_pt(210.0) - 595.2756).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn px_mm_round_trip(
            px in 0.001f64..1_000_000.0,
            content_mm in 10.0f64..1_000.0,
            width in 1u32..20_000,
            scale in 0.25f64..8.0,
        ) {
            let conv = UnitConverter::for_capture(content_mm, width, scale).unwrap();
            let back = conv.mm_to_px(conv.px_to_mm(px));
            prop_assert!((back - px).abs() <= px * 1e-9);
            prop_assert!(conv.px_to_mm(px) > 0.0);
        }

        #[test]
        fn free_functions_round_trip(x in 0.001f64..1_000_000.0, px_per_mm in 0.01f64..100.0) {
            let back = mm_to_px(px_to_mm(x, px_per_mm), px_per_mm);
            prop_assert!((back - x).abs() <= x * 1e-9);
            let extent = x * 2.0;
            prop_assert!((fraction_to_mm(mm_to_fraction(x, extent), extent) - x).abs() <= x * 1e-9);
        }
    }
}
