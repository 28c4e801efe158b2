//! Page formats, margins and the derived printable area

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output paper size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    /// Arbitrary portrait size in millimetres
    Custom { width_mm: f64, height_mm: f64 },
}

impl PageFormat {
    /// Portrait width and height in millimetres.
    pub fn size_mm(self) -> (f64, f64) {
        match self {
            PageFormat::A3 => (297.0, 420.0),
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::A5 => (148.0, 210.0),
            PageFormat::Letter => (215.9, 279.4),
            PageFormat::Legal => (215.9, 355.6),
            PageFormat::Custom { width_mm, height_mm } => (width_mm, height_mm),
        }
    }
}

impl FromStr for PageFormat {
    type Err = Error;

    /// Accepts a named format (`a4`, `letter`, ...) or `WIDTHxHEIGHT` in millimetres.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| Error::ConfigError(format!("unknown page format '{}'", s)))?;
                let parse = |v: &str| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|_| Error::ConfigError(format!("invalid page size '{}'", s)))
                };
                Ok(PageFormat::Custom {
                    width_mm: parse(w)?,
                    height_mm: parse(h)?,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Margin thickness on each side, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(mm: f64) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }

    fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|m| m.is_finite() && *m >= 0.0)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

/// Physical page layout: paper size plus margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    page_width_mm: f64,
    page_height_mm: f64,
    margins: Margins,
}

impl PageGeometry {
    pub fn new(format: PageFormat, orientation: Orientation, margins: Margins) -> Result<Self> {
        let (w, h) = format.size_mm();
        let (page_width_mm, page_height_mm) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        if !(page_width_mm.is_finite() && page_height_mm.is_finite())
            || page_width_mm <= 0.0
            || page_height_mm <= 0.0
        {
            return Err(Error::ConfigError(format!(
                "page size must be positive, got {}x{}mm",
                page_width_mm, page_height_mm
            )));
        }
        if !margins.is_valid() {
            return Err(Error::ConfigError("margins must be non-negative".into()));
        }
        let geometry = Self {
            page_width_mm,
            page_height_mm,
            margins,
        };
        if geometry.content_width_mm() <= 0.0 || geometry.content_height_mm() <= 0.0 {
            return Err(Error::ConfigError(format!(
                "margins leave no printable area on a {}x{}mm page",
                page_width_mm, page_height_mm
            )));
        }
        Ok(geometry)
    }

    pub fn page_width_mm(&self) -> f64 {
        self.page_width_mm
    }

    pub fn page_height_mm(&self) -> f64 {
        self.page_height_mm
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Printable width: page width minus left and right margins.
    pub fn content_width_mm(&self) -> f64 {
        self.page_width_mm - self.margins.left - self.margins.right
    }

    /// Printable height: page height minus top and bottom margins.
    pub fn content_height_mm(&self) -> f64 {
        self.page_height_mm - self.margins.top - self.margins.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_portrait_printable_area() {
        let g = PageGeometry::new(PageFormat::A4, Orientation::Portrait, Margins::uniform(10.0)).unwrap();
        assert_eq!(g.content_width_mm(), 190.0);
        assert_eq!(g.content_height_mm(), 277.0);
    }

    #[test]
    fn landscape_swaps_axes() {
        let g = PageGeometry::new(PageFormat::Letter, Orientation::Landscape, Margins::uniform(0.0)).unwrap();
        assert_eq!(g.page_width_mm(), 279.4);
        assert_eq!(g.page_height_mm(), 215.9);
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let err = PageGeometry::new(PageFormat::A5, Orientation::Portrait, Margins::uniform(80.0)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(PageGeometry::new(PageFormat::A4, Orientation::Portrait, Margins::uniform(-1.0)).is_err());
    }

    #[test]
    fn parses_named_and_custom_formats() {
        assert_eq!("Letter".parse::<PageFormat>().unwrap(), PageFormat::Letter);
        assert_eq!(
            "100x150".parse::<PageFormat>().unwrap(),
            PageFormat::Custom { width_mm: 100.0, height_mm: 150.0 }
        );
        assert!("tabloid".parse::<PageFormat>().is_err());
    }

    #[test]
    fn format_serde_is_lowercase() {
        let f: PageFormat = serde_json::from_str("\"a5\"").unwrap();
        assert_eq!(f, PageFormat::A5);
        let c: PageFormat = serde_json::from_str(r#"{"custom":{"width_mm":90,"height_mm":120}}"#).unwrap();
        assert_eq!(c.size_mm(), (90.0, 120.0));
    }
}
