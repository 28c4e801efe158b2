//! Export configuration.
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! changes:
//!
//! ```json
//! { "page": { "format": "letter", "margins": { "top": 15, "right": 15, "bottom": 15, "left": 15 } },
//!   "capture": { "scale": 3.0 },
//!   "image": { "kind": "flate" } }
//! ```

use crate::color::Rgb;
use crate::geometry::{Margins, Orientation, PageFormat, PageGeometry};
use crate::pdf::ImageEncoding;
use crate::surface::{CodeStyle, SurfaceStyle};
use crate::units::UnitConverter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PageConfig {
    pub format: PageFormat,
    pub orientation: Orientation,
    pub margins: Margins,
}

impl PageConfig {
    pub fn geometry(&self) -> Result<PageGeometry> {
        PageGeometry::new(self.format, self.orientation, self.margins)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Bitmap pixels per CSS pixel
    pub scale: f64,
    /// Fill colour for the capture and every page
    pub background: Rgb,
    /// Wait after style normalization before opening the capture
    pub settle_delay_ms: u64,
    /// Upper bound for each capture step
    pub timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: Rgb::new(0xfa, 0xf9, 0xf5),
            settle_delay_ms: 100,
            timeout_ms: 30000,
        }
    }
}

impl CaptureSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How much of the first page's top margin the surface already provides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsetCompensation {
    /// The surface's own top padding, converted at the capture density
    #[default]
    FromSurface,
    Fixed {
        mm: f64,
    },
    Disabled,
}

impl InsetCompensation {
    /// Inset in millimetres for a surface whose top padding is `top_inset_px` CSS pixels.
    pub fn inset_mm(&self, top_inset_px: u32, converter: &UnitConverter) -> f64 {
        match *self {
            InsetCompensation::FromSurface => converter.css_px_to_mm(top_inset_px as f64),
            InsetCompensation::Fixed { mm } => mm.max(0.0),
            InsetCompensation::Disabled => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub page: PageConfig,
    pub capture: CaptureSettings,
    pub surface: SurfaceStyle,
    pub code: CodeStyle,
    pub first_page_inset: InsetCompensation,
    pub image: ImageEncoding,
}

impl ExportConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: ExportConfig = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.page.geometry()?;
        if !(self.capture.scale.is_finite() && self.capture.scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "capture scale must be positive, got {}",
                self.capture.scale
            )));
        }
        if self.capture.timeout_ms == 0 {
            return Err(Error::ConfigError("capture timeout must be non-zero".into()));
        }
        if self.surface.width_px <= 2 * self.surface.padding_px {
            return Err(Error::ConfigError(format!(
                "surface width {}px leaves no room inside {}px padding",
                self.surface.width_px, self.surface.padding_px
            )));
        }
        if let InsetCompensation::Fixed { mm } = self.first_page_inset {
            if !(mm.is_finite() && mm >= 0.0) {
                return Err(Error::ConfigError(format!("first page inset must be >= 0, got {}", mm)));
            }
        }
        self.image.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_a4_portrait() {
        let c = ExportConfig::default();
        assert_eq!(c.page.format, PageFormat::A4);
        assert_eq!(c.page.orientation, Orientation::Portrait);
        assert_eq!(c.page.margins, Margins::uniform(20.0));
        assert_eq!(c.capture.scale, 2.0);
        assert_eq!(c.image, ImageEncoding::Jpeg { quality: 98 });
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "page": {{ "orientation": "landscape" }}, "capture": {{ "scale": 3 }}, "first_page_inset": {{ "mode": "fixed", "mm": 5 }} }}"#
        )
        .unwrap();
        let c = ExportConfig::from_json_file(file.path()).unwrap();
        assert_eq!(c.page.orientation, Orientation::Landscape);
        assert_eq!(c.page.format, PageFormat::A4);
        assert_eq!(c.capture.scale, 3.0);
        assert_eq!(c.capture.timeout_ms, 30000);
        assert_eq!(c.first_page_inset, InsetCompensation::Fixed { mm: 5.0 });
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let mut c = ExportConfig::default();
        c.capture.scale = 0.0;
        assert!(matches!(c.validate(), Err(Error::ConfigError(_))));

        let mut c = ExportConfig::default();
        c.page.margins = Margins::uniform(200.0);
        assert!(matches!(c.validate(), Err(Error::ConfigError(_))));

        let mut c = ExportConfig::default();
        c.surface.padding_px = 500;
        assert!(matches!(c.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        match ExportConfig::from_json_file(file.path()) {
            Err(Error::ConfigError(msg)) => assert!(msg.contains(&file.path().display().to_string())),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn inset_modes() {
        let conv = UnitConverter::new(0.25, 2.0).unwrap();
        assert_eq!(InsetCompensation::FromSurface.inset_mm(76, &conv), 19.0);
        assert_eq!(InsetCompensation::Fixed { mm: 3.5 }.inset_mm(76, &conv), 3.5);
        assert_eq!(InsetCompensation::Disabled.inset_mm(76, &conv), 0.0);
    }
}
