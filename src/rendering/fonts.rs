//! Font discovery and glyph outlines for the software backend
//!
//! Faces are resolved once per capture session from a [`fontdb::Database`]:
//! the surface's CSS font-family list first, then common serif and sans
//! families, then whatever face the database has. Code always resolves a
//! monospaced face. A [`FontSet`] with no faces is valid; text then falls
//! back to placeholder bars in the raster.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use log::{debug, warn};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tiny_skia::{Path, PathBuilder};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

const SERIF_FALLBACKS: &[&str] = &["DejaVu Serif", "Liberation Serif", "Noto Serif", "Georgia", "Times New Roman"];
const SANS_FALLBACKS: &[&str] = &["DejaVu Sans", "Liberation Sans", "Noto Sans", "Arial", "Helvetica"];
const MONO_FALLBACKS: &[&str] = &[
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Noto Sans Mono",
    "Menlo",
    "Consolas",
    "Courier New",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    Regular,
    Bold,
    Italic,
    Mono,
}

impl FaceKind {
    pub const ALL: [FaceKind; 4] = [FaceKind::Regular, FaceKind::Bold, FaceKind::Italic, FaceKind::Mono];

    fn slot(self) -> usize {
        match self {
            FaceKind::Regular => 0,
            FaceKind::Bold => 1,
            FaceKind::Italic => 2,
            FaceKind::Mono => 3,
        }
    }
}

#[derive(Clone)]
struct LoadedFace {
    data: Arc<Vec<u8>>,
    index: u32,
    family: String,
}

impl LoadedFace {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }
}

/// The faces used to lay out and draw one surface.
#[derive(Clone, Default)]
pub struct FontSet {
    faces: [Option<LoadedFace>; 4],
}

impl fmt::Debug for FontSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for kind in FaceKind::ALL {
            list.entry(&kind, &self.faces[kind.slot()].as_ref().map(|l| l.family.as_str()));
        }
        list.finish()
    }
}

/// System fonts, scanned on first use and shared afterwards.
pub fn system_database() -> Arc<Database> {
    static SYSTEM: OnceLock<Arc<Database>> = OnceLock::new();
    SYSTEM
        .get_or_init(|| {
            let mut db = Database::new();
            db.load_system_fonts();
            debug!("loaded {} system font faces", db.len());
            if db.is_empty() {
                warn!("no system fonts found; text will be drawn as placeholder bars");
            }
            Arc::new(db)
        })
        .clone()
}

impl FontSet {
    /// A set with no faces; every measurement falls back to fixed metrics.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve the four faces for a CSS `font-family` list.
    pub fn resolve(db: &Database, font_family: &str) -> Self {
        let requested: Vec<String> = font_family
            .split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut set = Self::empty();
        for kind in FaceKind::ALL {
            set.faces[kind.slot()] = resolve_face(db, &requested, kind);
        }
        debug!("resolved fonts {:?}", set);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.faces.iter().all(Option::is_none)
    }

    pub fn has(&self, kind: FaceKind) -> bool {
        self.faces[kind.slot()].is_some()
    }

    pub fn family(&self, kind: FaceKind) -> Option<&str> {
        self.faces[kind.slot()].as_ref().map(|l| l.family.as_str())
    }

    /// Horizontal advance of `text` at `size` px.
    pub fn advance(&self, kind: FaceKind, text: &str, size: f32) -> Option<f32> {
        let loaded = self.faces[kind.slot()].as_ref()?;
        let face = loaded.face()?;
        let scale = size / face.units_per_em() as f32;
        let units: u32 = text
            .chars()
            .map(|c| glyph_advance(&face, glyph_for(&face, c)) as u32)
            .sum();
        Some(units as f32 * scale)
    }

    /// Ascent and descent (both positive) at `size` px.
    pub fn vertical_metrics(&self, kind: FaceKind, size: f32) -> Option<(f32, f32)> {
        let loaded = self.faces[kind.slot()].as_ref()?;
        let face = loaded.face()?;
        let scale = size / face.units_per_em() as f32;
        Some((face.ascender() as f32 * scale, -(face.descender() as f32) * scale))
    }

    /// Outline of `text` with its first glyph origin at `(x, baseline)`.
    ///
    /// `None` when the face is missing or the text has no visible glyphs.
    pub fn outline(&self, kind: FaceKind, text: &str, size: f32, x: f32, baseline: f32) -> Option<Path> {
        let loaded = self.faces[kind.slot()].as_ref()?;
        let face = loaded.face()?;
        let scale = size / face.units_per_em() as f32;
        let mut builder = PathBuilder::new();
        let mut pen = x;
        for c in text.chars() {
            let gid = glyph_for(&face, c);
            let mut glyph = GlyphPath {
                builder: &mut builder,
                x: pen,
                y: baseline,
                scale,
            };
            let _ = face.outline_glyph(gid, &mut glyph);
            pen += glyph_advance(&face, gid) as f32 * scale;
        }
        builder.finish()
    }
}

fn glyph_for(face: &Face<'_>, c: char) -> GlyphId {
    face.glyph_index(c).unwrap_or(GlyphId(0))
}

fn glyph_advance(face: &Face<'_>, gid: GlyphId) -> u16 {
    face.glyph_hor_advance(gid).unwrap_or(0)
}

fn family_of(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" => Family::SansSerif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

fn resolve_face(db: &Database, requested: &[String], kind: FaceKind) -> Option<LoadedFace> {
    let families: Vec<Family<'_>> = match kind {
        FaceKind::Mono => MONO_FALLBACKS
            .iter()
            .map(|name| Family::Name(*name))
            .chain([Family::Monospace])
            .collect(),
        _ => requested
            .iter()
            .map(|name| family_of(name))
            .chain(SERIF_FALLBACKS.iter().map(|name| Family::Name(*name)))
            .chain(SANS_FALLBACKS.iter().map(|name| Family::Name(*name)))
            .chain([Family::Serif, Family::SansSerif])
            .collect(),
    };
    let query = Query {
        families: &families,
        weight: if kind == FaceKind::Bold { Weight::BOLD } else { Weight::NORMAL },
        stretch: Stretch::Normal,
        style: if kind == FaceKind::Italic { Style::Italic } else { Style::Normal },
    };

    let id = db.query(&query).or_else(|| {
        let any = match kind {
            FaceKind::Mono => db.faces().find(|f| f.monospaced).or_else(|| db.faces().next()),
            _ => db.faces().next(),
        };
        any.map(|f| f.id)
    })?;

    let family = db
        .face(id)
        .and_then(|info| info.families.first().map(|(name, _)| name.clone()))
        .unwrap_or_default();
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    if Face::parse(&data, index).is_err() {
        warn!("skipping unreadable font face {}", family);
        return None;
    }
    Some(LoadedFace {
        data: Arc::new(data),
        index,
        family,
    })
}

/// Feeds glyph outlines (font units, y up) into a path in CSS pixels (y down).
struct GlyphPath<'a> {
    builder: &'a mut PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphPath<'_> {
    fn at(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPath<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.at(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.at(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.at(x1, y1);
        let (x, y) = self.at(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.at(x1, y1);
        let (x2, y2) = self.at(x2, y2);
        let (x, y) = self.at(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
