/// Rasterizer for paint commands

use crate::capture::{CaptureConfig, RasterBitmap};
use crate::color::Rgb;
use crate::rendering::fonts::{FaceKind, FontSet};
use crate::rendering::layout::Rect;
use crate::rendering::paint::PaintCommand;
use crate::{Error, Result};
use image::RgbImage;
use tiny_skia::{FillRule, Paint, Pixmap, Transform};

/// Rasterize `commands` (CSS pixel coordinates) at `config.scale` over the
/// configured background.
///
/// Rects are drawn with pixel-aligned edges; glyphs are anti-aliased at the
/// output resolution. Text whose face is missing from `fonts` is drawn as a
/// bar through its word box.
pub fn rasterize(commands: &[PaintCommand], config: &CaptureConfig, fonts: &FontSet) -> Result<RasterBitmap> {
    let (w, h) = config.bitmap_size();
    if w == 0 || h == 0 {
        return Ok(RasterBitmap::new(RgbImage::new(w, h), config.scale));
    }
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| Error::RenderError(format!("cannot allocate a {}x{} raster", w, h)))?;
    let bg = config.background;
    pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, 255));
    let s = config.scale as f32;

    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { rect, color } => fill_rect(&mut pixmap, scaled(rect, s), *color),
            PaintCommand::StrokeRect { rect, thickness, color } => {
                let r = scaled(rect, s);
                let t = (thickness * s).max(1.0);
                fill_rect(&mut pixmap, Rect { height: t, ..r }, *color);
                fill_rect(&mut pixmap, Rect { y: r.bottom() - t, height: t, ..r }, *color);
                fill_rect(&mut pixmap, Rect { width: t, ..r }, *color);
                fill_rect(&mut pixmap, Rect { x: r.x + r.width - t, width: t, ..r }, *color);
            }
            PaintCommand::Text {
                text,
                face,
                size,
                x,
                baseline,
                bounds,
                color,
            } => {
                if fonts.has(*face) {
                    if let Some(path) = fonts.outline(*face, text, *size, *x, *baseline) {
                        pixmap.fill_path(
                            &path,
                            &paint(*color, true),
                            FillRule::Winding,
                            Transform::from_scale(s, s),
                            None,
                        );
                    }
                } else {
                    fill_rect(&mut pixmap, scaled(&placeholder_bar(bounds, *face), s), *color);
                }
            }
        }
    }

    let mut img = RgbImage::new(w, h);
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgb([c.red(), c.green(), c.blue()]);
    }
    Ok(RasterBitmap::new(img, config.scale))
}

fn paint(color: Rgb, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = anti_alias;
    paint
}

fn scaled(r: &Rect, s: f32) -> Rect {
    Rect {
        x: r.x * s,
        y: r.y * s,
        width: r.width * s,
        height: r.height * s,
    }
}

/// Bar through the middle of a word box, thicker for bold.
fn placeholder_bar(bounds: &Rect, face: FaceKind) -> Rect {
    let weight = match face {
        FaceKind::Bold => 0.4,
        FaceKind::Italic => 0.22,
        FaceKind::Regular | FaceKind::Mono => 0.3,
    };
    let h = bounds.height * weight;
    Rect {
        y: bounds.y + (bounds.height - h) / 2.0,
        height: h,
        ..*bounds
    }
}

/// Fill a rect clipped to the pixmap; edges round to the nearest pixel.
fn fill_rect(pixmap: &mut Pixmap, r: Rect, color: Rgb) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    let x0 = r.x.round().clamp(0.0, w);
    let x1 = (r.x + r.width).round().clamp(0.0, w);
    let y0 = r.y.round().clamp(0.0, h);
    let y1 = (r.y + r.height).round().clamp(0.0, h);
    if let Some(rect) = tiny_skia::Rect::from_ltrb(x0, y0, x1, y1) {
        pixmap.fill_rect(rect, &paint(color, false), Transform::identity(), None);
    }
}
