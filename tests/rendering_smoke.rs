#![cfg(feature = "software")]

use mdslice::capture::CaptureConfig;
use mdslice::rendering::fonts::system_database;
use mdslice::rendering::{layout_document, paint_layout, rasterize, FontSet, Palette, PaintCommand};
use mdslice::surface::{StyleNormalizer, Surface, SurfaceStyle};

#[test]
fn smoke_layout_paint_rasterize() {
    let style = SurfaceStyle::default();
    let surface = Surface::from_html(
        "<h1>Title</h1><p>Some <code>code</code> text</p><pre><code>let x = 1;\n</code></pre><hr>",
        style.clone(),
    );
    let clone = StyleNormalizer::default().normalize(&surface);

    let fonts = FontSet::resolve(&system_database(), &style.font_family);
    let layout = layout_document(&clone, &fonts);
    assert_eq!(layout.width, 794);
    assert!(layout.height >= 1123);
    assert!(!layout.nodes.is_empty());

    let commands = paint_layout(&layout, &Palette::for_surface(&style));
    assert!(!commands.is_empty());
    let words: Vec<&str> = commands
        .iter()
        .filter_map(|c| match c {
            PaintCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(&words[..4], &["Title", "Some", "code", "text"]);

    let metrics = mdslice::capture::SurfaceMetrics { width_px: layout.width, height_px: layout.height };
    let bitmap = rasterize(&commands, &CaptureConfig::new(1.0, style.background, metrics).unwrap(), &fonts).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (layout.width, layout.height));
}
