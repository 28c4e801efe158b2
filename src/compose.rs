//! Page composition: one background-filled raster per page segment.
//!
//! A page raster is sized to the whole physical page at the capture density,
//! filled edge to edge with the background colour and only then receives the
//! segment's rows, copied 1:1 into the margin box. Margins, the bottom gap of
//! a short last page and any rounding slack all keep the background colour.

use crate::capture::RasterBitmap;
use crate::color::Rgb;
use crate::geometry::PageGeometry;
use crate::paginate::PageSegment;
use crate::units::UnitConverter;
use crate::{Error, Result};
use image::RgbImage;
use log::debug;

/// A finished page raster and the physical size it is printed at.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub image: RgbImage,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Append-only page sequence under construction.
///
/// It starts out holding its first page, so a document with zero pages
/// cannot be represented.
#[derive(Debug)]
pub struct OutputDocument {
    background: Rgb,
    pages: Vec<ComposedPage>,
}

impl OutputDocument {
    pub fn begin(first: ComposedPage, background: Rgb) -> Self {
        Self {
            background,
            pages: vec![first],
        }
    }

    pub fn append(&mut self, page: ComposedPage) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> SealedDocument {
        SealedDocument {
            background: self.background,
            pages: self.pages,
        }
    }
}

/// A document that no longer accepts pages.
#[derive(Debug, Clone)]
pub struct SealedDocument {
    background: Rgb,
    pages: Vec<ComposedPage>,
}

impl SealedDocument {
    pub fn pages(&self) -> &[ComposedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn background(&self) -> Rgb {
        self.background
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    geometry: PageGeometry,
    converter: UnitConverter,
    background: Rgb,
}

impl Compositor {
    pub fn new(geometry: PageGeometry, converter: UnitConverter, background: Rgb) -> Self {
        Self {
            geometry,
            converter,
            background,
        }
    }

    /// Page raster size in bitmap pixels.
    pub fn page_size_px(&self) -> (u32, u32) {
        (
            self.converter.mm_to_px_rounded(self.geometry.page_width_mm()),
            self.converter.mm_to_px_rounded(self.geometry.page_height_mm()),
        )
    }

    /// Build the raster for one segment of `bitmap`.
    pub fn compose_page(&self, bitmap: &RasterBitmap, segment: &PageSegment) -> Result<ComposedPage> {
        if segment.end_px() > bitmap.height() {
            return Err(Error::RenderError(format!(
                "segment {} ends at row {} but the bitmap has {} rows",
                segment.index,
                segment.end_px(),
                bitmap.height()
            )));
        }

        let (page_w, page_h) = self.page_size_px();
        let mut page = RgbImage::from_pixel(page_w, page_h, self.background.into());

        let left = self.converter.mm_to_px_rounded(self.geometry.margins().left);
        let top = self.converter.mm_to_px_rounded(segment.top_margin_mm);
        let copy_w = bitmap.width().min(page_w.saturating_sub(left)) as usize;
        let stride = page_w as usize * 3;
        let raw: &mut [u8] = &mut page;

        for row in 0..segment.height_px {
            let dest_y = top + row;
            if dest_y >= page_h {
                break;
            }
            let src = &bitmap.row(segment.offset_px + row)[..copy_w * 3];
            let start = dest_y as usize * stride + left as usize * 3;
            raw[start..start + copy_w * 3].copy_from_slice(src);
        }

        Ok(ComposedPage {
            image: page,
            width_mm: self.geometry.page_width_mm(),
            height_mm: self.geometry.page_height_mm(),
        })
    }

    /// Compose every segment in order into a sealed document.
    pub fn compose(&self, bitmap: &RasterBitmap, segments: &[PageSegment]) -> Result<SealedDocument> {
        let (first, rest) = segments.split_first().ok_or(Error::EmptySurface)?;
        let mut document = OutputDocument::begin(self.compose_page(bitmap, first)?, self.background);
        for segment in rest {
            document.append(self.compose_page(bitmap, segment)?);
        }
        debug!(
            "composed {} page(s) at {}x{}px",
            document.page_count(),
            self.page_size_px().0,
            self.page_size_px().1
        );
        Ok(document.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Margins, Orientation, PageFormat};
    use crate::paginate::Paginator;

    const BG: Rgb = Rgb::new(0xfa, 0xf9, 0xf5);
    const INK: [u8; 3] = [0x14, 0x14, 0x13];

    // 100 x 140 mm page, 10 mm margins, content 80 mm wide captured as 160 px:
    // two bitmap pixels per millimetre.
    fn setup() -> (PageGeometry, UnitConverter) {
        let g = PageGeometry::new(
            PageFormat::Custom { width_mm: 100.0, height_mm: 140.0 },
            Orientation::Portrait,
            Margins::uniform(10.0),
        )
        .unwrap();
        let c = UnitConverter::for_capture(g.content_width_mm(), 160, 2.0).unwrap();
        (g, c)
    }

    fn ink_bitmap(height: u32) -> RasterBitmap {
        RasterBitmap::new(RgbImage::from_pixel(160, height, image::Rgb(INK)), 2.0)
    }

    #[test]
    fn page_count_matches_segments_and_margins_keep_background() {
        let (g, c) = setup();
        let bitmap = ink_bitmap(500);
        let paginator = Paginator::new(&g, &c).unwrap();
        assert_eq!(paginator.printable_height_px(), 240);
        let segments = paginator.paginate(bitmap.height(), &c).unwrap();
        let doc = Compositor::new(g, c, BG).compose(&bitmap, &segments).unwrap();

        assert_eq!(doc.page_count(), segments.len());
        assert_eq!(doc.page_count(), 3);
        for page in doc.pages() {
            assert_eq!(page.image.dimensions(), (200, 280));
            let img = &page.image;
            for y in 0..img.height() {
                for x in (0..20).chain(180..200) {
                    assert_eq!(img.get_pixel(x, y).0, BG.channels());
                }
            }
            for x in 0..img.width() {
                for y in 0..20 {
                    assert_eq!(img.get_pixel(x, y).0, BG.channels());
                }
                assert_eq!(img.get_pixel(x, 279).0, BG.channels());
            }
        }
        // content sits inside the margin box
        assert_eq!(doc.pages()[0].image.get_pixel(20, 20).0, INK);
        assert_eq!(doc.pages()[0].image.get_pixel(179, 259).0, INK);
        // the short last page is background below its 20 rows
        let last = &doc.pages()[2].image;
        assert_eq!(last.get_pixel(100, 39).0, INK);
        assert_eq!(last.get_pixel(100, 40).0, BG.channels());
    }

    #[test]
    fn first_page_uses_compensated_margin() {
        let (g, c) = setup();
        let bitmap = ink_bitmap(300);
        let segments = Paginator::new(&g, &c)
            .unwrap()
            .with_first_page_inset(4.0)
            .paginate(bitmap.height(), &c)
            .unwrap();
        let doc = Compositor::new(g, c, BG).compose(&bitmap, &segments).unwrap();
        let first = &doc.pages()[0].image;
        let second = &doc.pages()[1].image;
        // 6 mm → row 12 on page 1, 10 mm → row 20 afterwards
        assert_eq!(first.get_pixel(50, 11).0, BG.channels());
        assert_eq!(first.get_pixel(50, 12).0, INK);
        assert_eq!(second.get_pixel(50, 19).0, BG.channels());
        assert_eq!(second.get_pixel(50, 20).0, INK);
    }

    #[test]
    fn rows_are_copied_without_resampling() {
        let (g, c) = setup();
        let mut img = RgbImage::from_pixel(160, 10, BG.into());
        for x in 0..160 {
            img.put_pixel(x, 3, image::Rgb([(x % 256) as u8, 7, 9]));
        }
        let bitmap = RasterBitmap::new(img, 2.0);
        let segments = Paginator::new(&g, &c).unwrap().paginate(10, &c).unwrap();
        let doc = Compositor::new(g, c, BG).compose(&bitmap, &segments).unwrap();
        let page = &doc.pages()[0].image;
        for x in 0..160u32 {
            assert_eq!(page.get_pixel(20 + x, 23).0, [(x % 256) as u8, 7, 9]);
        }
    }

    #[test]
    fn no_segments_is_empty_surface() {
        let (g, c) = setup();
        let res = Compositor::new(g, c, BG).compose(&ink_bitmap(10), &[]);
        assert!(matches!(res, Err(Error::EmptySurface)));
    }

    #[test]
    fn segment_past_bitmap_is_rejected() {
        let (g, c) = setup();
        let seg = PageSegment { index: 0, offset_px: 5, height_px: 10, height_mm: 5.0, top_margin_mm: 10.0 };
        let res = Compositor::new(g, c, BG).compose_page(&ink_bitmap(10), &seg);
        assert!(matches!(res, Err(Error::RenderError(_))));
    }
}
