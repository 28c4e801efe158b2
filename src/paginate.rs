//! Slicing one tall bitmap into page-sized segments.
//!
//! Every page prints `printable_height_px` source rows except the last,
//! which takes the remainder. Segments are contiguous and cover the bitmap
//! exactly once.
//!
//! The first page is special: the captured surface already carries its own
//! top padding, so the first segment's top margin is reduced by that inset
//! and page 1 ends up with the same visual top offset as every later page.

use crate::geometry::PageGeometry;
use crate::units::UnitConverter;
use crate::{Error, Result};

/// One output page's slice of the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSegment {
    /// Zero-based page index
    pub index: usize,
    /// First source row
    pub offset_px: u32,
    /// Number of source rows
    pub height_px: u32,
    /// Physical height of the rows on the page
    pub height_mm: f64,
    /// Top margin to place the rows at on this page
    pub top_margin_mm: f64,
}

impl PageSegment {
    pub fn end_px(&self) -> u32 {
        self.offset_px + self.height_px
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paginator {
    printable_height_px: u32,
    top_margin_mm: f64,
    first_page_inset_mm: f64,
}

impl Paginator {
    /// Budget each page by the printable height of `geometry` at the
    /// converter's density.
    pub fn new(geometry: &PageGeometry, converter: &UnitConverter) -> Result<Self> {
        let printable = converter.mm_to_px_floor(geometry.content_height_mm());
        Self::with_printable_height(printable, geometry.margins().top)
    }

    pub fn with_printable_height(printable_height_px: u32, top_margin_mm: f64) -> Result<Self> {
        if printable_height_px == 0 {
            return Err(Error::ConfigError(
                "printable area is shorter than one source pixel".into(),
            ));
        }
        Ok(Self {
            printable_height_px,
            top_margin_mm,
            first_page_inset_mm: 0.0,
        })
    }

    /// Inset already baked into the top of the first page's content.
    pub fn with_first_page_inset(mut self, inset_mm: f64) -> Self {
        self.first_page_inset_mm = inset_mm.max(0.0);
        self
    }

    pub fn printable_height_px(&self) -> u32 {
        self.printable_height_px
    }

    /// Top margin of the first page after compensation; never negative.
    pub fn first_page_top_margin_mm(&self) -> f64 {
        (self.top_margin_mm - self.first_page_inset_mm).max(0.0)
    }

    /// Slice a bitmap of `bitmap_height_px` rows.
    pub fn paginate(&self, bitmap_height_px: u32, converter: &UnitConverter) -> Result<Vec<PageSegment>> {
        if bitmap_height_px == 0 {
            return Err(Error::EmptySurface);
        }
        let segments = segment_spans(bitmap_height_px, self.printable_height_px)
            .into_iter()
            .enumerate()
            .map(|(index, (offset_px, height_px))| PageSegment {
                index,
                offset_px,
                height_px,
                height_mm: converter.px_to_mm(height_px as f64),
                top_margin_mm: if index == 0 {
                    self.first_page_top_margin_mm()
                } else {
                    self.top_margin_mm
                },
            })
            .collect();
        Ok(segments)
    }
}

/// `(offset, height)` spans covering `total` rows in chunks of at most `printable`.
pub fn segment_spans(total: u32, printable: u32) -> Vec<(u32, u32)> {
    if printable == 0 {
        return Vec::new();
    }
    let mut spans = Vec::with_capacity(total.div_ceil(printable) as usize);
    let mut offset = 0u32;
    while offset < total {
        let height = printable.min(total - offset);
        spans.push((offset, height));
        offset += height;
    }
    spans
}
