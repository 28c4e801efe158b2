//! PDF encoding of a sealed document (one full-page image per page)

use crate::compose::{ComposedPage, SealedDocument};
use crate::units::mm_to_pt;
use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

/// How page rasters are stored in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Lossy, `DCTDecode`
    Jpeg {
        #[serde(default = "default_quality")]
        quality: u8,
    },
    /// Lossless raw RGB, `FlateDecode`
    Flate,
}

fn default_quality() -> u8 {
    98
}

impl Default for ImageEncoding {
    fn default() -> Self {
        ImageEncoding::Jpeg {
            quality: default_quality(),
        }
    }
}

impl ImageEncoding {
    pub fn validate(&self) -> Result<()> {
        match self {
            ImageEncoding::Jpeg { quality } if !(1..=100).contains(quality) => Err(Error::ConfigError(
                format!("jpeg quality must be within 1..=100, got {}", quality),
            )),
            _ => Ok(()),
        }
    }
}

/// Serialize `document` into PDF bytes.
pub fn write_pdf(document: &SealedDocument, encoding: ImageEncoding) -> Result<Vec<u8>> {
    encoding.validate()?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let background = document.background().unit_channels();

    let mut kids: Vec<Object> = Vec::with_capacity(document.page_count());
    for page in document.pages() {
        let page_id = write_page(&mut doc, pages_id, page, background, encoding)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(concat!("mdslice ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn write_page(
    doc: &mut Document,
    pages_id: ObjectId,
    page: &ComposedPage,
    background: [f32; 3],
    encoding: ImageEncoding,
) -> Result<ObjectId> {
    let width_pt = mm_to_pt(page.width_mm) as f32;
    let height_pt = mm_to_pt(page.height_mm) as f32;

    let image_id = doc.add_object(image_stream(page, encoding)?);

    // Background first over the whole page, then the page image on top
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "rg",
                vec![background[0].into(), background[1].into(), background[2].into()],
            ),
            Operation::new("re", vec![0.into(), 0.into(), width_pt.into(), height_pt.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width_pt.into(), 0.into(), 0.into(), height_pt.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });
    Ok(page_id)
}

fn image_stream(page: &ComposedPage, encoding: ImageEncoding) -> Result<Stream> {
    let (width, height) = page.image.dimensions();
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    match encoding {
        ImageEncoding::Jpeg { quality } => {
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&page.image)?;
            dict.set("Filter", "DCTDecode");
            // already compressed; keep lopdf from flating it again
            let mut stream = Stream::new(dict, jpeg);
            stream.allows_compression = false;
            Ok(stream)
        }
        ImageEncoding::Flate => Ok(Stream::new(dict, page.image.as_raw().clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::compose::OutputDocument;
    use image::RgbImage;

    fn page(w_mm: f64, h_mm: f64) -> ComposedPage {
        ComposedPage {
            image: RgbImage::from_pixel(42, 60, image::Rgb([0xfa, 0xf9, 0xf5])),
            width_mm: w_mm,
            height_mm: h_mm,
        }
    }

    fn sealed(pages: usize) -> SealedDocument {
        let mut doc = OutputDocument::begin(page(210.0, 297.0), Rgb::new(0xfa, 0xf9, 0xf5));
        for _ in 1..pages {
            doc.append(page(210.0, 297.0));
        }
        doc.finish()
    }

    fn image_filters(doc: &Document) -> Vec<Vec<u8>> {
        doc.objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(|o| o.as_name()).ok() == Some(&b"Image"[..]))
            .filter_map(|s| s.dict.get(b"Filter").and_then(|o| o.as_name()).ok().map(|n| n.to_vec()))
            .collect()
    }

    #[test]
    fn one_pdf_page_per_composed_page() {
        let bytes = write_pdf(&sealed(3), ImageEncoding::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn media_box_is_a4_in_points() {
        let bytes = write_pdf(&sealed(1), ImageEncoding::default()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let w = media_box[2].as_float().unwrap();
        let h = media_box[3].as_float().unwrap();
        assert!((w - 595.28).abs() < 0.01);
        assert!((h - 841.89).abs() < 0.01);
    }

    #[test]
    fn jpeg_images_use_dct() {
        let bytes = write_pdf(&sealed(2), ImageEncoding::Jpeg { quality: 80 }).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let filters = image_filters(&doc);
        assert_eq!(filters.len(), 2);
        assert!(filters.iter().all(|f| f == b"DCTDecode"));
    }

    #[test]
    fn flate_images_are_compressed() {
        let bytes = write_pdf(&sealed(1), ImageEncoding::Flate).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(image_filters(&doc), vec![b"FlateDecode".to_vec()]);
    }

    #[test]
    fn encoding_config_from_json() {
        let jpeg: ImageEncoding = serde_json::from_str(r#"{"kind":"jpeg"}"#).unwrap();
        assert_eq!(jpeg, ImageEncoding::Jpeg { quality: 98 });
        let flate: ImageEncoding = serde_json::from_str(r#"{"kind":"flate"}"#).unwrap();
        assert_eq!(flate, ImageEncoding::Flate);
        assert!(ImageEncoding::Jpeg { quality: 0 }.validate().is_err());
    }
}
