//! Rasterization boundary
//!
//! The crop pipeline only needs "one image per page, in page order". [`ScanImageRasterizer`]
//! provides that for scanned documents, where each page is a single embedded scan image: it pulls
//! the largest Image XObject off every page and resamples it to the requested resolution.

use crate::compose::inflate;
use crate::error::ScanCropError;
use crate::page::Page;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::{debug, info};

const POINTS_PER_INCH: f64 = 72.0;

/// Turns a source document into one raster image per page, in page order
pub trait Rasterizer {
    fn rasterize(&self, source: &Path, dpi: u32) -> Result<Vec<Page>, ScanCropError>;
}

/// Rasterizer for scanned PDFs: one embedded image per page
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanImageRasterizer;

impl Rasterizer for ScanImageRasterizer {
    fn rasterize(&self, source: &Path, dpi: u32) -> Result<Vec<Page>, ScanCropError> {
        let bytes = std::fs::read(source).map_err(|e| ScanCropError::io(source, e))?;
        let pages = rasterize_bytes(&bytes, dpi)?;
        info!(
            pages = pages.len(),
            dpi,
            source = %source.display(),
            "Rasterized source document"
        );
        Ok(pages)
    }
}

/// Rasterize an in-memory PDF
pub fn rasterize_bytes(bytes: &[u8], dpi: u32) -> Result<Vec<Page>, ScanCropError> {
    let doc = Document::load_mem(bytes).map_err(|e| ScanCropError::ParseError(e.to_string()))?;

    doc.get_pages()
        .into_iter()
        .map(|(number, page_id)| -> Result<Page, ScanCropError> {
            let image = page_image(&doc, number, page_id)?;
            let image = match media_box_size(&doc, page_id) {
                Some(size) if dpi > 0 => resample(image, size, dpi),
                _ => image,
            };
            debug!(
                page = number,
                width = image.width(),
                height = image.height(),
                "Page rasterized"
            );
            Ok(Page::new(number as usize - 1, image))
        })
        .collect()
}

/// Scale to `points * dpi / 72` pixels when that differs from the native image size
fn resample(image: DynamicImage, (width_pt, height_pt): (f64, f64), dpi: u32) -> DynamicImage {
    let target_w = (width_pt * dpi as f64 / POINTS_PER_INCH).round() as u32;
    let target_h = (height_pt * dpi as f64 / POINTS_PER_INCH).round() as u32;
    if target_w == 0 || target_h == 0 || (target_w, target_h) == image.dimensions() {
        return image;
    }
    image.resize_exact(target_w, target_h, FilterType::Triangle)
}

fn page_image(
    doc: &Document,
    number: u32,
    page_id: ObjectId,
) -> Result<DynamicImage, ScanCropError> {
    let no_image =
        || ScanCropError::ParseError(format!("Page {} has no embedded scan image", number));

    let resources = inherited(doc, page_id, b"Resources")
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .ok_or_else(no_image)?;
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .ok_or_else(no_image)?;

    let stream = xobjects
        .iter()
        .filter_map(|(_, o)| resolve(doc, o).as_stream().ok())
        .filter(|s| name(&s.dict, b"Subtype") == Some(b"Image".as_slice()))
        .max_by_key(|s| dimension(&s.dict, b"Width") * dimension(&s.dict, b"Height"))
        .ok_or_else(no_image)?;

    decode_image(stream)
        .map_err(|reason| ScanCropError::ParseError(format!("Page {}: {}", number, reason)))
}

fn decode_image(stream: &Stream) -> Result<DynamicImage, String> {
    let dict = &stream.dict;
    let width = dimension(dict, b"Width") as u32;
    let height = dimension(dict, b"Height") as u32;

    let filter = match dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(n.as_slice()),
        Ok(Object::Array(a)) if a.len() == 1 => a[0].as_name().ok(),
        Ok(Object::Array(a)) if a.is_empty() => None,
        Ok(_) => return Err("unsupported filter chain".into()),
        Err(_) => None,
    };

    let samples = match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| format!("JPEG decode failed: {}", e));
        }
        Some(b"FlateDecode") => inflate(&stream.content).map_err(|e| e.to_string())?,
        None => stream.content.clone(),
        Some(other) => {
            return Err(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(other)
            ))
        }
    };

    if dimension(dict, b"BitsPerComponent") != 8 {
        return Err("only 8-bit images are supported".into());
    }

    match name(dict, b"ColorSpace") {
        Some(b"DeviceGray") => GrayImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "truncated grayscale samples".to_string()),
        Some(b"DeviceRGB") => RgbImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "truncated RGB samples".to_string()),
        _ => Err("unsupported color space".into()),
    }
}

/// Look up a page attribute, following the page tree up through `Parent`
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_object(id).and_then(|o| o.as_dict()).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn name<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict.get(key).ok().and_then(|o| o.as_name().ok())
}

fn dimension(dict: &Dictionary, key: &[u8]) -> i64 {
    dict.get(key).and_then(|o| o.as_i64()).unwrap_or(0).max(0)
}

/// Width and height of the page's MediaBox in points
fn media_box_size(doc: &Document, page_id: ObjectId) -> Option<(f64, f64)> {
    let raw = inherited(doc, page_id, b"MediaBox")?;
    let arr = resolve(doc, raw).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let coords: Vec<f64> = arr.iter().filter_map(number).collect();
    if coords.len() != 4 {
        return None;
    }
    Some(((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs()))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{Compositor, PdfCompositor};
    use image::{Luma, Rgb};
    use lopdf::dictionary;

    #[test]
    fn test_rasterizes_composed_document_at_native_size() {
        let images = vec![
            DynamicImage::ImageLuma8(GrayImage::from_pixel(72, 144, Luma([10]))),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(36, 36, Rgb([1, 2, 3]))),
        ];
        let pdf = PdfCompositor.compose(&images).unwrap();

        // one point per pixel, so 72 dpi is the native resolution
        let pages = rasterize_bytes(&pdf, 72).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].index(), 0);
        assert_eq!(pages[0].dimensions(), (72, 144));
        assert_eq!(pages[0].image().get_pixel(3, 3).0, [10, 10, 10, 255]);
        assert_eq!(pages[1].index(), 1);
        assert_eq!(pages[1].image().get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_resamples_to_requested_dpi() {
        let images = vec![DynamicImage::ImageLuma8(GrayImage::new(72, 36))];
        let pdf = PdfCompositor.compose(&images).unwrap();
        let pages = rasterize_bytes(&pdf, 144).unwrap();
        assert_eq!(pages[0].dimensions(), (144, 72));
    }

    #[test]
    fn test_dpi_zero_keeps_native_size() {
        let images = vec![DynamicImage::ImageLuma8(GrayImage::new(20, 10))];
        let pdf = PdfCompositor.compose(&images).unwrap();
        assert_eq!(rasterize_bytes(&pdf, 0).unwrap()[0].dimensions(), (20, 10));
    }

    #[test]
    fn test_flate_scan_with_inherited_resources() {
        let samples: Vec<u8> = (0..6u8).map(|v| v * 40).collect();
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 3i64,
                "Height" => 2i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
                "Filter" => "FlateDecode",
            },
            crate::compose::deflate(&samples).unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => 1i64,
                "Kids" => vec![Object::Reference(page_id)],
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(3),
                    Object::Integer(2),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Scan" => image_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let pages = rasterize_bytes(&bytes, 72).unwrap();
        assert_eq!(pages[0].dimensions(), (3, 2));
        assert_eq!(pages[0].image().to_luma8().into_raw(), samples);
    }

    #[test]
    fn test_corrupt_flate_samples_are_parse_error() {
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2i64,
                "Height" => 2i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
                "Filter" => "FlateDecode",
            },
            b"not zlib".to_vec(),
        );
        assert!(decode_image(&stream).is_err());
    }

    #[test]
    fn test_page_without_image_is_parse_error() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(100),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => 1i64,
                "Kids" => vec![Object::Reference(page_id)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        match rasterize_bytes(&bytes, 300) {
            Err(ScanCropError::ParseError(msg)) => assert!(msg.contains("Page 1")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            rasterize_bytes(b"not a pdf", 300),
            Err(ScanCropError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let err = ScanImageRasterizer
            .rasterize(Path::new("/nonexistent/scan.pdf"), 300)
            .unwrap_err();
        assert!(matches!(err, ScanCropError::Io { .. }));
    }
}
