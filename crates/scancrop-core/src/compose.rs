//! Raster-to-PDF page composition
//!
//! Each image becomes one page whose MediaBox equals the image size (one pixel = one point),
//! with the image drawn at the origin at full scale.

use crate::error::ScanCropError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::{Read, Write};

/// Builds a PDF from an ordered list of images, one page per image
pub trait Compositor {
    fn compose(&self, images: &[DynamicImage]) -> Result<Vec<u8>, ScanCropError>;
}

/// lopdf-backed compositor embedding each image as a Flate-compressed Image XObject
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCompositor;

impl Compositor for PdfCompositor {
    fn compose(&self, images: &[DynamicImage]) -> Result<Vec<u8>, ScanCropError> {
        if images.is_empty() {
            return Err(ScanCropError::EmptyBatch);
        }

        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(images.len());

        for image in images {
            let (width, height) = image.dimensions();
            let (color_space, samples) = match image {
                DynamicImage::ImageLuma8(gray) => ("DeviceGray", gray.as_raw().clone()),
                other => ("DeviceRGB", other.to_rgb8().into_raw()),
            };

            let xobject = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8i64,
                    "Filter" => "FlateDecode",
                },
                deflate(&samples)?,
            );
            let image_id = doc.add_object(xobject);

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            Object::Integer(width as i64),
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Integer(height as i64),
                            Object::Integer(0),
                            Object::Integer(0),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content
                .encode()
                .map_err(|e| ScanCropError::OperationError(format!("Content encode: {}", e)))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

            let page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width as i64),
                    Object::Integer(height as i64),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
                "Contents" => content_id,
            };
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| ScanCropError::OperationError(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, ScanCropError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ScanCropError::OperationError(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ScanCropError::OperationError(format!("Compression failed: {}", e)))
}

/// Inflate a FlateDecode stream body
///
/// Used for image samples, which lopdf's `decompressed_content` does not accept.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>, ScanCropError> {
    let mut samples = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut samples)
        .map_err(|e| ScanCropError::OperationError(format!("Decompression failed: {}", e)))?;
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn media_box(doc: &Document, page_id: lopdf::ObjectId) -> Vec<i64> {
        doc.get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(
            PdfCompositor.compose(&[]),
            Err(ScanCropError::EmptyBatch)
        ));
    }

    #[test]
    fn test_one_page_per_image_sized_to_image() {
        let images = vec![
            DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([1, 2, 3]))),
            DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 90, Luma([200]))),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]))),
        ];
        let bytes = PdfCompositor.compose(&images).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();

        assert_eq!(pages.len(), 3);
        let boxes: Vec<Vec<i64>> = pages.values().map(|id| media_box(&doc, *id)).collect();
        assert_eq!(
            boxes,
            vec![vec![0, 0, 30, 20], vec![0, 0, 7, 90], vec![0, 0, 64, 64]]
        );
    }

    #[test]
    fn test_image_samples_survive_compression() {
        let gray = GrayImage::from_fn(4, 3, |x, y| Luma([(x * 10 + y) as u8]));
        let bytes = PdfCompositor
            .compose(&[DynamicImage::ImageLuma8(gray.clone())])
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let stream = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
            })
            .unwrap();
        assert_eq!(inflate(&stream.content).unwrap(), gray.into_raw());
    }
}
