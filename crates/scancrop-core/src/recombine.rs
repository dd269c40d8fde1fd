//! Reassemble cropped page images into the output document

use crate::compose::Compositor;
use crate::error::ScanCropError;
use crate::page::load_image;
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Composes an ordered image sequence into a single document, one page per image
#[derive(Debug, Clone, Default)]
pub struct Recombiner<C> {
    compositor: C,
}

impl<C: Compositor> Recombiner<C> {
    pub fn new(compositor: C) -> Self {
        Self { compositor }
    }

    /// Page `i` of the result is `images[i]`, sized to it
    pub fn recombine(&self, images: &[DynamicImage]) -> Result<Vec<u8>, ScanCropError> {
        self.compositor.compose(images)
    }

    /// Decode `paths` in the given order and write the composed document to `output`
    ///
    /// Any unreadable image aborts before anything is written. Returns the page count.
    pub fn recombine_files(
        &self,
        paths: &[PathBuf],
        output: &Path,
    ) -> Result<usize, ScanCropError> {
        let images = paths
            .iter()
            .map(|path| {
                debug!(path = %path.display(), "Loading cropped page");
                load_image(path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bytes = self.recombine(&images)?;
        write_atomic(output, &bytes)?;
        info!(
            pages = images.len(),
            output = %output.display(),
            "Combined PDF created"
        );
        Ok(images.len())
    }
}

/// Write `bytes` to `path` through a temporary sibling file, so `path` is either absent or whole
///
/// Missing parent directories are created.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ScanCropError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ScanCropError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ScanCropError::io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| ScanCropError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ScanCropError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::PdfCompositor;
    use crate::page::{Page, PageNaming};
    use image::{GrayImage, Luma};
    use lopdf::Document;

    fn save_page(dir: &Path, index: usize, width: u32, height: u32) {
        Page::new(
            index,
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([index as u8]))),
        )
        .save(dir, PageNaming::Cropped)
        .unwrap();
    }

    #[test]
    fn test_recombine_files_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let sizes = [(10, 20), (30, 5), (8, 8)];
        for (i, (w, h)) in sizes.iter().enumerate() {
            save_page(dir.path(), i, *w, *h);
        }
        let output = dir.path().join("out.pdf");

        let count = Recombiner::new(PdfCompositor)
            .recombine_files(&PageNaming::Cropped.paths(dir.path(), 3), &output)
            .unwrap();
        assert_eq!(count, 3);

        let doc = Document::load(&output).unwrap();
        let widths: Vec<i64> = doc
            .get_pages()
            .values()
            .map(|id| {
                let page = doc.get_object(*id).unwrap().as_dict().unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                media_box[2].as_i64().unwrap()
            })
            .collect();
        assert_eq!(widths, vec![10, 30, 8]);
    }

    #[test]
    fn test_unreadable_image_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        save_page(dir.path(), 0, 10, 10);
        std::fs::write(PageNaming::Cropped.path(dir.path(), 1), b"garbage").unwrap();
        let output = dir.path().join("out.pdf");

        let err = Recombiner::new(PdfCompositor)
            .recombine_files(&PageNaming::Cropped.paths(dir.path(), 2), &output)
            .unwrap_err();
        match err {
            ScanCropError::Decode { path, .. } => assert!(path.ends_with("cropped_0001.png")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_image_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        save_page(dir.path(), 0, 10, 10);
        let output = dir.path().join("out.pdf");

        let err = Recombiner::new(PdfCompositor)
            .recombine_files(&PageNaming::Cropped.paths(dir.path(), 2), &output)
            .unwrap_err();
        assert!(matches!(err, ScanCropError::MissingPage { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::compose::PdfCompositor;
    use image::GrayImage;
    use lopdf::Document;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// K images of varying sizes -> K pages, page i sized like image i
        #[test]
        fn recombination_fidelity(sizes in proptest::collection::vec((1u32..40, 1u32..40), 1..6)) {
            let images: Vec<DynamicImage> = sizes
                .iter()
                .map(|(w, h)| DynamicImage::ImageLuma8(GrayImage::new(*w, *h)))
                .collect();
            let bytes = Recombiner::new(PdfCompositor).recombine(&images).unwrap();
            let doc = Document::load_mem(&bytes).unwrap();
            let pages = doc.get_pages();
            prop_assert_eq!(pages.len(), sizes.len());

            for ((_, id), (w, h)) in pages.iter().zip(sizes.iter()) {
                let page = doc.get_object(*id).unwrap().as_dict().unwrap();
                let mb = page.get(b"MediaBox").unwrap().as_array().unwrap().clone();
                prop_assert_eq!(mb[2].as_i64().unwrap(), *w as i64);
                prop_assert_eq!(mb[3].as_i64().unwrap(), *h as i64);
            }
        }
    }
}
