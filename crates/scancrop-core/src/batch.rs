//! Apply one confirmed crop rectangle to every page of a document

use crate::error::ScanCropError;
use crate::geometry::OriginalRect;
use crate::page::{Page, PageNaming};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Crops an ordered page sequence with a single original-space rectangle
///
/// The batch is all-or-nothing: every page is bounds-checked before any pixel is copied, and
/// nothing is written to disk until every page has been cropped.
#[derive(Debug, Clone, Copy)]
pub struct BatchCropper {
    rect: OriginalRect,
}

impl BatchCropper {
    pub fn new(rect: OriginalRect) -> Self {
        Self { rect }
    }

    pub fn rect(&self) -> OriginalRect {
        self.rect
    }

    /// Verify the rectangle fits every page, reporting the first page that it does not
    pub fn check(&self, pages: &[Page]) -> Result<(), ScanCropError> {
        let r = self.rect;
        match pages.iter().find(|p| !r.fits_within(p.width(), p.height())) {
            Some(page) => Err(ScanCropError::OutOfBounds {
                page_index: page.index(),
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                page_width: page.width(),
                page_height: page.height(),
            }),
            None => Ok(()),
        }
    }

    /// Crop every page; output order and indices match the input
    pub fn crop(&self, pages: &[Page]) -> Result<Vec<Page>, ScanCropError> {
        self.check(pages)?;
        let r = self.rect;
        Ok(pages
            .iter()
            .map(|page| {
                debug!(page = page.index(), "Cropping page");
                Page::new(
                    page.index(),
                    page.image().crop_imm(r.x, r.y, r.width, r.height),
                )
            })
            .collect())
    }

    /// Crop pages `0..count` stored in `pages_dir` and write them to `cropped_dir`
    ///
    /// Returns the written paths in page order. If a save fails, pages already written by this
    /// call are removed again.
    pub fn crop_directory(
        &self,
        pages_dir: &Path,
        count: usize,
        cropped_dir: &Path,
    ) -> Result<Vec<PathBuf>, ScanCropError> {
        let pages = (0..count)
            .map(|i| Page::load(pages_dir, PageNaming::Rasterized, i))
            .collect::<Result<Vec<_>, _>>()?;

        let cropped = self.crop(&pages)?;
        drop(pages);

        let mut paths = Vec::with_capacity(cropped.len());
        for page in &cropped {
            match page.save(cropped_dir, PageNaming::Cropped) {
                Ok(path) => paths.push(path),
                Err(err) => {
                    discard(&paths);
                    return Err(err);
                }
            }
        }

        info!(
            pages = paths.len(),
            rect = %self.rect,
            "Finished cropping images"
        );
        Ok(paths)
    }
}

/// Remove pages already written by a failed run
fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "Failed to remove partial output");
        }
    }
}
