//! Rasterized pages and their on-disk names

use crate::error::ScanCropError;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::{Path, PathBuf};

/// One rasterized page: its ordinal in the source document and its pixels
///
/// The raster is owned by the page and never modified after construction; cropping produces a
/// new `Page` with the same index.
#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    image: DynamicImage,
}

impl Page {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Load the page stored under `dir` for `index` using `naming`
    pub fn load(dir: &Path, naming: PageNaming, index: usize) -> Result<Self, ScanCropError> {
        let path = naming.path(dir, index);
        Ok(Self::new(index, load_image(&path)?))
    }

    /// Write the page as PNG under `dir`, returning the written path
    pub fn save(&self, dir: &Path, naming: PageNaming) -> Result<PathBuf, ScanCropError> {
        let path = naming.path(dir, self.index);
        self.image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| ScanCropError::Encode {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// File naming for intermediate page images
///
/// Names are derived from the page index, zero-padded so lexical and numeric order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNaming {
    /// `page_0000.png`, written by rasterization
    Rasterized,
    /// `cropped_0000.png`, written by batch cropping
    Cropped,
}

impl PageNaming {
    pub fn prefix(&self) -> &'static str {
        match self {
            PageNaming::Rasterized => "page_",
            PageNaming::Cropped => "cropped_",
        }
    }

    pub fn file_name(&self, index: usize) -> String {
        format!("{}{:04}.png", self.prefix(), index)
    }

    pub fn path(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(self.file_name(index))
    }

    /// Paths for pages `0..count`, in page order
    pub fn paths(&self, dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count).map(|i| self.path(dir, i)).collect()
    }
}

/// Decode an image file, distinguishing a missing file from an undecodable one
pub fn load_image(path: &Path) -> Result<DynamicImage, ScanCropError> {
    if !path.is_file() {
        return Err(ScanCropError::MissingPage {
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(|source| ScanCropError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
