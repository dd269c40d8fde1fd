//! Crop scanned documents with one operator-chosen rectangle, and split them into chunks
//!
//! Two workflows share the crate:
//! - `pipeline::CropPipeline`: rasterize a scanned PDF, pick a crop rectangle on a downscaled
//!   preview of the first page, apply it to every page and reassemble the result.
//! - `split::DocumentSplitter`: cut a PDF into fixed-size chunks, each ending with a copy of the
//!   source's last page.

pub mod batch;
pub mod cleanup;
pub mod compose;
pub mod error;
pub mod geometry;
pub mod page;
pub mod pipeline;
pub mod raster;
pub mod recombine;
pub mod session;
pub mod split;

pub use batch::BatchCropper;
pub use cleanup::{clean_directory, CleanupReport};
pub use compose::{Compositor, PdfCompositor};
pub use error::ScanCropError;
pub use geometry::{
    to_original, to_preview, Original, OriginalRect, Point, Preview, PreviewRect, Rect,
    ScaleFactor,
};
pub use page::{Page, PageNaming};
pub use pipeline::{
    drag_gesture, CropPipeline, PipelineOptions, PipelineOutcome, PipelinePaths, Selection,
};
pub use raster::{Rasterizer, ScanImageRasterizer};
pub use recombine::Recombiner;
pub use session::{
    ConfirmationPrompt, CropPreview, CropSession, Decision, FixedDecision, PointerEvent,
    ReleaseOutcome, SessionState,
};
pub use split::{partition, DocumentSplitter, SplitChunk, SplitOptions, SplitReport};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, ScanCropError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| ScanCropError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse a preview-space selection `"x0,y0,x1,y1"` into its two corners
pub fn parse_corners(input: &str) -> Result<(Point, Point), ScanCropError> {
    let values = input
        .split(',')
        .map(|part| {
            part.trim().parse::<u32>().map_err(|_| {
                ScanCropError::OperationError(format!("Invalid coordinate: {:?}", part.trim()))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [x0, y0, x1, y1] => Ok((Point::new(*x0, *y0), Point::new(*x1, *y1))),
        _ => Err(ScanCropError::OperationError(format!(
            "Expected 4 coordinates x0,y0,x1,y1, got {}",
            values.len()
        ))),
    }
}
