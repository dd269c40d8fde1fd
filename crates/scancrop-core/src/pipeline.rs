//! End-to-end crop workflow
//!
//! 1. Empty the intermediate directories
//! 2. Rasterize the source, one PNG per page
//! 3. Select a crop rectangle on page 0 and wait for confirmation
//! 4. Crop every page with the confirmed rectangle
//! 5. Recombine the cropped pages into the output PDF
//!
//! Steps 4 and 5 are fail-fast: one bad page aborts the run and no output document is written.

use crate::batch::BatchCropper;
use crate::cleanup::clean_directory;
use crate::compose::Compositor;
use crate::error::ScanCropError;
use crate::geometry::{OriginalRect, Point, ScaleFactor};
use crate::page::{Page, PageNaming};
use crate::raster::Rasterizer;
use crate::recombine::Recombiner;
use crate::session::{ConfirmationPrompt, CropSession, PointerEvent, ReleaseOutcome, SessionState};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-system locations for one run; each is owned by the run while it executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    /// Scanned source PDF
    pub input: PathBuf,
    /// Rasterized pages (`page_NNNN.png`); emptied before the run
    pub pages_dir: PathBuf,
    /// Cropped pages (`cropped_NNNN.png`); emptied before the run
    pub cropped_dir: PathBuf,
    /// Recombined output PDF
    pub output_file: PathBuf,
}

impl PipelinePaths {
    /// Intermediate directories laid out under `work_dir`
    pub fn with_work_dir(input: &Path, work_dir: &Path, output_file: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            pages_dir: work_dir.join("pages"),
            cropped_dir: work_dir.join("cropped"),
            output_file: output_file.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub dpi: u32,
    pub scale: ScaleFactor,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            scale: ScaleFactor::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed {
        rect: OriginalRect,
        pages: usize,
        output: PathBuf,
    },
    /// The operator rejected the selection
    Cancelled,
    /// The pointer input never produced a non-empty selection
    NoSelection,
}

/// Result of the selection step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Confirmed(OriginalRect),
    Cancelled,
    Missing,
}

/// Press at `from`, drag to `to`, release at `to`
pub fn drag_gesture(from: Point, to: Point) -> Vec<PointerEvent> {
    vec![
        PointerEvent::Press(from),
        PointerEvent::Drag(to),
        PointerEvent::Release(to),
    ]
}

pub struct CropPipeline<R, C> {
    paths: PipelinePaths,
    options: PipelineOptions,
    rasterizer: R,
    recombiner: Recombiner<C>,
}

impl<R: Rasterizer, C: Compositor> CropPipeline<R, C> {
    pub fn new(
        paths: PipelinePaths,
        options: PipelineOptions,
        rasterizer: R,
        compositor: C,
    ) -> Self {
        Self {
            paths,
            options,
            rasterizer,
            recombiner: Recombiner::new(compositor),
        }
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    /// Run the whole workflow, replaying `gesture` on page 0 and asking `prompt` to confirm
    pub fn run(
        &self,
        gesture: &[PointerEvent],
        prompt: &mut dyn ConfirmationPrompt,
    ) -> Result<PipelineOutcome, ScanCropError> {
        let page_count = self.prepare()?;

        match self.select(gesture, prompt)? {
            Selection::Confirmed(rect) => self.crop_and_recombine(rect, page_count),
            Selection::Cancelled => Ok(PipelineOutcome::Cancelled),
            Selection::Missing => Ok(PipelineOutcome::NoSelection),
        }
    }

    /// Clean intermediates, rasterize the source and store the page images; returns the page count
    pub fn prepare(&self) -> Result<usize, ScanCropError> {
        for dir in [&self.paths.pages_dir, &self.paths.cropped_dir] {
            let report = clean_directory(dir)?;
            if !report.is_clean() {
                warn!(
                    dir = %dir.display(),
                    failed = report.failed.len(),
                    "Some intermediate files could not be deleted"
                );
            }
        }

        let pages = self
            .rasterizer
            .rasterize(&self.paths.input, self.options.dpi)?;
        if pages.is_empty() {
            return Err(ScanCropError::EmptyBatch);
        }
        for page in &pages {
            page.save(&self.paths.pages_dir, PageNaming::Rasterized)?;
        }
        info!(pages = pages.len(), dir = %self.paths.pages_dir.display(), "Pages stored");
        Ok(pages.len())
    }

    /// Drive a crop session on the stored first page
    pub fn select(
        &self,
        gesture: &[PointerEvent],
        prompt: &mut dyn ConfirmationPrompt,
    ) -> Result<Selection, ScanCropError> {
        let reference = Page::load(&self.paths.pages_dir, PageNaming::Rasterized, 0)?;

        let mut confirmed = None;
        let mut session = CropSession::new(reference.into_image(), self.options.scale, |rect| {
            confirmed = Some(rect)
        })?;

        // pointer events that do not apply in the current state are dropped
        for event in gesture {
            match session.handle(*event) {
                Ok(Some(ReleaseOutcome::Ready)) => break,
                Ok(_) => {}
                Err(ScanCropError::InvalidTransition { state, event }) => {
                    debug!(state, event, "Ignoring pointer event");
                }
                Err(err) => return Err(err),
            }
        }

        if session.state() != SessionState::AwaitingConfirmation {
            warn!("No valid crop area was selected");
            return Ok(Selection::Missing);
        }
        session.await_decision(prompt)?;
        drop(session);
        Ok(match confirmed {
            Some(rect) => Selection::Confirmed(rect),
            None => Selection::Cancelled,
        })
    }

    /// Crop all stored pages with `rect` and write the recombined document
    pub fn crop_and_recombine(
        &self,
        rect: OriginalRect,
        page_count: usize,
    ) -> Result<PipelineOutcome, ScanCropError> {
        let cropped = BatchCropper::new(rect).crop_directory(
            &self.paths.pages_dir,
            page_count,
            &self.paths.cropped_dir,
        )?;
        let pages = self
            .recombiner
            .recombine_files(&cropped, &self.paths.output_file)?;

        Ok(PipelineOutcome::Completed {
            rect,
            pages,
            output: self.paths.output_file.clone(),
        })
    }
}
