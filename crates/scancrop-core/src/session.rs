//! Interactive crop selection
//!
//! A [`CropSession`] holds one pending selection over one reference page. Pointer events drive it
//! through five states:
//!
//! ```text
//! Idle --press--> Selecting --drag--> Selecting
//!                 Selecting --release (dragged area > 0)--> AwaitingConfirmation
//!                 Selecting --release (dragged area = 0)--> Idle
//! AwaitingConfirmation --accept--> Confirmed   (callback fires once)
//! AwaitingConfirmation --reject--> Cancelled
//! ```
//!
//! Selection happens entirely in preview space; the rectangle is mapped to original space once,
//! on release. Events that are not valid for the current state are rejected and change nothing,
//! which is what keeps the confirmation callback from ever firing twice.

use crate::error::ScanCropError;
use crate::geometry::{to_original, OriginalRect, Point, PreviewRect, ScaleFactor};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Selecting,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Selecting => "Selecting",
            SessionState::AwaitingConfirmation => "AwaitingConfirmation",
            SessionState::Confirmed => "Confirmed",
            SessionState::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Confirmed | SessionState::Cancelled)
    }
}

/// Pointer input in preview coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press(Point),
    Drag(Point),
    Release(Point),
}

impl PointerEvent {
    fn name(&self) -> &'static str {
        match self {
            PointerEvent::Press(_) => "press",
            PointerEvent::Drag(_) => "drag",
            PointerEvent::Release(_) => "release",
        }
    }
}

/// Result of releasing the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// A crop preview is ready for review
    Ready,
    /// Zero-area selection; the session is back in `Idle`
    Invalid,
}

/// The selection as presented for operator review
#[derive(Debug, Clone)]
pub struct CropPreview {
    selection: PreviewRect,
    rect: OriginalRect,
    image: DynamicImage,
}

impl CropPreview {
    /// Selection as drawn on the preview
    pub fn selection(&self) -> PreviewRect {
        self.selection
    }

    /// Selection mapped to the full-resolution page
    pub fn rect(&self) -> OriginalRect {
        self.rect
    }

    /// The cropped reference page, downscaled for display
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// Blocking confirm/cancel boundary
///
/// Called once per reviewed selection; the workflow does not continue until it returns.
pub trait ConfirmationPrompt {
    fn decide(&mut self, preview: &CropPreview) -> Decision;
}

/// A prompt that always answers the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Decision);

impl ConfirmationPrompt for FixedDecision {
    fn decide(&mut self, _preview: &CropPreview) -> Decision {
        self.0
    }
}

impl<F> ConfirmationPrompt for F
where
    F: FnMut(&CropPreview) -> Decision,
{
    fn decide(&mut self, preview: &CropPreview) -> Decision {
        self(preview)
    }
}

/// Selection state machine over one reference page
pub struct CropSession<F>
where
    F: FnOnce(OriginalRect),
{
    reference: DynamicImage,
    preview: DynamicImage,
    scale: ScaleFactor,
    state: SessionState,
    anchor: Option<Point>,
    pending: Option<PreviewRect>,
    review: Option<CropPreview>,
    on_confirm: Option<F>,
}

impl<F> CropSession<F>
where
    F: FnOnce(OriginalRect),
{
    /// Start a session over `reference`, shown at `scale`
    ///
    /// `on_confirm` receives the original-space rectangle when the operator accepts.
    pub fn new(
        reference: DynamicImage,
        scale: ScaleFactor,
        on_confirm: F,
    ) -> Result<Self, ScanCropError> {
        let width = scale.scale_down(reference.width());
        let height = scale.scale_down(reference.height());
        if width == 0 || height == 0 {
            return Err(ScanCropError::InvalidScale(format!(
                "{} leaves no preview of a {}x{} page",
                scale,
                reference.width(),
                reference.height()
            )));
        }

        let preview = reference.resize_exact(width, height, FilterType::Triangle);
        debug!(width, height, %scale, "Crop session preview ready");

        Ok(Self {
            reference,
            preview,
            scale,
            state: SessionState::Idle,
            anchor: None,
            pending: None,
            review: None,
            on_confirm: Some(on_confirm),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    /// Rectangle currently being drawn, in preview space
    pub fn pending_rect(&self) -> Option<PreviewRect> {
        self.pending
    }

    /// Selection awaiting confirmation, if any
    pub fn review(&self) -> Option<&CropPreview> {
        self.review.as_ref()
    }

    /// Full downscaled reference page
    pub fn preview_image(&self) -> &DynamicImage {
        &self.preview
    }

    /// What the operator sees: the crop under review, otherwise the full preview
    pub fn displayed_image(&self) -> &DynamicImage {
        match &self.review {
            Some(review) => review.image(),
            None => &self.preview,
        }
    }

    /// Dispatch a pointer event; returns the release outcome for release events
    pub fn handle(&mut self, event: PointerEvent) -> Result<Option<ReleaseOutcome>, ScanCropError> {
        match event {
            PointerEvent::Press(p) => self.press(p).map(|_| None),
            PointerEvent::Drag(p) => self.drag(p).map(|_| None),
            PointerEvent::Release(p) => self.release(p).map(Some),
        }
    }

    pub fn press(&mut self, at: Point) -> Result<(), ScanCropError> {
        self.require_state(SessionState::Idle, PointerEvent::Press(at).name())?;
        let at = self.clamp(at);
        self.anchor = Some(at);
        self.pending = Some(PreviewRect::at(at));
        self.state = SessionState::Selecting;
        debug!(x = at.x, y = at.y, "Selection started");
        Ok(())
    }

    pub fn drag(&mut self, to: Point) -> Result<(), ScanCropError> {
        self.require_state(SessionState::Selecting, PointerEvent::Drag(to).name())?;
        self.pending = Some(self.span_to(to));
        Ok(())
    }

    /// Finish drawing the box built by the last drag
    ///
    /// A selection that is empty in either space returns the session to Idle. Otherwise it is
    /// mapped to original space and cropped for review. The release position itself does not
    /// move the box; a press released without any drag selects nothing.
    pub fn release(&mut self, at: Point) -> Result<ReleaseOutcome, ScanCropError> {
        self.require_state(SessionState::Selecting, PointerEvent::Release(at).name())?;
        let selection = self.pending.unwrap_or(PreviewRect::at(Point::default()));
        let rect = to_original(selection, self.scale);

        if selection.is_empty() || rect.is_empty() {
            warn!(%selection, "Invalid selection: crop area has zero width or height");
            self.anchor = None;
            self.pending = None;
            self.state = SessionState::Idle;
            return Ok(ReleaseOutcome::Invalid);
        }

        if !rect.fits_within(self.reference.width(), self.reference.height()) {
            return Err(ScanCropError::OutOfBounds {
                page_index: 0,
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                page_width: self.reference.width(),
                page_height: self.reference.height(),
            });
        }

        let cropped = self.reference.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let image = cropped.resize_exact(
            self.scale.scale_down(rect.width).max(1),
            self.scale.scale_down(rect.height).max(1),
            FilterType::Triangle,
        );

        debug!(%selection, %rect, "Selection ready for review");
        self.anchor = None;
        self.review = Some(CropPreview {
            selection,
            rect,
            image,
        });
        self.state = SessionState::AwaitingConfirmation;
        Ok(ReleaseOutcome::Ready)
    }

    /// Accept the reviewed selection, firing the confirmation callback
    pub fn accept(&mut self) -> Result<OriginalRect, ScanCropError> {
        self.require_state(SessionState::AwaitingConfirmation, "accept")?;
        let rect = match self.review.take() {
            Some(review) => review.rect,
            None => {
                return Err(ScanCropError::InvalidTransition {
                    state: self.state.name(),
                    event: "accept",
                })
            }
        };

        self.state = SessionState::Confirmed;
        info!(%rect, "Crop area confirmed");
        if let Some(callback) = self.on_confirm.take() {
            callback(rect);
        }
        Ok(rect)
    }

    /// Reject the reviewed selection; the session is finished and the full preview is restored
    pub fn reject(&mut self) -> Result<(), ScanCropError> {
        self.require_state(SessionState::AwaitingConfirmation, "reject")?;
        self.review = None;
        self.pending = None;
        self.state = SessionState::Cancelled;
        info!("Crop selection cancelled");
        Ok(())
    }

    /// Block on `prompt` for the reviewed selection and apply its decision
    pub fn await_decision(
        &mut self,
        prompt: &mut dyn ConfirmationPrompt,
    ) -> Result<SessionState, ScanCropError> {
        self.require_state(SessionState::AwaitingConfirmation, "decide")?;
        let decision = match &self.review {
            Some(review) => prompt.decide(review),
            None => Decision::Reject,
        };
        match decision {
            Decision::Accept => self.accept().map(|_| ())?,
            Decision::Reject => self.reject()?,
        }
        Ok(self.state)
    }

    fn require_state(&self, state: SessionState, event: &'static str) -> Result<(), ScanCropError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ScanCropError::InvalidTransition {
                state: self.state.name(),
                event,
            })
        }
    }

    /// Pointer positions are limited to the preview image
    fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.min(self.preview.width()), p.y.min(self.preview.height()))
    }

    fn span_to(&self, to: Point) -> PreviewRect {
        let anchor = self.anchor.unwrap_or_default();
        PreviewRect::spanning(anchor, self.clamp(to))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use image::GrayImage;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn event() -> impl Strategy<Value = Option<PointerEvent>> {
        let point = (0u32..80, 0u32..60).prop_map(|(x, y)| Point::new(x, y));
        prop_oneof![
            point.clone().prop_map(|p| Some(PointerEvent::Press(p))),
            point.clone().prop_map(|p| Some(PointerEvent::Drag(p))),
            point.prop_map(|p| Some(PointerEvent::Release(p))),
            Just(None), // accept
        ]
    }

    proptest! {
        /// The confirmation callback fires at most once whatever the event sequence
        #[test]
        fn confirmation_fires_at_most_once(events in proptest::collection::vec(event(), 0..40)) {
            let count = Cell::new(0u32);
            let image = DynamicImage::ImageLuma8(GrayImage::new(120, 90));
            let mut session = CropSession::new(image, ScaleFactor::default(), |_| {
                count.set(count.get() + 1)
            })
            .unwrap();

            for event in events {
                let _ = match event {
                    Some(e) => session.handle(e).map(|_| ()),
                    None => session.accept().map(|_| ()),
                };
                if count.get() > 0 {
                    prop_assert_eq!(session.state(), SessionState::Confirmed);
                }
            }
            drop(session);
            prop_assert!(count.get() <= 1);
        }

        /// Zero-width or zero-height releases never confirm and always land in Idle
        #[test]
        fn zero_area_release_is_rejected(
            x in 0u32..60,
            y in 0u32..45,
            d in 0u32..40,
            vertical in any::<bool>(),
        ) {
            let fired = Cell::new(false);
            let image = DynamicImage::ImageLuma8(GrayImage::new(120, 90));
            let mut session =
                CropSession::new(image, ScaleFactor::default(), |_| fired.set(true)).unwrap();
            let end = if vertical { Point::new(x, y + d) } else { Point::new(x + d, y) };
            session.press(Point::new(x, y)).unwrap();
            session.drag(end).unwrap();
            prop_assert_eq!(session.release(end).unwrap(), ReleaseOutcome::Invalid);
            prop_assert_eq!(session.state(), SessionState::Idle);
            prop_assert!(session.accept().is_err());
            drop(session);
            prop_assert!(!fired.get());
        }
    }
}
