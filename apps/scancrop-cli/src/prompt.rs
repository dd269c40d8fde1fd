//! Interactive confirmation on the terminal
//!
//! There is no window to draw on, so the reviewed crop is written to an image file for the
//! operator to open, and the decision is read as `y`/`n` from the input stream.

use scancrop_core::{ConfirmationPrompt, CropPreview, Decision};
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub struct TerminalPrompt<I, O> {
    input: I,
    output: O,
    review_path: PathBuf,
}

impl<I: BufRead, O: Write> TerminalPrompt<I, O> {
    pub fn new(input: I, output: O, review_path: PathBuf) -> Self {
        Self {
            input,
            output,
            review_path,
        }
    }

    fn ask(&mut self, preview: &CropPreview) -> std::io::Result<Decision> {
        match preview.image().save(&self.review_path) {
            Ok(()) => writeln!(
                self.output,
                "Crop preview written to {}",
                self.review_path.display()
            )?,
            Err(e) => {
                tracing::warn!(
                    path = %self.review_path.display(),
                    error = %e,
                    "Could not write crop preview"
                );
            }
        }
        writeln!(
            self.output,
            "Selected {} (preview {}) on the original page",
            preview.rect(),
            preview.selection()
        )?;

        loop {
            write!(self.output, "Proceed with this crop? [y/n] ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                // closed input counts as cancel
                return Ok(Decision::Reject);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Decision::Accept),
                "n" | "no" => return Ok(Decision::Reject),
                _ => writeln!(self.output, "Please answer y or n")?,
            }
        }
    }
}

impl<I: BufRead, O: Write> ConfirmationPrompt for TerminalPrompt<I, O> {
    fn decide(&mut self, preview: &CropPreview) -> Decision {
        self.ask(preview).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Terminal prompt failed; cancelling");
            Decision::Reject
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage};
    use scancrop_core::{CropSession, Point, ScaleFactor, SessionState};
    use std::io::Cursor;

    fn decide_with(input: &str) -> (SessionState, String, PathBuf, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let review_path = dir.path().join("review.png");
        let mut prompt = TerminalPrompt::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            review_path.clone(),
        );

        let reference = DynamicImage::ImageLuma8(GrayImage::new(40, 40));
        let mut session = CropSession::new(reference, ScaleFactor::default(), |_| {}).unwrap();
        session.press(Point::new(2, 2)).unwrap();
        session.drag(Point::new(12, 8)).unwrap();
        session.release(Point::new(12, 8)).unwrap();
        let state = session.await_decision(&mut prompt).unwrap();

        let output = String::from_utf8(prompt.output).unwrap();
        (state, output, review_path, dir)
    }

    #[test]
    fn test_yes_accepts_and_writes_review_image() {
        let (state, output, review_path, _dir) = decide_with("y\n");
        assert_eq!(state, SessionState::Confirmed);
        assert!(review_path.exists());
        assert!(output.contains("(4, 4) 20x12"));
    }

    #[test]
    fn test_reprompts_until_answer() {
        let (state, output, _, _dir) = decide_with("maybe\nNO\n");
        assert_eq!(state, SessionState::Cancelled);
        assert_eq!(output.matches("Proceed with this crop?").count(), 2);
    }

    #[test]
    fn test_closed_input_cancels() {
        let (state, _, _, _dir) = decide_with("");
        assert_eq!(state, SessionState::Cancelled);
    }
}
