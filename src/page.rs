//! Page state.
//!
//! This is everything the view needs to draw the page: the current image,
//! whether the engine is ready, progress, and the latest result or failure.
//! It holds no handles to anything, so it's cheap to clone and easy to test.

use crate::{
    intake::{DropRejection, UploadedImage},
    prelude::*,
    progress::ProgressState,
    session::ExtractError,
};

/// The state of one page session.
#[derive(Clone, Debug, Default)]
pub struct PageState {
    /// The image the user dropped, if any.
    pub image: Option<UploadedImage>,

    /// Does the recognition engine exist yet?
    pub engine_ready: bool,

    /// Is an extraction running?
    pub extracting: bool,

    /// Progress of the current or most recent extraction.
    pub progress: ProgressState,

    /// Text from the most recent successful extraction.
    pub result: Option<String>,

    /// Why the most recent extraction failed, if it did.
    pub failure: Option<String>,

    /// Bumped every time a drop replaces the image.
    pub image_generation: u64,

    /// The image generation the running extraction was started on.
    pub running_generation: Option<u64>,
}

impl PageState {
    /// Can the user start an extraction?
    pub fn extract_enabled(&self) -> bool {
        self.image.is_some() && self.engine_ready
    }

    /// Apply the outcome of a drop. Rejected drops change nothing.
    pub fn apply_drop(&mut self, outcome: Result<UploadedImage, DropRejection>) {
        match outcome {
            Ok(image) => {
                self.image = Some(image);
                self.image_generation += 1;
                self.result = None;
                self.failure = None;
            }
            Err(rejection) => warn!("Ignoring drop: {}", rejection),
        }
    }

    /// An extraction of the current image is starting. Returns the image
    /// generation it belongs to.
    pub fn begin_extraction(&mut self) -> u64 {
        self.extracting = true;
        self.failure = None;
        self.progress = ProgressState::starting();
        self.running_generation = Some(self.image_generation);
        self.image_generation
    }

    /// Record a progress event.
    pub fn apply_progress(&mut self, progress: ProgressState) {
        self.progress = progress;
    }

    /// Record how an extraction finished. A failure leaves the progress and
    /// any previous result untouched.
    ///
    /// Returns `false` if the outcome was discarded because the image was
    /// replaced while the extraction was running.
    pub fn finish_extraction(&mut self, outcome: &Result<String, ExtractError>) -> bool {
        // Another extraction is still running. Leave it be.
        if matches!(outcome, Err(ExtractError::Busy)) {
            return false;
        }
        self.extracting = false;
        let started_on = self.running_generation.take();
        if started_on != Some(self.image_generation) {
            debug!(
                ?started_on,
                current = self.image_generation,
                "Discarding extraction outcome for a replaced image"
            );
            return false;
        }
        match outcome {
            Ok(text) => {
                self.result = Some(text.clone());
                self.failure = None;
            }
            Err(err) => self.failure = Some(err.to_string()),
        }
        true
    }

    /// Is `generation` still the image on the page?
    pub fn is_current_image(&self, generation: u64) -> bool {
        self.image.is_some() && self.image_generation == generation
    }

    /// The result, if there is one worth showing.
    pub fn visible_result(&self) -> Option<&str> {
        self.result.as_deref().filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn image(name: &str) -> UploadedImage {
        UploadedImage::from_bytes(name, "image/png", b"bytes")
    }

    #[test]
    fn extract_needs_an_image_and_an_engine() {
        for (has_image, engine_ready) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            let state = PageState {
                image: has_image.then(|| image("a.png")),
                engine_ready,
                ..PageState::default()
            };
            assert_eq!(state.extract_enabled(), has_image && engine_ready);
        }
    }

    #[test]
    fn rejected_drops_change_nothing() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        state.result = Some("old".to_owned());

        state.apply_drop(Err(DropRejection::MultipleFiles(2)));
        state.apply_drop(Err(DropRejection::UnsupportedType {
            path: PathBuf::from("scan.pdf"),
            mime_type: Some("application/pdf".to_owned()),
        }));
        assert_eq!(state.image.as_ref().unwrap().file_name, "a.png");
        assert_eq!(state.result.as_deref(), Some("old"));
    }

    #[test]
    fn new_images_clear_old_results() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        state.result = Some("old".to_owned());
        state.failure = Some("bad".to_owned());
        state.apply_drop(Ok(image("b.png")));
        assert_eq!(state.image.as_ref().unwrap().file_name, "b.png");
        assert!(state.result.is_none());
        assert!(state.failure.is_none());
    }

    #[test]
    fn failures_keep_progress_and_previous_results() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        state.begin_extraction();
        assert!(state.finish_extraction(&Ok("first".to_owned())));
        state.begin_extraction();
        state.apply_progress(ProgressState::new(0.3, "loading language traineddata"));
        state.finish_extraction(&Err(ExtractError::EngineNotReady));

        assert!(!state.extracting);
        assert_eq!(state.progress.percent(), 30);
        assert_eq!(state.result.as_deref(), Some("first"));
        assert!(state.failure.is_some());
    }

    #[test]
    fn empty_results_are_hidden() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        state.begin_extraction();
        state.finish_extraction(&Ok(String::new()));
        assert_eq!(state.visible_result(), None);
        state.begin_extraction();
        state.finish_extraction(&Ok(" x ".to_owned()));
        assert_eq!(state.visible_result(), Some(" x "));
    }

    #[test]
    fn outcomes_for_replaced_images_are_discarded() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        let generation = state.begin_extraction();
        state.apply_drop(Ok(image("b.png")));
        assert!(!state.is_current_image(generation));

        assert!(!state.finish_extraction(&Ok("text from a.png".to_owned())));
        assert!(!state.extracting);
        assert_eq!(state.image.as_ref().unwrap().file_name, "b.png");
        assert!(state.result.is_none());
        assert_eq!(state.visible_result(), None);

        let generation = state.begin_extraction();
        state.apply_drop(Ok(image("c.png")));
        assert!(!state.finish_extraction(&Err(ExtractError::EngineNotReady)));
        assert!(state.failure.is_none());
        assert!(!state.is_current_image(generation));
    }

    #[test]
    fn busy_outcomes_leave_the_running_extraction_alone() {
        let mut state = PageState::default();
        state.apply_drop(Ok(image("a.png")));
        state.begin_extraction();
        assert!(!state.finish_extraction(&Err(ExtractError::Busy)));
        assert!(state.extracting);
        assert!(state.finish_extraction(&Ok("done".to_owned())));
        assert_eq!(state.visible_result(), Some("done"));
    }
}
