//! Command-line entry points.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::{
    intake::UploadedImage,
    page::PageState,
    progress::ProgressState,
    session::{ExtractError, RecognitionSession},
    view::PageView,
};

pub mod extract;
pub mod schema;
pub mod session;

/// Run one extraction, feeding progress into `state` and `view` as it
/// arrives.
///
/// The caller should already have called [`PageState::begin_extraction`].
/// When this returns, every progress event from the run has been applied
/// and the outcome has been recorded in `state`.
pub async fn drive_extraction(
    session: &RecognitionSession,
    image: &UploadedImage,
    progress: &mut mpsc::UnboundedReceiver<ProgressState>,
    state: &Mutex<PageState>,
    view: &mut PageView,
) -> Result<String, ExtractError> {
    let mut apply = |event: ProgressState| {
        view.show_progress(&event);
        state.lock().expect("lock poisoned").apply_progress(event);
    };

    let extraction = session.extract(image);
    tokio::pin!(extraction);
    let outcome = loop {
        tokio::select! {
            outcome = &mut extraction => break outcome,
            Some(event) = progress.recv() => apply(event),
        }
    };
    while let Ok(event) = progress.try_recv() {
        apply(event);
    }

    let mut state = state.lock().expect("lock poisoned");
    state.finish_extraction(&outcome);
    view.finish(&state);
    outcome
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{engines::echo::EchoEngine, progress::ProgressReporter, ui::Ui};

    #[tokio::test]
    async fn applies_every_event_before_returning() {
        let (reporter, mut rx) = ProgressReporter::new();
        let engine = EchoEngine::new(reporter.clone(), Duration::from_millis(1));
        let session =
            RecognitionSession::with_engine(Box::new(engine), reporter, "eng", false);
        let image = UploadedImage::from_bytes("photo.png", "image/png", b"abc");
        let state = Mutex::new(PageState {
            image: Some(image.clone()),
            engine_ready: true,
            ..PageState::default()
        });
        state.lock().unwrap().begin_extraction();
        let mut view = PageView::new(Ui::init_for_tests());

        let text = drive_extraction(&session, &image, &mut rx, &state, &mut view)
            .await
            .unwrap();

        let state = state.into_inner().unwrap();
        assert_eq!(text, EchoEngine::describe(&image));
        assert_eq!(state.result.as_deref(), Some(text.as_str()));
        assert!(!state.extracting);
        assert_eq!(state.progress.percent(), 100);
        assert_eq!(state.progress.display_label(), "DONE");
        session.shutdown().await.unwrap();
    }
}
