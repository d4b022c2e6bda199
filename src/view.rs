//! Terminal rendering of [`PageState`].

use indicatif::ProgressBar;

use crate::{
    intake::ACCEPTED_IMAGE_MIME_TYPES, page::PageState, progress::ProgressState, ui::Ui,
};

/// How much of the `data:` URL to show in the preview.
const PREVIEW_DATA_URL_CHARS: usize = 48;

/// Instructions shown while no image is loaded.
pub fn drop_instructions() -> String {
    let types = ACCEPTED_IMAGE_MIME_TYPES
        .iter()
        .map(|mime| mime.trim_start_matches("image/"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Drop an image here with `drop <PATH>` ({types})")
}

/// The heading and body of the result block.
pub fn render_result(text: &str) -> String {
    format!("RESULT\n{}\n{}", "─".repeat(40), text)
}

/// Draw the whole page as text.
pub fn render_page(state: &PageState) -> String {
    let mut lines = vec![];

    match &state.image {
        None => lines.push(format!("[ {} ]", drop_instructions())),
        Some(image) => {
            lines.push(format!(
                "[ Drop another image to replace {} ]",
                image.file_name
            ));
            let preview = if image.data_url.chars().count() > PREVIEW_DATA_URL_CHARS {
                let head = image
                    .data_url
                    .chars()
                    .take(PREVIEW_DATA_URL_CHARS)
                    .collect::<String>();
                format!("{head}…")
            } else {
                image.data_url.clone()
            };
            lines.push(format!(
                "Preview: {} ({}, {} bytes) {}",
                image.file_name, image.mime_type, image.byte_len, preview
            ));
        }
    }

    let control = if state.extracting {
        "[Extract] (running)"
    } else if state.extract_enabled() {
        "[Extract]"
    } else if !state.engine_ready {
        "[Extract] (disabled: engine is starting)"
    } else {
        "[Extract] (disabled: no image)"
    };
    lines.push(control.to_owned());
    lines.push(format!("Status: {}", state.progress.display_label()));
    lines.push(format!("Progress: {}%", state.progress.percent()));

    if let Some(failure) = &state.failure {
        lines.push(format!("ERROR: {failure}"));
    }
    if let Some(text) = state.visible_result() {
        lines.push(render_result(text));
    }
    lines.join("\n")
}

/// Live view of extraction progress.
pub struct PageView {
    ui: Ui,
    bar: Option<ProgressBar>,
}

impl PageView {
    /// Create a view which draws through `ui`.
    pub fn new(ui: Ui) -> Self {
        Self { ui, bar: None }
    }

    /// Show a progress event, creating the bar on first use.
    pub fn show_progress(&mut self, progress: &ProgressState) {
        let bar = self
            .bar
            .get_or_insert_with(|| self.ui.new_extraction_bar());
        bar.set_position(progress.percent());
        bar.set_message(progress.display_label());
    }

    /// Freeze the bar in its final state.
    pub fn finish(&mut self, state: &PageState) {
        if let Some(bar) = self.bar.take() {
            if state.failure.is_some() {
                bar.abandon_with_message(format!(
                    "{} (FAILED)",
                    state.progress.display_label()
                ));
            } else if state.progress.is_done() {
                bar.finish_with_message(state.progress.display_label());
            } else {
                bar.finish_and_clear();
            }
        }
    }

    /// Current bar position, if there is a bar.
    #[cfg(test)]
    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(|bar| bar.position())
    }

    /// Print to stdout without mangling the progress bars.
    pub fn print(&self, text: &str) {
        self.ui.suspend(|| println!("{text}"));
    }
}
