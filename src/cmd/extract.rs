//! The `extract` subcommand.

use std::sync::Mutex;

use clap::Args;
use schemars::JsonSchema;

use crate::{
    async_utils::io::write_output_text,
    engines::EngineOpts,
    intake::accept_drop,
    page::PageState,
    prelude::*,
    progress::ProgressReporter,
    session::RecognitionSession,
    ui::Ui,
    view::PageView,
};

use super::drive_extraction;

/// Command line arguments for `extract`.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// The image to read. Exactly one is accepted; passing several is
    /// treated like dropping several files at once, and rejected.
    #[clap(value_name = "FILE", required = true)]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub engine_opts: EngineOpts,

    /// Write a JSON record instead of plain text.
    #[clap(long)]
    pub json: bool,

    /// Where to write the output. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The record written by `extract --json`.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ExtractOutput {
    /// The file name of the image.
    pub file_name: String,

    /// The sniffed MIME type of the image.
    pub mime_type: String,

    /// The language we recognized.
    pub language: String,

    /// The recognized text, exactly as the engine returned it.
    pub text: String,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let (reporter, mut progress) = ProgressReporter::new();
    let spinner = ui.new_spinner("Starting OCR engine");

    let output = RecognitionSession::scoped(&opts.engine_opts, reporter, |session| {
        let ui = ui.clone();
        async move {
            spinner.finish_and_clear();
            let state = Mutex::new(PageState {
                engine_ready: true,
                ..PageState::default()
            });

            let dropped = accept_drop(&opts.paths).await;
            let rejection = dropped.as_ref().err().map(ToString::to_string);
            state.lock().expect("lock poisoned").apply_drop(dropped);

            let image = {
                let mut state = state.lock().expect("lock poisoned");
                let image = match &state.image {
                    Some(image) if state.extract_enabled() => image.clone(),
                    _ => {
                        return Err(anyhow!(
                            "nothing to extract: {}",
                            rejection.unwrap_or_else(|| "no image loaded".to_owned())
                        ));
                    }
                };
                state.begin_extraction();
                image
            };

            let mut view = PageView::new(ui);
            let text =
                drive_extraction(&session, &image, &mut progress, &state, &mut view)
                    .await
                    .with_context(|| format!("could not extract text from {}", image.file_name))?;

            Ok(ExtractOutput {
                file_name: image.file_name,
                mime_type: image.mime_type,
                language: opts.engine_opts.language.clone(),
                text,
            })
        }
    })
    .await?;

    if opts.json {
        let json = serde_json::to_string_pretty(&output)
            .context("failed to serialize output")?;
        write_output_text(opts.output_path.as_deref(), &json).await
    } else {
        write_output_text(opts.output_path.as_deref(), &output.text).await
    }
}
