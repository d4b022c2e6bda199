//! Recognition engine interface.
//!
//! An engine is created once per page session, with a [`ProgressReporter`]
//! registered up front. Each extraction then drives it through the same four
//! steps: load the runtime, load a language model, initialize for that
//! language, and recognize an image.

use clap::{Args, ValueEnum};

use crate::{intake::UploadedImage, prelude::*, progress::ProgressReporter};

pub mod echo;
pub mod tesseract;

/// Interface to a recognition engine.
#[async_trait]
pub trait RecognitionEngine: Send + Sync + 'static {
    /// Make sure the engine's runtime is available.
    async fn load_runtime(&mut self) -> Result<()>;

    /// Load the recognition model for `language`.
    async fn load_language(&mut self, language: &str) -> Result<()>;

    /// Prepare the engine to recognize `language`.
    async fn initialize(&mut self, language: &str) -> Result<()>;

    /// Recognize the text in an image.
    async fn recognize(&mut self, image: &UploadedImage) -> Result<String>;

    /// Release everything the engine holds. The engine must not be used
    /// afterwards.
    async fn terminate(&mut self) -> Result<()>;
}

/// The engines we support.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum EngineKind {
    /// The `tesseract` command-line tool.
    #[default]
    Tesseract,

    /// A fake engine that describes the image instead of reading it. Useful
    /// for testing.
    Echo,
}

/// Engine options shared by all subcommands.
#[derive(Debug, Clone, Args)]
pub struct EngineOpts {
    /// Which recognition engine to use.
    #[clap(long, env = "OCR_ENGINE", value_enum, default_value_t = EngineKind::Tesseract)]
    pub engine: EngineKind,

    /// The language to recognize, using Tesseract language codes. Join
    /// several with `+`, as in `eng+fra`.
    #[clap(long = "lang", env = "OCR_LANG", default_value = "eng")]
    pub language: String,

    /// Path to the `tesseract` binary.
    #[clap(long = "tesseract", env = "TESSERACT_PATH", default_value = "tesseract")]
    pub tesseract_path: PathBuf,

    /// Reload and re-initialize the language model before every extraction,
    /// instead of only the first time.
    #[clap(long)]
    pub reload_model_each_run: bool,

    /// Artificial delay for each step of the `echo` engine, in milliseconds.
    #[clap(long, hide = true, default_value = "0")]
    pub echo_step_delay_ms: u64,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            language: "eng".to_owned(),
            tesseract_path: PathBuf::from("tesseract"),
            reload_model_each_run: false,
            echo_step_delay_ms: 0,
        }
    }
}

/// Create the engine described by `opts`.
#[instrument(level = "debug", skip(reporter))]
pub async fn create_engine(
    opts: &EngineOpts,
    reporter: ProgressReporter,
) -> Result<Box<dyn RecognitionEngine>> {
    let engine: Box<dyn RecognitionEngine> = match opts.engine {
        EngineKind::Tesseract => Box::new(tesseract::TesseractEngine::new(
            opts.tesseract_path.clone(),
            reporter,
        )),
        EngineKind::Echo => Box::new(echo::EchoEngine::new(
            reporter,
            std::time::Duration::from_millis(opts.echo_step_delay_ms),
        )),
    };
    Ok(engine)
}
