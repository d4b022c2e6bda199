//! Recognition sessions.
//!
//! A [`RecognitionSession`] owns exactly one recognition engine for the
//! lifetime of a page session. It runs at most one extraction at a time,
//! and rejects overlapping requests with [`ExtractError::Busy`].

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    engines::{EngineOpts, RecognitionEngine, create_engine},
    intake::UploadedImage,
    prelude::*,
    progress::ProgressReporter,
};

/// The steps of an extraction, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractStep {
    LoadRuntime,
    LoadLanguage,
    Initialize,
    Recognize,
}

impl ExtractStep {
    /// The steps needed to get a model ready for recognition.
    const MODEL_STEPS: [ExtractStep; 3] = [
        ExtractStep::LoadRuntime,
        ExtractStep::LoadLanguage,
        ExtractStep::Initialize,
    ];

    /// Roughly how much of a full run this step takes.
    fn weight(self) -> f32 {
        match self {
            ExtractStep::LoadRuntime => 0.1,
            ExtractStep::LoadLanguage => 0.2,
            ExtractStep::Initialize => 0.1,
            ExtractStep::Recognize => 0.6,
        }
    }
}

impl fmt::Display for ExtractStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractStep::LoadRuntime => "loading the OCR runtime",
            ExtractStep::LoadLanguage => "loading the language model",
            ExtractStep::Initialize => "initializing the engine",
            ExtractStep::Recognize => "recognizing text",
        };
        f.write_str(name)
    }
}

/// Split `0.0..1.0` among `steps` in proportion to their weights. The last
/// step always ends at exactly 1.0.
fn step_ranges(steps: &[ExtractStep]) -> Vec<(ExtractStep, f32, f32)> {
    let total: f32 = steps.iter().map(|step| step.weight()).sum();
    let mut start = 0.0;
    let mut ranges = Vec::with_capacity(steps.len());
    for (idx, &step) in steps.iter().enumerate() {
        let end = if idx + 1 == steps.len() {
            1.0
        } else {
            (start + step.weight() / total).min(1.0)
        };
        ranges.push((step, start, end));
        start = end;
    }
    ranges
}

/// Why an extraction did not produce text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no image has been loaded")]
    NoImage,

    #[error("the recognition engine is not ready yet")]
    EngineNotReady,

    #[error("an extraction is already running")]
    Busy,

    #[error("the recognition session has been shut down")]
    Terminated,

    #[error("failed while {step}: {source:#}")]
    Engine {
        step: ExtractStep,
        #[source]
        source: anyhow::Error,
    },
}

/// The engine, plus what we know about its state.
struct EngineSlot {
    engine: Box<dyn RecognitionEngine>,

    /// Have runtime, language and initialization all succeeded since the
    /// last failure?
    model_ready: bool,
}

/// One recognition engine, owned for the length of a page session.
pub struct RecognitionSession {
    slot: Mutex<EngineSlot>,
    reporter: ProgressReporter,
    language: String,
    reload_model_each_run: bool,
    terminated: AtomicBool,
}

impl RecognitionSession {
    /// Create the engine described by `opts` and wrap it in a session.
    ///
    /// `reporter` receives progress for every extraction this session runs.
    #[instrument(level = "debug", skip_all, fields(engine = ?opts.engine))]
    pub async fn start(opts: &EngineOpts, reporter: ProgressReporter) -> Result<Self> {
        let engine = create_engine(opts, reporter.clone())
            .await
            .context("could not create recognition engine")?;
        info!(language = %opts.language, "Recognition engine ready");
        Ok(Self::with_engine(
            engine,
            reporter,
            &opts.language,
            opts.reload_model_each_run,
        ))
    }

    /// Wrap an existing engine. `reporter` should be the one the engine was
    /// constructed with.
    pub fn with_engine(
        engine: Box<dyn RecognitionEngine>,
        reporter: ProgressReporter,
        language: &str,
        reload_model_each_run: bool,
    ) -> Self {
        Self {
            slot: Mutex::new(EngineSlot {
                engine,
                model_ready: false,
            }),
            reporter,
            language: language.to_owned(),
            reload_model_each_run,
            terminated: AtomicBool::new(false),
        }
    }

    /// Start a session, run `f` with it, and shut the session down again no
    /// matter how `f` finishes.
    pub async fn scoped<F, Fut, T>(
        opts: &EngineOpts,
        reporter: ProgressReporter,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<RecognitionSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Arc::new(Self::start(opts, reporter).await?);
        let result = f(session.clone()).await;
        let shutdown = session.shutdown().await;
        let value = result?;
        shutdown?;
        Ok(value)
    }

    /// Is an extraction running right now?
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Has this session been shut down?
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn check_terminated(&self) -> Result<(), ExtractError> {
        if self.is_terminated() {
            Err(ExtractError::Terminated)
        } else {
            Ok(())
        }
    }

    /// Extract the text from `image`.
    ///
    /// The first run (and every run after a failure) loads the runtime and
    /// language model first. Later runs reuse them unless the session was
    /// configured to reload every time.
    #[instrument(
        level = "info",
        skip_all,
        fields(run_id = %Uuid::new_v4(), file_name = %image.file_name)
    )]
    pub async fn extract(&self, image: &UploadedImage) -> Result<String, ExtractError> {
        self.check_terminated()?;
        let mut slot = self.slot.try_lock().map_err(|_| ExtractError::Busy)?;
        self.check_terminated()?;

        let load_model = !slot.model_ready || self.reload_model_each_run;
        let mut steps = vec![];
        if load_model {
            steps.extend(ExtractStep::MODEL_STEPS);
        }
        steps.push(ExtractStep::Recognize);
        debug!(?steps, "Starting extraction");

        self.reporter.begin_run();
        let mut text = String::new();
        for (step, start, end) in step_ranges(&steps) {
            self.reporter.enter_step(start, end);
            let result = match step {
                ExtractStep::LoadRuntime => slot.engine.load_runtime().await,
                ExtractStep::LoadLanguage => {
                    slot.engine.load_language(&self.language).await
                }
                ExtractStep::Initialize => slot.engine.initialize(&self.language).await,
                ExtractStep::Recognize => {
                    slot.engine.recognize(image).await.map(|recognized| {
                        text = recognized;
                    })
                }
            };
            if let Err(source) = result {
                slot.model_ready = false;
                self.check_terminated()?;
                error!(%step, "Extraction failed: {:#}", source);
                return Err(ExtractError::Engine { step, source });
            }
            self.check_terminated()?;
            if step == ExtractStep::Initialize {
                slot.model_ready = true;
            }
        }

        self.reporter.complete();
        info!(chars = text.chars().count(), "Extraction complete");
        debug!(%text, "Recognized text");
        Ok(text)
    }

    /// Shut the session down and terminate the engine.
    ///
    /// No progress events are delivered after this starts. If an extraction
    /// is still running, this waits for its current step to end. Owners
    /// should abort in-flight extraction tasks first.
    #[instrument(level = "debug", skip_all)]
    pub async fn shutdown(&self) -> Result<()> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.reporter.close();
        let mut slot = self.slot.lock().await;
        slot.model_ready = false;
        slot.engine
            .terminate()
            .await
            .context("could not terminate recognition engine")?;
        debug!("Recognition session shut down");
        Ok(())
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        if !self.is_terminated() {
            warn!("Recognition session dropped without being shut down");
        }
        self.reporter.close();
    }
}
