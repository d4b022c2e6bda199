//! The `session` subcommand: an interactive page session on stdin.
//!
//! The engine starts in the background as soon as the session opens, and
//! `extract` stays disabled until it's ready. Extractions run in their own
//! task, so `status` and `drop` keep working while one is in flight.

use std::sync::{Arc, Mutex};

use clap::Args;
use futures::StreamExt as _;
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinHandle,
};

use crate::{
    async_utils::io::stdin_lines,
    engines::EngineOpts,
    intake::accept_drop,
    page::PageState,
    prelude::*,
    progress::{ProgressReporter, ProgressState},
    session::{ExtractError, RecognitionSession},
    ui::Ui,
    view::{PageView, render_page, render_result},
};

use super::drive_extraction;

/// Command line arguments for `session`.
#[derive(Debug, Args)]
pub struct SessionOpts {
    #[clap(flatten)]
    pub engine_opts: EngineOpts,
}

const HELP: &str = "\
Commands:
  drop <PATH>...  Load an image (exactly one).
  extract         Extract text from the loaded image.
  wait            Wait for the engine to start and any extraction to finish.
  status          Show the page.
  help            Show this message.
  quit            End the session.";

/// A parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Drop(Vec<PathBuf>),
    Extract,
    Wait,
    Status,
    Help,
    Quit,
}

/// Parse one line of input. Blank lines and `#` comments are `None`.
/// Arguments use shell quoting, so `drop "my photo.png"` is one path.
fn parse_command(line: &str) -> Result<Option<SessionCommand>> {
    if line.trim_start().starts_with('#') {
        return Ok(None);
    }
    let words = shell_words::split(line)
        .with_context(|| format!("could not parse command {:?}", line.trim()))?;
    let mut words = words.into_iter();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.as_str() {
        "drop" => SessionCommand::Drop(words.map(PathBuf::from).collect()),
        "extract" => SessionCommand::Extract,
        "wait" => SessionCommand::Wait,
        "status" => SessionCommand::Status,
        "help" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(anyhow!("unknown command {:?} (try `help`)", other)),
    };
    Ok(Some(command))
}

/// Everything the interactive session owns.
struct SessionHost {
    ui: Ui,
    state: Arc<Mutex<PageState>>,
    progress: Arc<AsyncMutex<mpsc::UnboundedReceiver<ProgressState>>>,
    startup: Option<JoinHandle<Result<RecognitionSession>>>,
    session: Option<Arc<RecognitionSession>>,
    extraction: Option<JoinHandle<()>>,
}

impl SessionHost {
    fn print(&self, text: &str) {
        self.ui.suspend(|| println!("{text}"));
    }

    /// Pick up the engine if it has finished starting. With `block`, wait for
    /// it.
    async fn poll_startup(&mut self, block: bool) {
        let finished = match &self.startup {
            Some(startup) => block || startup.is_finished(),
            None => false,
        };
        if !finished {
            return;
        }
        let Some(startup) = self.startup.take() else {
            return;
        };
        match startup.await {
            Ok(Ok(session)) => {
                self.session = Some(Arc::new(session));
                self.state.lock().expect("lock poisoned").engine_ready = true;
            }
            Ok(Err(err)) => {
                error!("Recognition engine failed to start: {:#}", err);
                self.print(&format!("ERROR: engine failed to start: {err:#}"));
            }
            Err(err) => error!("Engine startup task failed: {}", err),
        }
    }

    fn extraction_running(&self) -> bool {
        self.extraction
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn handle(&mut self, command: SessionCommand) -> bool {
        self.poll_startup(false).await;
        match command {
            SessionCommand::Drop(paths) => {
                let dropped = accept_drop(&paths).await;
                let message = match &dropped {
                    Ok(image) => format!("Loaded {} ({})", image.file_name, image.mime_type),
                    Err(rejection) => format!("Ignored drop: {rejection}"),
                };
                self.state.lock().expect("lock poisoned").apply_drop(dropped);
                self.print(&message);
            }
            SessionCommand::Extract => self.start_extraction(),
            SessionCommand::Wait => {
                self.poll_startup(true).await;
                if let Some(task) = self.extraction.take() {
                    if let Err(err) = task.await {
                        error!("Extraction task failed: {}", err);
                    }
                }
            }
            SessionCommand::Status => {
                let page = render_page(&self.state.lock().expect("lock poisoned"));
                self.print(&page);
            }
            SessionCommand::Help => self.print(HELP),
            SessionCommand::Quit => return false,
        }
        true
    }

    fn start_extraction(&mut self) {
        let (image, generation) = {
            let mut state = self.state.lock().expect("lock poisoned");
            let image = match (&state.image, &self.session) {
                (None, _) => Err(ExtractError::NoImage),
                (Some(_), None) => Err(ExtractError::EngineNotReady),
                (Some(_), Some(session)) if session.is_busy() || self.extraction_running() => {
                    Err(ExtractError::Busy)
                }
                (Some(image), Some(_)) => Ok(image.clone()),
            };
            match image {
                Ok(image) => {
                    let generation = state.begin_extraction();
                    (image, generation)
                }
                Err(err) => {
                    drop(state);
                    warn!("Extract is disabled: {}", err);
                    self.print(&format!("Extract is disabled: {err}"));
                    return;
                }
            }
        };
        let Some(session) = self.session.clone() else {
            return;
        };

        let ui = self.ui.clone();
        let state = self.state.clone();
        let progress = self.progress.clone();
        self.extraction = Some(tokio::spawn(async move {
            let mut progress = progress.lock().await;
            let mut view = PageView::new(ui);
            let outcome =
                drive_extraction(&session, &image, &mut progress, &state, &mut view).await;
            let replaced = !state
                .lock()
                .expect("lock poisoned")
                .is_current_image(generation);
            match outcome {
                _ if replaced => view.print(&format!(
                    "Discarded the result for {}, which was replaced.",
                    image.file_name
                )),
                Ok(text) if !text.is_empty() => view.print(&render_result(&text)),
                Ok(_) => view.print("No text found."),
                Err(err) => view.print(&format!("ERROR: {err}")),
            }
        }));
    }

    /// Abort anything in flight and release the engine.
    async fn teardown(mut self) -> Result<()> {
        if let Some(task) = self.extraction.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(startup) = self.startup.take() {
            startup.abort();
            if let Ok(Ok(session)) = startup.await {
                self.session = Some(Arc::new(session));
            }
        }
        if let Some(session) = self.session.take() {
            session.shutdown().await?;
        }
        Ok(())
    }
}

/// The `session` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_session(ui: Ui, opts: &SessionOpts) -> Result<()> {
    let (reporter, progress) = ProgressReporter::new();
    let engine_opts = opts.engine_opts.clone();
    let startup =
        tokio::spawn(async move { RecognitionSession::start(&engine_opts, reporter).await });

    let mut host = SessionHost {
        ui,
        state: Arc::new(Mutex::new(PageState::default())),
        progress: Arc::new(AsyncMutex::new(progress)),
        startup: Some(startup),
        session: None,
        extraction: None,
    };
    host.print(&render_page(&host.state.lock().expect("lock poisoned")));

    let result = run_commands(&mut host).await;
    let teardown = host.teardown().await;
    result?;
    teardown
}

/// Read and run commands until `quit` or end of input.
async fn run_commands(host: &mut SessionHost) -> Result<()> {
    let mut lines = stdin_lines();
    while let Some(line) = lines.next().await {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                host.print(&format!("{err}"));
                continue;
            }
        };
        debug!(?command, "Session command");
        if !host.handle(command).await {
            break;
        }
    }
    Ok(())
}
