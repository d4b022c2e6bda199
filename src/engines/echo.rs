//! Echo engine for testing.
//!
//! This engine walks through the same phases as Tesseract, but instead of
//! reading the image it returns a short description of it.

use std::time::Duration;

use tokio::time::sleep;

use crate::{intake::UploadedImage, prelude::*, progress::ProgressReporter};

use super::RecognitionEngine;

/// Echo engine for testing.
pub struct EchoEngine {
    reporter: ProgressReporter,
    step_delay: Duration,
    runtime_loaded: bool,
    loaded_language: Option<String>,
    language: Option<String>,
    terminated: bool,
}

impl EchoEngine {
    /// Create a new echo engine. `step_delay` is slept at each reported
    /// progress point, to simulate a slow engine.
    pub fn new(reporter: ProgressReporter, step_delay: Duration) -> Self {
        Self {
            reporter,
            step_delay,
            runtime_loaded: false,
            loaded_language: None,
            language: None,
            terminated: false,
        }
    }

    /// The text we "recognize" for an image.
    pub fn describe(image: &UploadedImage) -> String {
        format!(
            "{} ({}, {} bytes)",
            image.file_name, image.mime_type, image.byte_len
        )
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            sleep(self.step_delay).await;
        }
    }

    fn check_alive(&self) -> Result<()> {
        if self.terminated {
            Err(anyhow!("echo engine has been terminated"))
        } else {
            Ok(())
        }
    }
}

/// Accept the same shape of language codes as Tesseract: `eng`, `chi_sim`,
/// `eng+fra`.
fn is_valid_language(language: &str) -> bool {
    !language.is_empty()
        && language.split('+').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

#[async_trait]
impl RecognitionEngine for EchoEngine {
    async fn load_runtime(&mut self) -> Result<()> {
        self.check_alive()?;
        self.reporter.report("loading tesseract core", 0.0);
        self.pause().await;
        self.runtime_loaded = true;
        self.reporter.report("loading tesseract core", 1.0);
        Ok(())
    }

    async fn load_language(&mut self, language: &str) -> Result<()> {
        self.check_alive()?;
        if !self.runtime_loaded {
            return Err(anyhow!("runtime not loaded"));
        }
        self.reporter.report("loading language traineddata", 0.0);
        self.pause().await;
        if !is_valid_language(language) {
            return Err(anyhow!("unknown language {:?}", language));
        }
        self.loaded_language = Some(language.to_owned());
        self.reporter.report("loading language traineddata", 1.0);
        Ok(())
    }

    async fn initialize(&mut self, language: &str) -> Result<()> {
        self.check_alive()?;
        if self.loaded_language.as_deref() != Some(language) {
            return Err(anyhow!("language {:?} has not been loaded", language));
        }
        self.reporter.report("initializing api", 0.0);
        self.pause().await;
        self.language = Some(language.to_owned());
        self.reporter.report("initializing api", 1.0);
        Ok(())
    }

    async fn recognize(&mut self, image: &UploadedImage) -> Result<String> {
        self.check_alive()?;
        if self.language.is_none() {
            return Err(anyhow!("echo engine has not been initialized"));
        }
        for fraction in [0.0, 0.5] {
            self.reporter.report("recognizing text", fraction);
            self.pause().await;
        }
        self.reporter.report("recognizing text", 1.0);
        Ok(Self::describe(image))
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminated = true;
        self.language = None;
        self.loaded_language = None;
        Ok(())
    }
}
