//! Tesseract OCR engine.

use std::{ffi::OsStr, process::Output};

use tokio::process::Command;

use crate::{
    async_utils::check_for_command_failure, cpu_limit::with_cpu_semaphore,
    data_url::decode_data_url, intake::UploadedImage, prelude::*,
    progress::ProgressReporter,
};

use super::RecognitionEngine;

/// Engine wrapping the `tesseract` CLI tool.
///
/// The CLI has no persistent process we could keep a model loaded in, so
/// "loading" here means checking that the binary runs and the language data
/// is installed. Recognition runs one `tesseract` process per image.
pub struct TesseractEngine {
    binary: PathBuf,
    reporter: ProgressReporter,
    version: Option<String>,
    available_languages: Vec<String>,
    language: Option<String>,
    terminated: bool,
}

impl TesseractEngine {
    /// Create a new `tesseract` engine. This does not run anything yet.
    pub fn new(binary: PathBuf, reporter: ProgressReporter) -> Self {
        Self {
            binary,
            reporter,
            version: None,
            available_languages: vec![],
            language: None,
            terminated: false,
        }
    }

    /// Run `tesseract` with the given arguments and check the result. The
    /// child is killed if this future is dropped.
    async fn run(&self, args: &[&OsStr]) -> Result<Output> {
        let output = with_cpu_semaphore(move || async move {
            Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .with_context(|| format!("cannot run {}", self.binary.display()))
        })
        .await?;
        check_for_command_failure("tesseract", &output)?;
        Ok(output)
    }

    fn check_alive(&self) -> Result<()> {
        if self.terminated {
            Err(anyhow!("tesseract engine has been terminated"))
        } else {
            Ok(())
        }
    }
}

/// Parse the output of `tesseract --list-langs`, which starts with a header
/// line naming the tessdata directory.
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("List of available languages"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[async_trait]
impl RecognitionEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all)]
    async fn load_runtime(&mut self) -> Result<()> {
        self.check_alive()?;
        self.reporter.report("loading tesseract core", 0.0);
        let output = self.run(&[OsStr::new("--version")]).await?;
        // Older versions print the version to stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let version = text.lines().next().unwrap_or_default().trim().to_owned();
        debug!(%version, "Found tesseract");
        self.version = Some(version);
        self.reporter.report("loading tesseract core", 1.0);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn load_language(&mut self, language: &str) -> Result<()> {
        self.check_alive()?;
        if self.version.is_none() {
            return Err(anyhow!("tesseract runtime has not been loaded"));
        }
        self.reporter.report("loading language traineddata", 0.0);
        let output = self.run(&[OsStr::new("--list-langs")]).await?;
        self.available_languages =
            parse_language_list(&String::from_utf8_lossy(&output.stdout));
        for part in language.split('+') {
            if !self.available_languages.iter().any(|l| l == part) {
                return Err(anyhow!(
                    "tesseract has no data for language {:?} (available: {})",
                    part,
                    self.available_languages.join(", ")
                ));
            }
        }
        self.reporter.report("loading language traineddata", 1.0);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn initialize(&mut self, language: &str) -> Result<()> {
        self.check_alive()?;
        self.reporter.report("initializing api", 0.0);
        if language
            .split('+')
            .any(|part| !self.available_languages.iter().any(|l| l == part))
        {
            return Err(anyhow!("language {:?} has not been loaded", language));
        }
        self.language = Some(language.to_owned());
        self.reporter.report("initializing api", 1.0);
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(file_name = %image.file_name))]
    async fn recognize(&mut self, image: &UploadedImage) -> Result<String> {
        self.check_alive()?;
        let language = self
            .language
            .clone()
            .ok_or_else(|| anyhow!("tesseract has not been initialized"))?;
        self.reporter.report("recognizing text", 0.0);

        let (mime_type, data) = decode_data_url(&image.data_url)?;
        let extension = mime_guess::get_mime_extensions_str(&mime_type)
            .and_then(|o| o.first())
            .ok_or_else(|| anyhow!("cannot determine extension for {}", mime_type))?;

        // Tesseract wants files, so give it some.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join(format!("input.{}", extension));
        let output_base = tmpdir.path().join("output");
        tokio::fs::write(&input_path, &data)
            .await
            .context("cannot write tesseract input file")?;

        self.run(&[
            input_path.as_os_str(),
            output_base.as_os_str(),
            OsStr::new("-l"),
            OsStr::new(&language),
        ])
        .await?;

        let text = tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract output file")?;
        self.reporter.report("recognizing text", 1.0);
        Ok(text)
    }

    async fn terminate(&mut self) -> Result<()> {
        debug!("Terminating tesseract engine");
        self.terminated = true;
        self.language = None;
        self.available_languages.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language_lists() {
        let stdout = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\nchi_sim\n";
        assert_eq!(parse_language_list(stdout), vec!["eng", "osd", "chi_sim"]);
    }

    #[tokio::test]
    async fn reports_missing_binaries() {
        let (reporter, _rx) = ProgressReporter::new();
        let mut engine =
            TesseractEngine::new(PathBuf::from("/nonexistent/tesseract"), reporter);
        let err = engine.load_runtime().await.unwrap_err();
        assert!(format!("{err:?}").contains("cannot run"));
    }

    #[tokio::test]
    async fn refuses_to_recognize_before_initialization() {
        let (reporter, _rx) = ProgressReporter::new();
        let mut engine = TesseractEngine::new(PathBuf::from("tesseract"), reporter);
        let image = UploadedImage::from_bytes("a.png", "image/png", b"x");
        assert!(engine.recognize(&image).await.is_err());
    }

    #[tokio::test]
    #[ignore = "Needs tesseract installed"]
    async fn loads_english() {
        let (reporter, _rx) = ProgressReporter::new();
        let mut engine = TesseractEngine::new(PathBuf::from("tesseract"), reporter);
        engine.load_runtime().await.unwrap();
        engine.load_language("eng").await.unwrap();
        engine.initialize("eng").await.unwrap();
    }
}
