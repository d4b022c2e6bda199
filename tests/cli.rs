//! CLI test cases.
//!
//! Most tests use the `echo` engine, which walks through the same phases as
//! Tesseract but describes the image instead of reading it. Tests that need a
//! real `tesseract` binary are ignored by default.

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Create a new `Command` with our binary, using the echo engine.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("image-ocr").unwrap();
    cmd.env("OCR_ENGINE", "echo").env_remove("OCR_LANG");
    cmd
}

/// Write a small PNG and return its size.
fn write_png(path: &Path) -> u64 {
    image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))
        .save(path)
        .unwrap();
    fs::metadata(path).unwrap().len()
}

/// A scratch directory holding `photo.png` and `scan.pdf`.
struct Fixtures {
    dir: TempDir,
    png_len: u64,
}

impl Fixtures {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let png_len = write_png(&dir.path().join("photo.png"));
        fs::write(dir.path().join("scan.pdf"), b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        Self { dir, png_len }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// Add another PNG under `name` and return its path.
    fn add_png(&self, name: &str) -> String {
        write_png(&self.dir.path().join(name));
        self.path(name)
    }

    fn echo_text(&self) -> String {
        format!("photo.png (image/png, {} bytes)", self.png_len)
    }
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_extract_prints_text() {
    let fixtures = Fixtures::new();
    let output = cmd()
        .arg("extract")
        .arg(fixtures.path("photo.png"))
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        format!("{}\n", fixtures.echo_text())
    );
}

#[test]
fn test_extract_json() {
    let fixtures = Fixtures::new();
    let output = cmd()
        .arg("extract")
        .arg("--json")
        .args(["--lang", "eng+fra"])
        .arg(fixtures.path("photo.png"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["file_name"], "photo.png");
    assert_eq!(record["mime_type"], "image/png");
    assert_eq!(record["language"], "eng+fra");
    assert_eq!(record["text"], fixtures.echo_text());
}

#[test]
fn test_extract_to_file_is_exact() {
    let fixtures = Fixtures::new();
    let out = fixtures.path("out.txt");
    cmd()
        .arg("extract")
        .arg(fixtures.path("photo.png"))
        .args(["-o", &out])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(out).unwrap(), fixtures.echo_text());
}

#[test]
fn test_extract_rejects_pdfs() {
    let fixtures = Fixtures::new();
    cmd()
        .arg("extract")
        .arg(fixtures.path("scan.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported type application/pdf"));
}

#[test]
fn test_extract_rejects_multiple_files() {
    let fixtures = Fixtures::new();
    cmd()
        .arg("extract")
        .arg(fixtures.path("photo.png"))
        .arg(fixtures.path("photo.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 files were dropped"));
}

#[test]
fn test_extract_reports_engine_failures() {
    let fixtures = Fixtures::new();
    cmd()
        .arg("extract")
        .args(["--lang", "NOT A LANGUAGE"])
        .arg(fixtures.path("photo.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading the language model"));
}

#[test]
fn test_session_extracts_and_shows_status() {
    let fixtures = Fixtures::new();
    let script = format!(
        "status\ndrop {}\nwait\nstatus\nextract\nwait\nstatus\nquit\n",
        fixtures.path("photo.png")
    );
    let output = cmd().arg("session").write_stdin(script).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Drop an image here"));
    assert!(stdout.contains("Loaded photo.png (image/png)"));
    assert!(stdout.contains("Preview: photo.png (image/png"));
    assert!(stdout.contains("data:image/png;base64,"));
    assert!(stdout.contains("RESULT"));
    assert!(stdout.contains(&fixtures.echo_text()));
    assert!(stdout.contains("Status: DONE"));
    assert!(stdout.contains("Progress: 100%"));
}

#[test]
fn test_session_ignores_unsupported_drops() {
    let fixtures = Fixtures::new();
    let script = format!(
        "drop {}\nwait\nextract\nstatus\n",
        fixtures.path("scan.pdf")
    );
    let output = cmd().arg("session").write_stdin(script).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Ignored drop"));
    assert!(stdout.contains("Extract is disabled: no image has been loaded"));
    assert!(stdout.contains("[Extract] (disabled: no image)"));
    assert!(!stdout.contains("Preview:"));
}

#[test]
fn test_session_rejects_overlapping_extractions() {
    let fixtures = Fixtures::new();
    let script = format!(
        "drop {}\nwait\nextract\nextract\nwait\nquit\n",
        fixtures.path("photo.png")
    );
    let output = cmd()
        .arg("session")
        .args(["--echo-step-delay-ms", "100"])
        .write_stdin(script)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("an extraction is already running"));
    assert_eq!(stdout.matches("RESULT").count(), 1);
}

#[test]
fn test_session_discards_results_for_replaced_images() {
    let fixtures = Fixtures::new();
    let other = fixtures.add_png("other.png");
    let script = format!(
        "drop {}\nwait\nextract\ndrop {}\nwait\nstatus\nquit\n",
        fixtures.path("photo.png"),
        other
    );
    let output = cmd()
        .arg("session")
        .args(["--echo-step-delay-ms", "100"])
        .write_stdin(script)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Discarded the result for photo.png"));
    let status = &stdout[stdout.rfind("Preview:").unwrap()..];
    assert!(status.starts_with("Preview: other.png"));
    assert!(!status.contains("RESULT"));
    assert!(!status.contains(&fixtures.echo_text()));
}

#[test]
fn test_session_accepts_quoted_paths() {
    let fixtures = Fixtures::new();
    let spaced = fixtures.add_png("my photo.png");
    let script = format!("drop \"{spaced}\"\nwait\nextract\nwait\nquit\n");
    let output = cmd().arg("session").write_stdin(script).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Loaded my photo.png (image/png)"));
    assert!(stdout.contains("RESULT"));
    assert!(stdout.contains("my photo.png (image/png,"));
}

#[test]
fn test_extract_logs_recognized_text_at_debug() {
    let fixtures = Fixtures::new();
    cmd()
        .env("RUST_LOG", "image_ocr=debug")
        .arg("extract")
        .arg(fixtures.path("photo.png"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Recognized text"))
        .stderr(predicate::str::contains(fixtures.echo_text()));
}

#[test]
fn test_session_quit_cancels_extraction() {
    let fixtures = Fixtures::new();
    let script = format!("drop {}\nwait\nextract\nquit\n", fixtures.path("photo.png"));
    let output = cmd()
        .arg("session")
        .args(["--echo-step-delay-ms", "500"])
        .write_stdin(script)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("RESULT"));
    assert!(!stdout.contains("ERROR"));
}

#[test]
fn test_schema() {
    cmd()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("ExtractOutput"));
}

#[test]
#[ignore = "Needs tesseract installed"]
fn test_extract_with_tesseract() {
    let fixtures = Fixtures::new();
    Command::cargo_bin("image-ocr")
        .unwrap()
        .args(["extract", "--engine", "tesseract"])
        .arg(fixtures.path("photo.png"))
        .assert()
        .success();
}
