//! I/O utilities.
//!
//! Output goes to a file or to standard output. Interactive commands come in
//! on standard input, one per line.

use futures::StreamExt as _;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _, BufReader},
};
use tokio_stream::wrappers::LinesStream;

use crate::prelude::*;

use super::BoxedStream;

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write a complete block of text to either standard output or a file.
///
/// Files get the text exactly. Standard output also gets a final newline if
/// the text lacks one.
pub async fn write_output_text(path: Option<&Path>, text: &str) -> Result<()> {
    let mut writer = create_writer(path).await?;
    writer
        .write_all(text.as_bytes())
        .await
        .context("Failed to write output")?;
    if path.is_none() && !text.ends_with('\n') {
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Read lines from standard input as a stream.
pub fn stdin_lines() -> BoxedStream<Result<String>> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    LinesStream::new(lines)
        .map(|line| line.context("Failed to read from stdin"))
        .boxed()
}
