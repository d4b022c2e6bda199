//! Image intake: turning a drop of files into an [`UploadedImage`].
//!
//! A drop is accepted only when it contains exactly one file, and that file
//! is one of [`ACCEPTED_IMAGE_MIME_TYPES`]. Everything else is rejected
//! without touching the current image.

use crate::{data_url::data_url, prelude::*};

/// The image types we accept.
pub const ACCEPTED_IMAGE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/gif",
    "image/jpeg",
    "image/svg+xml",
    "image/webp",
    "image/avif",
    "image/heic",
    "image/heif",
];

/// An image the user has dropped, held in memory as a `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedImage {
    /// The file name, for display.
    pub file_name: String,

    /// The sniffed MIME type.
    pub mime_type: String,

    /// The raw file contents, encoded as a `data:` URL.
    pub data_url: String,

    /// Size of the raw file contents.
    pub byte_len: usize,
}

impl UploadedImage {
    /// Build an image from bytes we've already read.
    pub fn from_bytes(file_name: impl Into<String>, mime_type: &str, data: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.to_owned(),
            data_url: data_url(mime_type, data),
            byte_len: data.len(),
        }
    }
}

/// Why a drop was ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropRejection {
    /// Nothing was dropped.
    #[error("no file was dropped")]
    NoFiles,
    /// More than one file was dropped.
    #[error("{0} files were dropped, but only one is allowed")]
    MultipleFiles(usize),
    /// The file is not an accepted image type.
    #[error("{} has {}", .path.display(), describe_type(.mime_type))]
    UnsupportedType {
        path: PathBuf,
        mime_type: Option<String>,
    },
    /// The file could not be read.
    #[error("cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
}

fn describe_type(mime_type: &Option<String>) -> String {
    match mime_type {
        Some(mime_type) => format!("unsupported type {mime_type}"),
        None => "an unknown type".to_owned(),
    }
}

/// Is this MIME type one of the image types we accept?
pub fn is_accepted_image_type(mime_type: &str) -> bool {
    ACCEPTED_IMAGE_MIME_TYPES.contains(&mime_type)
}

/// Work out a file's MIME type. We trust the contents first, and fall back
/// to the extension for formats `infer` can't sniff, like SVG.
pub fn sniff_mime_type(path: &Path, data: &[u8]) -> Option<String> {
    infer::get(data)
        .map(|kind| kind.mime_type().to_owned())
        .or_else(|| {
            mime_guess::from_path(path)
                .first()
                .map(|mime| mime.essence_str().to_owned())
        })
}

/// Handle a drop of zero or more files.
#[instrument(level = "debug", skip_all, fields(count = paths.len()))]
pub async fn accept_drop(paths: &[PathBuf]) -> Result<UploadedImage, DropRejection> {
    let path = match paths {
        [] => return Err(DropRejection::NoFiles),
        [path] => path,
        _ => return Err(DropRejection::MultipleFiles(paths.len())),
    };

    let data = tokio::fs::read(path)
        .await
        .map_err(|err| DropRejection::Unreadable {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

    let mime_type = sniff_mime_type(path, &data);
    let mime_type = match mime_type {
        Some(mime_type) if is_accepted_image_type(&mime_type) => mime_type,
        mime_type => {
            return Err(DropRejection::UnsupportedType {
                path: path.to_owned(),
                mime_type,
            });
        }
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(%file_name, %mime_type, bytes = data.len(), "Accepted image");
    Ok(UploadedImage::from_bytes(file_name, &mime_type, &data))
}
