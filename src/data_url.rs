//! Converting binary data to and from `data:` URLs.

use std::sync::LazyLock;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use regex::Regex;

use crate::prelude::*;

/// Regex for parsing a base64 `data:` URL.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime_type>[^;,]+);base64,(?P<data>.*)$")
        .expect("failed to compile regex")
});

/// Convert binary data to a `data:` URL.
///
/// We never percent-encode the base64 payload. Image viewers and OCR engines
/// both accept it as-is.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(data))
}

/// Split a `data:` URL into a MIME type and its still-encoded base64 payload.
pub fn parse_data_url(data_url: &str) -> Option<(&str, &str)> {
    let caps = DATA_URL_RE.captures(data_url)?;
    let mime_type = caps.name("mime_type")?.as_str();
    let data = caps.name("data")?.as_str();
    Some((mime_type, data))
}

/// Decode a `data:` URL back into a MIME type and raw bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let (mime_type, data) = parse_data_url(data_url).ok_or_else(|| {
        anyhow!(
            "not a base64 data URL: {:?}",
            data_url.chars().take(32).collect::<String>()
        )
    })?;
    let bytes = BASE64_STANDARD
        .decode(data)
        .context("invalid base64 in data URL")?;
    Ok((mime_type.to_owned(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_mime_prefix() {
        let url = data_url("image/png", b"\x89PNG");
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn decodes_what_it_encodes() {
        let bytes = vec![0u8, 1, 2, 254, 255];
        let url = data_url("image/webp", &bytes);
        let (mime_type, decoded) = decode_data_url(&url).unwrap();
        assert_eq!(mime_type, "image/webp");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn rejects_non_data_urls() {
        assert!(parse_data_url("https://example.com/a.png").is_none());
        assert!(parse_data_url("data:image/png,plain").is_none());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }
}
