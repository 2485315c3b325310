//! Document sources for the Weir parser.
//!
//! A document reaches the parser as a stream of bytes. This module opens
//! that stream for local files, `http(s)` URLs (streamed through reqwest's
//! blocking client so the body is read as the network delivers it), `data:`
//! URLs and inline strings. Callers read the returned [`Read`] in chunks and
//! feed each chunk to the parser.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use thiserror::Error;

/// User-Agent header sent with network requests.
const USER_AGENT: &str = concat!("weir/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while opening a document source.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A local file could not be opened.
    #[error("failed to read '{path}': {source}")]
    File {
        /// The path that was opened.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The HTTP client could not be built or the request failed.
    #[error("request to '{url}' failed: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("HTTP error {status} fetching '{url}'")]
    Status {
        /// The requested URL.
        url: String,
        /// The status code returned by the server.
        status: reqwest::StatusCode,
    },
    /// A `data:` URL was malformed or its payload could not be decoded.
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
}

/// A parsed `data:` URL.
///
/// [RFC 2397](https://www.rfc-editor.org/rfc/rfc2397): `data:[<mediatype>][;base64],<data>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    media_type: String,
    base64: bool,
    payload: String,
}

impl DataUrl {
    /// Parse a `data:` URL without decoding its payload.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidDataUrl`] if the scheme or the comma
    /// separating metadata from data is missing.
    pub fn parse(url: &str) -> Result<Self, LoadError> {
        let Some(rest) = url.strip_prefix("data:") else {
            return Err(LoadError::InvalidDataUrl("missing 'data:' scheme".to_string()));
        };
        let Some((metadata, payload)) = rest.split_once(',') else {
            return Err(LoadError::InvalidDataUrl("missing comma".to_string()));
        };
        let (media_type, base64) = match metadata.strip_suffix(";base64") {
            Some(media_type) => (media_type, true),
            None => (metadata, false),
        };
        // "If <mediatype> is omitted, it defaults to text/plain;charset=US-ASCII."
        let media_type = if media_type.is_empty() {
            "text/plain;charset=US-ASCII"
        } else {
            media_type
        };
        Ok(Self {
            media_type: media_type.to_string(),
            base64,
            payload: payload.to_string(),
        })
    }

    /// The declared media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Decode the payload into raw bytes.
    ///
    /// Base64 payloads are decoded with the standard alphabet; anything else
    /// is percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidDataUrl`] if a base64 payload is malformed.
    pub fn decode(&self) -> Result<Vec<u8>, LoadError> {
        if self.base64 {
            base64::engine::general_purpose::STANDARD
                .decode(self.payload.trim())
                .map_err(|e| LoadError::InvalidDataUrl(format!("base64 decode error: {e}")))
        } else {
            Ok(percent_decode(&self.payload))
        }
    }
}

/// [URL Standard § 1.3 Percent-encoded bytes](https://url.spec.whatwg.org/#percent-decode)
///
/// A `%` not followed by two hex digits is kept as a literal byte.
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(hex_value),
                bytes.get(i + 2).and_then(hex_value),
            )
        {
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

fn hex_value(byte: &u8) -> Option<u8> {
    char::from(*byte)
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
}

/// Where a document's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A local file.
    File(PathBuf),
    /// An `http://` or `https://` URL.
    Url(String),
    /// A `data:` URL.
    Data(DataUrl),
    /// Markup passed directly as a string.
    Inline(String),
}

impl DocumentSource {
    /// Classify a command-line location as a URL, `data:` URL or file path.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidDataUrl`] for a malformed `data:` URL.
    pub fn from_location(location: &str) -> Result<Self, LoadError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(Self::Url(location.to_string()))
        } else if location.starts_with("data:") {
            DataUrl::parse(location).map(Self::Data)
        } else {
            Ok(Self::File(PathBuf::from(location)))
        }
    }

    /// A short human-readable description of the source.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Data(data) => format!("data URL ({})", data.media_type()),
            Self::Inline(html) => format!("inline markup ({} bytes)", html.len()),
        }
    }

    /// Open the source as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the file cannot be opened, the request
    /// fails or returns a non-success status, or a `data:` payload is
    /// malformed.
    pub fn open(&self) -> Result<Box<dyn Read>, LoadError> {
        match self {
            Self::File(path) => match File::open(path) {
                Ok(file) => Ok(Box::new(file)),
                Err(source) => Err(LoadError::File {
                    path: path.display().to_string(),
                    source,
                }),
            },
            Self::Url(url) => open_url(url),
            Self::Data(data) => Ok(Box::new(Cursor::new(data.decode()?))),
            Self::Inline(html) => Ok(Box::new(Cursor::new(html.clone().into_bytes()))),
        }
    }
}

fn open_url(url: &str) -> Result<Box<dyn Read>, LoadError> {
    let network = |source| LoadError::Network {
        url: url.to_string(),
        source,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;
    if !response.status().is_success() {
        return Err(LoadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    Ok(Box::new(response))
}

#[cfg(test)]
mod tests {
    use super::percent_decode;

    #[test]
    fn percent_decode_keeps_malformed_escapes() {
        assert_eq!(percent_decode("a%20b"), b"a b");
        assert_eq!(percent_decode("100%"), b"100%");
        assert_eq!(percent_decode("%zz"), b"%zz");
        assert_eq!(percent_decode("%3c%3E"), b"<>");
    }
}
