//! Image download over HTTP(S).

use std::io::Read;
use std::time::Duration;

use crate::error::{Error, Result};

/// Timeout applied to the whole request when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Responses larger than this are rejected instead of buffered.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Fetch the raw bytes behind `url`.
///
/// Any non-2xx status, transport failure, timeout or body over
/// [`MAX_BODY_BYTES`] is a [`Error::Network`]. The body of a failed
/// response is never read.
pub fn fetch_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let network_error = |reason: String| Error::Network {
        url: url.to_string(),
        reason,
    };

    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, response) => {
            network_error(format!("HTTP {} {}", code, response.status_text()))
        }
        ureq::Error::Transport(t) => network_error(transport_reason(&t)),
    })?;

    let declared = response
        .header("Content-Length")
        .and_then(|len| len.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(network_error(too_large(MAX_BODY_BYTES)));
    }

    let body = read_capped(response.into_reader(), MAX_BODY_BYTES).map_err(network_error)?;

    tracing::debug!(url = %url, bytes = body.len(), "Fetched image");
    Ok(body)
}

/// Read at most `limit` bytes; a longer stream is an error, not a truncation.
fn read_capped<R: Read>(reader: R, limit: u64) -> std::result::Result<Vec<u8>, String> {
    let mut body = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut body)
        .map_err(|e| format!("failed to read body: {}", e))?;

    if body.len() as u64 > limit {
        return Err(too_large(limit));
    }
    Ok(body)
}

fn too_large(limit: u64) -> String {
    format!("response exceeds {} MiB", limit / (1024 * 1024))
}

/// Kind, message and cause of a transport failure. The URL is left out since
/// [`Error::Network`] already carries it.
fn transport_reason(t: &ureq::Transport) -> String {
    let mut reason = t.kind().to_string();
    if let Some(message) = t.message() {
        reason.push_str(": ");
        reason.push_str(message);
    }
    if let Some(source) = std::error::Error::source(t) {
        reason.push_str(": ");
        reason.push_str(&source.to_string());
    }
    reason
}
