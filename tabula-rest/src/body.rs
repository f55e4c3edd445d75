//! Request-body rules.
//!
//! Every body-carrying request must declare `Content-Type:
//! application/json`, fit the configured size limit, and parse as JSON.
//! All violations are user errors with a caller-visible message; nothing
//! here reaches the log at error level.

use serde::de::DeserializeOwned;

use tabula_core::http::{Bytes, HeaderMap, CONTENT_TYPE};
use tabula_core::Error;

/// Validate and deserialise a request body.
pub fn parse_json<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: &Bytes,
    max_size: usize,
) -> Result<T, Error> {
    require_json_content_type(headers)?;
    if body.len() > max_size {
        return Err(Error::user(format!("request body exceeds {max_size} bytes")));
    }
    if body.is_empty() {
        return Err(Error::user("request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| Error::user(format!("invalid request body: {e}")))
}

fn require_json_content_type(headers: &HeaderMap) -> Result<(), Error> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    // The media type may carry parameters, e.g. a charset.
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if !mime.eq_ignore_ascii_case("application/json") {
        return Err(Error::user("Content-Type header is not application/json"));
    }
    Ok(())
}
