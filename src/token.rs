//! Reversible encoding of media URLs carried through the client as `target`.
//!
//! This is a transport convenience only: no signature, no expiry.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use url::Url;

use crate::error::AppError;

pub fn encode_target(url: &str) -> String {
    STANDARD.encode(url.as_bytes())
}

/// Decodes a `target` token back into the absolute http(s) URL it was built from.
///
/// The returned text is exactly what was encoded; it is only checked, never normalized.
pub fn decode_target(token: &str) -> Result<String, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::invalid_target("empty token"));
    }

    // Form decoding turns an unescaped `+` into a space.
    let normalized = token.replace(' ', "+");
    let bytes = STANDARD
        .decode(&normalized)
        .or_else(|_| URL_SAFE_NO_PAD.decode(normalized.trim_end_matches('=')))
        .map_err(|_| AppError::invalid_target("token is not valid base64"))?;

    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::invalid_target("token does not decode to text"))?;
    let url = Url::parse(&text)
        .map_err(|_| AppError::invalid_target("token does not decode to a URL"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::invalid_target("only http(s) targets are allowed"));
    }

    Ok(text)
}
