use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::error::AppError;

static STATUS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:(?:www|m(?:obile)?)\.)?(?:x|twitter)\.com/(?:#!/)?[A-Za-z0-9_]+/status(?:es)?/(?P<id>[0-9]+)",
    )
    .expect("status url pattern compiles")
});

/// Numeric identifier of a post, independent of the URL variant it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference(String);

impl PostReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the status id from a post URL, or accepts a bare numeric id.
///
/// Only the shape is checked; the id is never looked up.
pub fn resolve_post_id(input: &str) -> Result<PostReference, AppError> {
    let input = input.trim();

    if let Some(id) = STATUS_URL
        .captures(input)
        .and_then(|captures| captures.name("id"))
    {
        return Ok(PostReference(id.as_str().to_string()));
    }

    if !input.is_empty() && input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(PostReference(input.to_string()));
    }

    Err(AppError::invalid_input(
        "Invalid Twitter/X status URL or ID format.",
    ))
}
