use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use tracing::{info, warn};
use url::Url;

use crate::{error::AppError, token::decode_target};

const DEFAULT_EXTENSION: &str = "mp4";
const DEFAULT_FILENAME: &str = "media";
const MAX_EXTENSION_LEN: usize = 8;

/// Relays remote media to the caller as an attachment.
#[derive(Debug, Clone)]
pub struct MediaProxy {
    http: reqwest::Client,
}

impl MediaProxy {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetches the decoded target and streams its body back with download headers.
    ///
    /// The upstream body is pulled only as fast as the client reads it, and is
    /// dropped (aborting the fetch) if the client goes away.
    pub async fn stream(
        &self,
        encoded_target: &str,
        suggested_filename: Option<&str>,
    ) -> Result<Response, AppError> {
        let target = decode_target(encoded_target)?;

        let upstream = self
            .http
            .get(&target)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::UpstreamError)?;

        let filename = format!(
            "{}.{}",
            suggested_filename
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_FILENAME),
            extension_for_target(&target)
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_str(&build_content_disposition(&filename))
                .map_err(|_| AppError::internal("Could not build the download header."))?,
        );
        if let Some(content_type) = upstream.headers().get(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }
        if let Some(length) = upstream.content_length()
            && let Ok(value) = HeaderValue::from_str(&length.to_string())
        {
            headers.insert(CONTENT_LENGTH, value);
        }

        info!("Streaming {filename} from {}", upstream.url().host_str().unwrap_or("upstream"));

        let body = upstream.bytes_stream().inspect_err(|error| {
            warn!("Upstream stream ended early: {error}");
        });

        Ok((headers, Body::from_stream(body)).into_response())
    }
}

/// Extension taken from the last path segment of the target, `mp4` when absent.
pub fn extension_for_target(target: &str) -> String {
    let last_segment = match Url::parse(target) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(ToString::to_string),
        Err(_) => target
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(ToString::to_string),
    };

    last_segment
        .as_deref()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, extension)| extension)
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= MAX_EXTENSION_LEN
                && extension.bytes().all(|byte| byte.is_ascii_alphanumeric())
        })
        .unwrap_or(DEFAULT_EXTENSION)
        .to_string()
}

pub fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || matches!(character, '.' | '-' | '_' | ' ') {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        format!("{DEFAULT_FILENAME}.{DEFAULT_EXTENSION}")
    } else {
        compact.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_strips_query_string() {
        assert_eq!(
            extension_for_target("https://cdn.example/x/y.mp4?sig=abc"),
            "mp4"
        );
        assert_eq!(
            extension_for_target("https://pbs.twimg.com/media/Fx.jpg?format=jpg&name=orig"),
            "jpg"
        );
    }

    #[test]
    fn extension_uses_last_dot_of_last_segment() {
        assert_eq!(
            extension_for_target("https://video.twimg.com/tweet_video/a.b.gif"),
            "gif"
        );
    }

    #[test]
    fn extension_defaults_to_mp4() {
        assert_eq!(extension_for_target("https://cdn.example/x/video"), "mp4");
        assert_eq!(extension_for_target("https://cdn.example/"), "mp4");
        assert_eq!(extension_for_target("https://cdn.example/file."), "mp4");
        assert_eq!(
            extension_for_target("https://cdn.example/v1.2/stream?x=a.b"),
            "mp4"
        );
    }

    #[test]
    fn disposition_forces_attachment_with_quoted_name() {
        let header = build_content_disposition("twitter-jack-20.mp4");
        assert!(header.starts_with("attachment; filename=\"twitter-jack-20.mp4\""));
        assert!(header.ends_with("filename*=UTF-8''twitter-jack-20.mp4"));
    }

    #[test]
    fn disposition_sanitizes_non_ascii_names() {
        let header = build_content_disposition("twitter-café\"x-1.mp4");
        assert!(header.starts_with("attachment; filename=\"twitter-caf__x-1.mp4\""));
        assert!(header.contains("filename*=UTF-8''twitter-caf%C3%A9%22x-1.mp4"));
        assert!(HeaderValue::from_str(&header).is_ok());
    }
}
