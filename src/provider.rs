use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::{error::AppError, resolver::PostReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Gif,
    #[serde(alias = "photo")]
    Image,
    #[serde(other)]
    Other,
}

impl MediaType {
    fn is_animated(self) -> bool {
        matches!(self, Self::Video | Self::Gif)
    }
}

/// The one downloadable item picked for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaCandidate {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub author: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    tweet: Option<ProviderPost>,
}

/// Every field is optional and a malformed one is read as absent, so one odd
/// value never discards an otherwise usable post.
#[derive(Debug, Deserialize)]
struct ProviderPost {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    author: Option<ProviderAuthor>,
    #[serde(default, deserialize_with = "lenient")]
    media: Option<ProviderMedia>,
}

#[derive(Debug, Deserialize)]
struct ProviderAuthor {
    #[serde(default, deserialize_with = "lenient")]
    screen_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderMedia {
    #[serde(default, deserialize_with = "lenient_list")]
    all: Vec<ProviderMediaEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMediaEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(rename = "type", default = "unknown_media_type")]
    pub media_type: MediaType,
}

fn unknown_media_type() -> MediaType {
    MediaType::Other
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Keeps the entries that parse and drops the rest.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn provider_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Picks the first video or gif in list order, else the first entry of any type.
///
/// Entries without a URL are never candidates.
pub fn select_media(entries: &[ProviderMediaEntry]) -> Option<(&str, MediaType)> {
    let mut usable = entries
        .iter()
        .filter_map(|entry| Some((entry.url.as_deref()?, entry.media_type)));

    let first = usable.next()?;
    if first.1.is_animated() {
        return Some(first);
    }

    Some(usable.find(|(_, media_type)| media_type.is_animated()).unwrap_or(first))
}

/// Client for the third-party status metadata API.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    user_agent: String,
}

impl MetadataClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            timeout,
            user_agent: user_agent.into(),
        }
    }

    fn status_url(&self, post: &PostReference) -> String {
        format!("{}{}", self.base_url, post.as_str())
    }

    pub async fn fetch_media(&self, post: &PostReference) -> Result<MediaCandidate, AppError> {
        let endpoint = self.status_url(post);
        debug!("Requesting metadata from {endpoint}");

        let response = self
            .http
            .get(&endpoint)
            .timeout(self.timeout)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::ProviderUnreachable)?;

        let body = response
            .bytes()
            .await
            .map_err(AppError::ProviderUnreachable)?;

        let candidate = parse_provider_body(&body, post)?;
        info!(
            "Resolved post {post} to {:?} media by @{}",
            candidate.media_type, candidate.author
        );
        Ok(candidate)
    }
}

fn parse_provider_body(body: &[u8], post: &PostReference) -> Result<MediaCandidate, AppError> {
    let parsed: ProviderResponse = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            debug!("Unexpected metadata payload for post {post}: {error}");
            return Err(AppError::NoMediaFound);
        }
    };

    let tweet = parsed.tweet.ok_or(AppError::NoMediaFound)?;
    let entries = tweet.media.map(|media| media.all).unwrap_or_default();
    let (url, media_type) = select_media(&entries).ok_or(AppError::NoMediaFound)?;

    Ok(MediaCandidate {
        url: url.to_string(),
        media_type,
        author: tweet
            .author
            .and_then(|author| author.screen_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        id: provider_id(tweet.id).unwrap_or_else(|| post.to_string()),
    })
}
