use std::{path::PathBuf, time::Duration};

use url::Url;

use crate::error::AppError;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.fxtwitter.com/status/";
pub const DEFAULT_USER_AGENT: &str = "TwitterDownloader/1.0";
pub const DEFAULT_FILENAME_PREFIX: &str = "twitter";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Startup configuration. Read once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub provider_base_url: Url,
    pub provider_timeout: Duration,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub filename_prefix: String,
    pub public_dir: PathBuf,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            provider_base_url: Url::parse(DEFAULT_PROVIDER_BASE_URL)
                .expect("default provider url is valid"),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            public_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public"),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).and_then(|value| non_empty(&value).map(ToString::to_string));
        let read_secs = |name: &str| {
            read(name)
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
        };

        let bind_addr = read("APP_ADDR")
            .or_else(|| {
                read("PORT")
                    .and_then(|value| value.parse::<u16>().ok())
                    .map(|port| format!("0.0.0.0:{port}"))
            })
            .unwrap_or(defaults.bind_addr);

        let provider_base_url = match read("PROVIDER_BASE_URL") {
            Some(value) => parse_base_url(&value)?,
            None => defaults.provider_base_url,
        };

        Ok(Self {
            bind_addr,
            provider_base_url,
            provider_timeout: read_secs("PROVIDER_TIMEOUT_SECS").unwrap_or(defaults.provider_timeout),
            user_agent: read("PROVIDER_USER_AGENT").unwrap_or(defaults.user_agent),
            connect_timeout: read_secs("UPSTREAM_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout),
            filename_prefix: read("FILENAME_PREFIX").unwrap_or(defaults.filename_prefix),
            public_dir: read("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            allowed_origins: read("ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// The post id is appended verbatim, so the base always ends with `/`.
fn parse_base_url(value: &str) -> Result<Url, AppError> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };

    let url = Url::parse(&with_slash).map_err(|error| {
        AppError::internal(format!("Invalid PROVIDER_BASE_URL {value:?}: {error}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::internal(format!(
            "PROVIDER_BASE_URL must be http(s), got {value:?}"
        )));
    }

    Ok(url)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_public_provider() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.provider_base_url.as_str(), DEFAULT_PROVIDER_BASE_URL);
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "TwitterDownloader/1.0");
        assert_eq!(config.filename_prefix, "twitter");
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn app_addr_wins_over_port() {
        let config = config_from(&[("PORT", "8080")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");

        let config = config_from(&[("PORT", "8080"), ("APP_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("PORT", "http"),
            ("PROVIDER_TIMEOUT_SECS", "0"),
            ("UPSTREAM_CONNECT_TIMEOUT_SECS", "soon"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = config_from(&[("PROVIDER_BASE_URL", "http://localhost:9999/status")]).unwrap();
        assert_eq!(config.provider_base_url.as_str(), "http://localhost:9999/status/");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(config_from(&[("PROVIDER_BASE_URL", "not a url")]).is_err());
        assert!(config_from(&[("PROVIDER_BASE_URL", "ftp://host/status/")]).is_err());
    }

    #[test]
    fn splits_allowed_origins() {
        let config = config_from(&[(
            "ALLOWED_ORIGINS",
            "https://a.example, ,http://localhost:5173",
        )])
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "http://localhost:5173"]
        );
    }
}
