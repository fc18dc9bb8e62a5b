use std::{collections::HashSet, path::Path, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderValue, Method, StatusCode,
        header::{CONTENT_DISPOSITION, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, info};
use url::Url;

use crate::{
    config::Config,
    error::AppError,
    provider::{MediaCandidate, MediaType, MetadataClient},
    proxy::MediaProxy,
    resolver::resolve_post_id,
    token::encode_target,
};

#[derive(Clone)]
pub struct AppState {
    metadata: MetadataClient,
    proxy: MediaProxy,
    filename_prefix: Arc<str>,
}

impl AppState {
    pub fn new(metadata: MetadataClient, proxy: MediaProxy, filename_prefix: &str) -> Self {
        Self {
            metadata,
            proxy,
            filename_prefix: Arc::from(filename_prefix),
        }
    }

    /// Wires both outbound components onto one shared connection pool.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|error| AppError::internal(format!("Could not create HTTP client: {error}")))?;

        let metadata = MetadataClient::new(
            http_client.clone(),
            config.provider_base_url.clone(),
            config.provider_timeout,
            config.user_agent.clone(),
        );

        Ok(Self::new(
            metadata,
            MediaProxy::new(http_client),
            &config.filename_prefix,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct MetadataQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    target: Option<String>,
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct MetadataResponse {
    success: bool,
    data: MetadataData,
}

#[derive(Debug, Serialize)]
struct MetadataData {
    url: String,
    #[serde(rename = "type")]
    media_type: MediaType,
    author: String,
    id: String,
    #[serde(rename = "downloadEndpoint")]
    download_endpoint: String,
}

/// API routes only, without static files or outer layers.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/metadata", get(fetch_metadata))
        .route("/api/stream", get(stream_media))
        .with_state(state)
}

/// The full application: API, the static client UI, and response layers.
pub fn build_router(state: AppState, config: &Config) -> Result<Router, AppError> {
    let mut app = api_router(state).fallback_service(ServeDir::new(&config.public_dir));

    if !config.allowed_origins.is_empty() {
        app = app.layer(build_cors_layer(&config.allowed_origins)?);
    }

    Ok(with_security_headers(app).layer(TraceLayer::new_for_http()))
}

fn with_security_headers(app: Router) -> Router {
    app.layer(SetResponseHeaderLayer::if_not_present(
        X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    ))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn fetch_metadata(
    State(state): State<AppState>,
    query: Result<Query<MetadataQuery>, QueryRejection>,
) -> Result<Json<MetadataResponse>, AppError> {
    let Query(query) = query.map_err(invalid_query)?;
    let input = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingParameter("URL is required"))?;

    let post = resolve_post_id(input)?;
    let media = state.metadata.fetch_media(&post).await?;
    let download_endpoint = download_endpoint(&state.filename_prefix, &media);

    let MediaCandidate {
        url,
        media_type,
        author,
        id,
    } = media;

    Ok(Json(MetadataResponse {
        success: true,
        data: MetadataData {
            url,
            media_type,
            author,
            id,
            download_endpoint,
        },
    }))
}

async fn stream_media(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(invalid_query)?;
    let Some(target) = query.target.as_deref().filter(|value| !value.trim().is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, "Missing target.").into_response());
    };

    state.proxy.stream(target, query.filename.as_deref()).await
}

fn invalid_query(rejection: QueryRejection) -> AppError {
    AppError::invalid_input(format!("Invalid query string: {}", rejection.body_text()))
}

/// Same-origin link the client can navigate to as-is.
pub fn download_endpoint(prefix: &str, media: &MediaCandidate) -> String {
    let filename = format!("{prefix}-{}-{}", media.author, media.id);
    format!(
        "/api/stream?target={}&filename={}",
        urlencoding::encode(&encode_target(&media.url)),
        urlencoding::encode(&filename)
    )
}

fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, AppError> {
    let normalized_origins = origins
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                AppError::internal(format!(
                    "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                ))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;
    info!(
        "CORS allow-list loaded with {} origin(s): {:?}",
        normalized_origins.len(),
        normalized_origins
    );

    let allowed_origins = Arc::new(normalized_origins);
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let normalized = origin.to_str().ok().and_then(normalize_origin);
        let allowed = normalized
            .as_ref()
            .is_some_and(|value| allowed_origins.contains(value));
        debug!("CORS origin check raw={origin:?} allowed={allowed}");
        allowed
    });

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]))
}

fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    if !matches!(scheme, "http" | "https") {
        return None;
    }
    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    // `port()` is already `None` for the scheme's default port.
    match parsed.port() {
        Some(port) => Some(format!("{scheme}://{host}:{port}")),
        None => Some(format!("{scheme}://{host}")),
    }
}

pub fn public_dir_exists(dir: &Path) -> bool {
    dir.join("index.html").is_file()
}
