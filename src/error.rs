use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    MissingParameter(&'static str),

    #[error("No downloadable media found for this tweet.")]
    NoMediaFound,

    #[error("Failed to communicate with media provider.")]
    ProviderUnreachable(#[source] reqwest::Error),

    #[error("Invalid download target: {0}")]
    InvalidTarget(String),

    #[error("Failed to fetch the requested media.")]
    UpstreamError(#[source] reqwest::Error),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::MissingParameter(_) | Self::InvalidTarget(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NoMediaFound => StatusCode::NOT_FOUND,
            Self::ProviderUnreachable(_) | Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match std::error::Error::source(&self) {
                Some(cause) => warn!("[{status}] {self}: {cause}"),
                None => warn!("[{status}] {self}"),
            }
        }

        let body = Json(ErrorBody {
            success: false,
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_problems_map_to_bad_request() {
        assert_eq!(
            AppError::invalid_input("Invalid Twitter/X status URL or ID format.").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MissingParameter("URL is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::invalid_target("not base64").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_media_is_not_a_server_fault() {
        let status = AppError::NoMediaFound.status();
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_map_to_500() {
        assert_eq!(
            AppError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn response_body_carries_success_flag_and_message() {
        let response = AppError::MissingParameter("URL is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "URL is required");
    }
}
