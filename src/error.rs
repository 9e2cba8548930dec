//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, info};

use crate::compositor::ImageLoadError;
use crate::provider::ProviderError;

/// Errors the HTTP handlers can return, each mapped to a JSON `{error}` body.
#[derive(Debug)]
pub enum StudioError {
    /// The caller sent something we can't use, eg an empty prompt
    InvalidInput(String),
    /// The provider answered but returned no images
    UpstreamEmpty,
    /// The provider returned an image in a shape we don't understand
    UpstreamFormatUnsupported,
    /// The provider call failed, carries the best message we could find
    Upstream(String),
    /// There are no overlay images to composite with
    NoOverlays,
    /// One of the images could not be loaded or decoded
    ImageLoad(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl StudioError {
    /// The HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            StudioError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StudioError::UpstreamEmpty | StudioError::UpstreamFormatUnsupported => {
                StatusCode::BAD_GATEWAY
            }
            StudioError::NoOverlays => StatusCode::SERVICE_UNAVAILABLE,
            StudioError::Upstream(_)
            | StudioError::ImageLoad(_)
            | StudioError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for StudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudioError::InvalidInput(message)
            | StudioError::Upstream(message)
            | StudioError::InternalServerError(message) => write!(f, "{message}"),
            StudioError::UpstreamEmpty => write!(f, "No image returned by the image provider."),
            StudioError::UpstreamFormatUnsupported => {
                write!(f, "Unsupported image provider response format.")
            }
            StudioError::NoOverlays => write!(f, "No overlay images available."),
            StudioError::ImageLoad(message) => write!(f, "Failed to load image: {message}"),
        }
    }
}

impl std::error::Error for StudioError {}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<image::ImageError> for StudioError {
    fn from(err: image::ImageError) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StudioError {
    fn from(err: tokio::task::JoinError) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<ImageLoadError> for StudioError {
    fn from(err: ImageLoadError) -> Self {
        StudioError::ImageLoad(err.to_string())
    }
}

impl From<ProviderError> for StudioError {
    fn from(err: ProviderError) -> Self {
        StudioError::Upstream(err.to_string())
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            error!("{} {}", status.as_u16(), message);
        } else {
            info!("{} {}", status.as_u16(), message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
