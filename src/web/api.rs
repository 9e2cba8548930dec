//! JSON endpoints and their request/response bodies.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use tracing::{debug, instrument};

use super::prelude::*;
use crate::overlays::{OverlayImage, list_overlays};
use crate::prompt::Prompt;

/// Body of `POST /api/generate-image` and `POST /api/compose`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PromptRequest {
    /// What the user typed
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptRequest {
    /// Validates the body, a missing or unreadable body counts as an empty prompt.
    fn into_prompt(payload: Result<Json<Self>, JsonRejection>) -> Result<Prompt, StudioError> {
        let raw = match payload {
            Ok(Json(body)) => body.prompt.unwrap_or_default(),
            Err(rejection) => {
                debug!("Rejected prompt body: {rejection}");
                String::new()
            }
        };
        Prompt::parse(&raw)
    }
}

/// Response of `GET /api/reference-images`
#[derive(Debug, Deserialize, Serialize)]
pub struct ReferenceImagesResponse {
    /// Overlay images, sorted by name
    pub images: Vec<OverlayImage>,
}

/// Response of `POST /api/generate-image`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    /// A remote URL or a `data:image/png;base64,` URL
    pub image_url: String,
}

/// Response of `POST /api/compose`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResponse {
    /// The composited PNG as a data URL
    pub image_url: String,
    /// The overlay that was drawn on top
    pub overlay: OverlayImage,
    /// Suggested download file name
    pub file_name: String,
}

/// Every error body looks like this
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Human readable message
    pub error: String,
}

pub(crate) async fn reference_images_handler(
    State(state): State<AppState>,
) -> Result<Json<ReferenceImagesResponse>, StudioError> {
    let images = list_overlays(state.overlay_dir()).await?;
    Ok(Json(ReferenceImagesResponse { images }))
}

#[instrument(skip_all)]
pub(crate) async fn generate_image_handler(
    State(state): State<AppState>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, StudioError> {
    let prompt = PromptRequest::into_prompt(payload)?;
    let image_url = state.generate(&prompt).await?;
    Ok(Json(GenerateImageResponse { image_url }))
}

#[instrument(skip_all)]
pub(crate) async fn compose_handler(
    State(state): State<AppState>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<ComposeResponse>, StudioError> {
    let prompt = PromptRequest::into_prompt(payload)?;
    let composed = state.compose(&prompt).await?;
    info!("Composed {} with overlay {}", prompt, composed.overlay.name);
    Ok(Json(composed))
}
