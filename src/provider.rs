//! Client for the upstream image generation API (OpenAI Images).
//!
//! Docs: <https://platform.openai.com/docs/api-reference/images>

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::constants::{IMAGE_MODEL, IMAGE_SIZE, PNG_DATA_URL_PREFIX};
use crate::error::StudioError;

/// Request body for POST /images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

/// Response body for POST /images/generations
#[derive(Deserialize, Debug)]
pub struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// What the provider handed back for the first image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GeneratedImage {
    /// A URL we can pass straight to the caller
    Url(String),
    /// Base64 encoded PNG bytes
    Base64Png(String),
}

impl GeneratedImage {
    /// Either the URL as-is, or the payload wrapped in a PNG data URL.
    pub fn into_image_url(self) -> String {
        match self {
            GeneratedImage::Url(url) => url,
            GeneratedImage::Base64Png(b64) => format!("{PNG_DATA_URL_PREFIX}{b64}"),
        }
    }
}

impl TryFrom<ImagesGenerateResponse> for GeneratedImage {
    type Error = StudioError;

    fn try_from(response: ImagesGenerateResponse) -> Result<Self, Self::Error> {
        let first = response
            .data
            .into_iter()
            .next()
            .ok_or(StudioError::UpstreamEmpty)?;

        if let Some(revised_prompt) = first.revised_prompt.as_deref() {
            debug!("Revised prompt from provider: {revised_prompt}");
        }

        if let Some(url) = first.url.filter(|url| !url.is_empty()) {
            Ok(GeneratedImage::Url(url))
        } else if let Some(b64) = first.b64_json.filter(|b64| !b64.is_empty()) {
            Ok(GeneratedImage::Base64Png(b64))
        } else {
            Err(StudioError::UpstreamFormatUnsupported)
        }
    }
}

/// Failures talking to the provider.
#[derive(Debug)]
pub enum ProviderError {
    /// The request never got a response, or the body couldn't be read
    Transport(reqwest::Error),
    /// The provider answered with a non-success status
    Api {
        /// HTTP status returned by the provider
        status: u16,
        /// Best message we could pull out of the response
        message: String,
    },
    /// The success body wasn't the JSON we expected
    Parse(serde_json::Error),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Transport(err) => write!(f, "{err}"),
            ProviderError::Api { message, .. } => write!(f, "{message}"),
            ProviderError::Parse(err) => {
                write!(f, "Failed to parse image provider response: {err}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err)
    }
}

/// Pulls `error.message` out of a provider error body, falling back to something generic.
fn api_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| "Failed to generate image.".to_string())
}

/// Calls the images API with a fixed model and size.
#[derive(Clone)]
pub struct ImageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for ImageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ImageProvider {
    /// `base_url` is the API root, eg `https://api.openai.com/v1`.
    pub fn new(client: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Asks for one image of the scene prompt.
    #[instrument(skip_all)]
    pub async fn generate(&self, scene_prompt: &str) -> Result<GeneratedImage, StudioError> {
        let req_body = ImagesGenerateRequest {
            model: IMAGE_MODEL,
            prompt: scene_prompt,
            n: 1,
            size: IMAGE_SIZE,
        };
        let response = self.request(&req_body).await?;
        GeneratedImage::try_from(response)
    }

    async fn request(
        &self,
        req_body: &ImagesGenerateRequest<'_>,
    ) -> Result<ImagesGenerateResponse, ProviderError> {
        let endpoint = format!("{}/images/generations", self.base_url);
        debug!("POST {endpoint}");
        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(req_body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let err = ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&bytes),
            };
            debug!("{err:?}");
            return Err(err);
        }

        serde_json::from_slice(&bytes).map_err(ProviderError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ImagesGenerateResponse {
        serde_json::from_str(body).expect("parse response")
    }

    #[test]
    fn url_is_returned_verbatim() {
        let image = GeneratedImage::try_from(parse(
            r#"{"data":[{"url":"https://cdn.example.com/img.png?sig=a%2Fb"}]}"#,
        ))
        .expect("image");
        assert_eq!(
            image.into_image_url(),
            "https://cdn.example.com/img.png?sig=a%2Fb"
        );
    }

    #[test]
    fn base64_becomes_data_url() {
        let image =
            GeneratedImage::try_from(parse(r#"{"data":[{"b64_json":"iVBORw0KGgo="}]}"#))
                .expect("image");
        let url = image.into_image_url();
        assert_eq!(url, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(url.strip_prefix(PNG_DATA_URL_PREFIX), Some("iVBORw0KGgo="));
    }

    #[test]
    fn url_wins_over_base64() {
        let image = GeneratedImage::try_from(parse(
            r#"{"data":[{"url":"https://x.test/a.png","b64_json":"AAAA"}]}"#,
        ))
        .expect("image");
        assert_eq!(image, GeneratedImage::Url("https://x.test/a.png".to_string()));
    }

    #[test]
    fn empty_data_is_upstream_empty() {
        for body in [r#"{"data":[]}"#, r#"{}"#] {
            let err = GeneratedImage::try_from(parse(body)).expect_err("no image");
            assert!(matches!(err, StudioError::UpstreamEmpty), "{body}");
        }
    }

    #[test]
    fn unknown_shape_is_unsupported() {
        let err = GeneratedImage::try_from(parse(r#"{"data":[{"revised_prompt":"hm"}]}"#))
            .expect_err("no usable field");
        assert!(matches!(err, StudioError::UpstreamFormatUnsupported));
    }

    #[test]
    fn error_message_is_extracted() {
        assert_eq!(
            api_error_message(br#"{"error":{"message":"Billing hard limit reached"}}"#),
            "Billing hard limit reached"
        );
        assert_eq!(api_error_message(b"<html>bad gateway</html>"), "Failed to generate image.");
        assert_eq!(api_error_message(br#"{"error":{}}"#), "Failed to generate image.");
    }

    #[tokio::test]
    async fn rejected_request_keeps_upstream_status() {
        use axum::Json;
        use axum::http::StatusCode;
        use axum::routing::post;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let app = axum::Router::new().route(
            "/images/generations",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(serde_json::json!({"error": {"message": "Rate limit reached"}})),
                )
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let provider = ImageProvider::new(reqwest::Client::new(), "test-key", &base_url);
        let err = provider
            .request(&ImagesGenerateRequest {
                model: IMAGE_MODEL,
                prompt: "moor",
                n: 1,
                size: IMAGE_SIZE,
            })
            .await
            .expect_err("429");
        assert!(
            matches!(&err, ProviderError::Api { status: 429, message } if message == "Rate limit reached"),
            "{err:?}"
        );
        assert_eq!(err.to_string(), "Rate limit reached");
    }
}
