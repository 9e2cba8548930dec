//! Front end controller: talks to the studio API, composites locally and saves downloads.
//!
//! The controller owns a [`SessionState`] loaded once at startup; every
//! submit and download goes through it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::compositor::{ImageSource, composite_sources, fetch_bytes};
use crate::error::StudioError;
use crate::overlays::pick_overlay;
use crate::prompt::{download_file_name, trim_prompt};
use crate::web::api::{ErrorResponse, GenerateImageResponse, PromptRequest, ReferenceImagesResponse};

/// Things that go wrong on the client side.
#[derive(Debug)]
pub enum ClientError {
    /// The prompt was empty after trimming
    InvalidPrompt,
    /// The server has no overlay images
    NoOverlays,
    /// Download was asked for before anything was generated
    NothingToDownload,
    /// The API base URL couldn't be parsed
    InvalidBaseUrl(String),
    /// The API answered with an error body
    Api(String),
    /// The request to the API failed
    Transport(reqwest::Error),
    /// Loading or compositing the images failed
    Compose(StudioError),
    /// Writing the download failed
    Io(std::io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::InvalidPrompt => write!(f, "Please describe a place."),
            ClientError::NoOverlays => write!(f, "No overlay image available."),
            ClientError::NothingToDownload => write!(f, "Generate an image first."),
            ClientError::InvalidBaseUrl(url) => write!(f, "Invalid API base URL: {url}"),
            ClientError::Api(message) => write!(f, "{message}"),
            ClientError::Transport(err) => write!(f, "{err}"),
            ClientError::Compose(err) => write!(f, "{err}"),
            ClientError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err)
    }
}

impl From<StudioError> for ClientError {
    fn from(err: StudioError) -> Self {
        ClientError::Compose(err)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

/// Thin client for the studio's JSON API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Trailing slashes on `base_url` are ignored.
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/"))
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Root every relative URL from the API is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))
    }

    async fn read_json<T: DeserializeOwned>(
        resp: reqwest::Response,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| fallback.to_string());
            return Err(ClientError::Api(message));
        }
        serde_json::from_slice(&bytes).map_err(|_| ClientError::Api(fallback.to_string()))
    }

    /// Fetches the overlay URLs, skipping entries without one.
    pub async fn reference_images(&self) -> Result<Vec<String>, ClientError> {
        let resp = self
            .http
            .get(self.endpoint("/api/reference-images")?)
            .send()
            .await?;
        let body: ReferenceImagesResponse =
            Self::read_json(resp, "Failed to load overlay images.").await?;
        Ok(body
            .images
            .into_iter()
            .map(|image| image.url)
            .filter(|url| !url.is_empty())
            .collect())
    }

    /// Asks the server to generate an image and returns its URL or data URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.endpoint("/api/generate-image")?)
            .json(&PromptRequest {
                prompt: Some(prompt.to_string()),
            })
            .send()
            .await?;
        let body: GenerateImageResponse =
            Self::read_json(resp, "Image generation failed.").await?;
        Ok(body.image_url)
    }
}

/// Everything the controller remembers between actions.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    overlays: Vec<String>,
    last_prompt: Option<String>,
    result: Option<String>,
    status: String,
}

impl SessionState {
    /// Overlay URLs as listed by the server at startup
    pub fn overlays(&self) -> &[String] {
        &self.overlays
    }

    /// The prompt behind the current result
    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    /// The composited image as a data URL
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Latest status line
    pub fn status(&self) -> &str {
        &self.status
    }

    /// True when there's something to submit against
    pub fn can_generate(&self) -> bool {
        !self.overlays.is_empty()
    }
}

/// How a download finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DownloadOutcome {
    /// Written to this path
    Saved(PathBuf),
    /// Couldn't fetch the bytes, so the image was opened in the browser instead
    OpenedInBrowser,
}

/// Drives generate, composite and download against one server.
#[derive(Debug)]
pub struct StudioController {
    api: ApiClient,
    session: SessionState,
    open_in_browser: BrowserOpener,
}

/// Opens a URL outside the controller, the system browser by default.
pub type BrowserOpener = fn(&str) -> std::io::Result<()>;

impl StudioController {
    /// Loads the overlay list once; an empty list leaves the controller unable to generate.
    pub async fn load(api: ApiClient) -> Result<Self, ClientError> {
        let overlays = api.reference_images().await?;
        let status = if overlays.is_empty() {
            "No overlay images found. Add PNG/JPG/WEBP files to the overlay directory.".to_string()
        } else {
            format!("{} overlay images available.", overlays.len())
        };
        info!("{status}");
        Ok(Self {
            api,
            session: SessionState {
                overlays,
                status,
                ..Default::default()
            },
            open_in_browser: webbrowser::open,
        })
    }

    /// Swaps what a failed download falls back to.
    pub fn with_browser_opener(mut self, opener: BrowserOpener) -> Self {
        self.open_in_browser = opener;
        self
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Generates an image for the prompt and composites a random overlay on it.
    ///
    /// On failure the status carries the error message and there is no result.
    /// Taking `&mut self` means a second submit can't start while one is running.
    #[instrument(skip(self))]
    pub async fn submit(&mut self, raw_prompt: &str) -> Result<&str, ClientError> {
        let prompt = trim_prompt(raw_prompt).to_string();
        if prompt.is_empty() {
            return Err(self.fail(ClientError::InvalidPrompt));
        }
        let Some(overlay_url) = pick_overlay(&self.session.overlays).cloned() else {
            return Err(self.fail(ClientError::NoOverlays));
        };

        self.session.status = "Generating image...".to_string();
        self.session.result = None;
        info!("{}", self.session.status);

        let outcome = self.generate_and_composite(&prompt, &overlay_url).await;

        match outcome {
            Ok(data_url) => {
                self.session.result = Some(data_url);
                self.session.last_prompt = Some(prompt);
                self.session.status = "Image ready.".to_string();
                info!("{}", self.session.status);
                Ok(self.session.result.as_deref().unwrap_or_default())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn generate_and_composite(
        &self,
        prompt: &str,
        overlay_url: &str,
    ) -> Result<String, ClientError> {
        let image_url = self.api.generate_image(prompt).await?;
        let base_url = self.api.base_url();
        let base = ImageSource::resolve(&image_url, Some(base_url))
            .map_err(|err| ClientError::Compose(err.into()))?;
        let overlay = ImageSource::resolve(overlay_url, Some(base_url))
            .map_err(|err| ClientError::Compose(err.into()))?;
        debug!("Compositing {overlay:?} over generated image");
        Ok(composite_sources(&base, &overlay, &self.api.http).await?)
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        self.session.status = err.to_string();
        warn!("{}", self.session.status);
        err
    }

    /// Saves the current result into `out_dir`, named after the last prompt.
    ///
    /// When the image bytes can't be fetched the source is opened in the
    /// system browser instead.
    pub async fn download(&mut self, out_dir: &Path) -> Result<DownloadOutcome, ClientError> {
        let Some(src) = self.session.result.clone() else {
            return Err(self.fail(ClientError::NothingToDownload));
        };
        let file_name = download_file_name(
            self.session.last_prompt.as_deref(),
            Utc::now().timestamp_millis(),
        );

        let fetched = match ImageSource::resolve(&src, Some(self.api.base_url())) {
            Ok(source) => fetch_bytes(&source, &self.api.http).await,
            Err(err) => Err(err),
        };
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Download fetch failed, opening in browser: {err}");
                (self.open_in_browser)(&src).map_err(|err| self.fail(err.into()))?;
                self.session.status =
                    "Opened image in the browser. Save it from there.".to_string();
                return Ok(DownloadOutcome::OpenedInBrowser);
            }
        };

        let path = out_dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        self.session.status = format!("Saved {}", path.display());
        info!("{}", self.session.status);
        Ok(DownloadOutcome::Saved(path))
    }
}
