//! HTTP server: JSON API, the HTML form, and static files.

use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use tower_http::services::ServeDir;
use tracing::{error, info, instrument};

use crate::compositor::{ImageSource, composite_sources};
use crate::constants::OVERLAY_URL_PREFIX;
use crate::error::StudioError;
use crate::overlays::{list_overlays, pick_overlay};
use crate::prompt::{Prompt, download_file_name};
use crate::provider::ImageProvider;

pub mod api;
mod middleware;
mod prelude;
mod views;

use api::ComposeResponse;

/// Largest JSON/form body we accept.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Everything a request handler needs; cheap to clone and never mutated.
#[derive(Clone, Debug)]
pub struct AppState {
    provider: ImageProvider,
    http: reqwest::Client,
    overlay_dir: Arc<PathBuf>,
    static_dir: Arc<PathBuf>,
    public_api_base_url: String,
}

impl AppState {
    /// `http` is used to fetch generated images by URL when compositing.
    pub fn new(
        provider: ImageProvider,
        http: reqwest::Client,
        overlay_dir: &Path,
        static_dir: &Path,
        public_api_base_url: &str,
    ) -> Self {
        Self {
            provider,
            http,
            overlay_dir: Arc::new(overlay_dir.to_path_buf()),
            static_dir: Arc::new(static_dir.to_path_buf()),
            public_api_base_url: public_api_base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn overlay_dir(&self) -> &Path {
        &self.overlay_dir
    }

    pub(crate) fn public_api_base_url(&self) -> &str {
        &self.public_api_base_url
    }

    /// Sends the scene prompt upstream and returns an image URL or data URL.
    pub(crate) async fn generate(&self, prompt: &Prompt) -> Result<String, StudioError> {
        let generated = self.provider.generate(&prompt.scene()).await?;
        Ok(generated.into_image_url())
    }

    /// Generates an image and flattens a random overlay on top of it.
    #[instrument(skip_all)]
    pub(crate) async fn compose(&self, prompt: &Prompt) -> Result<ComposeResponse, StudioError> {
        let overlays = list_overlays(self.overlay_dir()).await?;
        let overlay = pick_overlay(&overlays)
            .ok_or(StudioError::NoOverlays)?
            .clone();

        let generated_url = self.generate(prompt).await?;
        let base = ImageSource::resolve(&generated_url, None)?;
        let overlay_source = ImageSource::File(overlay.path_in(self.overlay_dir()));
        let image_url = composite_sources(&base, &overlay_source, &self.http).await?;

        Ok(ComposeResponse {
            image_url,
            overlay,
            file_name: download_file_name(Some(prompt.as_str()), Utc::now().timestamp_millis()),
        })
    }
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    let overlay_files = ServeDir::new(state.overlay_dir.as_path());
    let static_files = ServeDir::new(state.static_dir.as_path());

    Router::new()
        .route("/", get(views::home_handler))
        .route("/compose", post(views::compose_form_handler))
        .route("/static/styles.css", get(styles_handler))
        .route(
            "/api/reference-images",
            get(api::reference_images_handler),
        )
        .route("/api/generate-image", post(api::generate_image_handler))
        .route("/api/compose", post(api::compose_handler))
        .nest_service(OVERLAY_URL_PREFIX, overlay_files)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::hide_dotfiles))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Binds the listener and serves until Ctrl-C.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    state: AppState,
) -> Result<(), anyhow::Error> {
    let app = create_router(state);

    let addr = format!("{}:{}", listen_addr, port);
    info!("App is running on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
