use clap::Parser;
use overlay_studio::config::{load_dotenv, setup_logging};
use overlay_studio::provider::ImageProvider;
use overlay_studio::web::AppState;
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    load_dotenv();
    let cli = overlay_studio::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    if !cli.overlay_dir.is_dir() {
        tracing::warn!(
            "Overlay directory {} not found, no overlays will be offered",
            cli.overlay_dir.display()
        );
    }

    let http = reqwest::Client::new();
    let provider = ImageProvider::new(http.clone(), &cli.openai_api_key, &cli.provider_url);
    let state = AppState::new(
        provider,
        http,
        &cli.overlay_dir,
        &cli.static_dir,
        &cli.public_api_base_url,
    );

    if let Err(err) = overlay_studio::web::setup_server(&cli.listen_address, cli.port, state).await
    {
        error!("Application error: {}", err);
    }
}
