//! Generate a scene for a prompt through a running studio server and save it.
//!
//! Minimal UX:
//!   overlay_studio_client "abandoned lighthouse"

use anyhow::{Context, Result};
use clap::Parser;
use overlay_studio::client::{ApiClient, DownloadOutcome, StudioController};
use overlay_studio::config::{load_dotenv, setup_logging};
use overlay_studio::constants::DEFAULT_CLIENT_API_BASE_URL;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "overlay_studio_client")]
#[command(about = "Generate a scene image, composite a random overlay on it, and save the result")]
struct Args {
    /// Place to generate, eg "abandoned lighthouse"
    prompt: String,

    /// Studio server to talk to
    #[arg(long, default_value = DEFAULT_CLIENT_API_BASE_URL, env = "OVERLAY_STUDIO_API_BASE_URL")]
    api_base_url: String,

    /// Directory the result is saved into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow::anyhow!(err))?;

    let api = ApiClient::new(reqwest::Client::new(), &args.api_base_url)?;
    let mut controller = StudioController::load(api)
        .await
        .context("Failed to load overlay images")?;

    controller.submit(&args.prompt).await?;

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    match controller.download(&args.out_dir).await? {
        DownloadOutcome::Saved(path) => eprintln!("Saved: {}", path.display()),
        DownloadOutcome::OpenedInBrowser => eprintln!("{}", controller.session().status()),
    }
    Ok(())
}
