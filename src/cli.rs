//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

use crate::constants::{DEFAULT_OVERLAY_DIR, DEFAULT_PROVIDER_URL};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "OVERLAY_STUDIO_DEBUG")]
    /// Enable debug logging. Env: OVERLAY_STUDIO_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "PORT")]
    /// http listener, defaults to `3000`.
    /// Env: PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "OVERLAY_STUDIO_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: OVERLAY_STUDIO_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// API key for the image provider, required.
    /// Env: OPENAI_API_KEY
    pub openai_api_key: String,

    #[clap(long, default_value = DEFAULT_PROVIDER_URL, env = "OVERLAY_STUDIO_PROVIDER_URL")]
    /// Base URL of the image provider API.
    /// Env: OVERLAY_STUDIO_PROVIDER_URL
    pub provider_url: String,

    #[clap(long, default_value = DEFAULT_OVERLAY_DIR, env = "OVERLAY_STUDIO_OVERLAY_DIR")]
    /// Directory holding overlay images, served under `/assets/overlays`.
    /// Env: OVERLAY_STUDIO_OVERLAY_DIR
    pub overlay_dir: PathBuf,

    #[clap(long, default_value = ".", env = "OVERLAY_STUDIO_STATIC_DIR")]
    /// Directory served for anything not matched by a route.
    /// Env: OVERLAY_STUDIO_STATIC_DIR
    pub static_dir: PathBuf,

    #[clap(long, default_value = "", env = "OVERLAY_STUDIO_PUBLIC_API_BASE_URL")]
    /// API base URL injected into the page, eg `https://studio.example.com`.
    /// Env: OVERLAY_STUDIO_PUBLIC_API_BASE_URL
    pub public_api_base_url: String,
}
