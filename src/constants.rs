//! Shared constants/setters for things
//!

/// The default place we look for overlay images
pub const DEFAULT_OVERLAY_DIR: &str = "./assets/overlays";

/// URL path the overlay directory is mounted under
pub const OVERLAY_URL_PREFIX: &str = "/assets/overlays";

/// Extensions (lowercase, without the dot) we treat as overlay images
pub const SUPPORTED_OVERLAY_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Default base URL for the image provider API
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1";

/// Image model requested from the provider
pub const IMAGE_MODEL: &str = "gpt-image-1";

/// Image size requested from the provider
pub const IMAGE_SIZE: &str = "1024x1024";

/// Width and height of the composited output
pub const OUTPUT_SIZE: u32 = 1024;

/// Prefix for inline PNG payloads
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Longest slug we put in a download file name
pub const MAX_FILE_SLUG_LENGTH: usize = 50;

/// Slug used when the prompt has nothing usable in it
pub const FALLBACK_FILE_SLUG: &str = "ai-image";

/// Default API base the client talks to
pub const DEFAULT_CLIENT_API_BASE_URL: &str = "http://localhost:3000";
