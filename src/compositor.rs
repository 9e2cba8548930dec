//! Loads a generated image and an overlay, then flattens them into one PNG.
//!
//! Both inputs are stretched independently to [`OUTPUT_SIZE`] square; aspect
//! ratio is not preserved.

use std::io::Cursor;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, instrument};
use url::Url;

use crate::constants::{OUTPUT_SIZE, PNG_DATA_URL_PREFIX};
use crate::error::StudioError;

/// Why an image couldn't be loaded.
#[derive(Debug)]
pub enum ImageLoadError {
    /// The source string isn't something we know how to load
    InvalidSource(String),
    /// Fetching a remote image failed
    Fetch(String),
    /// Reading a local file failed
    Io(std::io::Error),
    /// The bytes aren't a decodable image
    Decode(String),
}

impl std::fmt::Display for ImageLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageLoadError::InvalidSource(src) => write!(f, "unsupported image source {src}"),
            ImageLoadError::Fetch(message) => write!(f, "fetch failed: {message}"),
            ImageLoadError::Io(err) => write!(f, "{err}"),
            ImageLoadError::Decode(message) => write!(f, "decode failed: {message}"),
        }
    }
}

impl std::error::Error for ImageLoadError {}

impl From<std::io::Error> for ImageLoadError {
    fn from(err: std::io::Error) -> Self {
        ImageLoadError::Io(err)
    }
}

impl From<reqwest::Error> for ImageLoadError {
    fn from(err: reqwest::Error) -> Self {
        ImageLoadError::Fetch(err.to_string())
    }
}

/// Somewhere an image can be loaded from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageSource {
    /// A `data:` URL with a base64 payload
    DataUrl(String),
    /// An http(s) URL
    Remote(Url),
    /// A file on local disk
    File(PathBuf),
}

impl ImageSource {
    /// Parses a data URL or absolute http(s) URL, resolving relative URLs against `base`.
    pub fn resolve(src: &str, base: Option<&Url>) -> Result<Self, ImageLoadError> {
        let src = src.trim();
        if strip_data_scheme(src).is_some() {
            return Ok(ImageSource::DataUrl(src.to_string()));
        }
        let parsed = match Url::parse(src) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base
                .ok_or_else(|| ImageLoadError::InvalidSource(src.to_string()))?
                .join(src)
                .map_err(|_| ImageLoadError::InvalidSource(src.to_string()))?,
            Err(_) => return Err(ImageLoadError::InvalidSource(src.to_string())),
        };
        match parsed.scheme() {
            "http" | "https" => Ok(ImageSource::Remote(parsed)),
            _ => Err(ImageLoadError::InvalidSource(src.to_string())),
        }
    }
}

fn strip_data_scheme(src: &str) -> Option<&str> {
    let scheme = src.get(..5)?;
    if scheme.eq_ignore_ascii_case("data:") {
        src.get(5..)
    } else {
        None
    }
}

/// Decodes the payload of a base64 `data:` URL.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ImageLoadError> {
    let invalid = || ImageLoadError::InvalidSource(truncate_for_log(data_url));
    let rest = strip_data_scheme(data_url).ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    if !header.to_ascii_lowercase().ends_with(";base64") {
        return Err(invalid());
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| ImageLoadError::Decode(err.to_string()))
}

fn truncate_for_log(src: &str) -> String {
    src.chars().take(48).collect()
}

/// Gets the raw bytes behind a source.
pub async fn fetch_bytes(
    source: &ImageSource,
    http: &reqwest::Client,
) -> Result<Vec<u8>, ImageLoadError> {
    match source {
        ImageSource::DataUrl(data_url) => decode_data_url(data_url),
        ImageSource::Remote(url) => {
            debug!("GET {url}");
            let resp = http.get(url.clone()).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ImageLoadError::Fetch(format!("{url} returned {status}")));
            }
            Ok(resp.bytes().await?.to_vec())
        }
        ImageSource::File(path) => Ok(tokio::fs::read(path).await?),
    }
}

/// Decodes image bytes, guessing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageLoadError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ImageLoadError::Decode(err.to_string()))?
        .decode()
        .map_err(|err| ImageLoadError::Decode(err.to_string()))
}

/// Loads and decodes an image from any supported source.
pub async fn load_image(
    source: &ImageSource,
    http: &reqwest::Client,
) -> Result<DynamicImage, ImageLoadError> {
    let bytes = fetch_bytes(source, http).await?;
    decode_image(&bytes)
}

/// Stretches both images to the output frame and draws the overlay over the base.
pub fn composite(base: &DynamicImage, overlay: &DynamicImage) -> RgbaImage {
    let mut canvas = base
        .resize_exact(OUTPUT_SIZE, OUTPUT_SIZE, FilterType::Triangle)
        .to_rgba8();
    let overlay = overlay
        .resize_exact(OUTPUT_SIZE, OUTPUT_SIZE, FilterType::Triangle)
        .to_rgba8();
    image::imageops::overlay(&mut canvas, &overlay, 0, 0);
    canvas
}

/// Encodes an image as a PNG data URL.
pub fn png_data_url(image: &RgbaImage) -> Result<String, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(format!(
        "{PNG_DATA_URL_PREFIX}{}",
        general_purpose::STANDARD.encode(bytes)
    ))
}

/// Loads both images, composites them off the async runtime and returns a PNG data URL.
#[instrument(skip_all)]
pub async fn composite_sources(
    base: &ImageSource,
    overlay: &ImageSource,
    http: &reqwest::Client,
) -> Result<String, StudioError> {
    let (base, overlay) = tokio::try_join!(load_image(base, http), load_image(overlay, http))?;
    debug!(
        "Compositing {}x{} base with {}x{} overlay",
        base.width(),
        base.height(),
        overlay.width(),
        overlay.height()
    );
    let data_url = tokio::task::spawn_blocking(move || png_data_url(&composite(&base, &overlay)))
        .await??;
    Ok(data_url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    pub(crate) fn solid_png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    pub(crate) fn png_data_url_of(width: u32, height: u32, pixel: [u8; 4]) -> String {
        format!(
            "{PNG_DATA_URL_PREFIX}{}",
            general_purpose::STANDARD.encode(solid_png(width, height, pixel))
        )
    }

    #[test]
    fn sources_are_classified() {
        assert!(matches!(
            ImageSource::resolve("data:image/png;base64,AAAA", None),
            Ok(ImageSource::DataUrl(_))
        ));
        assert!(matches!(
            ImageSource::resolve("https://cdn.example.com/a.png", None),
            Ok(ImageSource::Remote(_))
        ));
        let base = Url::parse("http://localhost:3000/").expect("base url");
        assert_eq!(
            ImageSource::resolve("/assets/overlays/a%20b.png", Some(&base)).expect("resolve"),
            ImageSource::Remote(
                Url::parse("http://localhost:3000/assets/overlays/a%20b.png").expect("url")
            )
        );
        assert!(ImageSource::resolve("/assets/overlays/a.png", None).is_err());
        assert!(ImageSource::resolve("ftp://example.com/a.png", None).is_err());
    }

    #[test]
    fn data_urls_decode() {
        assert_eq!(
            decode_data_url("data:image/png;base64,aGVsbG8=").expect("decode"),
            b"hello"
        );
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("https://example.com").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn output_is_always_square() {
        for (bw, bh, ow, oh) in [(10, 20, 5, 5), (2048, 512, 1, 1), (1024, 1024, 300, 900)] {
            let base = decode_image(&solid_png(bw, bh, [10, 20, 30, 255])).expect("base");
            let overlay = decode_image(&solid_png(ow, oh, [0, 0, 0, 0])).expect("overlay");
            let out = composite(&base, &overlay);
            assert_eq!(out.dimensions(), (OUTPUT_SIZE, OUTPUT_SIZE));
        }
    }

    #[test]
    fn overlay_is_drawn_over_base() {
        let base = decode_image(&solid_png(8, 8, [255, 0, 0, 255])).expect("base");

        let transparent = decode_image(&solid_png(3, 3, [0, 0, 255, 0])).expect("overlay");
        let out = composite(&base, &transparent);
        assert_eq!(out.get_pixel(512, 512).0, [255, 0, 0, 255]);

        let opaque = decode_image(&solid_png(3, 3, [0, 0, 255, 255])).expect("overlay");
        let out = composite(&base, &opaque);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(1023, 1023).0, [0, 0, 255, 255]);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(ImageLoadError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn composite_sources_returns_png_data_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let overlay_path = dir.path().join("overlay.png");
        std::fs::write(&overlay_path, solid_png(40, 7, [0, 255, 0, 128])).expect("write");

        let base = ImageSource::DataUrl(png_data_url_of(300, 200, [0, 0, 0, 255]));
        let overlay = ImageSource::File(overlay_path);
        let data_url = composite_sources(&base, &overlay, &reqwest::Client::new())
            .await
            .expect("composite");

        let bytes = decode_data_url(&data_url).expect("payload");
        let decoded = decode_image(&bytes).expect("decode output");
        assert_eq!(decoded.width(), OUTPUT_SIZE);
        assert_eq!(decoded.height(), OUTPUT_SIZE);
    }

    #[tokio::test]
    async fn missing_overlay_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = ImageSource::DataUrl(png_data_url_of(4, 4, [0, 0, 0, 255]));
        let overlay = ImageSource::File(dir.path().join("missing.png"));
        let err = composite_sources(&base, &overlay, &reqwest::Client::new())
            .await
            .expect_err("missing overlay");
        assert!(matches!(err, StudioError::ImageLoad(_)));
    }
}
