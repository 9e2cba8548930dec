//! Listing the overlay images available on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{OVERLAY_URL_PREFIX, SUPPORTED_OVERLAY_EXTENSIONS};
use crate::error::StudioError;

/// Characters left alone when encoding a single URL component.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// An overlay image and the URL it's served from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OverlayImage {
    /// Raw file name
    pub name: String,
    /// Path under the static overlay mount
    pub url: String,
}

impl OverlayImage {
    /// Builds the descriptor for a file in the overlay directory.
    pub fn from_file_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!(
                "{}/{}",
                OVERLAY_URL_PREFIX,
                utf8_percent_encode(name, URI_COMPONENT)
            ),
        }
    }

    /// Where this overlay lives on disk.
    pub fn path_in(&self, overlay_dir: &Path) -> PathBuf {
        overlay_dir.join(&self.name)
    }
}

/// Returns true if the file name has one of the supported image extensions.
pub fn is_supported_overlay(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_OVERLAY_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Root-locale collator at the default (tertiary) strength.
fn root_collator() -> Option<CollatorBorrowed<'static>> {
    Collator::try_new(CollatorPreferences::default(), CollatorOptions::default())
        .inspect_err(|err| warn!("No collation data, overlay names sort by bytes: {err}"))
        .ok()
}

/// Sorts names in collation order: punctuation before digits before
/// letters, with accents and case only breaking ties.
pub fn sort_by_locale<S: AsRef<str>>(names: &mut [S]) {
    match root_collator() {
        Some(collator) => names.sort_by(|a, b| collator.compare(a.as_ref(), b.as_ref())),
        None => names.sort_by(|a, b| a.as_ref().cmp(b.as_ref())),
    }
}

/// Lists supported images directly inside `overlay_dir`, sorted by name.
///
/// A missing directory is an empty list, not an error.
pub async fn list_overlays(overlay_dir: &Path) -> Result<Vec<OverlayImage>, StudioError> {
    let mut entries = match tokio::fs::read_dir(overlay_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("Overlay dir {} does not exist", overlay_dir.display());
            return Ok(Vec::new());
        }
        Err(err) => return Err(StudioError::InternalServerError(err.to_string())),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if is_supported_overlay(&name) {
            names.push(name);
        }
    }
    sort_by_locale(&mut names);

    Ok(names
        .iter()
        .map(|name| OverlayImage::from_file_name(name))
        .collect())
}

/// Picks one candidate uniformly at random, `None` if there are none.
pub fn pick_overlay<T>(candidates: &[T]) -> Option<&T> {
    candidates.choose(&mut rand::rng())
}
