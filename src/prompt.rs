//! User prompts, the scene prompt we send upstream, and download file names.

use crate::constants::{FALLBACK_FILE_SLUG, MAX_FILE_SLUG_LENGTH};
use crate::error::StudioError;

/// Clauses appended to every prompt so the provider only draws places.
pub const SCENE_SAFETY_CLAUSES: [&str; 2] = [
    "No people, no faces, no portraits, no human figures.",
    "Focus on environment and atmosphere only.",
];

/// A trimmed, non-empty user prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prompt(String);

/// Strips surrounding whitespace, including a stray byte order mark.
pub fn trim_prompt(raw: &str) -> &str {
    raw.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{FEFF}')
}

impl Prompt {
    /// Trims the input and rejects it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, StudioError> {
        let trimmed = trim_prompt(raw);
        if trimmed.is_empty() {
            return Err(StudioError::InvalidInput("Prompt is required.".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The prompt text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the scene prompt sent to the image provider.
    pub fn scene(&self) -> String {
        let mut parts = Vec::with_capacity(SCENE_SAFETY_CLAUSES.len() + 1);
        parts.push(format!(
            "Create a photorealistic image of this location: {}.",
            self.0
        ));
        parts.extend(SCENE_SAFETY_CLAUSES.iter().map(|clause| clause.to_string()));
        parts.join(" ")
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercases the prompt and squashes everything outside `[a-z0-9]` into single dashes.
pub fn file_slug(prompt: &str) -> String {
    let mut slug = String::with_capacity(prompt.len());
    let mut pending_dash = false;
    for ch in prompt.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    // a dash landing on the cut still has to go
    slug.truncate(MAX_FILE_SLUG_LENGTH);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_FILE_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// File name offered when downloading a result, eg `abandoned-lighthouse-1700000000000.png`.
pub fn download_file_name(prompt: Option<&str>, timestamp_millis: i64) -> String {
    let slug = file_slug(prompt.unwrap_or(FALLBACK_FILE_SLUG));
    format!("{slug}-{timestamp_millis}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompts_are_rejected() {
        for raw in ["", "   ", "\n\t ", "\u{3000}", "\u{FEFF}", " \u{FEFF}\n"] {
            let err = Prompt::parse(raw).expect_err("blank prompt");
            assert!(matches!(err, StudioError::InvalidInput(_)), "{raw:?}");
        }
    }

    #[test]
    fn prompt_is_trimmed() {
        let prompt = Prompt::parse("  foggy harbour \n").expect("valid prompt");
        assert_eq!(prompt.as_str(), "foggy harbour");
        let prompt = Prompt::parse("\u{FEFF}salt marsh\u{FEFF}").expect("valid prompt");
        assert_eq!(prompt.as_str(), "salt marsh");
    }

    #[test]
    fn scene_contains_prompt_and_clauses() {
        let prompt = Prompt::parse("abandoned lighthouse").expect("valid prompt");
        let scene = prompt.scene();
        assert!(scene.contains("abandoned lighthouse"));
        for clause in SCENE_SAFETY_CLAUSES {
            assert!(scene.contains(clause), "missing {clause}");
        }
        assert!(scene.contains("No people"));
    }

    #[test]
    fn slug_squashes_and_trims() {
        assert_eq!(file_slug("Abandoned Lighthouse"), "abandoned-lighthouse");
        assert_eq!(file_slug("  --Rainy  Street!! "), "rainy-street");
        assert_eq!(file_slug("café_au lait"), "caf-au-lait");
        assert_eq!(file_slug("!!!"), FALLBACK_FILE_SLUG);
        assert_eq!(file_slug(""), FALLBACK_FILE_SLUG);
    }

    #[test]
    fn slug_is_capped() {
        let long = "a".repeat(49) + " b" + &"c".repeat(40);
        let slug = file_slug(&long);
        assert!(slug.len() <= MAX_FILE_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "a".repeat(49));
    }

    #[test]
    fn download_name_matches_pattern() {
        assert_eq!(
            download_file_name(Some("abandoned lighthouse"), 1_700_000_000_123),
            "abandoned-lighthouse-1700000000123.png"
        );
        assert_eq!(download_file_name(None, 5), "ai-image-5.png");
    }
}
