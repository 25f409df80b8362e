//! Typed view of the JSON payloads the API strategies consume. Shape checks
//! happen once here; strategies work with the structs, never raw `Value`s.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use strand_core::{Result, StrandError};

/// Parse a payload into its typed form, naming the parse site on failure.
pub fn parse<T: DeserializeOwned>(body: &Value, context: &str) -> Result<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| StrandError::ParseFailure(format!("{context}: {e}")))
}

// ── Reel lookup ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReelLookupPayload {
    #[serde(default)]
    pub reels_media: Vec<ReelTray>,
}

#[derive(Debug, Deserialize)]
pub struct ReelTray {
    #[serde(default)]
    pub items: Vec<ReelItem>,
}

#[derive(Debug, Deserialize)]
pub struct ReelItem {
    pub id: Option<String>,
    pub image_versions2: Option<ImageVersions>,
    #[serde(default)]
    pub video_versions: Vec<VideoVersion>,
}

#[derive(Debug, Deserialize)]
pub struct ImageVersions {
    #[serde(default)]
    pub candidates: Vec<ImageCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct ImageCandidate {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct VideoVersion {
    pub url: String,
}

impl ReelItem {
    /// Preferred media URL: video when present, else the largest image.
    pub fn best_media(&self) -> Option<(&str, bool)> {
        if let Some(video) = self.video_versions.first() {
            return Some((video.url.as_str(), true));
        }
        self.image_versions2
            .as_ref()?
            .candidates
            .iter()
            .max_by_key(|c| c.width as u64 * c.height as u64)
            .map(|c| (c.url.as_str(), false))
    }
}

// ── Thread probe ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ThreadProbePayload {
    pub thread: Option<ThreadInfo>,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadInfo {
    pub thread_id: Option<String>,
}

// ── Feed pages ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FeedPagePayload {
    #[serde(default)]
    pub items: Vec<FeedEntry>,
    pub next_max_id: Option<String>,
    pub more_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FeedEntry {
    pub id: Option<String>,
    /// Shortcode used in the item's canonical URL.
    pub code: Option<String>,
    pub user: Option<FeedUser>,
    pub caption: Option<FeedCaption>,
    /// Present on injected/sponsored entries.
    pub injected: Option<Value>,
    pub ad_id: Option<String>,
    pub attribution: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedUser {
    pub username: Option<String>,
    pub pk: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FeedCaption {
    pub text: Option<String>,
}

impl FeedEntry {
    pub fn is_sponsored(&self) -> bool {
        self.injected.is_some() || self.ad_id.is_some()
    }
}
