use serde::{Deserialize, Serialize};

use strand_core::{AccountId, CapabilityState, Channel, StoryRef, TargetId};

use crate::chain::Candidate;
use crate::validate::media_url_valid;

// ── Story media ────────────────────────────────────────────────

/// Locate the media behind a story item currently in view.
#[derive(Debug, Clone)]
pub struct StoryMediaQuery {
    pub owner: TargetId,
    /// Item id, when the navigation layer already knows it.
    pub item_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// A resolved media reference for one story item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
    pub story_ref: Option<StoryRef>,
}

impl Candidate for MediaRef {
    fn validate(&self) -> Result<(), String> {
        media_url_valid(&self.url)
    }

    fn story_ref(&self) -> Option<StoryRef> {
        self.story_ref.clone()
    }
}

// ── Messageability ─────────────────────────────────────────────

/// Determine which contact channel a target currently accepts.
#[derive(Debug, Clone)]
pub struct MessageabilityQuery {
    pub target: TargetId,
    pub channel: Channel,
}

/// Probe outcome. Definitive by construction — a probe that cannot decide
/// returns no candidate instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityVerdict {
    pub state: CapabilityState,
}

impl CapabilityVerdict {
    pub fn new(state: CapabilityState) -> Self {
        Self { state }
    }
}

impl Candidate for CapabilityVerdict {
    fn validate(&self) -> Result<(), String> {
        if self.state == CapabilityState::Unknown {
            Err("verdict is not definitive".into())
        } else {
            Ok(())
        }
    }
}

// ── Feed pages ─────────────────────────────────────────────────

/// Fetch one page of the home feed, continuing from a cursor.
#[derive(Debug, Clone)]
pub struct FeedPageQuery {
    pub account: AccountId,
    pub cursor: Option<String>,
}

/// One item in a feed page, carrying the metadata scope and marker policy
/// decisions need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub owner: TargetId,
    pub item_id: Option<String>,
    pub canonical_url: Option<String>,
    pub caption: Option<String>,
    pub sponsored: bool,
    /// Third-party attribution string, when the item credits another source.
    pub attribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Absent on the final page.
    pub next_cursor: Option<String>,
}

impl Candidate for FeedPage {
    fn validate(&self) -> Result<(), String> {
        // An empty page is only meaningful when it is the final one.
        if self.items.is_empty() && self.next_cursor.is_some() {
            Err("empty page with a continuation cursor".into())
        } else {
            Ok(())
        }
    }
}
