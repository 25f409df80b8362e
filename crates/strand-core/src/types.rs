use serde::{Deserialize, Serialize};

/// Opaque platform identifier for the managed account.
pub type AccountId = String;

/// Opaque platform identifier for a target entity (a profile we interact with).
pub type TargetId = String;

/// A story/reel item addressed by its owner + item identifier pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRef {
    pub owner: TargetId,
    pub item: String,
}

/// The channel through which we contact a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Message,
    StoryReply,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Message => "message",
            Channel::StoryReply => "story_reply",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Channel::Message),
            "story_reply" => Some(Channel::StoryReply),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted capability status for a target on a channel.
///
/// No state is terminal — every state is re-evaluated on next contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityState {
    Unknown,
    Available,
    Unavailable,
    ReactionOnly,
}

impl CapabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityState::Unknown => "unknown",
            CapabilityState::Available => "available",
            CapabilityState::Unavailable => "unavailable",
            CapabilityState::ReactionOnly => "reaction_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(CapabilityState::Unknown),
            "available" => Some(CapabilityState::Available),
            "unavailable" => Some(CapabilityState::Unavailable),
            "reaction_only" => Some(CapabilityState::ReactionOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a resolved value should be trusted, intrinsic to the strategy
/// that produced it. API sources are High; DOM and log scraping are lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(s)
    }
}

/// A validated result from a resolution chain, with provenance.
#[derive(Debug, Clone)]
pub struct ExtractionResult<T> {
    pub value: T,
    /// Name of the strategy that produced the value.
    pub source_strategy: String,
    pub confidence: Confidence,
    /// Owner + item identifiers when the query concerned a story item.
    pub story_ref: Option<StoryRef>,
}

/// Composite deduplication key for one item in a content stream.
///
/// Identity (owner + item id) when both resolve; otherwise a content
/// signature over whatever stable fields the surface exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKey {
    Identity { owner: TargetId, item: String },
    Signature(String),
}

impl ItemKey {
    pub fn identity(owner: impl Into<TargetId>, item: impl Into<String>) -> Self {
        ItemKey::Identity {
            owner: owner.into(),
            item: item.into(),
        }
    }

    /// Signature fallback: hash of the visible title + media reference.
    pub fn signature(parts: &[&str]) -> Self {
        ItemKey::Signature(content_signature(parts))
    }

    /// Stable textual form, used for persistence and log fields.
    pub fn as_string(&self) -> String {
        match self {
            ItemKey::Identity { owner, item } => format!("{owner}:{item}"),
            ItemKey::Signature(sig) => format!("sig:{sig}"),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Hash a set of content fields into a short stable signature.
pub fn content_signature(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.finalize().to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable() {
        let a = content_signature(&["title", "https://cdn.example/v.mp4"]);
        let b = content_signature(&["title", "https://cdn.example/v.mp4"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_signature_field_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = content_signature(&["ab", "c"]);
        let b = content_signature(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_channel_round_trip() {
        for ch in [Channel::Message, Channel::StoryReply] {
            assert_eq!(Channel::parse(ch.as_str()), Some(ch));
        }
        assert_eq!(Channel::parse("carrier_pigeon"), None);
    }

    #[test]
    fn test_capability_state_round_trip() {
        for st in [
            CapabilityState::Unknown,
            CapabilityState::Available,
            CapabilityState::Unavailable,
            CapabilityState::ReactionOnly,
        ] {
            assert_eq!(CapabilityState::parse(st.as_str()), Some(st));
        }
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }
}
