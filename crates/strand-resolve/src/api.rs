//! Strategies backed by the direct JSON API, executed through the gateway so
//! pacing, pauses, and escalation all apply.

use async_trait::async_trait;
use std::sync::Arc;

use strand_core::{CapabilityState, Confidence, Result, StoryRef, StrandError};
use strand_gateway::{ApiRequest, Endpoint, FailureReason, GatewayResponse, RequestGateway};

use crate::chain::Strategy;
use crate::payload::{self, FeedPagePayload, ReelLookupPayload, ThreadProbePayload};
use crate::query::{
    CapabilityVerdict, FeedItem, FeedPage, FeedPageQuery, MediaKind, MediaRef,
    MessageabilityQuery, StoryMediaQuery,
};

/// Turn a failed gateway response into the strategy-level outcome: expired
/// auth aborts the chain, everything else is "no result here".
fn check_auth(response: &GatewayResponse) -> Result<()> {
    if response.reason == Some(FailureReason::AuthExpired) {
        Err(StrandError::AuthExpired("session rejected by the API".into()))
    } else {
        Ok(())
    }
}

/// Canonical web URL for a feed item shortcode.
fn canonical_url(code: &str) -> String {
    format!("https://www.example-platform.com/p/{code}/")
}

// ── Story media ────────────────────────────────────────────────

pub struct ApiReelLookup {
    gateway: Arc<RequestGateway>,
}

impl ApiReelLookup {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Strategy<StoryMediaQuery, MediaRef> for ApiReelLookup {
    fn name(&self) -> &'static str {
        "api_reel_lookup"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    async fn attempt(&self, query: &StoryMediaQuery) -> Result<Option<MediaRef>> {
        let request =
            ApiRequest::get(Endpoint::ReelLookup).with_query("reel_ids", query.owner.clone());
        let response = self.gateway.execute(Some(&query.owner), request).await;
        if !response.ok {
            check_auth(&response)?;
            return Ok(None);
        }
        let Some(body) = response.payload else {
            return Ok(None);
        };

        let parsed: ReelLookupPayload = payload::parse(&body, "reel_lookup")?;
        let Some(tray) = parsed.reels_media.first() else {
            return Ok(None);
        };
        // Prefer the hinted item; fall back to the first one in the tray.
        let item = match &query.item_hint {
            Some(hint) => tray
                .items
                .iter()
                .find(|i| i.id.as_deref() == Some(hint.as_str()))
                .or_else(|| tray.items.first()),
            None => tray.items.first(),
        };
        let Some(item) = item else {
            return Ok(None);
        };
        let Some((url, is_video)) = item.best_media() else {
            return Ok(None);
        };

        let story_ref = item.id.clone().map(|id| StoryRef {
            owner: query.owner.clone(),
            item: id,
        });
        Ok(Some(MediaRef {
            url: url.to_string(),
            kind: if is_video {
                MediaKind::Video
            } else {
                MediaKind::Image
            },
            story_ref,
        }))
    }
}

// ── Messageability ─────────────────────────────────────────────

pub struct ApiThreadProbe {
    gateway: Arc<RequestGateway>,
}

impl ApiThreadProbe {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Strategy<MessageabilityQuery, CapabilityVerdict> for ApiThreadProbe {
    fn name(&self) -> &'static str {
        "api_thread_probe"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    async fn attempt(&self, query: &MessageabilityQuery) -> Result<Option<CapabilityVerdict>> {
        let request = ApiRequest::post(Endpoint::ThreadCreate)
            .with_form("recipient_users", format!("[\"{}\"]", query.target));
        let response = self.gateway.execute(Some(&query.target), request).await;

        if response.ok {
            let Some(body) = response.payload else {
                return Ok(None);
            };
            let parsed: ThreadProbePayload = payload::parse(&body, "thread_probe")?;
            if parsed.thread.and_then(|t| t.thread_id).is_some() {
                return Ok(Some(CapabilityVerdict::new(CapabilityState::Available)));
            }
            if let Some(message) = &parsed.message
                && message.to_ascii_lowercase().contains("reaction")
            {
                return Ok(Some(CapabilityVerdict::new(CapabilityState::ReactionOnly)));
            }
            if parsed.status.as_deref() == Some("ok") {
                return Ok(Some(CapabilityVerdict::new(CapabilityState::Available)));
            }
            return Ok(None);
        }

        check_auth(&response)?;
        // A definitive refusal is a verdict, not a missing result.
        if response.status == 403 {
            return Ok(Some(CapabilityVerdict::new(CapabilityState::Unavailable)));
        }
        Ok(None)
    }
}

// ── Feed pages ─────────────────────────────────────────────────

pub struct ApiFeedPage {
    gateway: Arc<RequestGateway>,
}

impl ApiFeedPage {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    pub(crate) fn page_from(payload: FeedPagePayload) -> FeedPage {
        let items = payload
            .items
            .into_iter()
            .map(|entry| {
                let owner = entry
                    .user
                    .as_ref()
                    .and_then(|u| u.username.clone())
                    .or_else(|| {
                        entry
                            .user
                            .as_ref()
                            .and_then(|u| u.pk.as_ref())
                            .map(|pk| pk.to_string())
                    })
                    .unwrap_or_default();
                let sponsored = entry.is_sponsored();
                FeedItem {
                    owner,
                    item_id: entry.id,
                    canonical_url: entry.code.as_deref().map(canonical_url),
                    caption: entry.caption.and_then(|c| c.text),
                    sponsored,
                    attribution: entry.attribution,
                }
            })
            .collect();
        let next_cursor = if payload.more_available == Some(false) {
            None
        } else {
            payload.next_max_id
        };
        FeedPage { items, next_cursor }
    }
}

#[async_trait]
impl Strategy<FeedPageQuery, FeedPage> for ApiFeedPage {
    fn name(&self) -> &'static str {
        "api_feed_page"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    async fn attempt(&self, query: &FeedPageQuery) -> Result<Option<FeedPage>> {
        let mut request = ApiRequest::get(Endpoint::FeedTimeline);
        if let Some(cursor) = &query.cursor {
            request = request.with_query("max_id", cursor.clone());
        }
        let response = self.gateway.execute(None, request).await;
        if !response.ok {
            check_auth(&response)?;
            return Ok(None);
        }
        let Some(body) = response.payload else {
            return Ok(None);
        };
        let parsed: FeedPagePayload = payload::parse(&body, "feed_timeline")?;
        Ok(Some(Self::page_from(parsed)))
    }
}
