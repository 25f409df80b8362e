//! Story media recovery from the browser's captured network traffic. When the
//! direct API refuses or garbles a lookup, the page itself has usually already
//! fetched the media — the capture hook saw the URL go by.

use async_trait::async_trait;
use std::sync::Arc;

use strand_core::{Confidence, Result};
use strand_driver::Driver;
use strand_gateway::{ApiRequest, BrowserEscalation, Endpoint};

use crate::api::ApiFeedPage;
use crate::chain::Strategy;
use crate::payload::{self, FeedPagePayload};
use crate::query::{FeedPage, FeedPageQuery, MediaKind, MediaRef, StoryMediaQuery};
use crate::validate::{looks_like_media, looks_like_video, media_url_valid};

pub struct NetworkLogScan {
    driver: Arc<dyn Driver>,
}

impl NetworkLogScan {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Strategy<StoryMediaQuery, MediaRef> for NetworkLogScan {
    fn name(&self) -> &'static str {
        "network_log_scan"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    // The capture log has no owner column, so provenance stays URL-level.
    async fn attempt(&self, _query: &StoryMediaQuery) -> Result<Option<MediaRef>> {
        let entries = self.driver.network_log().await?;

        // Newest entries first: the item in view loaded last. Videos beat
        // images because image hits also cover thumbnails and avatars.
        let mut best: Option<&str> = None;
        for entry in entries.iter().rev() {
            if entry.status.is_some_and(|s| !(200..300).contains(&s)) {
                continue;
            }
            if !looks_like_media(&entry.url) || media_url_valid(&entry.url).is_err() {
                continue;
            }
            if looks_like_video(&entry.url) {
                best = Some(&entry.url);
                break;
            }
            if best.is_none() {
                best = Some(&entry.url);
            }
        }

        Ok(best.map(|url| MediaRef {
            kind: if looks_like_video(url) {
                MediaKind::Video
            } else {
                MediaKind::Image
            },
            url: url.to_string(),
            story_ref: None,
        }))
    }
}

/// Feed fetch performed from inside the page's script context. Same request
/// as the direct API strategy, but carrying the page's own session, which
/// the platform trusts more than a bare client.
pub struct ScriptFeedFetch {
    escalation: Arc<dyn BrowserEscalation>,
}

impl ScriptFeedFetch {
    pub fn new(escalation: Arc<dyn BrowserEscalation>) -> Self {
        Self { escalation }
    }
}

#[async_trait]
impl Strategy<FeedPageQuery, FeedPage> for ScriptFeedFetch {
    fn name(&self) -> &'static str {
        "script_feed_fetch"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    async fn attempt(&self, query: &FeedPageQuery) -> Result<Option<FeedPage>> {
        let mut request = ApiRequest::get(Endpoint::FeedTimeline);
        if let Some(cursor) = &query.cursor {
            request = request.with_query("max_id", cursor.clone());
        }
        let response = self.escalation.fetch(&request).await?;
        if !response.is_success() {
            return Ok(None);
        }
        let Some(body) = response.body else {
            return Ok(None);
        };
        let parsed: FeedPagePayload = payload::parse(&body, "feed_timeline")?;
        Ok(Some(ApiFeedPage::page_from(parsed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_driver::{NetworkEntry, ScriptedDriver};

    fn entry(url: &str, status: Option<u16>) -> NetworkEntry {
        NetworkEntry {
            url: url.to_string(),
            status,
            body: None,
        }
    }

    #[tokio::test]
    async fn test_prefers_recent_video_over_images() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_network(vec![
            entry("https://cdn.example.com/thumb_a.jpg", Some(200)),
            entry("https://cdn.example.com/story_clip.mp4?sig=9", Some(200)),
            entry("https://cdn.example.com/thumb_b.jpg", Some(200)),
        ]);

        let scan = NetworkLogScan::new(driver);
        let query = StoryMediaQuery {
            owner: "alpha".into(),
            item_hint: None,
        };
        let found = scan.attempt(&query).await.unwrap().unwrap();
        assert_eq!(found.url, "https://cdn.example.com/story_clip.mp4?sig=9");
        assert_eq!(found.kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn test_skips_failed_and_placeholder_responses() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_network(vec![
            entry("https://cdn.example.com/default_avatar.png", Some(200)),
            entry("https://cdn.example.com/real.jpg", Some(403)),
            entry("https://i.example-platform.com/api/v1/feed/", Some(200)),
        ]);

        let scan = NetworkLogScan::new(driver);
        let query = StoryMediaQuery {
            owner: "alpha".into(),
            item_hint: None,
        };
        assert!(scan.attempt(&query).await.unwrap().is_none());
    }
}
