//! Strategies that read the rendered page. Last resorts: anything visible to
//! the user is visible to us, at the cost of precision.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use strand_core::{CapabilityState, Confidence, Result};
use strand_driver::Driver;

use crate::chain::Strategy;
use crate::query::{
    CapabilityVerdict, FeedItem, FeedPage, FeedPageQuery, MediaKind, MediaRef,
    MessageabilityQuery, StoryMediaQuery,
};

// ── Visible story media ────────────────────────────────────────

/// Returns `{url, video}` for the media element in view, or null.
const VISIBLE_MEDIA_SCRIPT: &str = r#"
(() => {
  const video = document.querySelector('section video, div[role="dialog"] video');
  if (video && video.currentSrc) return { url: video.currentSrc, video: true };
  if (video && video.src) return { url: video.src, video: true };
  let best = null;
  for (const img of document.querySelectorAll('section img, div[role="dialog"] img')) {
    const area = img.naturalWidth * img.naturalHeight;
    if (img.src && (!best || area > best.area)) best = { url: img.src, area };
  }
  return best ? { url: best.url, video: false } : null;
})()
"#;

#[derive(Debug, Deserialize)]
struct VisibleMedia {
    url: String,
    #[serde(default)]
    video: bool,
}

pub struct DomMediaProbe {
    driver: Arc<dyn Driver>,
}

impl DomMediaProbe {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Strategy<StoryMediaQuery, MediaRef> for DomMediaProbe {
    fn name(&self) -> &'static str {
        "dom_media_probe"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Low
    }

    async fn attempt(&self, _query: &StoryMediaQuery) -> Result<Option<MediaRef>> {
        let value = self.driver.evaluate(VISIBLE_MEDIA_SCRIPT).await?;
        if value.is_null() {
            return Ok(None);
        }
        let found: VisibleMedia = serde_json::from_value(value)?;
        Ok(Some(MediaRef {
            url: found.url,
            kind: if found.video {
                MediaKind::Video
            } else {
                MediaKind::Image
            },
            story_ref: None,
        }))
    }
}

// ── Composer presence ──────────────────────────────────────────

const COMPOSER_SELECTOR: &str = "textarea[placeholder]";
const REACTION_BAR_SELECTOR: &str = "[aria-label*='reaction']";
const STORY_SURFACE_SELECTOR: &str = "section video, section img";

/// Infers messageability from the story UI itself: a reply composer means the
/// channel is open, a bare reaction strip means reactions only, and a story
/// surface with neither means the target closed the channel.
pub struct ComposerProbe {
    driver: Arc<dyn Driver>,
}

impl ComposerProbe {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Strategy<MessageabilityQuery, CapabilityVerdict> for ComposerProbe {
    fn name(&self) -> &'static str {
        "composer_probe"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    async fn attempt(&self, _query: &MessageabilityQuery) -> Result<Option<CapabilityVerdict>> {
        if !self.driver.find_elements(COMPOSER_SELECTOR).await?.is_empty() {
            return Ok(Some(CapabilityVerdict::new(CapabilityState::Available)));
        }
        if !self
            .driver
            .find_elements(REACTION_BAR_SELECTOR)
            .await?
            .is_empty()
        {
            return Ok(Some(CapabilityVerdict::new(CapabilityState::ReactionOnly)));
        }
        // Only decide Unavailable when we can see we are actually on a story.
        if !self
            .driver
            .find_elements(STORY_SURFACE_SELECTOR)
            .await?
            .is_empty()
        {
            return Ok(Some(CapabilityVerdict::new(CapabilityState::Unavailable)));
        }
        Ok(None)
    }
}

// ── Feed link scrape ───────────────────────────────────────────

/// Maps visible feed articles to `{href, owner, caption, sponsored}`.
const FEED_SCRAPE_SCRIPT: &str = r#"
(() => {
  const out = [];
  for (const article of document.querySelectorAll('article')) {
    const link = article.querySelector('a[href*="/p/"]');
    if (!link) continue;
    const owner = article.querySelector('header a')?.textContent?.trim() || '';
    const caption = article.querySelector('h1, [data-caption]')?.textContent || null;
    const sponsored = /sponsored/i.test(article.textContent || '');
    out.push({ href: link.href, owner, caption, sponsored });
  }
  return out;
})()
"#;

#[derive(Debug, Deserialize)]
struct ScrapedArticle {
    href: String,
    #[serde(default)]
    owner: String,
    caption: Option<String>,
    #[serde(default)]
    sponsored: bool,
}

pub struct DomFeedScrape {
    driver: Arc<dyn Driver>,
}

impl DomFeedScrape {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Strategy<FeedPageQuery, FeedPage> for DomFeedScrape {
    fn name(&self) -> &'static str {
        "dom_feed_scrape"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Low
    }

    async fn attempt(&self, _query: &FeedPageQuery) -> Result<Option<FeedPage>> {
        let value = self.driver.evaluate(FEED_SCRAPE_SCRIPT).await?;
        if value.is_null() {
            return Ok(None);
        }
        let articles: Vec<ScrapedArticle> = serde_json::from_value(value)?;
        if articles.is_empty() {
            return Ok(None);
        }
        let items = articles
            .into_iter()
            .map(|a| FeedItem {
                owner: a.owner,
                item_id: None,
                canonical_url: Some(a.href),
                caption: a.caption,
                sponsored: a.sponsored,
                attribution: None,
            })
            .collect();
        // The scrape sees one viewport's worth; it cannot paginate.
        Ok(Some(FeedPage {
            items,
            next_cursor: None,
        }))
    }
}
