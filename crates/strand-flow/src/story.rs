//! DOM-backed carousel over the story viewer.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use strand_config::NavigationConfig;
use strand_core::{Confidence, Result};
use strand_driver::Driver;

use crate::carousel::{Carousel, ItemView};

const STORIES_URL: &str = "https://www.example-platform.com/stories/";

/// Reads the story viewer's state: the owner/item from the URL path, the
/// caption overlay, and the media element in view.
const CURRENT_STORY_SCRIPT: &str = r#"
(() => {
  const surface = document.querySelector('section video, section img, div[role="dialog"] video, div[role="dialog"] img');
  if (!surface) return null;
  const parts = location.pathname.split('/').filter(Boolean);
  const owner = parts[0] === 'stories' ? parts[1] || null : null;
  const item_id = parts[0] === 'stories' ? parts[2] || null : null;
  const title = document.querySelector('section h1, [data-caption]')?.textContent?.trim() || null;
  const media = surface.currentSrc || surface.src || null;
  return { owner, item_id, title, media };
})()
"#;

/// Clicks the next-story control, falling back to a keyboard event.
const ADVANCE_SCRIPT: &str = r#"
(() => {
  const next = document.querySelector('button[aria-label="Next"], [aria-label="Next story"]');
  if (next) { next.click(); return true; }
  document.dispatchEvent(new KeyboardEvent('keydown', { key: 'ArrowRight', bubbles: true }));
  return true;
})()
"#;

#[derive(Debug, Deserialize)]
struct StoryView {
    owner: Option<String>,
    item_id: Option<String>,
    title: Option<String>,
    media: Option<String>,
}

pub struct StoryCarousel {
    driver: Arc<dyn Driver>,
    settle: Duration,
}

impl StoryCarousel {
    /// Navigate to the story surface and hold it.
    pub async fn open(driver: Arc<dyn Driver>, config: &NavigationConfig) -> Result<Self> {
        driver.navigate(STORIES_URL).await?;
        Ok(Self {
            driver,
            settle: Duration::from_millis(config.settle_ms),
        })
    }
}

#[async_trait]
impl Carousel for StoryCarousel {
    async fn current(&self) -> Result<Option<ItemView>> {
        let value = self.driver.evaluate(CURRENT_STORY_SCRIPT).await?;
        if value.is_null() {
            return Ok(None);
        }
        let view: StoryView = serde_json::from_value(value)?;
        Ok(Some(ItemView {
            owner: view.owner,
            item_id: view.item_id,
            title: view.title,
            media_hint: view.media,
            source_confidence: Confidence::Low,
            ..ItemView::default()
        }))
    }

    async fn advance(&self) -> Result<()> {
        self.driver.evaluate(ADVANCE_SCRIPT).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}
