use async_trait::async_trait;
use rand::prelude::IndexedRandom;

use strand_core::{Channel, Result, StrandError};

/// What the generator gets to look at when composing a reply.
#[derive(Debug, Clone)]
pub struct ReplyContext<'a> {
    pub owner: &'a str,
    pub caption: Option<&'a str>,
    pub media_url: Option<&'a str>,
    pub channel: Channel,
}

/// Produces the delivery text. The engine treats this as a black box.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, context: &ReplyContext<'_>) -> Result<String>;
}

/// Default generator: a uniform pick from a fixed template list.
pub struct TemplateReply {
    templates: Vec<String>,
}

impl TemplateReply {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }
}

impl Default for TemplateReply {
    fn default() -> Self {
        Self::new(
            ["Love this!", "This is great", "Amazing shot", "So good!"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

#[async_trait]
impl ReplyGenerator for TemplateReply {
    async fn generate(&self, _context: &ReplyContext<'_>) -> Result<String> {
        self.templates
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| StrandError::Config("reply template list is empty".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_reply_draws_from_the_list() {
        let generator = TemplateReply::new(vec!["only one".into()]);
        let context = ReplyContext {
            owner: "alpha",
            caption: None,
            media_url: None,
            channel: Channel::StoryReply,
        };
        assert_eq!(generator.generate(&context).await.unwrap(), "only one");
    }

    #[tokio::test]
    async fn test_empty_template_list_is_an_error() {
        let generator = TemplateReply::new(vec![]);
        let context = ReplyContext {
            owner: "alpha",
            caption: None,
            media_url: None,
            channel: Channel::Message,
        };
        assert!(generator.generate(&context).await.is_err());
    }
}
