//! # strand-flow
//!
//! The engine's navigation loops and per-item pipeline. A [`CarouselWalker`]
//! traverses a sequential surface under hard safety bounds; a [`FeedWalker`]
//! pages through the feed iteratively with cursor persistence; a
//! [`DeliveryPipeline`] runs each item through the fixed skip ladder and the
//! delivery side effects. [`Workflows`] ties the loops to browser sessions
//! and the schedule.

mod carousel;
mod feed;
mod markers;
mod pipeline;
mod reply;
mod story;
mod workflow;

pub use carousel::{Carousel, CarouselWalker, ItemProcessor, ItemView};
pub use feed::FeedWalker;
pub use markers::{has_external_attribution, is_promotional};
pub use pipeline::{DeliveryPipeline, ScopePolicy};
pub use reply::{ReplyContext, ReplyGenerator, TemplateReply};
pub use story::StoryCarousel;
pub use workflow::{SessionFactory, StoreCapabilityCache, Workflows};
