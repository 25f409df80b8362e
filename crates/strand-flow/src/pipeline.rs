use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use strand_config::PolicyConfig;
use strand_core::{
    AccountId, CapabilityState, Channel, Confidence, ItemKey, Outcome, Result, SkipReason,
    StrandError,
};
use strand_gateway::{ApiRequest, Endpoint, FailureReason, RequestGateway};
use strand_resolve::{MediaRef, ResolutionChain, StoryMediaQuery};
use strand_state::{ContentRecord, Gate, StateStore};

use crate::carousel::{ItemProcessor, ItemView};
use crate::markers;
use crate::reply::{ReplyContext, ReplyGenerator};

/// Which owners the engine may interact with. An empty list means every
/// resolvable owner is in scope.
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    allowed: HashSet<String>,
}

impl ScopePolicy {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn in_scope(&self, owner: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(owner)
    }
}

/// The fixed per-item pipeline: identity, scope, gate, resolution, marker
/// checks, duplicate check, then the delivery side effects. Every early exit
/// is a typed skip, recorded in the outcome log.
pub struct DeliveryPipeline {
    account: AccountId,
    workflow: &'static str,
    channel: Channel,
    gateway: Arc<RequestGateway>,
    /// Chain used to resolve story media. `None` for surfaces whose items
    /// already carry their content (the feed).
    media_chain: Option<ResolutionChain<StoryMediaQuery, MediaRef>>,
    store: Arc<StateStore>,
    reply: Arc<dyn ReplyGenerator>,
    policy: PolicyConfig,
    scope: ScopePolicy,
}

impl DeliveryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account: impl Into<AccountId>,
        workflow: &'static str,
        channel: Channel,
        gateway: Arc<RequestGateway>,
        media_chain: Option<ResolutionChain<StoryMediaQuery, MediaRef>>,
        store: Arc<StateStore>,
        reply: Arc<dyn ReplyGenerator>,
        policy: PolicyConfig,
        scope: ScopePolicy,
    ) -> Self {
        Self {
            account: account.into(),
            workflow,
            channel,
            gateway,
            media_chain,
            store,
            reply,
            policy,
            scope,
        }
    }

    fn record(&self, key: &ItemKey, outcome: &Outcome) {
        if let Err(e) = self
            .store
            .record_outcome(&self.account, self.workflow, key, outcome)
        {
            warn!(key = %key, error = %e, "failed to record outcome");
        }
    }

    /// Resolve the item's content: through the media chain when one is
    /// configured, else from what the surface already provided.
    async fn resolve_content(
        &self,
        owner: &str,
        view: &ItemView,
    ) -> Result<Option<(Option<MediaRef>, Confidence)>> {
        match &self.media_chain {
            Some(chain) => {
                let query = StoryMediaQuery {
                    owner: owner.to_string(),
                    item_hint: view.item_id.clone(),
                };
                match chain.resolve(&query).await {
                    Ok(result) => Ok(Some((Some(result.value), result.confidence))),
                    Err(StrandError::Unresolved { reasons }) => {
                        debug!(owner, reasons = reasons.len(), "content unresolved");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                if view.canonical_url.is_none() && view.media_hint.is_none() {
                    return Ok(None);
                }
                Ok(Some((None, view.source_confidence)))
            }
        }
    }

    fn delivery_request(&self, view: &ItemView, owner: &str, text: &str) -> ApiRequest {
        match self.channel {
            Channel::StoryReply => {
                let mut request = ApiRequest::post(Endpoint::StoryReplySend)
                    .with_form("recipient_users", format!("[[\"{owner}\"]]"))
                    .with_form("text", text);
                if let Some(item) = &view.item_id {
                    request = request.with_form("reel_id", item.clone());
                }
                request
            }
            Channel::Message => ApiRequest::post(Endpoint::MessageSend)
                .with_form("recipient_users", format!("[[\"{owner}\"]]"))
                .with_form("action", "send_item")
                .with_form("text", text),
        }
    }

    /// Mark the owner unavailable for the configured window after a failed
    /// send. A 403 is a hard refusal and earns the long window.
    fn mark_send_failure(&self, owner: &str, status: u16) {
        let window_secs = if status == 403 {
            self.policy.forbidden_retry_window_secs
        } else {
            self.policy.transient_retry_window_secs
        };
        let until = self.store_now() + Duration::seconds(window_secs as i64);
        if let Err(e) = self.store.mark(
            &owner.to_string(),
            self.channel,
            CapabilityState::Unavailable,
            Some(&format!("send failed with status {status}")),
            Some(until),
        ) {
            warn!(owner, error = %e, "failed to persist send failure");
        }
    }

    fn store_now(&self) -> chrono::DateTime<chrono::Utc> {
        self.gateway.clock().now()
    }

    async fn run(&self, view: &ItemView, key: &ItemKey) -> Result<Outcome> {
        // 1. Identity.
        let Some(owner) = view.owner.as_deref().filter(|o| !o.is_empty()) else {
            return Ok(Outcome::Skip(SkipReason::IdentityUnresolved));
        };

        // 2. Scope. Out-of-scope owners never consume a retry window.
        if !self.scope.in_scope(owner) {
            return Ok(Outcome::Skip(SkipReason::OutOfScope));
        }

        // 3. Retry-window gate.
        if let Gate::Skip { state, until } = self.store.gate(&owner.to_string(), self.channel)? {
            debug!(owner, state = %state, %until, "retry window active");
            return Ok(Outcome::Skip(SkipReason::RetryWindowActive));
        }

        // 4. Content resolution.
        let Some((media, confidence)) = self.resolve_content(owner, view).await? else {
            return Ok(Outcome::Skip(SkipReason::ContentUnresolved));
        };

        // 5. Marker checks, acted on only for high-confidence sources.
        if confidence == Confidence::High {
            let text = view.title.as_deref().unwrap_or("");
            if view.sponsored || markers::is_promotional(text) {
                return Ok(Outcome::Skip(SkipReason::Promotional));
            }
            if view.attribution.is_some() || markers::has_external_attribution(text) {
                return Ok(Outcome::Skip(SkipReason::ExternalAttribution));
            }
        }

        // 6. Duplicate check against the bounded response window.
        let signature = key.as_string();
        if self.store.is_recent_duplicate(
            view.item_id.as_deref(),
            view.canonical_url.as_deref(),
            Some(&signature),
            self.policy.duplicate_window,
        )? {
            return Ok(Outcome::Skip(SkipReason::Duplicate));
        }

        // 7. Side effects: compose, deliver, then persist and record. The
        // content record is written only for an answered item, so a failed
        // delivery never feeds the duplicate check and the item is retried
        // once its window elapses.
        let media_url = media.as_ref().map(|m| m.url.clone());
        let text = self
            .reply
            .generate(&ReplyContext {
                owner,
                caption: view.title.as_deref(),
                media_url: media_url.as_deref(),
                channel: self.channel,
            })
            .await?;

        let request = self.delivery_request(view, owner, &text);
        let response = self.gateway.execute(Some(owner), request).await;
        if response.ok {
            info!(owner, key = %key, via_browser = response.via_browser, "delivered");
            self.store.persist_content(&ContentRecord {
                owner: owner.to_string(),
                item_id: view.item_id.clone(),
                canonical_url: view.canonical_url.clone(),
                signature: Some(signature),
                media_url,
                caption: view.title.clone(),
            })?;
            self.store
                .mark(&owner.to_string(), self.channel, CapabilityState::Available, None, None)?;
            return Ok(Outcome::Done);
        }

        if response.reason == Some(FailureReason::AuthExpired) {
            return Err(StrandError::AuthExpired("delivery rejected the session".into()));
        }
        self.mark_send_failure(owner, response.status);
        Ok(Outcome::Failed(format!(
            "delivery failed with status {}",
            response.status
        )))
    }
}

#[async_trait]
impl ItemProcessor for DeliveryPipeline {
    async fn process(&self, view: &ItemView, key: &ItemKey) -> Result<Outcome> {
        let outcome = self.run(view, key).await?;
        self.record(key, &outcome);
        Ok(outcome)
    }
}
