use serde_json::Value;
use std::collections::HashMap;

/// HTTP method for an API call. The private surface only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Spacing class for an endpoint. Inbox-like endpoints are paced harder than
/// generic reads; writes sit in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Read,
    Inbox,
    Write,
}

/// The fixed set of JSON endpoints the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Story/reel item lookup for one or more owners.
    ReelLookup,
    /// Paginated home feed.
    FeedTimeline,
    /// Profile metadata for a target.
    ProfileInfo,
    /// Inbox thread listing.
    InboxThreads,
    /// Thread-creation probe (messageability check).
    ThreadCreate,
    /// Direct message send.
    MessageSend,
    /// Story reply send.
    StoryReplySend,
    /// Comment on a feed item.
    CommentPost,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::ReelLookup => "reel_lookup",
            Endpoint::FeedTimeline => "feed_timeline",
            Endpoint::ProfileInfo => "profile_info",
            Endpoint::InboxThreads => "inbox_threads",
            Endpoint::ThreadCreate => "thread_create",
            Endpoint::MessageSend => "message_send",
            Endpoint::StoryReplySend => "story_reply_send",
            Endpoint::CommentPost => "comment_post",
        }
    }

    /// Path under the API base.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ReelLookup => "feed/reels_media/",
            Endpoint::FeedTimeline => "feed/timeline/",
            Endpoint::ProfileInfo => "users/info/",
            Endpoint::InboxThreads => "direct_v2/inbox/",
            Endpoint::ThreadCreate => "direct_v2/create_group_thread/",
            Endpoint::MessageSend => "direct_v2/threads/broadcast/text/",
            Endpoint::StoryReplySend => "direct_v2/threads/broadcast/reel_share/",
            Endpoint::CommentPost => "media/comment/",
        }
    }

    pub fn class(&self) -> EndpointClass {
        match self {
            Endpoint::ReelLookup | Endpoint::FeedTimeline | Endpoint::ProfileInfo => {
                EndpointClass::Read
            }
            Endpoint::InboxThreads | Endpoint::ThreadCreate => EndpointClass::Inbox,
            Endpoint::MessageSend | Endpoint::StoryReplySend | Endpoint::CommentPost => {
                EndpointClass::Write
            }
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One logical request against the API surface.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub method: Method,
    /// Query parameters (cursors, id lists).
    pub query: Vec<(String, String)>,
    /// Form-encoded body for POSTs. The gateway injects a client-generated
    /// `client_context` token once per logical request, so retries and the
    /// browser escalation repeat the same idempotent send.
    pub form: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: Method::Get,
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: Method::Post,
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport-level response: status, headers, parsed JSON body if any.
/// Status 0 means the request never produced an HTTP response.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }
}

/// Reason code attached to a failed [`GatewayResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A local rate-limit pause was active; no call was issued.
    PauseActive {
        pause_reason: String,
        unblock_in_secs: i64,
    },
    /// All direct attempts (and escalation, if available) failed.
    Exhausted { attempts: u32, last_status: u16 },
    /// The session is no longer authenticated; the whole workflow must stop.
    AuthExpired,
    /// The platform answered with a definitive non-retryable status.
    Upstream { status: u16 },
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::PauseActive { .. } => "pause_active",
            FailureReason::Exhausted { .. } => "exhausted",
            FailureReason::AuthExpired => "auth_expired",
            FailureReason::Upstream { .. } => "upstream",
        }
    }
}

/// Structured result of [`crate::RequestGateway::execute`]. Never an `Err`
/// for upstream conditions.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub ok: bool,
    pub status: u16,
    pub payload: Option<Value>,
    pub headers: HashMap<String, String>,
    pub reason: Option<FailureReason>,
    /// True when the payload came from the in-browser escalation path.
    pub via_browser: bool,
}

impl GatewayResponse {
    pub fn success(response: ApiResponse, via_browser: bool) -> Self {
        Self {
            ok: true,
            status: response.status,
            payload: response.body,
            headers: response.headers,
            reason: None,
            via_browser,
        }
    }

    pub fn failure(status: u16, reason: FailureReason) -> Self {
        Self {
            ok: false,
            status,
            payload: None,
            headers: HashMap::new(),
            reason: Some(reason),
            via_browser: false,
        }
    }
}
