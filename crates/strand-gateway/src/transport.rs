//! Direct HTTP transport for the private JSON API.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::types::{ApiRequest, ApiResponse, Method};
use strand_config::AccountConfig;
use strand_core::StrandError;

/// Session authentication material reconstructed into request headers:
/// session cookie, app-identifier, CSRF token, and the optional rotating
/// "claim" header.
#[derive(Debug, Clone)]
pub struct SessionHeaders {
    pub cookie: String,
    pub app_id: String,
    pub csrf_token: String,
    pub claim: Option<String>,
}

impl SessionHeaders {
    pub fn from_account(account: &AccountConfig) -> Self {
        Self {
            cookie: account.session_cookie.clone(),
            app_id: account.app_id.clone(),
            csrf_token: account.csrf_token.clone(),
            claim: account.claim.clone(),
        }
    }
}

/// Seam between the gateway and the network. Implementations must map any
/// no-response condition (timeout, connect failure) to an error; the gateway
/// treats transport errors as status-0 network failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse>;
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    client: reqwest::Client,
    api_base: String,
    headers: SessionHeaders,
}

impl HttpTransport {
    pub fn new(api_base: impl Into<String>, headers: SessionHeaders) -> strand_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StrandError::TransientNetwork(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            headers,
        })
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}/{}", self.api_base, request.endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse> {
        let url = self.url_for(request);
        debug!(endpoint = %request.endpoint, method = request.method.as_str(), "direct API call");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.query),
            Method::Post => self.client.post(&url).query(&request.query).form(&request.form),
        };

        builder = builder
            .header("cookie", &self.headers.cookie)
            .header("x-ig-app-id", &self.headers.app_id)
            .header("x-csrftoken", &self.headers.csrf_token);
        if let Some(claim) = &self.headers.claim {
            builder = builder.header("x-ig-www-claim", claim);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StrandError::TransientNetwork(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| StrandError::TransientNetwork(e.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).ok();

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
