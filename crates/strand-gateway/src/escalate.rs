//! Browser escalation: when direct calls are exhausted, replay the same
//! logical request through the page's own script context. The page's ambient
//! cookies authenticate the call; the CSRF token is read from in-page state
//! rather than forwarded from the direct transport.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::types::{ApiRequest, ApiResponse, Method};
use strand_core::StrandError;
use strand_driver::Driver;

/// Capability to issue the same logical API request from inside the browser.
#[async_trait]
pub trait BrowserEscalation: Send + Sync {
    async fn fetch(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse>;
}

/// Escalation over the driver's script-execution context.
pub struct ScriptFetch {
    driver: Arc<dyn Driver>,
    api_base: String,
    app_id: String,
}

impl ScriptFetch {
    pub fn new(driver: Arc<dyn Driver>, api_base: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            driver,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
        }
    }

    fn build_script(&self, request: &ApiRequest) -> strand_core::Result<String> {
        let mut url = format!("{}/{}", self.api_base, request.endpoint.path());
        if !request.query.is_empty() {
            let qs = request
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", url_escape(k), url_escape(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&qs);
        }

        let body_expr = if request.method == Method::Post {
            let form = request
                .form
                .iter()
                .map(|(k, v)| format!("{}={}", url_escape(k), url_escape(v)))
                .collect::<Vec<_>>()
                .join("&");
            format!("body: {},", serde_json::to_string(&form)?)
        } else {
            String::new()
        };

        Ok(format!(
            r#"
            (async () => {{
                const csrf = (document.cookie.match(/csrftoken=([^;]+)/) || [])[1] || '';
                const resp = await fetch({url}, {{
                    method: '{method}',
                    credentials: 'include',
                    headers: {{
                        'x-csrftoken': csrf,
                        'x-ig-app-id': {app_id},
                        'content-type': 'application/x-www-form-urlencoded',
                    }},
                    {body_expr}
                }});
                const text = await resp.text();
                return {{ status: resp.status, body: text }};
            }})()
            "#,
            url = serde_json::to_string(&url)?,
            method = request.method.as_str(),
            app_id = serde_json::to_string(&self.app_id)?,
            body_expr = body_expr,
        ))
    }
}

fn url_escape(s: &str) -> String {
    // Unreserved characters pass through; everything else is percent-encoded.
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl BrowserEscalation for ScriptFetch {
    async fn fetch(&self, request: &ApiRequest) -> strand_core::Result<ApiResponse> {
        info!(endpoint = %request.endpoint, "escalating request to in-page fetch");
        let script = self.build_script(request)?;
        let value = self.driver.evaluate_async(&script).await?;

        let status = value["status"]
            .as_u64()
            .ok_or_else(|| StrandError::ParseFailure("in-page fetch returned no status".into()))?
            as u16;
        let body = value["body"]
            .as_str()
            .and_then(|text| serde_json::from_str::<Value>(text).ok());

        Ok(ApiResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Endpoint;

    #[test]
    fn test_url_escape() {
        assert_eq!(url_escape("abc-123_~."), "abc-123_~.");
        assert_eq!(url_escape("a b&c"), "a%20b%26c");
    }

    #[tokio::test]
    async fn test_script_fetch_parses_result() {
        let driver = Arc::new(strand_driver::ScriptedDriver::new());
        driver.push_eval(Ok(serde_json::json!({
            "status": 200,
            "body": "{\"items\": []}",
        })));

        let fetcher = ScriptFetch::new(driver.clone(), "https://x/api/v1", "app-1");
        let req = ApiRequest::get(Endpoint::FeedTimeline).with_query("max_id", "abc");
        let resp = fetcher.fetch(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.unwrap()["items"].is_array());
        assert_eq!(driver.call_count("evaluate_async"), 1);
    }
}
