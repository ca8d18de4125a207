//! REST implementation of [`ToolBackend`].
//!
//! `RestToolBackend` wraps a `reqwest::Client` and translates every
//! trait method into the corresponding HTTP call against the dispatch
//! backend, with automatic retry + exponential back-off on transient
//! (5xx / timeout) failures. 4xx responses are permanent and returned
//! immediately.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use sl_domain::config::BackendConfig;
use sl_domain::error::{Error, Result};
use sl_domain::tool::{AlertResult, BookResult, CallbackResult, LookupResult};
use sl_domain::trace::TraceEvent;

use crate::{CallContext, ToolBackend};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the dispatch backend.
///
/// Created once at process start and shared across calls; the
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestToolBackend {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
    max_retries: u32,
}

impl RestToolBackend {
    /// Build a new client from the shared [`BackendConfig`]. The bearer
    /// token is read from the configured env var once, at build time.
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let auth_token = std::env::var(&cfg.auth_token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if auth_token.is_none() {
            tracing::warn!(
                env = %cfg.auth_token_env,
                "backend auth token not set; requests go out unauthenticated"
            );
        }

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            auth_token,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let mut rb = rb.header("X-Trace-Id", &trace_id);
        if let Some(ref token) = self.auth_token {
            rb = rb.bearer_auth(token);
        }
        rb
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The shared request envelope: `{call: {...}, args: {...}}`.
    fn envelope(call: &CallContext, args: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "call": call, "args": args })
    }

    // ── retry engine ─────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient
    /// errors. Emits a `TraceEvent::ToolCall` after every attempt.
    async fn execute_with_retry(
        &self,
        call_id: &str,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let rb = self.decorate(build_request());
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    TraceEvent::ToolCall {
                        call_id: call_id.to_owned(),
                        tool: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        // 5xx is transient, retry.
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Tool {
                            tool: endpoint.to_owned(),
                            message: format!("HTTP {status}: {body}"),
                        });
                        continue;
                    }

                    if resp.status().is_client_error() {
                        // 4xx is permanent, do NOT retry.
                        let resp_status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        if resp_status == StatusCode::UNAUTHORIZED
                            || resp_status == StatusCode::FORBIDDEN
                        {
                            return Err(Error::Auth(format!(
                                "{endpoint} auth failed ({status}): {body}"
                            )));
                        }
                        return Err(Error::Tool {
                            tool: endpoint.to_owned(),
                            message: format!("HTTP {status}: {body}"),
                        });
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::ToolCall {
                        call_id: call_id.to_owned(),
                        tool: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                    // Timeouts and connection errors are transient, retry.
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Tool {
            tool: endpoint.to_owned(),
            message: "all retries exhausted".into(),
        }))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        call: &CallContext,
        path: &str,
        args: serde_json::Value,
    ) -> Result<T> {
        let url = self.url(path);
        let body = Self::envelope(call, args);
        let resp = self
            .execute_with_retry(&call.call_id, path, || self.http.post(&url).json(&body))
            .await?;

        let text = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&text).map_err(|e| Error::Tool {
            tool: path.to_owned(),
            message: format!("failed to parse response: {e}: {text}"),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl ToolBackend for RestToolBackend {
    async fn lookup_caller(&self, call: &CallContext, phone: &str) -> Result<LookupResult> {
        self.post_json(call, "/lookup-caller", serde_json::json!({ "phone": phone }))
            .await
    }

    async fn book_service(
        &self,
        call: &CallContext,
        args: serde_json::Value,
    ) -> Result<BookResult> {
        self.post_json(call, "/book-service", args).await
    }

    async fn create_callback(
        &self,
        call: &CallContext,
        args: serde_json::Value,
    ) -> Result<CallbackResult> {
        self.post_json(call, "/create-callback", args).await
    }

    async fn send_sales_lead_alert(
        &self,
        call: &CallContext,
        payload: serde_json::Value,
    ) -> Result<AlertResult> {
        self.post_json(call, "/send-sales-lead-alert", payload).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`. Timeouts become
/// `Error::Timeout` so the processor can tell them apart in logs.
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_call_identity_and_args() {
        let call = CallContext {
            call_id: "c-1".into(),
            phone_number: "+15125551234".into(),
        };
        let env = RestToolBackend::envelope(&call, serde_json::json!({ "phone": "+15125551234" }));
        assert_eq!(env["call"]["call_id"], "c-1");
        assert_eq!(env["call"]["phone_number"], "+15125551234");
        assert_eq!(env["args"]["phone"], "+15125551234");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let cfg = BackendConfig {
            base_url: "https://dispatch.example.com/".into(),
            ..BackendConfig::default()
        };
        let client = RestToolBackend::new(&cfg).unwrap();
        assert_eq!(client.url("/book-service"), "https://dispatch.example.com/book-service");
    }
}
