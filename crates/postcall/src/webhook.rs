//! Signed webhook delivery to the dashboard receiver.
//!
//! Every request carries `X-Webhook-Signature: HMAC-SHA256(body,
//! secret)` in hex. Retries are bounded; 4xx responses are permanent
//! and logged with their body so server-side validation failures are
//! debuggable from our side.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use sl_domain::config::WebhookConfig;
use sl_domain::error::{Error, Result};
use sl_domain::trace::TraceEvent;

type HmacSha256 = Hmac<Sha256>;

pub const JOBS_PATH: &str = "/webhook/jobs";
pub const CALLS_PATH: &str = "/webhook/calls";
pub const ALERTS_PATH: &str = "/webhook/emergency-alerts";

/// Hex HMAC-SHA256 of the exact body bytes.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time signature check (receiver side / tests).
pub fn verify(body: &[u8], secret: &str, signature_hex: &str) -> bool {
    let computed = sign(body, secret);
    computed.as_bytes().ct_eq(signature_hex.as_bytes()).unwrap_u8() == 1
}

/// Shared client for the three dashboard endpoints.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    base_url: String,
    secret: String,
    max_retries: u32,
}

impl WebhookClient {
    pub fn new(cfg: &WebhookConfig) -> Result<Self> {
        let secret = cfg
            .secret()
            .ok_or_else(|| Error::Config(format!("webhook secret env {} not set", cfg.secret_env)))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            secret,
            max_retries: cfg.max_retries,
        })
    }

    /// Construct directly (tests, alternate secret sources).
    pub fn with_secret(cfg: &WebhookConfig, secret: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            secret: secret.into(),
            max_retries: cfg.max_retries,
        })
    }

    /// POST a JSON payload with a signature over the exact bytes sent.
    ///
    /// Retries on 5xx and transport errors with exponential backoff; a
    /// 4xx is permanent. Emits a `TraceEvent::WebhookPost` per attempt.
    pub async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let signature = sign(&body, &self.secret);
        let url = format!("{}{}", self.base_url, path);

        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let result = self
                .http
                .post(&url)
                .header("Content-Type", "application/json")
                .header("X-Webhook-Signature", &signature)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::WebhookPost {
                        endpoint: path.to_owned(),
                        status: status.as_u16(),
                        attempt,
                    }
                    .emit();

                    if status.is_success() {
                        return Ok(());
                    }

                    let response_body = resp.text().await.unwrap_or_default();
                    tracing::error!(
                        endpoint = path,
                        status = status.as_u16(),
                        body = %response_body,
                        "webhook POST rejected"
                    );

                    let err = Error::Webhook {
                        endpoint: path.to_owned(),
                        message: format!("HTTP {}: {response_body}", status.as_u16()),
                    };
                    if status.is_client_error() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
                Err(e) => {
                    TraceEvent::WebhookPost {
                        endpoint: path.to_owned(),
                        status: 0,
                        attempt,
                    }
                    .emit();
                    last_err = Some(Error::Webhook {
                        endpoint: path.to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Webhook {
            endpoint: path.to_owned(),
            message: "all retries exhausted".into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // HMAC-SHA256("hello", key "secret"), independently computed.
        let sig = sign(b"hello", "secret");
        assert_eq!(
            sig,
            "88aab3ede8d3adf94d26ab90d3bafd4a2083070c3bcce9c014ee04a443847c0b"
        );
    }

    #[test]
    fn verify_round_trips_and_rejects_tampering() {
        let body = br#"{"call_id":"abc","booking_status":"confirmed"}"#;
        let sig = sign(body, "shared-secret");
        assert!(verify(body, "shared-secret", &sig));
        assert!(!verify(body, "shared-secret", "deadbeef"));
        assert!(!verify(b"tampered", "shared-secret", &sig));
        assert!(!verify(body, "wrong-secret", &sig));
    }

    #[test]
    fn signature_covers_exact_bytes() {
        let a = serde_json::json!({"k": 1});
        let b = serde_json::json!({"k": 2});
        let sa = sign(&serde_json::to_vec(&a).unwrap(), "s");
        let sb = sign(&serde_json::to_vec(&b).unwrap(), "s");
        assert_ne!(sa, sb);
    }
}
