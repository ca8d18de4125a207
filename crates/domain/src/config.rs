//! Configuration tree for the ServiceLine core.
//!
//! Loaded from TOML with env-var overrides in the binary; every field
//! has a serde default so a partial file (or none at all) still yields
//! a runnable config. `validate()` reports issues with severities
//! instead of panicking so the CLI can print all of them at once.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the dispatch backend (lookups, bookings, callbacks).
    #[serde(default)]
    pub base_url: String,
    /// Env var holding the bearer token sent on every backend call.
    #[serde(default = "d_backend_token_env")]
    pub auth_token_env: String,
    #[serde(default = "d_10000u")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token_env: d_backend_token_env(),
            timeout_ms: d_10000u(),
            max_retries: d_2(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook receiver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Base URL of the dashboard webhook receiver.
    #[serde(default)]
    pub base_url: String,
    /// Env var holding the shared HMAC secret for `X-Webhook-Signature`.
    #[serde(default = "d_webhook_secret_env")]
    pub secret_env: String,
    #[serde(default = "d_10000u")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            secret_env: d_webhook_secret_env(),
            timeout_ms: d_10000u(),
            max_retries: d_2(),
        }
    }
}

impl WebhookConfig {
    /// Resolve the signing secret from the configured env var.
    pub fn secret(&self) -> Option<String> {
        std::env::var(&self.secret_env).ok().filter(|s| !s.is_empty())
    }

    /// Heuristic used for the startup warning: anything that is not
    /// https is assumed to be a staging or local receiver.
    pub fn is_production_url(&self) -> bool {
        self.base_url.starts_with("https://") && !self.base_url.contains("localhost")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM (extraction + classification only; the conversational model is
// wired by the pipeline framework outside this core)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions base URL.
    #[serde(default = "d_llm_base_url")]
    pub base_url: String,
    /// Env var holding the API key.
    #[serde(default = "d_llm_key_env")]
    pub api_key_env: String,
    /// Model used for conversational generation (passed through to the
    /// pipeline framework; the core never calls it directly).
    #[serde(default = "d_primary_model")]
    pub primary_model: String,
    /// Model used for field extraction and post-call classification.
    #[serde(default = "d_extraction_model")]
    pub extraction_model: String,
    #[serde(default = "d_20000u")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_base_url(),
            api_key_env: d_llm_key_env(),
            primary_model: d_primary_model(),
            extraction_model: d_extraction_model(),
            timeout_ms: d_20000u(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// IANA timezone used to resolve spoken booking times.
    #[serde(default = "d_timezone")]
    pub timezone: String,
    /// Allowed ZIP prefixes for the service area.
    #[serde(default = "d_service_area_prefixes")]
    pub service_area_prefixes: Vec<String>,
    /// Hard ceiling on caller turns per call.
    #[serde(default = "d_30")]
    pub max_turns_per_call: u32,
    /// Ceiling on exchanges within a single state.
    #[serde(default = "d_5")]
    pub max_turns_per_state: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            timezone: d_timezone(),
            service_area_prefixes: d_service_area_prefixes(),
            max_turns_per_call: d_30(),
            max_turns_per_state: d_5(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline timing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Post-tool debounce window in seconds.
    #[serde(default = "d_1_5")]
    pub buffer_debounce_s: f64,
    /// Hard cap on buffer mode regardless of fresh fragments.
    #[serde(default = "d_5_0")]
    pub buffer_max_s: f64,
    /// Delay before an ordinary goodbye ends the call.
    #[serde(default = "d_3_0")]
    pub end_delay_s: f64,
    /// Delay before a terminal-response goodbye ends the call.
    #[serde(default = "d_4_0")]
    pub terminal_end_delay_s: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_debounce_s: d_1_5(),
            buffer_max_s: d_5_0(),
            end_delay_s: d_3_0(),
            terminal_end_delay_s: d_4_0(),
        }
    }
}

// ── serde default helpers ─────────────────────────────────────────

fn d_backend_token_env() -> String {
    "SL_BACKEND_TOKEN".into()
}
fn d_webhook_secret_env() -> String {
    "SL_WEBHOOK_SECRET".into()
}
fn d_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_llm_key_env() -> String {
    "SL_LLM_API_KEY".into()
}
fn d_primary_model() -> String {
    "gpt-4o".into()
}
fn d_extraction_model() -> String {
    "gpt-4o-mini".into()
}
fn d_timezone() -> String {
    "America/Chicago".into()
}
fn d_service_area_prefixes() -> Vec<String> {
    vec!["787".into()]
}
fn d_10000u() -> u64 {
    10_000
}
fn d_20000u() -> u64 {
    20_000
}
fn d_2() -> u32 {
    2
}
fn d_5() -> u32 {
    5
}
fn d_30() -> u32 {
    30
}
fn d_1_5() -> f64 {
    1.5
}
fn d_5_0() -> f64 {
    5.0
}
fn d_3_0() -> f64 {
    3.0
}
fn d_4_0() -> f64 {
    4.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (field, url) in [
            ("backend.base_url", &self.backend.base_url),
            ("webhook.base_url", &self.webhook.base_url),
            ("llm.base_url", &self.llm.base_url),
        ] {
            if url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            } else if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: format!("must start with http:// or https:// (got \"{url}\")"),
                });
            }
        }

        if !self.webhook.base_url.is_empty() && !self.webhook.is_production_url() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "webhook.base_url".into(),
                message: format!(
                    "\"{}\" does not look like the production receiver",
                    self.webhook.base_url
                ),
            });
        }

        if !timezone_name_plausible(&self.flow.timezone) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "flow.timezone".into(),
                message: format!("unknown IANA timezone \"{}\"", self.flow.timezone),
            });
        }

        if self.flow.service_area_prefixes.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "flow.service_area_prefixes".into(),
                message: "empty prefix set puts every caller out of area".into(),
            });
        }

        for (field, value) in [
            ("flow.max_turns_per_call", self.flow.max_turns_per_call),
            ("flow.max_turns_per_state", self.flow.max_turns_per_state),
        ] {
            if value == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if self.pipeline.buffer_max_s < self.pipeline.buffer_debounce_s {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pipeline.buffer_max_s".into(),
                message: "hard cap must be at least the debounce window".into(),
            });
        }

        errors
    }
}

/// Minimal timezone-name check without pulling chrono-tz into this
/// crate: the flow crate does the real parse; here we only gate on the
/// shape of the name.
fn timezone_name_plausible(name: &str) -> bool {
    (!name.is_empty() && name.contains('/')) || name == "UTC"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.flow.timezone, "America/Chicago");
        assert_eq!(c.flow.service_area_prefixes, vec!["787".to_string()]);
        assert_eq!(c.flow.max_turns_per_call, 30);
        assert_eq!(c.flow.max_turns_per_state, 5);
        assert!((c.pipeline.buffer_debounce_s - 1.5).abs() < f64::EPSILON);
        assert!((c.pipeline.buffer_max_s - 5.0).abs() < f64::EPSILON);
        assert!((c.pipeline.end_delay_s - 3.0).abs() < f64::EPSILON);
        assert!((c.pipeline.terminal_end_delay_s - 4.0).abs() < f64::EPSILON);
        assert_eq!(c.backend.timeout_ms, 10_000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str(
            r#"
            [backend]
            base_url = "https://dispatch.example.com"

            [flow]
            service_area_prefixes = ["787", "786"]
            "#,
        )
        .unwrap();
        assert_eq!(c.backend.base_url, "https://dispatch.example.com");
        assert_eq!(c.backend.max_retries, 2);
        assert_eq!(c.flow.service_area_prefixes.len(), 2);
        assert_eq!(c.flow.timezone, "America/Chicago");
    }

    #[test]
    fn validate_flags_empty_urls() {
        let issues = Config::default().validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "backend.base_url" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn validate_warns_on_non_production_webhook() {
        let mut c = Config::default();
        c.backend.base_url = "https://dispatch.example.com".into();
        c.webhook.base_url = "http://localhost:8080".into();
        let issues = c.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "webhook.base_url" && i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn validate_rejects_inverted_buffer_windows() {
        let mut c = Config::default();
        c.pipeline.buffer_max_s = 1.0;
        let issues = c.validate();
        assert!(issues.iter().any(|i| i.field == "pipeline.buffer_max_s"));
    }
}
