//! The two non-conversational LLM duties of the core: background field
//! extraction during the call and one-shot classification after it.
//!
//! The conversational model lives downstream of the frame processor in
//! the pipeline framework and is out of scope here; this crate only
//! speaks JSON-mode chat completions against an OpenAI-compatible
//! endpoint, behind a trait so tests can run without a network.

pub mod classifier;
pub mod client;
pub mod extractor;

use async_trait::async_trait;

use sl_domain::error::Result;

/// A JSON-mode completion provider.
///
/// One method is all extraction and classification need: send a system
/// prompt and a user payload, get a JSON object back.
#[async_trait]
pub trait JsonCompleter: Send + Sync {
    async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value>;
}

pub use classifier::{classify_call, Classification};
pub use client::OpenAiCompatClient;
pub use extractor::{spawn_extraction, ExtractedFields};
