//! HTTP adapter for the dispatch backend.
//!
//! Four operations behind one trait so the pipeline and tests can swap
//! in a mock. The REST implementation wraps a pooled `reqwest::Client`
//! with a fixed timeout and retry-with-backoff on transient failures.

pub mod client;

use async_trait::async_trait;
use serde::Serialize;

use sl_domain::error::Result;
use sl_domain::session::CallSession;
use sl_domain::tool::{AlertResult, BookResult, CallbackResult, LookupResult};

/// The call identity included in every backend request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct CallContext {
    pub call_id: String,
    pub phone_number: String,
}

impl CallContext {
    pub fn from_session(session: &CallSession) -> Self {
        Self {
            call_id: session.call_id.to_string(),
            phone_number: session.phone_number.clone(),
        }
    }
}

/// The dispatch backend's four operations.
///
/// All requests share one envelope shape: `{call: {...}, args: {...}}`.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn lookup_caller(&self, call: &CallContext, phone: &str) -> Result<LookupResult>;

    async fn book_service(
        &self,
        call: &CallContext,
        args: serde_json::Value,
    ) -> Result<BookResult>;

    async fn create_callback(
        &self,
        call: &CallContext,
        args: serde_json::Value,
    ) -> Result<CallbackResult>;

    async fn send_sales_lead_alert(
        &self,
        call: &CallContext,
        payload: serde_json::Value,
    ) -> Result<AlertResult>;
}

pub use client::RestToolBackend;
