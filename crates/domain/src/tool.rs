//! Tool names, call records, and backend result shapes.
//!
//! Every external side effect the state machine can request goes through
//! one of these. Result structs mirror the backend's wire contracts; field
//! defaults keep a sparse response from failing deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of tools the flow can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    LookupCaller,
    BookService,
    CreateCallback,
    SendSalesLeadAlert,
    /// Not a backend call: instructs the pipeline to terminate the call.
    EndCall,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::LookupCaller => "lookup_caller",
            ToolName::BookService => "book_service",
            ToolName::CreateCallback => "create_callback",
            ToolName::SendSalesLeadAlert => "send_sales_lead_alert",
            ToolName::EndCall => "end_call",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by a state handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: ToolName,
    pub arguments: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A callback the office previously promised this caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackPromise {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub issue: String,
}

/// Response of `POST /lookup-caller`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupResult {
    #[serde(default)]
    pub known: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zip_code: String,
    /// Passthrough: stored on the session, never shown to the LLM.
    #[serde(default)]
    pub service_address: String,
    #[serde(default)]
    pub has_appointment: bool,
    #[serde(default)]
    pub appointment_date: String,
    #[serde(default)]
    pub appointment_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_promise: Option<CallbackPromise>,
}

/// Response of `POST /book-service`.
///
/// `booking_confirmed` is canonical; `booked` is an accepted alias.
/// Producers should emit both, so ingest takes the OR of the two.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookResult {
    #[serde(default)]
    pub booking_confirmed: bool,
    #[serde(default)]
    pub booked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
    #[serde(default, rename = "confirmationMessage")]
    pub confirmation_message: String,
    #[serde(default, rename = "appointmentId", skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BookResult {
    /// Canonical confirmation flag: either wire key counts.
    pub fn confirmed(&self) -> bool {
        self.booking_confirmed || self.booked
    }
}

/// Response of `POST /create-callback`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /send-sales-lead-alert`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertResult {
    #[serde(default)]
    pub success: bool,
}

/// A completed tool round-trip, as recorded on the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOutcome {
    LookupCaller(LookupResult),
    BookService(BookResult),
    CreateCallback(CallbackResult),
    SendSalesLeadAlert(AlertResult),
}
