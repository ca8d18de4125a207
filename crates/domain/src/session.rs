//! The mutable session record carried through one call.
//!
//! A plain struct with public fields. Invariants are protected by the
//! handler contracts in `sl-flow` and the frame processor, not by
//! encapsulation: the only writers are state handlers, tool-result
//! handlers, the processor's bookkeeping, and the guarded if-empty
//! assignments applied from the extraction task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;

/// Speaker role on the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

/// One message of LLM-visible conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

/// One timestamped transcript entry, annotated with the state it
/// occurred in. Tool entries additionally carry the tool name and its
/// structured result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Urgency of the caller's problem. Handlers set `Routine`/`Urgent`/
/// `Emergency`; `SameDay` and `Estimate` appear via extraction and are
/// accepted for the payload mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    #[default]
    Routine,
    Urgent,
    SameDay,
    Emergency,
    Estimate,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Routine => "routine",
            UrgencyTier::Urgent => "urgent",
            UrgencyTier::SameDay => "same_day",
            UrgencyTier::Emergency => "emergency",
            UrgencyTier::Estimate => "estimate",
        }
    }
}

/// Lead classification for the sales side of the house.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadType {
    #[default]
    Standard,
    HighTicket,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CallSession
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything known about one live call. Created when the pipeline
/// opens the call, discarded after the post-call webhooks are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    // ── Identity ─────────────────────────────────────────────────
    pub call_id: Uuid,
    pub phone_number: String,
    pub start_time: DateTime<Utc>,

    // ── Lookup outcome (written only by on_lookup_caller) ────────
    pub caller_known: bool,
    pub has_appointment: bool,
    pub appointment_date: String,
    pub appointment_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_promise: Option<crate::tool::CallbackPromise>,

    // ── Handler-owned collected fields ───────────────────────────
    // Set only by deterministic validation inside state handlers.
    // The extraction task must not write these.
    pub customer_name: String,
    pub zip_code: String,
    /// Passthrough: used by tools, never shown to the LLM.
    pub service_address: String,

    // ── Extraction-owned soft fields (written only if empty) ─────
    pub problem_description: String,
    pub equipment_type: String,
    pub problem_duration: String,
    pub preferred_time: String,

    // ── Urgency / lead ───────────────────────────────────────────
    pub urgency_tier: UrgencyTier,
    pub lead_type: LeadType,

    // ── Booking outcome ──────────────────────────────────────────
    pub booking_attempted: bool,
    pub booking_confirmed: bool,
    pub booked_time: String,
    pub confirmation_message: String,

    // ── Callback outcome ─────────────────────────────────────────
    pub callback_type: String,
    pub callback_attempted: bool,
    pub callback_created: bool,

    // ── Conversation bookkeeping ─────────────────────────────────
    pub conversation_history: Vec<ConversationEntry>,
    pub transcript_log: Vec<TranscriptEntry>,

    // ── Counters and gates ───────────────────────────────────────
    pub turn_count: u32,
    pub state_turn_count: u32,
    pub agent_has_responded: bool,
    pub terminal_reply_used: bool,
    pub confirm_extended: bool,

    // ── State ────────────────────────────────────────────────────
    pub state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_agent_state: Option<State>,

    // ── Post-call ────────────────────────────────────────────────
    pub synced_to_dashboard: bool,
}

impl CallSession {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            start_time: Utc::now(),
            caller_known: false,
            has_appointment: false,
            appointment_date: String::new(),
            appointment_time: String::new(),
            callback_promise: None,
            customer_name: String::new(),
            zip_code: String::new(),
            service_address: String::new(),
            problem_description: String::new(),
            equipment_type: String::new(),
            problem_duration: String::new(),
            preferred_time: String::new(),
            urgency_tier: UrgencyTier::default(),
            lead_type: LeadType::default(),
            booking_attempted: false,
            booking_confirmed: false,
            booked_time: String::new(),
            confirmation_message: String::new(),
            callback_type: String::new(),
            callback_attempted: false,
            callback_created: false,
            conversation_history: Vec::new(),
            transcript_log: Vec::new(),
            turn_count: 0,
            state_turn_count: 0,
            agent_has_responded: false,
            terminal_reply_used: false,
            confirm_extended: false,
            state: State::Welcome,
            last_agent_state: None,
            synced_to_dashboard: false,
        }
    }

    /// Move to a new state, resetting the per-state counters.
    pub fn transition_to(&mut self, next: State) {
        if next == self.state {
            return;
        }
        tracing::debug!(
            call_id = %self.call_id,
            from = %self.state,
            to = %next,
            "state transition"
        );
        self.state = next;
        self.state_turn_count = 0;
        self.agent_has_responded = false;
    }

    /// Append an entry to both the transcript log and the LLM context.
    pub fn log_user(&mut self, content: &str) {
        self.transcript_log.push(TranscriptEntry {
            role: Role::User,
            content: content.to_owned(),
            timestamp: Utc::now(),
            state: self.state,
            name: None,
            result: None,
        });
        self.conversation_history.push(ConversationEntry {
            role: Role::User,
            content: content.to_owned(),
        });
    }

    /// Record an agent utterance. Canned lines pass `conversational =
    /// false` so they do not count as exchanges.
    pub fn log_agent(&mut self, content: &str, conversational: bool) {
        self.transcript_log.push(TranscriptEntry {
            role: Role::Agent,
            content: content.to_owned(),
            timestamp: Utc::now(),
            state: self.state,
            name: None,
            result: None,
        });
        self.conversation_history.push(ConversationEntry {
            role: Role::Agent,
            content: content.to_owned(),
        });
        if conversational {
            self.agent_has_responded = true;
            self.last_agent_state = Some(self.state);
        }
    }

    /// Record a completed tool round-trip with its structured result.
    pub fn log_tool(&mut self, name: &str, result: serde_json::Value) {
        self.transcript_log.push(TranscriptEntry {
            role: Role::Tool,
            content: String::new(),
            timestamp: Utc::now(),
            state: self.state,
            name: Some(name.to_owned()),
            result: Some(result),
        });
    }

    /// All three discovery fields present?
    pub fn discovery_complete(&self) -> bool {
        !self.customer_name.is_empty()
            && !self.problem_description.is_empty()
            && !self.service_address.is_empty()
    }

    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }
}
