//! Webhook payload assembly.
//!
//! The receiver validates strictly: fields that would be `null` are
//! omitted entirely (`skip_serializing_if`), and empty strings for
//! optional business fields are likewise dropped. Everything here is
//! plain data derived from the session + classification + drift.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use sl_domain::session::{CallSession, LeadType, Role};
use sl_llm::Classification;

use crate::drift::DriftReport;
use crate::transcript;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mappings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The payload-surface urgency mapping. Accepts the raw tier string so
/// values that only classification produces still map sensibly.
pub fn map_urgency(tier: &str) -> &'static str {
    match tier {
        "urgent" | "same_day" => "high",
        "emergency" => "emergency",
        // routine, estimate, unknown
        _ => "low",
    }
}

/// Booking outcome as the dashboard spells it.
pub fn booking_status(session: &CallSession) -> &'static str {
    if session.booking_confirmed {
        "confirmed"
    } else if session.booking_attempted {
        "attempted_failed"
    } else {
        "not_attempted"
    }
}

/// A blunt 0.0-1.0 quality score over what the call captured.
pub fn quality_score(session: &CallSession, classification: &Classification) -> f64 {
    let checks = [
        !session.customer_name.is_empty(),
        !session.zip_code.is_empty(),
        !session.problem_description.is_empty(),
        !session.service_address.is_empty(),
        session.booking_confirmed || session.callback_created,
        classification.tag_count() > 0,
    ];
    let passed = checks.iter().filter(|c| **c).count();
    passed as f64 / checks.len() as f64
}

fn none_if_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the dispatch dashboard needs to open (or route) a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobPayload {
    pub call_id: String,
    pub phone_number: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_s: i64,
    pub end_state: String,
    pub turn_count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,

    pub caller_known: bool,
    pub has_appointment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,

    pub urgency: String,
    pub urgency_tier: String,
    pub lead_type: String,

    pub booking_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_type: Option<String>,
    pub callback_created: bool,

    // Drift
    pub slot_changed: bool,
    pub urgency_mismatch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_requested_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_booked_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_urgency_transition: Option<String>,

    // Classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_tier: Option<String>,
}

/// Assemble the job payload. `job_id` comes from the booking trace when
/// the backend returned an appointment id.
pub fn build_job_payload(
    session: &CallSession,
    classification: &Classification,
    drift: &DriftReport,
    now: DateTime<Utc>,
) -> JobPayload {
    // The card summary picks up the drift note so a human reviews
    // substituted slots.
    let card_summary = match (classification.card_summary.clone(), drift.review_note()) {
        (Some(summary), Some(note)) => Some(format!("{summary} {note}")),
        (None, Some(note)) => Some(note),
        (summary, None) => summary,
    };

    JobPayload {
        call_id: session.call_id.to_string(),
        phone_number: session.phone_number.clone(),
        start_time: session.start_time.to_rfc3339(),
        end_time: now.to_rfc3339(),
        duration_s: session.duration_seconds(now),
        end_state: session.state.to_string(),
        turn_count: session.turn_count,

        customer_name: none_if_empty(&session.customer_name),
        zip_code: none_if_empty(&session.zip_code),
        service_address: none_if_empty(&session.service_address),
        problem_description: none_if_empty(&session.problem_description),
        equipment_type: none_if_empty(&session.equipment_type),
        problem_duration: none_if_empty(&session.problem_duration),
        preferred_time: none_if_empty(&session.preferred_time),

        caller_known: session.caller_known,
        has_appointment: session.has_appointment,
        appointment_date: none_if_empty(&session.appointment_date),
        appointment_time: none_if_empty(&session.appointment_time),

        urgency: map_urgency(session.urgency_tier.as_str()).to_owned(),
        urgency_tier: session.urgency_tier.as_str().to_owned(),
        lead_type: match session.lead_type {
            LeadType::Standard => "standard".to_owned(),
            LeadType::HighTicket => "high_ticket".to_owned(),
        },

        booking_status: booking_status(session).to_owned(),
        booked_time: none_if_empty(&session.booked_time),
        confirmation_message: none_if_empty(&session.confirmation_message),
        job_id: booking_appointment_id(session),
        lead_id: None,

        callback_type: none_if_empty(&session.callback_type),
        callback_created: session.callback_created,

        slot_changed: drift.slot_changed,
        urgency_mismatch: drift.urgency_mismatch,
        booking_requested_time: drift.booking_requested_time.clone(),
        booking_booked_slot: drift.booking_booked_slot.clone(),
        booking_urgency_transition: drift.booking_urgency_transition.clone(),

        ai_summary: classification.ai_summary.clone(),
        card_headline: classification.card_headline.clone(),
        card_summary,
        call_type: classification.call_type.clone(),
        call_subtype: classification.call_subtype.clone(),
        sentiment_score: classification.sentiment_score,
        tags: classification.tags.clone(),
        priority_color: classification.priority_color.clone(),
        revenue_tier: classification.revenue_tier.clone(),
    }
}

/// The appointment id the backend returned for the booking, if any.
fn booking_appointment_id(session: &CallSession) -> Option<String> {
    session
        .transcript_log
        .iter()
        .rev()
        .filter(|e| e.role == Role::Tool && e.name.as_deref() == Some("book_service"))
        .find_map(|e| {
            e.result
                .as_ref()?
                .pointer("/response/appointmentId")?
                .as_str()
                .map(str::to_owned)
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Transcript + metadata record for the calls feed.
#[derive(Debug, Clone, Serialize)]
pub struct CallPayload {
    pub call_id: String,
    pub phone_number: String,
    pub start_time: String,
    pub duration_s: i64,
    pub end_state: String,
    pub transcript: String,
    pub transcript_json: Value,
    pub quality_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
}

pub fn build_call_payload(
    session: &CallSession,
    classification: &Classification,
    now: DateTime<Utc>,
) -> CallPayload {
    CallPayload {
        call_id: session.call_id.to_string(),
        phone_number: session.phone_number.clone(),
        start_time: session.start_time.to_rfc3339(),
        duration_s: session.duration_seconds(now),
        end_state: session.state.to_string(),
        transcript: transcript::plain_text(&session.transcript_log),
        transcript_json: transcript::json_array(&session.transcript_log),
        quality_score: quality_score(session, classification),
        ai_summary: classification.ai_summary.clone(),
        sentiment_score: classification.sentiment_score,
        call_type: classification.call_type.clone(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Alert payload (safety exits)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How many trailing caller lines the emergency alert excerpts.
const ALERT_EXCERPT_LINES: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub call_id: String,
    pub phone_number: String,
    pub timestamp: String,
    pub reason: String,
    pub transcript_excerpt: String,
}

pub fn build_alert_payload(session: &CallSession, now: DateTime<Utc>) -> AlertPayload {
    let excerpt: Vec<String> = session
        .transcript_log
        .iter()
        .filter(|e| e.role != Role::Tool)
        .rev()
        .take(ALERT_EXCERPT_LINES)
        .map(|e| {
            format!(
                "{}: {}",
                match e.role {
                    Role::User => "User",
                    Role::Agent => "Agent",
                    Role::Tool => "Tool",
                },
                e.content
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    AlertPayload {
        call_id: session.call_id.to_string(),
        phone_number: session.phone_number.clone(),
        timestamp: now.to_rfc3339(),
        reason: "safety_emergency".into(),
        transcript_excerpt: excerpt.join("\n"),
    }
}
