//! Drift analysis: did the backend book what the caller asked for?
//!
//! Parses the `book_service` entry of the tool-call trace and compares
//! the requested slot and urgency against what actually got booked.
//! Mismatches are warnings for a human reviewer, never call failures.

use chrono::DateTime;
use serde::Serialize;

use sl_domain::session::{CallSession, Role};

/// What the payloads carry about booking drift.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    pub slot_changed: bool,
    pub urgency_mismatch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_requested_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_booked_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_urgency_transition: Option<String>,
}

impl DriftReport {
    /// A short reviewer note for the card summary, present only when
    /// something drifted.
    pub fn review_note(&self) -> Option<String> {
        if !self.slot_changed {
            return None;
        }
        Some(format!(
            "Review booking: requested {} but booked {}",
            self.booking_requested_time.as_deref().unwrap_or("?"),
            self.booking_booked_slot.as_deref().unwrap_or("?"),
        ))
    }
}

/// Analyze the session's tool trace for booking drift.
pub fn analyze(session: &CallSession) -> DriftReport {
    let mut report = DriftReport::default();

    let book_entry = session
        .transcript_log
        .iter()
        .rev()
        .find(|e| e.role == Role::Tool && e.name.as_deref() == Some("book_service"));

    let Some(entry) = book_entry else {
        return report;
    };
    let Some(record) = &entry.result else {
        return report;
    };

    let requested = record
        .pointer("/request/date_time")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let booked = record
        .pointer("/response/appointment_time")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    if let (Some(req), Some(got)) = (&requested, &booked) {
        report.slot_changed = !same_instant(req, got);
        if report.slot_changed {
            tracing::warn!(
                call_id = %session.call_id,
                requested = %req,
                booked = %got,
                "booking slot drifted from the requested time"
            );
        }
    }
    report.booking_requested_time = requested;
    report.booking_booked_slot = booked;

    if let Some(at_booking) = record
        .pointer("/urgency_at_booking")
        .and_then(|v| v.as_str())
    {
        let final_urgency = session.urgency_tier.as_str();
        if at_booking != final_urgency {
            report.urgency_mismatch = true;
            report.booking_urgency_transition =
                Some(format!("{at_booking}->{final_urgency}"));
            tracing::warn!(
                call_id = %session.call_id,
                at_booking,
                final_urgency,
                "urgency changed between booking and call end"
            );
        }
    }

    report
}

/// Compare two timestamps as instants where possible, falling back to
/// string equality for anything unparseable.
fn same_instant(a: &str, b: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}
