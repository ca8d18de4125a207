//! Keyword sets and detectors used by the state handlers.
//!
//! All matching is word-boundary and case-insensitive via
//! [`crate::validate::match_any_keyword`]. Sets are small and fixed;
//! they route conversation, they do not interpret it; anything fuzzy
//! belongs to the extraction task.

use crate::validate::match_any_keyword;

/// The ways callers answer "any safety concerns?" with a no.
pub const NO_CONCERNS: &[&str] = &["no", "none", "nope", "nothing", "all good"];

/// Hazard phrases that bypass everything and route to 911.
pub const SAFETY_EMERGENCY: &[&str] = &[
    "smell gas",
    "gas leak",
    "gas smell",
    "smoke",
    "fire",
    "sparks",
    "sparking",
    "carbon monoxide",
    "flooding",
    "burning smell",
];

/// Wants someone out the door now.
pub const URGENCY_SIGNALS: &[&str] = &[
    "asap",
    "today",
    "right away",
    "soonest",
    "right now",
    "emergency",
];

/// A scheduling preference worth storing verbatim.
pub const TIME_PATTERNS: &[&str] = &[
    "tomorrow",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "morning",
    "afternoon",
    "evening",
    "following",
    "next day",
    "today",
    "asap",
    "right away",
    "right now",
    "soonest",
    "this week",
];

/// Consent to book.
pub const AFFIRMATIVE: &[&str] = &[
    "yes",
    "yeah",
    "sure",
    "go ahead",
    "sounds good",
    "book it",
    "please do",
];

/// Wants to touch an existing appointment.
pub const RESCHEDULE: &[&str] = &[
    "reschedule",
    "cancel",
    "move my appointment",
    "change my appointment",
];

/// Explicitly asks for a human to call back.
pub const CALLBACK_REQUEST: &[&str] = &[
    "call me back",
    "callback",
    "have someone call",
    "talk to a person",
    "speak to someone",
];

/// Replacement-or-install language that marks a high-ticket sales lead.
pub const HIGH_TICKET: &[&str] = &[
    "replace",
    "replacement",
    "new system",
    "new unit",
    "new furnace",
    "new ac",
    "install",
    "installation",
    "quote",
    "estimate",
];

pub fn detect_safety_emergency(text: &str) -> bool {
    match_any_keyword(text, SAFETY_EMERGENCY)
}

pub fn detect_high_ticket(text: &str) -> bool {
    match_any_keyword(text, HIGH_TICKET)
}

pub fn is_affirmative(text: &str) -> bool {
    match_any_keyword(text, AFFIRMATIVE)
}

pub fn has_urgency_signal(text: &str) -> bool {
    match_any_keyword(text, URGENCY_SIGNALS)
}

pub fn has_time_pattern(text: &str) -> bool {
    match_any_keyword(text, TIME_PATTERNS)
}

pub fn wants_reschedule(text: &str) -> bool {
    match_any_keyword(text, RESCHEDULE)
}

pub fn requests_callback(text: &str) -> bool {
    match_any_keyword(text, CALLBACK_REQUEST)
}

pub fn says_no_concerns(text: &str) -> bool {
    match_any_keyword(text, NO_CONCERNS)
}
