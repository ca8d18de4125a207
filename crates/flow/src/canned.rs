//! Canned utterances spoken directly by the state machine.
//!
//! These bypass the LLM entirely: they are synthesized as-is and do
//! not count as conversational exchanges for turn accounting.

/// Spoken while the caller lookup runs.
pub const LOOKUP_BRIDGE: &str = "One second, pulling that up.";

/// The discovery-to-confirm bridge once all three fields are in hand.
pub const URGENCY_BRIDGE: &str =
    "Got it. How urgent is this - need someone today, or this week works?";

/// Spoken right before `book_service` is dispatched.
pub const BOOKING_BRIDGE: &str = "Checking the schedule now.";

/// Out-of-area apology, delivered before routing to callback.
pub const OUT_OF_AREA: &str =
    "I'm sorry - that address is outside the area we cover. Let me take your \
     details and have our office call you back.";

/// Safety emergency script.
pub const SAFETY_EXIT: &str =
    "Please hang up and call 911 right away. If you can, get everyone out of \
     the house first. We'll follow up once you're safe.";

/// Closing line after a callback has been recorded.
pub const CALLBACK_CLOSE: &str =
    "You're on the list - our office will call you back shortly. Thanks for calling!";

/// Per-state turn budget exhausted.
pub const STATE_LIMIT_ESCALATION: &str =
    "Let me have someone call you back so we can sort this out properly.";

/// Whole-call turn ceiling reached.
pub const CALL_LIMIT_ESCALATION: &str =
    "This has gone on a while - let me have someone follow up with you directly.";

/// Final goodbye when the close window cannot be extended again.
pub const FINAL_GOODBYE: &str = "Thanks again for calling - goodbye now.";

/// Fallback confirmation when the backend confirms without a message.
pub const DEFAULT_CONFIRMATION: &str = "You're booked. We'll see you then.";

/// Acknowledge a previously promised callback, folded into the bridge.
pub fn callback_acknowledgment(issue: &str, date: &str) -> String {
    match (issue.is_empty(), date.is_empty()) {
        (false, false) => {
            format!(" By the way, I see we owe you a call about {issue} from {date} - I'll flag that for the office too.")
        }
        (false, true) => {
            format!(" By the way, I see we owe you a call about {issue} - I'll flag that for the office too.")
        }
        (true, false) => {
            format!(" By the way, I see we owe you a call from {date} - I'll flag that for the office too.")
        }
        (true, true) => String::new(),
    }
}
