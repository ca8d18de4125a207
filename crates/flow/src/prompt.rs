//! System-prompt composition for the conversational LLM.
//!
//! Three parts: a fixed persona, the current state's instructions, and
//! a `KNOWN INFO` paragraph built from session fields. The composer is
//! the only place session data becomes LLM-visible, which is what makes
//! the passthrough rule for `service_address` enforceable.

use sl_domain::session::CallSession;
use sl_domain::state::State;

/// Fixed persona constraining length, tone, and forbidden phrasing.
const PERSONA: &str = "You are Riley, the phone agent for a home-services company. \
Speak like a calm, competent dispatcher: short sentences, plain words, one \
question at a time. Never promise a price, never diagnose over the phone, \
never say 'as an AI'. Keep every reply under 40 spoken words.";

/// Per-state instructions handed to the LLM verbatim.
fn state_instructions(state: State) -> &'static str {
    match state {
        State::Welcome => {
            "Greet the caller briefly and ask what's going on with their home today."
        }
        State::Lookup => {
            "You are waiting on the account lookup. Acknowledge briefly; do not ask questions."
        }
        State::Safety => {
            "Ask whether there is any safety concern right now: gas smell, smoke, \
             sparks, or water where it shouldn't be. One short question."
        }
        State::SafetyExit => {
            "Tell the caller to hang up and dial 911 immediately. Do not continue the intake."
        }
        State::ServiceArea => {
            "Ask for the 5-digit ZIP code of the service address so you can confirm coverage."
        }
        State::Discovery => {
            "Collect, one at a time, whichever is still missing: the caller's name, \
             what's wrong, and the street address for the visit."
        }
        State::Confirm => {
            "Confirm how urgent the problem is and when they'd like a technician. \
             Once they agree to a time, say you'll get it booked."
        }
        State::Booking => {
            "You are waiting on the scheduling system. Acknowledge briefly; do not ask questions."
        }
        State::Done => {
            "The visit is booked. Answer one short follow-up if asked, restate the \
             confirmed time if helpful, then wrap up warmly."
        }
        State::Callback => {
            "Let the caller know the office will call them back shortly. Reassure, \
             collect nothing further, and wrap up."
        }
    }
}

/// Build the full system prompt for the current turn.
pub fn get_system_prompt(session: &CallSession) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(PERSONA);
    prompt.push_str("\n\n");
    prompt.push_str(state_instructions(session.state));

    let known = known_info(session);
    if !known.is_empty() {
        prompt.push_str("\n\nKNOWN INFO\n");
        prompt.push_str(&known);
    }
    prompt
}

/// The dynamic context paragraph. `service_address` is passthrough data
/// and is deliberately never included here.
fn known_info(session: &CallSession) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (label, value) in [
        ("Caller name", &session.customer_name),
        ("ZIP code", &session.zip_code),
        ("Problem", &session.problem_description),
        ("Preferred time", &session.preferred_time),
    ] {
        if !value.is_empty() {
            lines.push(format!("- {label}: {value}"));
        }
    }

    if session.state == State::Lookup && session.has_appointment {
        if !session.appointment_date.is_empty() {
            lines.push(format!("- Existing appointment date: {}", session.appointment_date));
        }
        if !session.appointment_time.is_empty() {
            lines.push(format!("- Existing appointment time: {}", session.appointment_time));
        }
    }

    if session.state == State::Confirm {
        if let Some(promise) = &session.callback_promise {
            if !promise.issue.is_empty() || !promise.date.is_empty() {
                lines.push(format!(
                    "- We owe this caller a callback about: {} ({})",
                    promise.issue, promise.date
                ));
            }
        }
    }

    if matches!(session.state, State::Confirm | State::Done)
        && !session.confirmation_message.is_empty()
    {
        lines.push(format!(
            "- Booking confirmation: {}",
            session.confirmation_message
        ));
    }

    lines.join("\n")
}
