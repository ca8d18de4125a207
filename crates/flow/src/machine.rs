//! The state machine: per-state handlers, escalations, and tool-result
//! handlers.
//!
//! Handlers are synchronous and pure apart from session mutation: they
//! never perform I/O. Anything that needs the outside world is returned
//! as part of the [`Action`] and executed by the frame processor, which
//! then routes the result back through the `on_*` handlers here.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;

use sl_domain::action::Action;
use sl_domain::config::FlowConfig;
use sl_domain::error::{Error, Result};
use sl_domain::session::{CallSession, LeadType, UrgencyTier};
use sl_domain::state::State;
use sl_domain::tool::{BookResult, CallbackResult, LookupResult, ToolName};

use crate::canned;
use crate::keywords;
use crate::validate;

/// Why the flow was force-routed to `Callback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// `state_turn_count` exceeded the per-state budget.
    StateTurnLimit,
    /// `turn_count` exceeded the per-call ceiling.
    CallTurnLimit,
}

/// The deterministic flow engine for one deployment.
///
/// Holds the parsed timezone and service-area prefixes; everything else
/// lives on the session. One engine is shared by all calls.
#[derive(Debug, Clone)]
pub struct FlowEngine {
    tz: Tz,
    service_area_prefixes: Vec<String>,
}

impl FlowEngine {
    pub fn new(cfg: &FlowConfig) -> Result<Self> {
        let tz = Tz::from_str(&cfg.timezone)
            .map_err(|_| Error::Config(format!("unknown timezone \"{}\"", cfg.timezone)))?;
        Ok(Self {
            tz,
            service_area_prefixes: cfg.service_area_prefixes.clone(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // User-text dispatch
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run the current state's handler against one caller utterance.
    pub fn handle(&self, session: &mut CallSession, user_text: &str, now: DateTime<Utc>) -> Action {
        match session.state {
            State::Welcome => self.handle_welcome(session),
            State::Safety => self.handle_safety(session, user_text),
            State::ServiceArea => self.handle_service_area(session, user_text),
            State::Discovery => self.handle_discovery(session, user_text),
            State::Confirm => self.handle_confirm(session, user_text, now),
            State::Done => self.handle_done(session),
            State::Callback => self.handle_callback(session),
            // Action states have no user-text path; they are entered and
            // left through tool-result handlers while the caller waits.
            State::Lookup | State::Booking => {
                tracing::debug!(state = %session.state, "utterance during action state ignored");
                Action::silent()
            }
            State::SafetyExit => Action::canned(canned::SAFETY_EXIT).ending_call(),
        }
    }

    fn handle_welcome(&self, session: &mut CallSession) -> Action {
        if session.phone_number.is_empty() {
            // Nothing to look up; go straight to the safety question.
            session.transition_to(State::Safety);
            return Action::llm();
        }
        session.transition_to(State::Lookup);
        Action::canned(canned::LOOKUP_BRIDGE).with_tool(
            ToolName::LookupCaller,
            json!({ "phone": session.phone_number }),
        )
    }

    fn handle_safety(&self, session: &mut CallSession, text: &str) -> Action {
        if keywords::detect_safety_emergency(text) {
            session.transition_to(State::SafetyExit);
            return Action::canned(canned::SAFETY_EXIT).ending_call();
        }
        if keywords::says_no_concerns(text) {
            session.transition_to(State::ServiceArea);
            return Action::llm();
        }
        Action::llm()
    }

    fn handle_service_area(&self, session: &mut CallSession, text: &str) -> Action {
        let zip = validate::validate_zip(text);
        if zip.is_empty() {
            return Action::llm();
        }
        if validate::is_service_area(&zip, &self.service_area_prefixes) {
            session.zip_code = zip;
            session.transition_to(State::Discovery);
            return Action::llm();
        }
        session.callback_type = "out_of_area".into();
        session.transition_to(State::Callback);
        Action::canned(canned::OUT_OF_AREA)
    }

    fn handle_discovery(&self, session: &mut CallSession, text: &str) -> Action {
        let mut took_address = false;
        if session.service_address.is_empty() {
            if let Some(addr) = try_extract_address(text) {
                session.service_address = addr;
                took_address = true;
            }
        }
        if session.customer_name.is_empty() && !took_address {
            if let Some(name) = try_extract_name(text) {
                session.customer_name = name;
            }
        }

        if session.discovery_complete() {
            let mut line = canned::URGENCY_BRIDGE.to_owned();
            if let Some(promise) = &session.callback_promise {
                line.push_str(&canned::callback_acknowledgment(&promise.issue, &promise.date));
            }
            session.transition_to(State::Confirm);
            return Action::canned(line);
        }
        Action::llm()
    }

    fn handle_confirm(&self, session: &mut CallSession, text: &str, now: DateTime<Utc>) -> Action {
        if keywords::wants_reschedule(text) && session.has_appointment {
            session.callback_type = "reschedule".into();
            session.transition_to(State::Callback);
            return Action::llm();
        }

        let high_ticket = keywords::detect_high_ticket(text)
            || keywords::detect_high_ticket(&session.problem_description);
        if high_ticket || keywords::requests_callback(text) {
            if high_ticket {
                session.lead_type = LeadType::HighTicket;
                session.callback_type = "sales_lead".into();
            } else {
                session.callback_type = "requested".into();
            }
            session.transition_to(State::Callback);
            return Action::llm();
        }

        if keywords::has_urgency_signal(text) {
            session.urgency_tier = if validate::match_any_keyword(text, &["emergency"]) {
                UrgencyTier::Emergency
            } else {
                UrgencyTier::Urgent
            };
        }
        if keywords::has_time_pattern(text) {
            // An explicit statement at confirm outranks whatever the
            // extraction task may have guessed earlier.
            session.preferred_time = text.trim().to_owned();
        }

        if keywords::is_affirmative(text) && !session.preferred_time.is_empty() {
            session.booking_attempted = true;
            let args = self.book_arguments(session, now);
            session.transition_to(State::Booking);
            return Action::canned(canned::BOOKING_BRIDGE).with_tool(ToolName::BookService, args);
        }

        Action::llm()
    }

    fn handle_done(&self, session: &mut CallSession) -> Action {
        if !session.terminal_reply_used {
            // One follow-up gets a real answer, then the call closes.
            session.terminal_reply_used = true;
            return Action::llm().ending_call();
        }
        Action::canned(canned::FINAL_GOODBYE).ending_call()
    }

    fn handle_callback(&self, session: &mut CallSession) -> Action {
        if !session.callback_attempted {
            session.callback_attempted = true;
            let mut action = Action::canned(canned::CALLBACK_CLOSE)
                .with_tool(
                    ToolName::CreateCallback,
                    json!({
                        "customer_name": session.customer_name,
                        "customer_phone": session.phone_number,
                        "service_address": session.service_address,
                        "problem_description": session.problem_description,
                        "callback_reason": if session.callback_type.is_empty() {
                            "general"
                        } else {
                            session.callback_type.as_str()
                        },
                    }),
                )
                .ending_call();
            if session.lead_type == LeadType::HighTicket {
                action = action.with_alert(
                    ToolName::SendSalesLeadAlert,
                    json!({
                        "customer_name": session.customer_name,
                        "customer_phone": session.phone_number,
                        "problem_description": session.problem_description,
                        "lead_type": "high_ticket",
                    }),
                );
            }
            return action;
        }
        if !session.terminal_reply_used {
            session.terminal_reply_used = true;
            return Action::llm().ending_call();
        }
        Action::canned(canned::FINAL_GOODBYE).ending_call()
    }

    /// Force the flow to `Callback` after a turn-budget overflow.
    ///
    /// The canned escalation is not a conversational exchange and must
    /// not re-trigger extraction; the processor honors both.
    pub fn escalate(&self, session: &mut CallSession, kind: Escalation) -> Action {
        tracing::info!(
            call_id = %session.call_id,
            state = %session.state,
            ?kind,
            "turn limit escalation"
        );
        if session.callback_type.is_empty() {
            session.callback_type = "turn_limit".into();
        }
        session.transition_to(State::Callback);
        let line = match kind {
            Escalation::StateTurnLimit => canned::STATE_LIMIT_ESCALATION,
            Escalation::CallTurnLimit => canned::CALL_LIMIT_ESCALATION,
        };
        Action::canned(line)
    }

    fn book_arguments(&self, session: &CallSession, now: DateTime<Utc>) -> serde_json::Value {
        json!({
            "customer_name": session.customer_name,
            "customer_phone": session.phone_number,
            "problem_description": session.problem_description,
            "service_address": session.service_address,
            "date_time": validate::resolve_booking_time(&session.preferred_time, now, self.tz),
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Tool-result handlers
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Apply a caller-lookup result. Deterministically validated fields
    /// are written only when still empty, so nothing the caller already
    /// said gets clobbered.
    pub fn on_lookup_caller(session: &mut CallSession, result: &LookupResult) {
        session.caller_known = result.known;
        if session.customer_name.is_empty() {
            let name = validate::validate_name(&result.name);
            if !name.is_empty() {
                session.customer_name = name;
            }
        }
        if session.zip_code.is_empty() {
            let zip = validate::validate_zip(&result.zip_code);
            if !zip.is_empty() {
                session.zip_code = zip;
            }
        }
        if session.service_address.is_empty() && !result.service_address.is_empty() {
            session.service_address = result.service_address.trim().to_owned();
        }
        session.has_appointment = result.has_appointment;
        session.appointment_date = result.appointment_date.clone();
        session.appointment_time = result.appointment_time.clone();
        session.callback_promise = result.callback_promise.clone();
        session.transition_to(State::Safety);
    }

    /// Apply a booking result: confirmed moves to `Done`, anything else
    /// routes to `Callback` so a human can pick it up.
    pub fn on_book_service(session: &mut CallSession, result: &BookResult) {
        session.booking_confirmed = result.confirmed();
        if session.booking_confirmed {
            if let Some(t) = &result.appointment_time {
                session.booked_time = t.clone();
            }
            session.confirmation_message = if result.confirmation_message.is_empty() {
                canned::DEFAULT_CONFIRMATION.to_owned()
            } else {
                result.confirmation_message.clone()
            };
            session.transition_to(State::Done);
        } else {
            if let Some(e) = &result.error {
                tracing::warn!(call_id = %session.call_id, error = %e, "booking failed");
            }
            session.callback_type = "booking_failed".into();
            session.transition_to(State::Callback);
        }
    }

    /// Apply a create-callback result. Never transitions.
    pub fn on_create_callback(session: &mut CallSession, result: &CallbackResult) {
        session.callback_created = result.success;
        if !result.success {
            tracing::warn!(
                call_id = %session.call_id,
                error = result.error.as_deref().unwrap_or("unspecified"),
                "callback creation failed"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deterministic utterance extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const NAME_LEAD_INS: &[&str] = &[
    "my name is",
    "my name's",
    "the name is",
    "name is",
    "this is",
    "it is",
    "it's",
    "i am",
    "i'm",
];

const ADDRESS_LEAD_INS: &[&str] = &[
    "my address is",
    "the address is",
    "address is",
    "i live at",
    "i'm at",
    "we're at",
    "it's at",
    "it's",
    "okay it's",
];

/// Conversational filler worth discarding before either extractor runs.
const FILLERS: &[&str] = &["okay", "ok", "yeah", "well", "so", "um", "uh", "hi", "hello"];

/// Street words that mark an utterance as address-shaped, not a name.
const STREET_WORDS: &[&str] = &[
    "street", "st", "avenue", "ave", "road", "rd", "drive", "dr", "lane", "ln", "court", "ct",
    "boulevard", "blvd", "way", "circle", "highway", "hwy",
];

fn strip_fillers(text: &str) -> &str {
    let mut rest = text.trim();
    loop {
        let Some(first) = rest.split_whitespace().next() else {
            return rest;
        };
        let word = first.trim_matches(|c: char| !c.is_alphanumeric());
        if FILLERS.contains(&word.to_ascii_lowercase().as_str()) {
            rest = rest[first.len()..].trim_start_matches([' ', ',']);
        } else {
            return rest;
        }
    }
}

fn strip_lead_in<'a>(text: &'a str, lead_ins: &[&str]) -> &'a str {
    let trimmed = strip_fillers(text);
    let lowered = trimmed.to_ascii_lowercase();
    for lead in lead_ins {
        if lowered.starts_with(lead) {
            return trimmed[lead.len()..].trim_start_matches([' ', ',', ':']);
        }
    }
    trimmed
}

/// A name is a short utterance with no digits, no spoken numbers, and
/// no street words, that survives `validate_name`. Anything longer or
/// address-shaped is left for the LLM to re-ask.
fn try_extract_name(text: &str) -> Option<String> {
    let candidate = strip_lead_in(text, NAME_LEAD_INS);
    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 4 {
        return None;
    }
    if candidate.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    for token in &tokens {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        if validate::small_number_to_digits(word).is_some() {
            return None;
        }
        if STREET_WORDS.contains(&word.to_ascii_lowercase().as_str()) {
            return None;
        }
    }
    let name = validate::validate_name(candidate);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// An address must start (after lead-in filler) with a street number,
/// spoken or literal; everything from that token on is validated.
fn try_extract_address(text: &str) -> Option<String> {
    let candidate = strip_lead_in(text, ADDRESS_LEAD_INS);
    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    let start = tokens.iter().position(|t| {
        t.chars().all(|c| c.is_ascii_digit()) && !t.is_empty()
            || validate::small_number_to_digits(t).is_some()
    })?;
    let tail = tokens[start..].join(" ");
    let addr = validate::validate_address(&tail);
    if addr.is_empty() {
        None
    } else {
        Some(addr)
    }
}
