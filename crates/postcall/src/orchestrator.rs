//! The post-call orchestrator: one pass per call, after the pipeline
//! task returns.
//!
//! Nothing in here may fail the process: classification degrades to
//! nulls, failed webhook posts leave the session unsynced for a later
//! retry, and a duplicate invocation returns at the idempotency gate.

use chrono::Utc;
use serde::Serialize;

use sl_domain::session::CallSession;
use sl_domain::state::State;
use sl_domain::trace::TraceEvent;
use sl_llm::{classify_call, Classification, JsonCompleter};

use crate::drift;
use crate::payload;
use crate::transcript;
use crate::webhook::{WebhookClient, ALERTS_PATH, CALLS_PATH, JOBS_PATH};

/// Run the full post-call pipeline once.
pub async fn run_post_call(
    session: &mut CallSession,
    completer: &dyn JsonCompleter,
    webhooks: &WebhookClient,
) {
    // 1. Idempotency gate.
    if session.synced_to_dashboard {
        tracing::debug!(call_id = %session.call_id, "post-call already synced; skipping");
        return;
    }

    let now = Utc::now();

    // 2. Transcript assembly + chunked dump.
    let plain = transcript::plain_text(&session.transcript_log);
    for chunk in transcript::dump_chunks(&session.transcript_log, session.start_time) {
        tracing::info!("{chunk}");
    }

    // 3. Classification (never blocks payload emission).
    let classification = classify_call(completer, &plain).await;

    // 4. Drift analysis.
    let drift = drift::analyze(session);

    // 5/6. Payload assembly; signing happens inside the client.
    let job = payload::build_job_payload(session, &classification, &drift, now);
    let call = payload::build_call_payload(session, &classification, now);

    // 7. Delivery, in order: jobs, calls, alerts.
    if deliver(webhooks, JOBS_PATH, &job).await {
        // 8. Idempotency marker after the job POST lands.
        session.synced_to_dashboard = true;
    }
    deliver(webhooks, CALLS_PATH, &call).await;
    if session.state == State::SafetyExit {
        let alert = payload::build_alert_payload(session, now);
        deliver(webhooks, ALERTS_PATH, &alert).await;
    }

    // 9. Scorecard + gap warnings.
    let scorecard = build_scorecard(session, &classification);
    scorecard.emit();
    if classification.tag_count() == 0 {
        TraceEvent::TagsEmpty {
            call_id: session.call_id.to_string(),
        }
        .emit();
    }
    if callback_promised(session) && !session.callback_created {
        TraceEvent::CallbackGap {
            call_id: session.call_id.to_string(),
        }
        .emit();
    }
}

async fn deliver<T: Serialize>(webhooks: &WebhookClient, path: &str, payload: &T) -> bool {
    let value = match serde_json::to_value(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(endpoint = path, error = %e, "payload serialization failed");
            return false;
        }
    };
    match webhooks.post(path, &value).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(endpoint = path, error = %e, "webhook delivery failed");
            false
        }
    }
}

/// The call promised a human follow-up if it ever entered the callback
/// flow (or recorded a reason to).
fn callback_promised(session: &CallSession) -> bool {
    session.callback_attempted
        || session.state == State::Callback
        || !session.callback_type.is_empty()
}

/// Build the quality scorecard event for one completed call.
pub fn build_scorecard(session: &CallSession, classification: &Classification) -> TraceEvent {
    TraceEvent::CallScorecard {
        call_id: session.call_id.to_string(),
        end_state: session.state.to_string(),
        duration_s: session.duration_seconds(Utc::now()),
        tag_count: classification.tag_count(),
        name_captured: !session.customer_name.is_empty(),
        urgency_agent: session.urgency_tier.as_str().to_owned(),
        urgency_inferred: classification
            .tags
            .as_ref()
            .and_then(|t| t.get("urgency"))
            .and_then(|v| v.as_str())
            .map(str::to_owned),
        booking_attempted: session.booking_attempted,
        booking_succeeded: session.booking_confirmed,
        callback_promised: callback_promised(session),
        callback_created: session.callback_created,
    }
}
