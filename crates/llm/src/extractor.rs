//! Background field extraction, the soft half of the extraction
//! firewall.
//!
//! A fire-and-forget task reads the recent conversation and proposes
//! values for the four extraction-owned fields. The task never touches
//! the session itself: results travel back to the frame processor,
//! which applies them with [`ExtractedFields::apply_to`] so the
//! if-empty guard runs on the same event loop as every other session
//! write. Handler-owned fields (name, ZIP, address) are not even part
//! of the schema.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sl_domain::error::Result;
use sl_domain::session::{CallSession, ConversationEntry, Role};

use crate::JsonCompleter;

/// How much conversation the extraction model sees.
const HISTORY_WINDOW: usize = 12;

const EXTRACTION_SYSTEM: &str = "You extract structured fields from a phone call \
between a home-services dispatcher and a caller. Respond with a JSON object with \
exactly these keys: problem_description, equipment_type, problem_duration, \
preferred_time. Use the caller's own words, condensed. Use an empty string for \
anything not clearly stated. Never guess.";

/// The extraction-owned fields, as proposed by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub problem_description: String,
    #[serde(default)]
    pub equipment_type: String,
    #[serde(default)]
    pub problem_duration: String,
    #[serde(default)]
    pub preferred_time: String,
}

impl ExtractedFields {
    /// Apply to the session with if-empty guards. Returns how many
    /// fields were actually filled.
    pub fn apply_to(&self, session: &mut CallSession) -> usize {
        let mut filled = 0;
        for (slot, value) in [
            (&mut session.problem_description, &self.problem_description),
            (&mut session.equipment_type, &self.equipment_type),
            (&mut session.problem_duration, &self.problem_duration),
            (&mut session.preferred_time, &self.preferred_time),
        ] {
            if slot.is_empty() && !value.is_empty() {
                *slot = value.clone();
                filled += 1;
            }
        }
        filled
    }
}

/// Run one extraction pass over the recent conversation.
pub async fn extract_fields(
    completer: &dyn JsonCompleter,
    history: &[ConversationEntry],
) -> Result<ExtractedFields> {
    let window = history.iter().rev().take(HISTORY_WINDOW).collect::<Vec<_>>();
    let mut transcript = String::new();
    for entry in window.into_iter().rev() {
        let role = match entry.role {
            Role::User => "caller",
            Role::Agent => "agent",
            Role::Tool => continue,
        };
        transcript.push_str(role);
        transcript.push_str(": ");
        transcript.push_str(&entry.content);
        transcript.push('\n');
    }

    let json = completer.complete_json(EXTRACTION_SYSTEM, &transcript).await?;
    Ok(serde_json::from_value(json)?)
}

/// Spawn extraction as a fire-and-forget task.
///
/// The wrapper logs and swallows every failure; nothing raised in here
/// can reach the pipeline. `deliver` runs on success only, typically a
/// closure that posts the fields back into the processor's command
/// loop.
pub fn spawn_extraction(
    completer: Arc<dyn JsonCompleter>,
    call_id: String,
    history: Vec<ConversationEntry>,
    deliver: impl FnOnce(ExtractedFields) + Send + 'static,
) {
    tokio::spawn(async move {
        match extract_fields(completer.as_ref(), &history).await {
            Ok(fields) => deliver(fields),
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "extraction task failed");
            }
        }
    });
}
