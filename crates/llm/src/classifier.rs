//! Post-call classification: one structured-output LLM call.
//!
//! Classification enriches the dashboard payloads but never gates
//! them: on any failure every field stays `None` and the orchestrator
//! ships the payloads anyway (with a `tags_empty` warning on the
//! scorecard).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::JsonCompleter;

/// The nine tag categories the dashboard groups by.
pub const TAG_CATEGORIES: [&str; 9] = [
    "service_type",
    "equipment",
    "urgency",
    "sentiment",
    "outcome",
    "lead_quality",
    "area",
    "issue",
    "follow_up",
];

const CLASSIFY_SYSTEM: &str = "You classify a completed phone call to a \
home-services dispatcher. Respond with a JSON object with exactly these keys: \
ai_summary (2-3 sentences), card_headline (under 8 words), card_summary (one \
sentence), call_type, call_subtype, sentiment_score (0.0-1.0), tags (object \
keyed by: service_type, equipment, urgency, sentiment, outcome, lead_quality, \
area, issue, follow_up - each a short string or null), priority_color (green, \
yellow, or red), revenue_tier (standard or high_ticket).";

/// Output of the classification call. All fields nullable; `None`
/// everywhere means classification failed or was skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub card_headline: Option<String>,
    #[serde(default)]
    pub card_summary: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub call_subtype: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub tags: Option<Map<String, Value>>,
    #[serde(default)]
    pub priority_color: Option<String>,
    #[serde(default)]
    pub revenue_tier: Option<String>,
}

impl Classification {
    /// Number of tag categories with a usable (non-null, non-empty) value.
    pub fn tag_count(&self) -> usize {
        self.tags
            .as_ref()
            .map(|tags| {
                tags.values()
                    .filter(|v| match v {
                        Value::Null => false,
                        Value::String(s) => !s.is_empty(),
                        _ => true,
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Classify a finished call from its plain-text transcript.
///
/// Never returns an error: failures are logged and degrade to an
/// all-`None` classification.
pub async fn classify_call(completer: &dyn JsonCompleter, transcript: &str) -> Classification {
    if transcript.trim().is_empty() {
        return Classification::default();
    }

    match completer.complete_json(CLASSIFY_SYSTEM, transcript).await {
        Ok(json) => match serde_json::from_value::<Classification>(json) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "classification response did not match schema");
                Classification::default()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "classification call failed");
            Classification::default()
        }
    }
}
