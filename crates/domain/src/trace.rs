use serde::Serialize;

/// Structured trace events emitted across all ServiceLine crates.
///
/// Serialized as one JSON object per log line, tagged by `event`, so
/// the dashboard's log parsers can consume them without touching the
/// human-readable fields.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ToolCall {
        call_id: String,
        tool: String,
        status: u16,
        duration_ms: u64,
    },
    WebhookPost {
        endpoint: String,
        status: u16,
        attempt: u32,
    },
    ExtractionApplied {
        call_id: String,
        fields_filled: usize,
    },
    /// One per completed call: the quality scorecard.
    CallScorecard {
        call_id: String,
        end_state: String,
        duration_s: i64,
        tag_count: usize,
        name_captured: bool,
        urgency_agent: String,
        urgency_inferred: Option<String>,
        booking_attempted: bool,
        booking_succeeded: bool,
        callback_promised: bool,
        callback_created: bool,
    },
    /// Classification produced no tags.
    TagsEmpty { call_id: String },
    /// A promised callback was never created.
    CallbackGap { call_id: String },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        match self {
            TraceEvent::TagsEmpty { .. } | TraceEvent::CallbackGap { .. } => {
                tracing::warn!(trace_event = %json, "sl_event");
            }
            _ => {
                tracing::info!(trace_event = %json, "sl_event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_snake_case_name() {
        let e = TraceEvent::TagsEmpty {
            call_id: "abc".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "tags_empty");

        let e = TraceEvent::CallScorecard {
            call_id: "abc".into(),
            end_state: "done".into(),
            duration_s: 93,
            tag_count: 4,
            name_captured: true,
            urgency_agent: "urgent".into(),
            urgency_inferred: None,
            booking_attempted: true,
            booking_succeeded: true,
            callback_promised: false,
            callback_created: false,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "call_scorecard");
        assert_eq!(json["tag_count"], 4);
    }
}
