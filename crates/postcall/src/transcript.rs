//! Transcript assembly in the three formats the dashboard consumes.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use sl_domain::session::{Role, TranscriptEntry};

/// Upper bound on one `TRANSCRIPT_DUMP` chunk body, leaving headroom
/// for the log line envelope under common collector limits.
const DUMP_CHUNK_BYTES: usize = 3_500;

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Agent => "Agent",
        Role::Tool => "Tool",
    }
}

/// Plain-text transcript: `Role: content` per line, ordered by
/// timestamp, tool entries filtered out.
pub fn plain_text(log: &[TranscriptEntry]) -> String {
    let mut entries: Vec<&TranscriptEntry> =
        log.iter().filter(|e| e.role != Role::Tool).collect();
    entries.sort_by_key(|e| e.timestamp);

    let mut out = String::new();
    for entry in entries {
        out.push_str(role_label(entry.role));
        out.push_str(": ");
        out.push_str(&entry.content);
        out.push('\n');
    }
    out
}

/// JSON transcript: `[{role, content, timestamp}]` filtered to agent
/// and user entries.
pub fn json_array(log: &[TranscriptEntry]) -> Value {
    let mut entries: Vec<&TranscriptEntry> =
        log.iter().filter(|e| e.role != Role::Tool).collect();
    entries.sort_by_key(|e| e.timestamp);

    Value::Array(
        entries
            .iter()
            .map(|e| {
                json!({
                    "role": e.role,
                    "content": e.content,
                    "timestamp": e.timestamp.to_rfc3339(),
                })
            })
            .collect(),
    )
}

/// The chunked structured dump for offline reconstruction.
///
/// Every entry (tool entries included) is serialized with `t` as the
/// offset from call start and its `state`; entries are packed greedily
/// into chunks of at most [`DUMP_CHUNK_BYTES`], never splitting an
/// entry, and each chunk is prefixed `TRANSCRIPT_DUMP|i/n|`.
pub fn dump_chunks(log: &[TranscriptEntry], start_time: DateTime<Utc>) -> Vec<String> {
    let mut serialized: Vec<String> = Vec::with_capacity(log.len());
    for entry in log {
        let mut obj = json!({
            "t": (entry.timestamp - start_time).num_milliseconds() as f64 / 1000.0,
            "state": entry.state,
            "role": entry.role,
            "content": entry.content,
        });
        if let Some(name) = &entry.name {
            obj["name"] = json!(name);
        }
        if let Some(result) = &entry.result {
            obj["result"] = result.clone();
        }
        serialized.push(obj.to_string());
    }

    // Greedy packing aligned to entry boundaries.
    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();
    for entry_json in serialized {
        let extra = entry_json.len() + 1;
        if !current.is_empty() && current.len() + extra > DUMP_CHUNK_BYTES {
            bodies.push(current);
            current = String::new();
        }
        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(&entry_json);
    }
    if !current.is_empty() {
        bodies.push(current);
    }

    let n = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| format!("TRANSCRIPT_DUMP|{}/{}|{{\"entries\":[{}]}}", i + 1, n, body))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sl_domain::state::State;

    fn entry(role: Role, content: &str, at: DateTime<Utc>, state: State) -> TranscriptEntry {
        TranscriptEntry {
            role,
            content: content.into(),
            timestamp: at,
            state,
            name: None,
            result: None,
        }
    }

    fn sample_log() -> (DateTime<Utc>, Vec<TranscriptEntry>) {
        let t0 = Utc::now();
        let log = vec![
            entry(Role::User, "my AC is out", t0, State::Welcome),
            TranscriptEntry {
                role: Role::Tool,
                content: String::new(),
                timestamp: t0 + Duration::milliseconds(500),
                state: State::Lookup,
                name: Some("lookup_caller".into()),
                result: Some(json!({"known": true})),
            },
            entry(
                Role::Agent,
                "Any safety concerns?",
                t0 + Duration::seconds(2),
                State::Safety,
            ),
        ];
        (t0, log)
    }

    #[test]
    fn plain_text_filters_tools_and_orders_by_time() {
        let (_, log) = sample_log();
        let text = plain_text(&log);
        assert_eq!(text, "User: my AC is out\nAgent: Any safety concerns?\n");
    }

    #[test]
    fn json_array_keeps_only_agent_and_user() {
        let (_, log) = sample_log();
        let arr = json_array(&log);
        let arr = arr.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["role"], "user");
        assert_eq!(arr[1]["role"], "agent");
        assert!(arr[0]["timestamp"].is_string());
    }

    #[test]
    fn dump_includes_tools_offsets_and_states() {
        let (t0, log) = sample_log();
        let chunks = dump_chunks(&log, t0);
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert!(chunk.starts_with("TRANSCRIPT_DUMP|1/1|"));
        let body: Value =
            serde_json::from_str(chunk.split('|').nth(2).unwrap()).unwrap();
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["t"], 0.0);
        assert_eq!(entries[1]["name"], "lookup_caller");
        assert_eq!(entries[2]["state"], "safety");
        assert_eq!(entries[2]["t"], 2.0);
    }

    #[test]
    fn dump_chunks_align_to_entry_boundaries() {
        let t0 = Utc::now();
        // Entries large enough to force several chunks.
        let log: Vec<TranscriptEntry> = (0..40)
            .map(|i| {
                entry(
                    Role::User,
                    &format!("{} {}", i, "x".repeat(400)),
                    t0 + Duration::seconds(i),
                    State::Discovery,
                )
            })
            .collect();

        let chunks = dump_chunks(&log, t0);
        assert!(chunks.len() > 1);

        let mut total = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            let header = format!("TRANSCRIPT_DUMP|{}/{}|", i + 1, chunks.len());
            assert!(chunk.starts_with(&header), "{chunk}");
            // Every chunk must parse on its own: no split entries.
            let body: Value =
                serde_json::from_str(&chunk[header.len()..]).unwrap();
            let entries = body["entries"].as_array().unwrap();
            assert!(!entries.is_empty());
            total += entries.len();
            assert!(chunk.len() <= DUMP_CHUNK_BYTES + 100, "chunk too big: {}", chunk.len());
        }
        assert_eq!(total, 40);
    }

    #[test]
    fn empty_log_produces_no_chunks() {
        let chunks = dump_chunks(&[], Utc::now());
        assert!(chunks.is_empty());
    }
}
