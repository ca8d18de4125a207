//! End-to-end scenarios over the real frame processor with a mock
//! backend and a mock extraction model. Time is paused, so debounce and
//! close-window timers run deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use sl_backend::{CallContext, ToolBackend};
use sl_domain::config::{FlowConfig, PipelineConfig};
use sl_domain::error::{Error, Result};
use sl_domain::session::{CallSession, Role};
use sl_domain::state::State;
use sl_domain::tool::{AlertResult, BookResult, CallbackResult, LookupResult};
use sl_flow::canned;
use sl_flow::FlowEngine;
use sl_llm::JsonCompleter;
use sl_pipeline::{Frame, FrameProcessor, ProcessorHandle};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct MockBackend {
    lookup: LookupResult,
    book: Option<BookResult>,
    book_error: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn invocations(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolBackend for MockBackend {
    async fn lookup_caller(&self, _call: &CallContext, _phone: &str) -> Result<LookupResult> {
        self.calls.lock().unwrap().push("lookup_caller".into());
        Ok(self.lookup.clone())
    }

    async fn book_service(
        &self,
        _call: &CallContext,
        _args: serde_json::Value,
    ) -> Result<BookResult> {
        self.calls.lock().unwrap().push("book_service".into());
        if let Some(e) = &self.book_error {
            return Err(Error::Timeout(e.clone()));
        }
        Ok(self.book.clone().unwrap_or_default())
    }

    async fn create_callback(
        &self,
        _call: &CallContext,
        _args: serde_json::Value,
    ) -> Result<CallbackResult> {
        self.calls.lock().unwrap().push("create_callback".into());
        Ok(CallbackResult {
            success: true,
            error: None,
        })
    }

    async fn send_sales_lead_alert(
        &self,
        _call: &CallContext,
        _payload: serde_json::Value,
    ) -> Result<AlertResult> {
        self.calls.lock().unwrap().push("send_sales_lead_alert".into());
        Ok(AlertResult { success: true })
    }
}

/// Extraction model stub: always proposes the same soft fields.
struct MockCompleter(serde_json::Value);

#[async_trait]
impl JsonCompleter for MockCompleter {
    async fn complete_json(&self, _system: &str, _user: &str) -> Result<serde_json::Value> {
        Ok(self.0.clone())
    }
}

fn extraction_stub() -> Arc<dyn JsonCompleter> {
    Arc::new(MockCompleter(serde_json::json!({
        "problem_description": "AC blowing warm",
        "equipment_type": "central AC",
        "problem_duration": "",
        "preferred_time": ""
    })))
}

fn silent_extraction() -> Arc<dyn JsonCompleter> {
    Arc::new(MockCompleter(serde_json::json!({})))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    handle: ProcessorHandle,
    frames: mpsc::Receiver<Frame>,
    backend: Arc<MockBackend>,
}

fn spawn_with(
    session: CallSession,
    backend: MockBackend,
    completer: Arc<dyn JsonCompleter>,
) -> Harness {
    let (tx, rx) = mpsc::channel(64);
    let backend = Arc::new(backend);
    let engine = FlowEngine::new(&FlowConfig::default()).unwrap();
    let handle = FrameProcessor::spawn(
        session,
        engine,
        backend.clone(),
        completer,
        &PipelineConfig::default(),
        &FlowConfig::default(),
        tx,
    );
    Harness {
        handle,
        frames: rx,
        backend,
    }
}

/// Let the processor and any spawned tasks drain.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

impl Harness {
    async fn say(&self, text: &str) {
        self.handle.transcription(text);
        settle().await;
    }

    async fn agent(&self, text: &str) {
        self.handle.agent_reply(text);
        settle().await;
    }

    async fn next_frame(&mut self) -> Frame {
        self.frames.recv().await.expect("pipeline closed early")
    }

    /// Receive frames until a Transcription frame arrives.
    async fn next_llm_push(&mut self) -> String {
        loop {
            if let Frame::Transcription(t) = self.next_frame().await {
                return t.text;
            }
        }
    }
}

fn known_caller_lookup() -> LookupResult {
    LookupResult {
        known: true,
        name: "Jonas".into(),
        zip_code: "78701".into(),
        service_address: "4329 Franklin St".into(),
        ..LookupResult::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seed scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn happy_path_books_known_caller() {
    let backend = MockBackend {
        lookup: known_caller_lookup(),
        book: Some(BookResult {
            booking_confirmed: true,
            booked: true,
            appointment_time: Some("2026-02-24T12:00:00-06:00".into()),
            confirmation_message: "You're set for noon today.".into(),
            ..BookResult::default()
        }),
        ..MockBackend::default()
    };
    let mut h = spawn_with(CallSession::new("+15125551234"), backend, extraction_stub());

    // Welcome: canned bridge + lookup, then the post-tool buffer flushes.
    h.say("Hi, my AC is blowing warm").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::LOOKUP_BRIDGE.into()));
    let pushed = h.next_llm_push().await;
    assert!(pushed.contains("AC is blowing warm"));

    // Safety: all clear.
    h.agent("Any safety concerns - gas smell, smoke, sparks?").await;
    h.say("no, nothing like that").await;
    h.next_llm_push().await;

    // Service area.
    h.agent("What's the ZIP for the service address?").await;
    h.say("78701").await;
    h.next_llm_push().await;

    // Discovery: lookup + extraction already filled everything, so the
    // first utterance lands the urgency bridge.
    h.agent("And what's going on with the unit?").await;
    h.say("like I said, it's blowing warm air").await;
    match h.next_frame().await {
        Frame::Speak(line) => assert!(line.starts_with(canned::URGENCY_BRIDGE)),
        other => panic!("expected urgency bridge, got {other:?}"),
    }

    // Confirm: consent with a time books.
    h.say("today, yes, book it").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::BOOKING_BRIDGE.into()));
    assert_eq!(
        h.next_frame().await,
        Frame::Speak("You're set for noon today.".into())
    );

    // Close window elapses, the call ends.
    assert_eq!(h.next_frame().await, Frame::End);

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::Done);
    assert!(session.booking_attempted && session.booking_confirmed);
    assert_eq!(session.booked_time, "2026-02-24T12:00:00-06:00");
    assert_eq!(session.customer_name, "Jonas");
    assert_eq!(session.zip_code, "78701");
    assert_eq!(session.problem_description, "AC blowing warm");
    assert_eq!(
        h.backend.invocations(),
        vec!["lookup_caller".to_string(), "book_service".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn slot_substitution_reaches_done_with_backend_slot() {
    let backend = MockBackend {
        lookup: known_caller_lookup(),
        book: Some(BookResult {
            booking_confirmed: true,
            booked: true,
            appointment_time: Some("2026-02-27T15:45:00-06:00".into()),
            confirmation_message: "Closest I have is 3:45 PM.".into(),
            ..BookResult::default()
        }),
        ..MockBackend::default()
    };
    let mut session = CallSession::new("+15125551234");
    session.state = State::Confirm;
    session.customer_name = "Jonas".into();
    session.service_address = "4329 Franklin St".into();
    session.problem_description = "AC blowing warm".into();

    let mut h = spawn_with(session, backend, silent_extraction());

    h.say("tomorrow at 4:30 PM, yes book it").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::BOOKING_BRIDGE.into()));
    assert_eq!(h.next_frame().await, Frame::Speak("Closest I have is 3:45 PM.".into()));
    assert_eq!(h.next_frame().await, Frame::End);

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::Done);
    // The drift between these two is the post-call orchestrator's job.
    assert!(session.preferred_time.contains("tomorrow"));
    assert_eq!(session.booked_time, "2026-02-27T15:45:00-06:00");
}

#[tokio::test(start_paused = true)]
async fn booking_failure_routes_to_callback() {
    let backend = MockBackend {
        lookup: known_caller_lookup(),
        book: Some(BookResult {
            error: Some("No slots".into()),
            ..BookResult::default()
        }),
        ..MockBackend::default()
    };
    let mut session = CallSession::new("+15125551234");
    session.state = State::Confirm;
    session.customer_name = "Jonas".into();
    session.service_address = "4329 Franklin St".into();
    session.problem_description = "AC blowing warm".into();

    let mut h = spawn_with(session, backend, silent_extraction());

    h.say("today please, go ahead").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::BOOKING_BRIDGE.into()));
    // Failure hands off to the LLM to explain the callback.
    h.next_llm_push().await;

    h.agent("I couldn't lock that in - the office will call you back shortly.")
        .await;
    h.say("okay, that works").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::CALLBACK_CLOSE.into()));
    assert_eq!(h.next_frame().await, Frame::End);

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::Callback);
    assert!(session.booking_attempted && !session.booking_confirmed);
    assert_eq!(session.callback_type, "booking_failed");
    assert!(session.callback_created);
    assert!(h.backend.invocations().contains(&"create_callback".to_string()));
}

#[tokio::test(start_paused = true)]
async fn fragmented_address_counts_as_one_exchange() {
    let mut session = CallSession::new("+15125551234");
    session.state = State::Discovery;
    session.agent_has_responded = true;

    let h = spawn_with(session, MockBackend::default(), silent_extraction());

    for fragment in [
        "Okay it's",
        "four three two nine",
        "Franklin Street",
        "Franklin",
        "Austin Texas",
    ] {
        h.say(fragment).await;
    }

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::Discovery);
    assert_eq!(session.state_turn_count, 1, "fragments must count as one exchange");
    assert_eq!(session.turn_count, 5, "every frame counts toward the hard ceiling");
}

#[tokio::test(start_paused = true)]
async fn post_tool_debounce_consolidates_fragments() {
    let backend = MockBackend {
        lookup: known_caller_lookup(),
        ..MockBackend::default()
    };
    let mut h = spawn_with(CallSession::new("+15125551234"), backend, silent_extraction());

    h.say("I'm having a problem with my air").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::LOOKUP_BRIDGE.into()));

    // The caller keeps talking while the tool result lands.
    h.say("conditioning unit that's not cooling.").await;

    let pushed = h.next_llm_push().await;
    assert_eq!(
        pushed,
        "I'm having a problem with my air conditioning unit that's not cooling."
    );

    let session = h.handle.finish().await.unwrap();
    // One consolidated user message in the LLM context...
    let user_history: Vec<_> = session
        .conversation_history
        .iter()
        .filter(|e| e.role == Role::User)
        .collect();
    assert_eq!(user_history.len(), 1);
    assert!(user_history[0].content.contains("not cooling"));
    // ...but every fragment on the permanent transcript.
    let user_log = session
        .transcript_log
        .iter()
        .filter(|e| e.role == Role::User)
        .count();
    assert_eq!(user_log, 2);
}

#[tokio::test(start_paused = true)]
async fn safety_emergency_exits_with_script() {
    let mut session = CallSession::new("+15125551234");
    session.state = State::Safety;

    let mut h = spawn_with(session, MockBackend::default(), silent_extraction());

    h.say("I smell gas in the hallway").await;
    match h.next_frame().await {
        Frame::Speak(line) => assert!(line.contains("911")),
        other => panic!("expected safety script, got {other:?}"),
    }
    assert_eq!(h.next_frame().await, Frame::End);

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::SafetyExit);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Boundary behaviors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn state_turn_limit_escalates_to_callback() {
    let mut session = CallSession::new("+15125551234");
    session.state = State::Discovery;

    let mut h = spawn_with(session, MockBackend::default(), silent_extraction());

    // Six full exchanges with no progress.
    for i in 0..6 {
        h.agent(&format!("Could you repeat that? ({i})")).await;
        h.say("mumble mumble").await;
    }

    // Drain LLM pushes until the escalation line shows up.
    let mut saw_escalation = false;
    while let Ok(frame) = tokio::time::timeout(Duration::from_secs(1), h.next_frame()).await {
        if frame == Frame::Speak(canned::STATE_LIMIT_ESCALATION.into()) {
            saw_escalation = true;
            break;
        }
    }
    assert!(saw_escalation);

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.state, State::Callback);
    assert_eq!(session.callback_type, "turn_limit");
}

#[tokio::test(start_paused = true)]
async fn buffer_hard_cap_flushes_despite_fresh_fragments() {
    let backend = MockBackend {
        lookup: known_caller_lookup(),
        ..MockBackend::default()
    };
    let mut h = spawn_with(CallSession::new("+15125551234"), backend, silent_extraction());

    h.say("hello there").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::LOOKUP_BRIDGE.into()));
    let start = Instant::now();

    // A fragment every second keeps the 1.5 s debounce from ever firing;
    // the 5 s hard cap must flush anyway.
    for i in 0..4 {
        tokio::time::advance(Duration::from_secs(1)).await;
        h.say(&format!("fragment {i}")).await;
    }

    let pushed = h.next_llm_push().await;
    let elapsed = start.elapsed();
    assert!(pushed.starts_with("hello there fragment 0"));
    assert!(pushed.contains("fragment 3"));
    assert!(
        elapsed <= Duration::from_millis(5200),
        "hard cap should flush at ~5s, took {elapsed:?}"
    );

    let _ = h.handle.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn close_window_cancels_once_then_ends_regardless() {
    let mut session = CallSession::new("+15125551234");
    session.state = State::Confirm;
    session.customer_name = "Jonas".into();
    session.service_address = "4329 Franklin St".into();
    session.problem_description = "AC out".into();

    let backend = MockBackend {
        book: Some(BookResult {
            booking_confirmed: true,
            confirmation_message: "Booked for noon.".into(),
            ..BookResult::default()
        }),
        ..MockBackend::default()
    };
    let mut h = spawn_with(session, backend, silent_extraction());

    h.say("today, book it").await;
    assert_eq!(h.next_frame().await, Frame::Speak(canned::BOOKING_BRIDGE.into()));
    assert_eq!(h.next_frame().await, Frame::Speak("Booked for noon.".into()));

    // First interruption cancels the pending end and earns one reply.
    h.say("wait - what time was that again?").await;
    let pushed = h.next_llm_push().await;
    assert!(pushed.contains("what time"));
    h.agent("Noon today - you're all set.").await;

    // Second interruption cannot cancel again; the call still ends.
    h.say("hmm, and also").await;
    assert_eq!(h.next_frame().await, Frame::End);

    let session = h.handle.finish().await.unwrap();
    assert!(session.confirm_extended);
    assert_eq!(session.state, State::Done);
}

#[tokio::test(start_paused = true)]
async fn turn_count_increments_once_per_frame() {
    let mut session = CallSession::new("+15125551234");
    session.state = State::Discovery;

    let h = spawn_with(session, MockBackend::default(), silent_extraction());
    for i in 0..7 {
        h.say(&format!("frame {i}")).await;
    }
    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.turn_count, 7);
}

#[tokio::test(start_paused = true)]
async fn extraction_never_touches_handler_owned_fields() {
    let completer: Arc<dyn JsonCompleter> = Arc::new(MockCompleter(serde_json::json!({
        // A hostile extraction payload: handler-owned keys are simply
        // not part of the schema and must be ignored.
        "customer_name": "Wrong Name",
        "zip_code": "00000",
        "service_address": "1 Hacker Way",
        "problem_description": "heater rattling"
    })));

    let mut session = CallSession::new("+15125551234");
    session.state = State::Discovery;
    session.customer_name = "Jonas".into();
    session.zip_code = "78701".into();
    session.service_address = "4329 Franklin St".into();

    let h = spawn_with(session, MockBackend::default(), completer);
    h.say("it's the heater, it rattles").await;
    settle().await;

    let session = h.handle.finish().await.unwrap();
    assert_eq!(session.customer_name, "Jonas");
    assert_eq!(session.zip_code, "78701");
    assert_eq!(session.service_address, "4329 Franklin St");
    assert_eq!(session.problem_description, "heater rattling");
}
