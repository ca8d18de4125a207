//! The turn-aware frame processor.
//!
//! Sits between STT and the LLM. Runs as an actor: one task owns the
//! session and drains a command queue, so transcription frames are
//! serialized in arrival order, a tool result is fully applied before
//! the next frame is processed, and the extraction task's writes go
//! through the same loop as everything else. The two timers (post-tool
//! debounce, delayed call end) are spawned tasks that post commands
//! back into the queue; cancelling one is an `abort()`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use sl_backend::{CallContext, ToolBackend};
use sl_domain::action::Action;
use sl_domain::config::{FlowConfig, PipelineConfig};
use sl_domain::error::{Error, Result};
use sl_domain::session::{CallSession, ConversationEntry, Role, TranscriptEntry};
use sl_domain::state::State;
use sl_domain::tool::{BookResult, CallbackResult, LookupResult, ToolName, ToolRequest};
use sl_domain::trace::TraceEvent;
use sl_flow::machine::{Escalation, FlowEngine};
use sl_llm::{spawn_extraction, ExtractedFields, JsonCompleter};

use crate::frame::{Frame, TranscriptionFrame};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Event {
    /// A finalized STT fragment.
    Transcription(String),
    /// A completed assistant message observed at the context aggregator.
    AgentReply(String),
    /// The debounce (or hard-cap) timer fired for buffer generation `n`.
    FlushBuffer(u64),
    /// The delayed-end timer fired.
    FireEnd,
    /// The extraction task finished.
    Extracted(ExtractedFields),
    /// Pipeline shutdown.
    Shutdown,
}

struct BufferState {
    texts: Vec<String>,
    deadline: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle to a running processor. The pipeline framework feeds it STT
/// output and assistant messages; [`ProcessorHandle::finish`] returns
/// the session for the post-call orchestrator.
pub struct ProcessorHandle {
    tx: mpsc::UnboundedSender<Event>,
    join: JoinHandle<CallSession>,
}

impl ProcessorHandle {
    pub fn transcription(&self, text: &str) {
        let _ = self.tx.send(Event::Transcription(text.to_owned()));
    }

    pub fn agent_reply(&self, text: &str) {
        let _ = self.tx.send(Event::AgentReply(text.to_owned()));
    }

    /// Shut down (idempotent if the call already ended) and return the
    /// session record.
    pub async fn finish(self) -> Result<CallSession> {
        let _ = self.tx.send(Event::Shutdown);
        self.join
            .await
            .map_err(|e| Error::Other(format!("processor task failed: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Processor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FrameProcessor {
    session: CallSession,
    engine: FlowEngine,
    backend: Arc<dyn ToolBackend>,
    completer: Arc<dyn JsonCompleter>,
    cfg: PipelineConfig,
    max_turns_per_call: u32,
    max_turns_per_state: u32,
    downstream: mpsc::Sender<Frame>,
    tx: mpsc::UnboundedSender<Event>,
    buffer: Option<BufferState>,
    buffer_generation: u64,
    end_task: Option<JoinHandle<()>>,
}

impl FrameProcessor {
    /// Spawn the processor actor for one call.
    pub fn spawn(
        session: CallSession,
        engine: FlowEngine,
        backend: Arc<dyn ToolBackend>,
        completer: Arc<dyn JsonCompleter>,
        pipeline_cfg: &PipelineConfig,
        flow_cfg: &FlowConfig,
        downstream: mpsc::Sender<Frame>,
    ) -> ProcessorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = Self {
            session,
            engine,
            backend,
            completer,
            cfg: pipeline_cfg.clone(),
            max_turns_per_call: flow_cfg.max_turns_per_call,
            max_turns_per_state: flow_cfg.max_turns_per_state,
            downstream,
            tx: tx.clone(),
            buffer: None,
            buffer_generation: 0,
            end_task: None,
        };
        let join = tokio::spawn(processor.run(rx));
        ProcessorHandle { tx, join }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) -> CallSession {
        while let Some(event) = rx.recv().await {
            match event {
                Event::Transcription(text) => self.on_transcription(text).await,
                Event::AgentReply(text) => self.session.log_agent(&text, true),
                Event::FlushBuffer(generation) => self.on_flush(generation).await,
                Event::FireEnd => {
                    self.end_task = None;
                    self.cancel_buffer();
                    let _ = self.downstream.send(Frame::End).await;
                    break;
                }
                Event::Extracted(fields) => self.on_extracted(fields),
                Event::Shutdown => {
                    self.cancel_timers();
                    break;
                }
            }
        }
        self.session
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Input handling
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn on_transcription(&mut self, text: String) {
        // 1. Close-window handling: the first new utterance cancels a
        //    pending end; a second one in the same window does not.
        if let Some(handle) = self.end_task.take() {
            if !self.session.confirm_extended {
                handle.abort();
                self.session.confirm_extended = true;
                tracing::debug!(call_id = %self.session.call_id, "call end cancelled by new speech");
            } else {
                self.end_task = Some(handle);
                self.session.log_user(&text);
                self.session.turn_count += 1;
                tracing::debug!(call_id = %self.session.call_id, "close window already extended; ending anyway");
                return;
            }
        }

        // 2. Record the fragment. During buffer mode the permanent
        //    transcript gets every fragment but the LLM context gets one
        //    consolidated message at flush.
        let buffering = self.buffer.is_some();
        if buffering {
            self.log_user_fragment(&text);
        } else {
            self.session.log_user(&text);
        }

        // 3. Hard per-call ceiling.
        self.session.turn_count += 1;
        if self.session.turn_count > self.max_turns_per_call
            && !matches!(self.session.state, State::Callback | State::Done | State::SafetyExit)
        {
            self.cancel_buffer();
            let action = self.engine.escalate(&mut self.session, Escalation::CallTurnLimit);
            self.deliver_canned(&action).await;
            return;
        }

        // 4. Exchange-based per-state counting: fragments only count
        //    once the agent has spoken since the last increment.
        if self.session.agent_has_responded {
            self.session.state_turn_count += 1;
            self.session.agent_has_responded = false;
        }
        if self.session.state_turn_count > self.max_turns_per_state
            && !matches!(self.session.state, State::Callback | State::Done | State::SafetyExit)
        {
            self.cancel_buffer();
            let action = self.engine.escalate(&mut self.session, Escalation::StateTurnLimit);
            self.deliver_canned(&action).await;
            return;
        }

        // 5. Buffer mode: accumulate and restart the debounce timer.
        if buffering {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.texts.push(text);
            }
            self.restart_debounce();
            return;
        }

        // 6-10. One state-machine tick.
        self.tick(text).await;
    }

    /// Run the state machine once and execute the resulting action,
    /// then kick off extraction where it applies.
    async fn tick(&mut self, text: String) {
        let action = self.engine.handle(&mut self.session, &text, Utc::now());
        self.process_action(action, &text).await;

        // Fire-and-forget extraction, never during buffer mode (the
        // flush-consolidated text will get its own pass).
        if self.buffer.is_none()
            && matches!(
                self.session.state,
                State::ServiceArea | State::Discovery | State::Confirm
            )
        {
            let tx = self.tx.clone();
            spawn_extraction(
                self.completer.clone(),
                self.session.call_id.to_string(),
                self.session.conversation_history.clone(),
                move |fields| {
                    let _ = tx.send(Event::Extracted(fields));
                },
            );
        }
    }

    async fn process_action(&mut self, mut action: Action, text: &str) {
        // Canned speech goes out first so it covers tool latency.
        if let Some(line) = action.speak.take() {
            self.session.log_agent(&line, false);
            let _ = self.downstream.send(Frame::Speak(line)).await;
        }

        // Fire-and-forget notification ahead of the primary tool.
        if let Some(alert) = action.alert.take() {
            self.dispatch_alert(alert).await;
        }

        if let Some(tool) = action.tool.take() {
            let prev_state = self.session.state;
            self.dispatch_tool(tool).await;
            let new_state = self.session.state;

            // Post-tool routing only applies when the result handler
            // moved the flow somewhere new; a non-transitioning result
            // (create_callback) leaves the action as the handler built it.
            if new_state != prev_state {
                if new_state.expects_conversation() {
                    // Post-tool LLM handoff: without this the agent goes
                    // silent after a fast tool return. The push itself is
                    // deferred to the buffer flush.
                    action.needs_llm = true;
                    self.enter_buffer_mode(text);
                } else if new_state == State::Done {
                    // Booking confirmed: speak the confirmation and open
                    // the close window.
                    let line = self.session.confirmation_message.clone();
                    if !line.is_empty() {
                        self.session.log_agent(&line, false);
                        let _ = self.downstream.send(Frame::Speak(line)).await;
                    }
                    action.end_call = true;
                } else if new_state == State::Callback {
                    // Failure handoff: the LLM explains the callback; the
                    // caller's reply then drives the callback tools.
                    action.needs_llm = true;
                }
            }
        }

        if action.needs_llm {
            if self.buffer.is_none() {
                let _ = self
                    .downstream
                    .send(Frame::Transcription(TranscriptionFrame::new(text)))
                    .await;
            }
            // Otherwise deferred: the flush pushes one consolidated frame.
        }

        if action.end_call {
            self.schedule_end();
        }
    }

    /// Speak an escalation line and keep the call going; the callback
    /// state takes over on the caller's next utterance. Canned
    /// escalations are not conversational exchanges and do not trigger
    /// extraction.
    async fn deliver_canned(&mut self, action: &Action) {
        if let Some(line) = &action.speak {
            self.session.log_agent(line, false);
            let _ = self.downstream.send(Frame::Speak(line.clone())).await;
        }
        if action.end_call {
            self.schedule_end();
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Post-tool debounce buffer
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Enter buffer mode seeded with the utterance that triggered the
    /// tool: the caller was likely mid-thought, and the flush should
    /// hand the LLM the whole thought as one message.
    fn enter_buffer_mode(&mut self, originating_text: &str) {
        if self.buffer.is_some() {
            return;
        }

        // The originating fragment moves from the LLM context into the
        // buffer; the flush re-adds it consolidated.
        let duplicate = self
            .session
            .conversation_history
            .last()
            .map(|last| last.role == Role::User && last.content == originating_text)
            .unwrap_or(false);
        if duplicate {
            self.session.conversation_history.pop();
        }

        self.buffer_generation += 1;
        let generation = self.buffer_generation;
        let deadline = Instant::now() + Duration::from_secs_f64(self.cfg.buffer_max_s);
        let timer = spawn_flush_timer(
            self.tx.clone(),
            Duration::from_secs_f64(self.cfg.buffer_debounce_s),
            generation,
        );
        self.buffer = Some(BufferState {
            texts: vec![originating_text.to_owned()],
            deadline,
            generation,
            timer,
        });
    }

    /// Restart the debounce timer, clamped to the hard deadline.
    fn restart_debounce(&mut self) {
        self.buffer_generation += 1;
        let generation = self.buffer_generation;
        let debounce = Duration::from_secs_f64(self.cfg.buffer_debounce_s);
        let tx = self.tx.clone();

        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        buffer.timer.abort();
        buffer.generation = generation;

        let remaining = buffer.deadline.saturating_duration_since(Instant::now());
        buffer.timer = spawn_flush_timer(tx, remaining.min(debounce), generation);
    }

    /// Exit buffer mode and run exactly one state-machine tick on the
    /// concatenated text.
    async fn on_flush(&mut self, generation: u64) {
        let current = self.buffer.as_ref().map(|b| b.generation);
        if current != Some(generation) {
            // A fragment restarted the timer after this one fired.
            return;
        }
        let buffer = match self.buffer.take() {
            Some(b) => b,
            None => return,
        };
        buffer.timer.abort();

        let text = buffer.texts.join(" ");
        tracing::debug!(
            call_id = %self.session.call_id,
            fragments = buffer.texts.len(),
            "buffer flush"
        );

        // One consolidated user message for the LLM context.
        self.session.conversation_history.push(ConversationEntry {
            role: Role::User,
            content: text.clone(),
        });

        self.tick(text).await;
    }

    fn log_user_fragment(&mut self, text: &str) {
        self.session.transcript_log.push(TranscriptEntry {
            role: Role::User,
            content: text.to_owned(),
            timestamp: Utc::now(),
            state: self.session.state,
            name: None,
            result: None,
        });
    }

    fn cancel_buffer(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.timer.abort();
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Cancellable delayed end
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn schedule_end(&mut self) {
        if let Some(handle) = self.end_task.take() {
            handle.abort();
        }
        let terminal =
            self.session.terminal_reply_used || self.session.state == State::SafetyExit;
        let delay = if terminal {
            self.cfg.terminal_end_delay_s
        } else {
            self.cfg.end_delay_s
        };
        let tx = self.tx.clone();
        self.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            let _ = tx.send(Event::FireEnd);
        }));
    }

    fn cancel_timers(&mut self) {
        self.cancel_buffer();
        if let Some(handle) = self.end_task.take() {
            handle.abort();
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Tool dispatch
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Await the tool's HTTP call and apply its result handler. Errors
    /// degrade to an empty/failed result routed through the same
    /// handler, so a timeout and a "no slots" response take the same
    /// path.
    async fn dispatch_tool(&mut self, tool: ToolRequest) {
        let call = CallContext::from_session(&self.session);
        match tool.name {
            ToolName::LookupCaller => {
                let phone = tool
                    .arguments
                    .get("phone")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned();
                let result = match self.backend.lookup_caller(&call, &phone).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(call_id = %call.call_id, error = %e, "lookup_caller failed");
                        LookupResult::default()
                    }
                };
                self.log_tool_result(ToolName::LookupCaller, &result);
                FlowEngine::on_lookup_caller(&mut self.session, &result);
            }
            ToolName::BookService => {
                let request = tool.arguments.clone();
                let result = match self.backend.book_service(&call, tool.arguments).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(call_id = %call.call_id, error = %e, "book_service failed");
                        BookResult {
                            error: Some(e.to_string()),
                            ..BookResult::default()
                        }
                    }
                };
                // The drift analysis needs what we asked for next to
                // what we got, plus the urgency at booking time.
                let entry = serde_json::json!({
                    "request": request,
                    "urgency_at_booking": self.session.urgency_tier,
                    "response": serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
                });
                self.session.log_tool(ToolName::BookService.as_str(), entry);
                FlowEngine::on_book_service(&mut self.session, &result);
            }
            ToolName::CreateCallback => {
                let result = match self.backend.create_callback(&call, tool.arguments).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(call_id = %call.call_id, error = %e, "create_callback failed");
                        CallbackResult {
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                };
                self.log_tool_result(ToolName::CreateCallback, &result);
                FlowEngine::on_create_callback(&mut self.session, &result);
            }
            ToolName::SendSalesLeadAlert | ToolName::EndCall => {
                tracing::warn!(tool = %tool.name, "unexpected primary tool; ignoring");
            }
        }
    }

    async fn dispatch_alert(&mut self, alert: ToolRequest) {
        let call = CallContext::from_session(&self.session);
        match self.backend.send_sales_lead_alert(&call, alert.arguments).await {
            Ok(result) => self.log_tool_result(ToolName::SendSalesLeadAlert, &result),
            Err(e) => {
                tracing::warn!(call_id = %call.call_id, error = %e, "sales lead alert failed");
            }
        }
    }

    fn log_tool_result<T: serde::Serialize>(&mut self, name: ToolName, result: &T) {
        let value = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        self.session.log_tool(name.as_str(), value);
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Extraction results
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn on_extracted(&mut self, fields: ExtractedFields) {
        let filled = fields.apply_to(&mut self.session);
        if filled > 0 {
            TraceEvent::ExtractionApplied {
                call_id: self.session.call_id.to_string(),
                fields_filled: filled,
            }
            .emit();
        }
    }
}

fn spawn_flush_timer(
    tx: mpsc::UnboundedSender<Event>,
    wait: Duration,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        let _ = tx.send(Event::FlushBuffer(generation));
    })
}
