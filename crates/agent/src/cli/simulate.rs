//! `serviceline simulate`: drive a call from the terminal.
//!
//! Each line typed is fed to the frame processor as a finalized STT
//! fragment. Lines starting with `:agent ` are injected as assistant
//! messages, standing in for the conversational LLM the real pipeline
//! runs downstream. When the processor ends the call (or on Ctrl+D),
//! the post-call orchestrator runs against the configured receiver.

use std::sync::Arc;

use tokio::sync::mpsc;

use sl_backend::RestToolBackend;
use sl_domain::config::Config;
use sl_domain::session::CallSession;
use sl_flow::FlowEngine;
use sl_llm::OpenAiCompatClient;
use sl_pipeline::{sanitize, Frame, FrameProcessor};
use sl_postcall::{run_post_call, WebhookClient};

pub async fn simulate(config: Config, phone: String, no_webhooks: bool) -> anyhow::Result<()> {
    let engine = FlowEngine::new(&config.flow)?;
    let backend = Arc::new(RestToolBackend::new(&config.backend)?);
    let completer = Arc::new(OpenAiCompatClient::new(&config.llm)?);

    let session = CallSession::new(phone);
    let call_id = session.call_id;
    eprintln!("Simulated call {call_id}");
    eprintln!("Type caller speech; ':agent <text>' injects an assistant reply; Ctrl+D hangs up.");
    eprintln!();

    let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(64);
    let handle = FrameProcessor::spawn(
        session,
        engine,
        backend,
        completer.clone(),
        &config.pipeline,
        &config.flow,
        frame_tx,
    );

    // Drain frames to the terminal through the same sanitizer the TTS
    // wrapper uses in production.
    let (ended_tx, mut ended_rx) = mpsc::channel::<()>(1);
    let printer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            match sanitize::sanitize_frame(frame) {
                Frame::Speak(line) => println!("agent (canned)> {line}"),
                Frame::Transcription(t) => {
                    println!("[-> llm] {}", t.text);
                }
                Frame::End => {
                    println!("[call ended]");
                    let _ = ended_tx.send(()).await;
                    break;
                }
            }
        }
    });

    // Readline loop on the blocking pool; rustyline is synchronous.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(8);
    std::thread::spawn(move || {
        let mut rl = match rustyline::DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("readline init failed: {e}");
                return;
            }
        };
        loop {
            match rl.readline("caller> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(&line);
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    loop {
        tokio::select! {
            _ = ended_rx.recv() => break,
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(reply) = trimmed.strip_prefix(":agent ") {
                    handle.agent_reply(reply);
                } else {
                    handle.transcription(trimmed);
                }
            }
        }
    }

    let mut session = handle.finish().await?;
    printer.abort();

    if no_webhooks {
        eprintln!("call {} finished in state {}; webhooks skipped", call_id, session.state);
        return Ok(());
    }

    let webhooks = WebhookClient::new(&config.webhook)?;
    run_post_call(&mut session, completer.as_ref(), &webhooks).await;
    eprintln!(
        "call {} finished in state {}; synced={}",
        call_id, session.state, session.synced_to_dashboard
    );
    Ok(())
}
