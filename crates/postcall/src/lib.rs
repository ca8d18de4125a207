//! Post-call pipeline: transcript assembly, classification, drift
//! analysis, payload assembly and signing, idempotent webhook delivery,
//! and the quality scorecard.
//!
//! Runs exactly once after the audio pipeline returns; the idempotency
//! gate makes a duplicate invocation a no-op.

pub mod drift;
pub mod orchestrator;
pub mod payload;
pub mod transcript;
pub mod webhook;

pub use orchestrator::run_post_call;
pub use webhook::WebhookClient;
