//! Frame types exchanged with the surrounding audio pipeline.
//!
//! The framework upstream of the processor produces finalized
//! [`TranscriptionFrame`]s; everything the processor emits downstream
//! is a [`Frame`]. Audio never passes through the core.

/// One finalized speech-to-text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionFrame {
    pub text: String,
}

impl TranscriptionFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// What the processor pushes downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Forward the caller's (possibly consolidated) utterance to the
    /// LLM for a generated reply.
    Transcription(TranscriptionFrame),
    /// A canned utterance for the TTS service, bypassing the LLM.
    Speak(String),
    /// Terminate the call.
    End,
}
