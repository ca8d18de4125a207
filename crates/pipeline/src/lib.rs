//! The real-time half of the conversation core: frame types, the
//! turn-aware frame processor, the TTS text sanitizer, and the inline
//! PCM resampler.
//!
//! The processor is an actor owning one [`sl_domain::session::CallSession`];
//! the pipeline framework feeds it STT fragments and assistant messages
//! and consumes the frames it pushes downstream.

pub mod frame;
pub mod processor;
pub mod resample;
pub mod sanitize;

pub use frame::{Frame, TranscriptionFrame};
pub use processor::{FrameProcessor, ProcessorHandle};
