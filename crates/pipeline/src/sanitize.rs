//! Text sanitation for the TTS boundary.
//!
//! Streaming TTS services split text into UTF-8 chunks; em and en
//! dashes sit on multi-byte boundaries and have crashed more than one
//! of them. The fix is applied exactly once, here, in the wrapper every
//! outbound utterance passes through - canned lines and LLM text alike.

use crate::frame::Frame;

/// Replace U+2014 (em dash) and U+2013 (en dash) with a plain hyphen.
pub fn clean(text: &str) -> String {
    if !text.contains(['\u{2014}', '\u{2013}']) {
        return text.to_owned();
    }
    text.replace(['\u{2014}', '\u{2013}'], "-")
}

/// Sanitize the speakable content of a frame.
pub fn sanitize_frame(frame: Frame) -> Frame {
    match frame {
        Frame::Speak(text) => Frame::Speak(clean(&text)),
        Frame::Transcription(t) => Frame::Transcription(t),
        Frame::End => Frame::End,
    }
}

/// Sanitize LLM-generated reply text on its way to the TTS service.
pub fn sanitize_reply(text: &str) -> String {
    clean(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TranscriptionFrame;

    #[test]
    fn replaces_both_dash_kinds() {
        assert_eq!(clean("now\u{2014}or later"), "now-or later");
        assert_eq!(clean("9\u{2013}5"), "9-5");
        assert_eq!(clean("a\u{2014}b\u{2013}c"), "a-b-c");
    }

    #[test]
    fn plain_text_passes_untouched() {
        assert_eq!(clean("already - hyphenated"), "already - hyphenated");
    }

    #[test]
    fn only_speak_frames_are_rewritten() {
        let speak = sanitize_frame(Frame::Speak("wait\u{2014}one moment".into()));
        assert_eq!(speak, Frame::Speak("wait-one moment".into()));

        let passthrough =
            sanitize_frame(Frame::Transcription(TranscriptionFrame::new("a\u{2014}b")));
        assert_eq!(
            passthrough,
            Frame::Transcription(TranscriptionFrame::new("a\u{2014}b"))
        );
    }
}
