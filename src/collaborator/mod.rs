//! External collaborator seams.
//!
//! The session core treats transcription, question generation and speech
//! synthesis as external services with one contract: accept bytes (or text),
//! return text (or fail). These traits are the seams; real implementations
//! live in [`gemini`] and [`speech`], mocks in [`mock`].

pub mod gemini;
pub mod mock;
pub mod parse;
pub mod speech;

use crate::audio::encode::EncodedClip;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Trait for the transcription collaborator.
///
/// Returns the collaborator's raw text output — structured JSON or plain
/// text. The answer is extracted afterwards by [`parse::extract_answer`],
/// so a malformed payload is a recoverable condition, not an error here.
pub trait Transcriber: Send + Sync {
    /// Transcribe an encoded audio clip.
    fn transcribe(&self, clip: &EncodedClip) -> Result<String>;

    /// Name of the backing service/model, for logs and reports.
    fn name(&self) -> &str;
}

/// A fully assembled reply from the generation collaborator.
///
/// Implementations that stream record chunk arrival for instrumentation but
/// still return one complete text: the orchestrator only ever sees the
/// blocking call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    /// Number of chunks the reply arrived in (1 for non-streaming backends).
    pub chunk_count: u32,
    /// Latency until the first chunk arrived, when known.
    pub first_chunk: Option<Duration>,
}

impl GeneratedReply {
    /// A reply that arrived in one piece.
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk_count: 1,
            first_chunk: None,
        }
    }
}

/// Trait for the generation collaborator ("the next question").
pub trait QuestionGenerator: Send + Sync {
    /// Generate the next interview question from the candidate's answer
    /// audio. Blocks until the full reply is assembled.
    fn next_question(&self, clip: &EncodedClip) -> Result<GeneratedReply>;

    /// Name of the backing service/model, for logs and reports.
    fn name(&self) -> &str;
}

/// Trait for the speech-synthesis collaborator.
///
/// `speak` returns once playback has completed; that return is the
/// synchronization signal the orchestrator waits on.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> Result<()>;
}

/// Implement the traits for Arc<T> so collaborators can be shared across
/// threads without wrapper types.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, clip: &EncodedClip) -> Result<String> {
        (**self).transcribe(clip)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: QuestionGenerator + ?Sized> QuestionGenerator for Arc<T> {
    fn next_question(&self, clip: &EncodedClip) -> Result<GeneratedReply> {
        (**self).next_question(clip)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    fn speak(&self, text: &str) -> Result<()> {
        (**self).speak(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::{MockGenerator, MockTranscriber};

    fn clip() -> EncodedClip {
        EncodedClip {
            id: "clip_test_001".to_string(),
            mime_type: "audio/wav",
            bytes: vec![0u8; 64],
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_generated_reply_complete() {
        let reply = GeneratedReply::complete("What is overfitting?");
        assert_eq!(reply.text, "What is overfitting?");
        assert_eq!(reply.chunk_count, 1);
        assert!(reply.first_chunk.is_none());
    }

    #[test]
    fn test_traits_are_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("mock").with_response("hello"));
        assert_eq!(transcriber.transcribe(&clip()).unwrap(), "hello");

        let generator: Box<dyn QuestionGenerator> =
            Box::new(MockGenerator::new().with_response("next?"));
        assert_eq!(generator.next_question(&clip()).unwrap().text, "next?");
    }

    #[test]
    fn test_arc_impls_delegate() {
        let transcriber = Arc::new(MockTranscriber::new("mock").with_response("via arc"));
        assert_eq!(Transcriber::name(&transcriber), "mock");
        assert_eq!(transcriber.transcribe(&clip()).unwrap(), "via arc");
    }
}
