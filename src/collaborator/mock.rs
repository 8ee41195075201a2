//! Mock collaborators for testing.

use crate::audio::encode::EncodedClip;
use crate::collaborator::{GeneratedReply, QuestionGenerator, SpeechSynthesizer, Transcriber};
use crate::error::{IntervoxError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Mock transcriber with configurable response, failure and latency.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    name: String,
    response: String,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    seen_clips: Arc<Mutex<Vec<String>>>,
}

impl MockTranscriber {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_clips: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the raw text the mock returns (plain or structured JSON).
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure a processing delay, to simulate a slow collaborator.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcribe calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Clip ids seen so far, in call order.
    pub fn seen_clips(&self) -> Vec<String> {
        self.seen_clips.lock().unwrap().clone()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, clip: &EncodedClip) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_clips.lock().unwrap().push(clip.id.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.should_fail {
            Err(IntervoxError::collaborator(
                "transcription",
                "mock transcription failure",
            ))
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Mock question generator.
///
/// Returns queued questions in order when configured with `with_questions`,
/// falling back to a fixed response once the queue is exhausted.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    response: String,
    queued: Arc<Mutex<VecDeque<String>>>,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            response: "mock question".to_string(),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            should_fail: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the fallback response.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Queue questions returned one per call, in order.
    pub fn with_questions(self, questions: &[&str]) -> Self {
        {
            let mut queued = self.queued.lock().unwrap();
            queued.extend(questions.iter().map(|q| q.to_string()));
        }
        self
    }

    /// Configure the mock to fail on every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure a generation delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionGenerator for MockGenerator {
    fn next_question(&self, _clip: &EncodedClip) -> Result<GeneratedReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.should_fail {
            return Err(IntervoxError::collaborator(
                "generation",
                "mock generation failure",
            ));
        }
        let text = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.response.clone());
        Ok(GeneratedReply::complete(text))
    }

    fn name(&self) -> &str {
        "mock-generator"
    }
}

/// Mock speech synthesizer that records everything spoken.
#[derive(Debug, Clone)]
pub struct MockSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
    delay: Option<Duration>,
}

impl MockSpeaker {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            delay: None,
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Everything spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Default for MockSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for MockSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.should_fail {
            return Err(IntervoxError::collaborator("speech", "mock speech failure"));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> EncodedClip {
        EncodedClip {
            id: "clip_mock_001".to_string(),
            mime_type: "audio/wav",
            bytes: vec![0u8; 16],
            duration: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_mock_transcriber_returns_response_and_records_clip() {
        let transcriber = MockTranscriber::new("test-model").with_response("hello");

        let result = transcriber.transcribe(&clip()).unwrap();

        assert_eq!(result, "hello");
        assert_eq!(transcriber.call_count(), 1);
        assert_eq!(transcriber.seen_clips(), vec!["clip_mock_001"]);
    }

    #[test]
    fn test_mock_transcriber_failure() {
        let transcriber = MockTranscriber::new("test-model").with_failure();

        let err = transcriber.transcribe(&clip()).unwrap_err();
        assert!(matches!(err, IntervoxError::Collaborator { .. }));
        assert_eq!(transcriber.call_count(), 1);
    }

    #[test]
    fn test_mock_transcriber_delay() {
        let transcriber =
            MockTranscriber::new("test-model").with_delay(Duration::from_millis(30));

        let started = std::time::Instant::now();
        transcriber.transcribe(&clip()).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_mock_generator_queued_questions_in_order() {
        let generator = MockGenerator::new()
            .with_questions(&["first?", "second?"])
            .with_response("fallback?");

        assert_eq!(generator.next_question(&clip()).unwrap().text, "first?");
        assert_eq!(generator.next_question(&clip()).unwrap().text, "second?");
        assert_eq!(generator.next_question(&clip()).unwrap().text, "fallback?");
        assert_eq!(generator.call_count(), 3);
    }

    #[test]
    fn test_mock_generator_failure() {
        let generator = MockGenerator::new().with_failure();
        assert!(generator.next_question(&clip()).is_err());
    }

    #[test]
    fn test_mock_speaker_records_spoken_text() {
        let speaker = MockSpeaker::new();
        speaker.speak("question one").unwrap();
        speaker.speak("question two").unwrap();

        assert_eq!(speaker.spoken(), vec!["question one", "question two"]);
    }

    #[test]
    fn test_mock_speaker_failure_records_nothing() {
        let speaker = MockSpeaker::new().with_failure();
        assert!(speaker.speak("lost words").is_err());
        assert!(speaker.spoken().is_empty());
    }
}
