//! Default configuration constants for intervox.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 44.1kHz mono keeps full voice fidelity for the cloud collaborators, which
/// do their own downsampling. Local processing never touches the samples, so
/// there is no reason to capture at a lower rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default channel count. Interview audio is single-microphone.
pub const CHANNELS: u16 = 1;

/// Default frame size in samples delivered by the capture layer per callback.
pub const FRAME_SAMPLES: usize = 1024;

/// Default transcription worker pool size.
///
/// One worker is enough: transcriptions are best-effort background work and
/// the collaborator dominates the latency anyway. Raise for long interviews
/// with a slow transcription backend.
pub const WORKER_COUNT: usize = 1;

/// How long a worker blocks on the job queue before re-checking the session
/// phase, in milliseconds. Bounds the delay between a shutdown request and an
/// idle worker noticing it.
pub const WORKER_POLL_MS: u64 = 1000;

/// Ceiling on the shutdown drain in seconds.
///
/// After this long the drain gives up on in-flight work and force-terminates,
/// trading completeness for liveness.
pub const DRAIN_CEILING_SECS: u64 = 30;

/// Default transcript output file.
pub const TRANSCRIPT_FILE: &str = "interview_transcript.txt";

/// Default human-readable performance report file.
pub const PERFORMANCE_REPORT_FILE: &str = "performance_report.txt";

/// Default machine-readable performance data file.
pub const PERFORMANCE_DATA_FILE: &str = "performance_data.json";

/// Marker rendered in the transcript for entries whose response has not
/// arrived (or never will, after a failed transcription).
pub const PENDING_RESPONSE_MARKER: &str = "[transcription in progress]";

/// Default generation model id.
pub const GENERATION_MODEL: &str = "gemini-2.5-flash";

/// Base URL of the generative language API.
pub const GENERATION_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key for the cloud collaborators.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default collaborator request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// MIME type of encoded clips.
pub const WAV_MIME: &str = "audio/wav";

/// Question the interviewer opens every session with.
pub const OPENING_QUESTION: &str = "Hello! Welcome to your practice interview. \
    Let's begin with a quick introduction: could you tell me about yourself \
    and your background?";

/// Instruction sent with each clip to the transcription collaborator.
///
/// Requests the structured payload the answer extractor understands; plain
/// text replies are still accepted via the parser's fallback path.
pub const TRANSCRIPTION_INSTRUCTION: &str = "\
You are an audio transcription service for a two-party interview recording. \
Transcribe all speech, labeling speakers sequentially in order of first \
appearance (Speaker1, Speaker2, ...) and using the label Interviewer for the \
interviewer when identifiable. Preserve the exact language mix as spoken. \
Isolate background noise into background_notes rather than the conversation. \
Respond with JSON only, in this shape: \
{\"conversation\": [{\"speaker\": \"...\", \"text\": \"...\"}], \
\"background_notes\": [\"...\"], \"metadata\": {}}";

/// Instruction sent with each clip to the generation collaborator.
pub const GENERATION_INSTRUCTION: &str = "\
You are an interviewer conducting a professional practice interview. Listen \
to the candidate's recorded answer and ask the single next question. Always \
ask in English regardless of the language spoken, and keep the question \
concise and conversational. Reply with the question text only.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_and_frame_size_are_sane() {
        assert!(SAMPLE_RATE > 0);
        assert!(FRAME_SAMPLES > 0);
        assert_eq!(CHANNELS, 1);
    }

    #[test]
    fn transcription_instruction_requests_expected_payload_keys() {
        assert!(TRANSCRIPTION_INSTRUCTION.contains("conversation"));
        assert!(TRANSCRIPTION_INSTRUCTION.contains("background_notes"));
        assert!(TRANSCRIPTION_INSTRUCTION.contains("metadata"));
    }
}
