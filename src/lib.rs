//! intervox - Voice-driven mock interview assistant
//!
//! Mute-delimited audio capture with background transcription and a
//! synchronously generated next question per turn.

// Enforce error handling discipline in library code
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod cli;
pub mod collaborator;
pub mod config;
pub mod defaults;
pub mod error;
pub mod report;
pub mod session;

// Collaborator seams (swap real services for mocks in tests)
pub use collaborator::{GeneratedReply, QuestionGenerator, SpeechSynthesizer, Transcriber};

// Session core
pub use session::capture::{CaptureGate, FrameSink};
pub use session::orchestrator::{
    DrainOutcome, Session, SessionBuilder, SessionOptions, TurnOutcome,
};
pub use session::state::SessionPhase;

// Error handling
pub use error::{ErrorReporter, IntervoxError, Result, StderrReporter};

// Config
pub use config::Config;

// Artifacts
pub use report::{PerformanceLog, TranscriptWriter};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
