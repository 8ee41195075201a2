//! Error types for intervox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntervoxError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio encoding failed: {message}")]
    AudioEncode { message: String },

    // Collaborator errors (transcription, generation, speech synthesis).
    // Always recoverable: the affected turn or entry stays incomplete.
    #[error("{service} call failed: {message}")]
    Collaborator { service: String, message: String },

    // Ledger errors
    #[error("Ledger index {index} out of range (len {len})")]
    LedgerIndexOutOfRange { index: usize, len: usize },

    #[error("Response for ledger entry {index} already recorded")]
    ResponseAlreadyRecorded { index: usize },

    // Shutdown errors
    #[error("Shutdown drain exceeded {ceiling_secs}s, force-terminating")]
    ShutdownTimeout { ceiling_secs: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl IntervoxError {
    /// Shorthand for a collaborator failure.
    pub fn collaborator(service: &str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, IntervoxError>;

/// Trait for reporting recoverable errors from session stages.
///
/// Collaborator failures never crash the session; they are routed here so the
/// front end (or a test) decides how to surface them.
pub trait ErrorReporter: Send + Sync {
    /// Reports a recoverable error from the named stage.
    fn report(&self, stage: &str, error: &IntervoxError);

    /// Reports a warning that is not tied to an error value.
    fn warn(&self, stage: &str, message: &str) {
        eprintln!("intervox: [{}] {}", stage, message);
    }
}

/// Default reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, stage: &str, error: &IntervoxError) {
        eprintln!("intervox: [{}] {}", stage, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_audio_device_not_found_display() {
        let error = IntervoxError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_audio_capture_display() {
        let error = IntervoxError::AudioCapture {
            message: "buffer overflow".to_string(),
        };
        assert_eq!(error.to_string(), "Audio capture failed: buffer overflow");
    }

    #[test]
    fn test_audio_encode_display() {
        let error = IntervoxError::AudioEncode {
            message: "zero-length clip".to_string(),
        };
        assert_eq!(error.to_string(), "Audio encoding failed: zero-length clip");
    }

    #[test]
    fn test_collaborator_display() {
        let error = IntervoxError::collaborator("transcription", "connection reset");
        assert_eq!(
            error.to_string(),
            "transcription call failed: connection reset"
        );
    }

    #[test]
    fn test_ledger_index_out_of_range_display() {
        let error = IntervoxError::LedgerIndexOutOfRange { index: 5, len: 2 };
        assert_eq!(error.to_string(), "Ledger index 5 out of range (len 2)");
    }

    #[test]
    fn test_response_already_recorded_display() {
        let error = IntervoxError::ResponseAlreadyRecorded { index: 3 };
        assert_eq!(
            error.to_string(),
            "Response for ledger entry 3 already recorded"
        );
    }

    #[test]
    fn test_shutdown_timeout_display() {
        let error = IntervoxError::ShutdownTimeout { ceiling_secs: 30 };
        assert_eq!(
            error.to_string(),
            "Shutdown drain exceeded 30s, force-terminating"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = IntervoxError::ConfigInvalidValue {
            key: "audio.sample_rate".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.sample_rate: must be positive"
        );
    }

    #[test]
    fn test_other_display() {
        let error = IntervoxError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: IntervoxError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: IntervoxError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: IntervoxError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<IntervoxError>();
        assert_sync::<IntervoxError>();
    }

    #[test]
    fn test_stderr_reporter_does_not_panic() {
        let reporter = StderrReporter;
        reporter.report("test", &IntervoxError::Other("boom".to_string()));
        reporter.warn("test", "just a warning");
    }
}
