use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub generation: GenerationConfig,
    pub report: ReportConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_samples: usize,
}

/// Session behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Transcription worker pool size.
    pub workers: usize,
    /// Worker queue poll interval in milliseconds.
    pub worker_poll_ms: u64,
    /// Shutdown drain ceiling in seconds.
    pub drain_ceiling_secs: u64,
    /// The question that opens every session.
    pub opening_question: String,
    /// External command used to speak questions aloud (e.g. "espeak").
    /// The question text is appended as the final argument. None disables
    /// speech playback.
    pub speech_command: Option<String>,
    /// Directory where finalized clips are persisted as WAV artifacts.
    /// None disables persistence; clips are kept in memory only.
    pub clip_dir: Option<PathBuf>,
}

/// Generation collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub timeout_secs: u64,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub transcript_path: PathBuf,
    /// Human-readable performance report. None disables it.
    pub performance_report_path: Option<PathBuf>,
    /// Machine-readable per-turn timing data. None disables it.
    pub performance_data_path: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            frame_samples: defaults::FRAME_SAMPLES,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            worker_poll_ms: defaults::WORKER_POLL_MS,
            drain_ceiling_secs: defaults::DRAIN_CEILING_SECS,
            opening_question: defaults::OPENING_QUESTION.to_string(),
            speech_command: None,
            clip_dir: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: defaults::GENERATION_MODEL.to_string(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            transcript_path: PathBuf::from(defaults::TRANSCRIPT_FILE),
            performance_report_path: Some(PathBuf::from(defaults::PERFORMANCE_REPORT_FILE)),
            performance_data_path: Some(PathBuf::from(defaults::PERFORMANCE_DATA_FILE)),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - INTERVOX_MODEL → generation.model
    /// - INTERVOX_AUDIO_DEVICE → audio.device
    /// - INTERVOX_TRANSCRIPT → report.transcript_path
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("INTERVOX_MODEL")
            && !model.is_empty()
        {
            self.generation.model = model;
        }

        if let Ok(device) = std::env::var("INTERVOX_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(transcript) = std::env::var("INTERVOX_TRANSCRIPT")
            && !transcript.is_empty()
        {
            self.report.transcript_path = PathBuf::from(transcript);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/intervox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("intervox")
            .join("config.toml")
    }
}
