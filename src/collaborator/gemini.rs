//! Gemini-backed transcription and question generation.
//!
//! One HTTP client serves both collaborator roles: the request shape is
//! identical (instruction text part + inline base64 WAV part) and only the
//! instruction differs. The client owns a small tokio runtime and bridges
//! the synchronous trait calls with `block_on`, so the session core stays
//! thread-based.

use crate::audio::encode::EncodedClip;
use crate::collaborator::{GeneratedReply, QuestionGenerator, Transcriber};
use crate::config::GenerationConfig;
use crate::defaults;
use crate::error::{IntervoxError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::time::{Duration, Instant};

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Builds the config from the generation section plus the API key
    /// environment variable.
    pub fn from_env(generation: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(defaults::API_KEY_ENV).map_err(|_| {
            IntervoxError::ConfigInvalidValue {
                key: defaults::API_KEY_ENV.to_string(),
                message: "environment variable not set".to_string(),
            }
        })?;
        Self::new(api_key, &generation.model, generation.timeout_secs)
    }

    pub fn new(api_key: String, model: &str, timeout_secs: u64) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(IntervoxError::ConfigInvalidValue {
                key: defaults::API_KEY_ENV.to_string(),
                message: "API key is empty".to_string(),
            });
        }
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: defaults::GENERATION_BASE_URL.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// HTTP client for the Gemini generateContent endpoint, implementing both
/// the transcription and the generation collaborator traits.
pub struct GeminiClient {
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                IntervoxError::collaborator("generation", format!("HTTP client init: {}", e))
            })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| {
                IntervoxError::collaborator("generation", format!("runtime init: {}", e))
            })?;

        Ok(Self {
            http,
            runtime,
            config,
        })
    }

    /// One generateContent round trip: instruction + audio in, text out.
    fn generate_content(
        &self,
        service: &str,
        instruction: &str,
        clip: &EncodedClip,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = build_request_body(instruction, clip);

        self.runtime.block_on(async {
            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| IntervoxError::collaborator(service, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(IntervoxError::collaborator(
                    service,
                    format!("HTTP {}: {}", status, detail.trim()),
                ));
            }

            let payload: serde_json::Value = response
                .json()
                .await
                .map_err(|e| IntervoxError::collaborator(service, e.to_string()))?;

            parse_reply_text(&payload).ok_or_else(|| {
                IntervoxError::collaborator(service, "response contained no text")
            })
        })
    }
}

impl Transcriber for GeminiClient {
    fn transcribe(&self, clip: &EncodedClip) -> Result<String> {
        self.generate_content("transcription", defaults::TRANSCRIPTION_INSTRUCTION, clip)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

impl QuestionGenerator for GeminiClient {
    fn next_question(&self, clip: &EncodedClip) -> Result<GeneratedReply> {
        let started = Instant::now();
        let text = self.generate_content("generation", defaults::GENERATION_INSTRUCTION, clip)?;
        // Non-streaming: the whole reply is one chunk, arriving at the end.
        Ok(GeneratedReply {
            text,
            chunk_count: 1,
            first_chunk: Some(started.elapsed()),
        })
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Builds the generateContent request body: one text part with the
/// instruction, one inline_data part with the base64 WAV payload.
fn build_request_body(instruction: &str, clip: &EncodedClip) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": instruction },
                {
                    "inline_data": {
                        "mime_type": clip.mime_type,
                        "data": BASE64_STANDARD.encode(&clip.bytes),
                    }
                }
            ]
        }]
    })
}

/// Extracts the concatenated text parts of the first candidate.
fn parse_reply_text(payload: &serde_json::Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
