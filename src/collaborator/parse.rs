//! Structured-response parsing for transcription payloads.
//!
//! The transcription collaborator is asked for JSON of the shape
//! `{conversation: [{speaker, text}], background_notes: [...], metadata: {}}`
//! but may answer with fenced markdown or plain text. The extractor accepts
//! all three: fences are stripped, the structured payload is preferred, and
//! on parse failure the whole text is treated as one utterance.

use serde::Deserialize;

/// The structured payload the transcription collaborator is asked to return.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StructuredTranscript {
    #[serde(default)]
    pub conversation: Vec<Utterance>,
    #[serde(default)]
    pub background_notes: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One labeled utterance within the conversation.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Utterance {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
}

/// Strips a surrounding markdown code fence (with optional info string such
/// as ```` ```json ````) from the collaborator's output.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string on the opening fence line.
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[newline + 1..];
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Attempts to parse the structured payload.
pub fn parse_structured(raw: &str) -> Option<StructuredTranscript> {
    serde_json::from_str(strip_code_fences(raw)).ok()
}

/// Extracts "the answer" from the collaborator's raw output: the
/// concatenated text of every non-interviewer speaker.
///
/// Fallback: output that is not valid JSON is treated as one unlabeled
/// utterance and returned whole. Returns `None` when the payload parses but
/// contains no candidate speech, or when the output is empty.
pub fn extract_answer(raw: &str) -> Option<String> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return None;
    }

    match serde_json::from_str::<StructuredTranscript>(cleaned) {
        Ok(payload) => {
            let parts: Vec<&str> = payload
                .conversation
                .iter()
                .filter(|u| !u.speaker.to_lowercase().contains("interviewer"))
                .map(|u| u.text.trim())
                .filter(|t| !t.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        Err(_) => Some(cleaned.to_string()),
    }
}
