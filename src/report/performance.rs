//! Per-turn latency measurements and the aggregate session report.
//!
//! Records are keyed by clip id: a ledger entry can be targeted by more than
//! one clip (the user re-answers after a failed generation), but each clip
//! makes exactly one turn attempt.

use crate::error::Result;
use chrono::Local;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Timing and outcome of one collaborator stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTiming {
    pub duration: Duration,
    pub success: bool,
}

/// Timing of the generation stage, with streaming instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTiming {
    pub duration: Duration,
    pub success: bool,
    /// Latency until the first chunk arrived, when the backend reports it.
    pub first_chunk: Option<Duration>,
    pub chunk_count: u32,
}

/// One turn attempt: a finalized clip and everything that happened to it.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub clip_id: String,
    /// Ledger index this clip's transcription targets. None when the clip
    /// had no open question to answer.
    pub target_index: Option<usize>,
    pub clip_duration: Duration,
    pub clip_bytes: usize,
    pub encode_time: Duration,
    pub transcription: Option<StageTiming>,
    pub generation: Option<GenerationTiming>,
    pub speech: Option<StageTiming>,
}

/// Aggregated session statistics.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub turns: usize,
    pub transcription_attempts: usize,
    pub transcription_successes: usize,
    pub generation_attempts: usize,
    pub generation_successes: usize,
    pub speech_attempts: usize,
    pub speech_successes: usize,
    pub avg_clip_duration: Duration,
    pub avg_encode_time: Duration,
    pub avg_transcription: Duration,
    pub avg_generation: Duration,
    pub avg_first_chunk: Option<Duration>,
}

/// Collects per-turn measurements; safe to update from the orchestrator and
/// worker threads concurrently.
pub struct PerformanceLog {
    turns: Mutex<Vec<TurnRecord>>,
}

impl PerformanceLog {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
        }
    }

    /// Opens a record for a freshly finalized clip.
    pub fn begin_turn(
        &self,
        clip_id: &str,
        target_index: Option<usize>,
        clip_duration: Duration,
        clip_bytes: usize,
        encode_time: Duration,
    ) {
        let mut turns = self.turns.lock().expect("performance log lock poisoned");
        turns.push(TurnRecord {
            clip_id: clip_id.to_string(),
            target_index,
            clip_duration,
            clip_bytes,
            encode_time,
            transcription: None,
            generation: None,
            speech: None,
        });
    }

    /// Records the transcription outcome for a clip (called by a worker).
    pub fn record_transcription(&self, clip_id: &str, duration: Duration, success: bool) {
        self.update(clip_id, |record| {
            record.transcription = Some(StageTiming { duration, success });
        });
    }

    /// Records the generation outcome for a clip.
    pub fn record_generation(&self, clip_id: &str, timing: GenerationTiming) {
        self.update(clip_id, |record| {
            record.generation = Some(timing);
        });
    }

    /// Records the speech playback outcome for a clip.
    pub fn record_speech(&self, clip_id: &str, duration: Duration, success: bool) {
        self.update(clip_id, |record| {
            record.speech = Some(StageTiming { duration, success });
        });
    }

    fn update(&self, clip_id: &str, apply: impl FnOnce(&mut TurnRecord)) {
        let mut turns = self.turns.lock().expect("performance log lock poisoned");
        if let Some(record) = turns.iter_mut().rev().find(|r| r.clip_id == clip_id) {
            apply(record);
        }
    }

    pub fn snapshot(&self) -> Vec<TurnRecord> {
        self.turns
            .lock()
            .expect("performance log lock poisoned")
            .clone()
    }

    /// Computes aggregated statistics, or None when no turn was recorded.
    pub fn stats(&self) -> Option<SessionStats> {
        let turns = self.snapshot();
        if turns.is_empty() {
            return None;
        }

        let clip_durations: Vec<Duration> = turns.iter().map(|t| t.clip_duration).collect();
        let encode_times: Vec<Duration> = turns.iter().map(|t| t.encode_time).collect();

        let transcriptions: Vec<&StageTiming> =
            turns.iter().filter_map(|t| t.transcription.as_ref()).collect();
        let generations: Vec<&GenerationTiming> =
            turns.iter().filter_map(|t| t.generation.as_ref()).collect();
        let speeches: Vec<&StageTiming> =
            turns.iter().filter_map(|t| t.speech.as_ref()).collect();

        let transcription_durations: Vec<Duration> = transcriptions
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration)
            .collect();
        let generation_durations: Vec<Duration> = generations
            .iter()
            .filter(|g| g.success)
            .map(|g| g.duration)
            .collect();
        let first_chunks: Vec<Duration> =
            generations.iter().filter_map(|g| g.first_chunk).collect();

        Some(SessionStats {
            turns: turns.len(),
            transcription_attempts: transcriptions.len(),
            transcription_successes: transcriptions.iter().filter(|s| s.success).count(),
            generation_attempts: generations.len(),
            generation_successes: generations.iter().filter(|g| g.success).count(),
            speech_attempts: speeches.len(),
            speech_successes: speeches.iter().filter(|s| s.success).count(),
            avg_clip_duration: avg_duration(&clip_durations),
            avg_encode_time: avg_duration(&encode_times),
            avg_transcription: avg_duration(&transcription_durations),
            avg_generation: avg_duration(&generation_durations),
            avg_first_chunk: if first_chunks.is_empty() {
                None
            } else {
                Some(avg_duration(&first_chunks))
            },
        })
    }

    /// Prints a user-friendly summary of session performance.
    pub fn print_summary(&self) {
        if let Some(stats) = self.stats() {
            eprintln!();
            eprintln!("=== Session Summary ===");
            eprintln!(
                "Completed {} turn{}",
                stats.turns,
                if stats.turns == 1 { "" } else { "s" }
            );
            eprintln!();
            eprintln!(
                "  Avg answer audio:        {}",
                format_duration(stats.avg_clip_duration)
            );
            eprintln!(
                "  Avg question generation: {}",
                format_duration(stats.avg_generation)
            );
            if let Some(first_chunk) = stats.avg_first_chunk {
                eprintln!("  Avg time to first chunk: {}", format_duration(first_chunk));
            }
            eprintln!(
                "  Avg transcription:       {}  (background)",
                format_duration(stats.avg_transcription)
            );
            eprintln!();
            eprintln!(
                "  Transcriptions: {}/{} | Generations: {}/{} | Speech: {}/{}",
                stats.transcription_successes,
                stats.transcription_attempts,
                stats.generation_successes,
                stats.generation_attempts,
                stats.speech_successes,
                stats.speech_attempts,
            );
        }
    }

    /// Writes the machine-readable per-turn data as JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let turns: Vec<serde_json::Value> = self.snapshot().iter().map(turn_to_json).collect();
        let payload = serde_json::to_string_pretty(&turns)
            .unwrap_or_else(|_| "[]".to_string());
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Writes the human-readable report: per-turn lines plus the aggregate.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        out.push_str(&format!(
            "INTERVIEW PERFORMANCE REPORT — {}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        for record in self.snapshot() {
            out.push_str(&format!(
                "{} (entry {}): audio {}, encode {}",
                record.clip_id,
                record
                    .target_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                format_duration(record.clip_duration),
                format_duration(record.encode_time),
            ));
            if let Some(t) = &record.transcription {
                out.push_str(&format!(
                    ", transcription {} ({})",
                    format_duration(t.duration),
                    outcome(t.success)
                ));
            }
            if let Some(g) = &record.generation {
                out.push_str(&format!(
                    ", generation {} ({})",
                    format_duration(g.duration),
                    outcome(g.success)
                ));
            }
            if let Some(s) = &record.speech {
                out.push_str(&format!(
                    ", speech {} ({})",
                    format_duration(s.duration),
                    outcome(s.success)
                ));
            }
            out.push('\n');
        }

        if let Some(stats) = self.stats() {
            out.push_str(&format!(
                "\nTurns: {}\nTranscriptions: {}/{}\nGenerations: {}/{}\n\
                 Avg answer audio: {}\nAvg generation: {}\nAvg transcription: {}\n",
                stats.turns,
                stats.transcription_successes,
                stats.transcription_attempts,
                stats.generation_successes,
                stats.generation_attempts,
                format_duration(stats.avg_clip_duration),
                format_duration(stats.avg_generation),
                format_duration(stats.avg_transcription),
            ));
        }

        std::fs::write(path, out)?;
        Ok(())
    }
}

impl Default for PerformanceLog {
    fn default() -> Self {
        Self::new()
    }
}

fn turn_to_json(record: &TurnRecord) -> serde_json::Value {
    serde_json::json!({
        "clip_id": record.clip_id,
        "target_index": record.target_index,
        "clip_duration_ms": record.clip_duration.as_millis() as u64,
        "clip_bytes": record.clip_bytes,
        "encode_ms": record.encode_time.as_millis() as u64,
        "transcription": record.transcription.as_ref().map(|t| serde_json::json!({
            "duration_ms": t.duration.as_millis() as u64,
            "success": t.success,
        })),
        "generation": record.generation.as_ref().map(|g| serde_json::json!({
            "duration_ms": g.duration.as_millis() as u64,
            "success": g.success,
            "first_chunk_ms": g.first_chunk.map(|d| d.as_millis() as u64),
            "chunk_count": g.chunk_count,
        })),
        "speech": record.speech.as_ref().map(|s| serde_json::json!({
            "duration_ms": s.duration.as_millis() as u64,
            "success": s.success,
        })),
    })
}

fn outcome(success: bool) -> &'static str {
    if success { "ok" } else { "failed" }
}

/// Formats a duration as a human-friendly string.
/// Under 1s: "450ms", at or above 1s: "1.5s".
fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Calculates average duration from a slice.
fn avg_duration(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::from_secs(0);
    }
    let sum: Duration = durations.iter().sum();
    sum / durations.len() as u32
}
