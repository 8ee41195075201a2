//! Interview application entry point.
//!
//! Composition root: wires config, collaborators, the session and the audio
//! device together, then drives the session from stdin commands
//! (`m` toggles mute/unmute, `q` quits with a clean drain).

use crate::collaborator::speech::{CommandSpeaker, NullSpeaker};
use crate::collaborator::SpeechSynthesizer;
use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI overrides applied on top of the loaded configuration.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub device: Option<String>,
    pub model: Option<String>,
    pub workers: Option<usize>,
    pub transcript: Option<PathBuf>,
    pub no_speech: bool,
}

/// Apply CLI overrides to the configuration.
pub fn apply_overrides(mut config: Config, overrides: &Overrides) -> Config {
    if let Some(device) = &overrides.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(model) = &overrides.model {
        config.generation.model = model.clone();
    }
    if let Some(workers) = overrides.workers {
        config.session.workers = workers;
    }
    if let Some(transcript) = &overrides.transcript {
        config.report.transcript_path = transcript.clone();
    }
    if overrides.no_speech {
        config.session.speech_command = None;
    }
    config
}

/// Build the speech collaborator from the configuration.
///
/// No configured command (or `--no-speech`) disables playback.
pub fn build_speaker(config: &Config) -> Arc<dyn SpeechSynthesizer> {
    match config
        .session
        .speech_command
        .as_deref()
        .and_then(CommandSpeaker::from_command_line)
    {
        Some(speaker) => Arc::new(speaker),
        None => Arc::new(NullSpeaker),
    }
}

/// Run an interview session until the user quits.
///
/// Exit is clean only after the shutdown drain completes: every queued
/// transcription has settled and the final transcript is on disk.
#[cfg(feature = "cpal-audio")]
pub fn run_interview(config: Config, overrides: &Overrides, quiet: bool) -> Result<()> {
    use crate::audio::capture::{CpalFrameSource, suppress_audio_warnings};
    use crate::collaborator::gemini::{GeminiClient, GeminiConfig};
    use crate::collaborator::{QuestionGenerator, Transcriber};
    use crate::session::orchestrator::{DrainOutcome, SessionBuilder, SessionOptions};
    use std::io::BufRead;

    suppress_audio_warnings();

    let config = apply_overrides(config, overrides);

    // Collaborators. A missing API key is fatal here, before any capture.
    let gemini = Arc::new(GeminiClient::new(GeminiConfig::from_env(
        &config.generation,
    )?)?);
    let transcriber: Arc<dyn Transcriber> = gemini.clone();
    let generator: Arc<dyn QuestionGenerator> = gemini;
    let speaker = build_speaker(&config);

    let session = SessionBuilder::new(SessionOptions::from_config(&config))
        .with_transcript(config.report.transcript_path.clone())
        .start(transcriber, generator, speaker);

    // Audio device: fatal at startup when unavailable.
    let source = CpalFrameSource::new(
        config.audio.device.as_deref(),
        config.audio.sample_rate,
        config.audio.frame_samples,
        Arc::new(session.frame_sink()),
    )?;
    source.start()?;

    if !quiet {
        eprintln!("Type 'm' to toggle mute/unmute, 'q' to quit.");
        eprintln!("Answers are transcribed in the background while the next question plays.");
        eprintln!();
    }

    session.open();
    if !quiet {
        eprintln!("Listening... answer, then press 'm'.");
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break; // Treat a read error like EOF: quit with a drain.
        };
        match line.trim().to_lowercase().as_str() {
            "m" => handle_toggle(&session, quiet),
            "q" => break,
            "" => {}
            other => {
                if !quiet {
                    eprintln!("Unknown command '{}'. Use 'm' or 'q'.", other);
                }
            }
        }
    }

    if !quiet {
        eprintln!("Ending interview; waiting for in-flight work...");
    }
    if let Err(e) = source.stop() {
        eprintln!("intervox: failed to stop audio capture: {}", e);
    }

    let outcome = session.shutdown();
    if outcome == DrainOutcome::TimedOut && !quiet {
        eprintln!("Some background work did not finish; transcript may be incomplete.");
    }

    export_reports(&session, &config, quiet);
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
pub fn run_interview(_config: Config, _overrides: &Overrides, _quiet: bool) -> Result<()> {
    Err(crate::error::IntervoxError::AudioCapture {
        message: "built without the cpal-audio feature; no capture device available".to_string(),
    })
}

#[cfg(feature = "cpal-audio")]
fn handle_toggle(session: &crate::session::orchestrator::Session, quiet: bool) {
    use crate::session::orchestrator::TurnOutcome;
    use crate::session::state::SessionPhase;

    match session.phase() {
        SessionPhase::Listening => match session.mute() {
            TurnOutcome::Completed { question, .. } => {
                println!("Interviewer: {}", question);
                if !quiet {
                    eprintln!("Listening... (previous answer transcribing in background)");
                }
            }
            TurnOutcome::EmptyClip => {
                if !quiet {
                    eprintln!("Nothing recorded; still listening.");
                }
            }
            TurnOutcome::GenerationFailed => {
                eprintln!("Question generation failed. Press 'm' to resume listening.");
            }
            TurnOutcome::EncodeFailed | TurnOutcome::Rejected => {}
        },
        SessionPhase::MutedProcessing => {
            if session.unmute() && !quiet {
                eprintln!("Listening again.");
            }
        }
        _ => {
            eprintln!("Shutdown in progress; command ignored.");
        }
    }
}

#[cfg(feature = "cpal-audio")]
fn export_reports(session: &crate::session::orchestrator::Session, config: &Config, quiet: bool) {
    if let Some(path) = &config.report.performance_data_path
        && let Err(e) = session.performance().write_json(path)
    {
        eprintln!("intervox: failed to write performance data: {}", e);
    }
    if let Some(path) = &config.report.performance_report_path
        && let Err(e) = session.performance().write_report(path)
    {
        eprintln!("intervox: failed to write performance report: {}", e);
    }
    if !quiet {
        session.performance().print_summary();
        eprintln!();
        eprintln!(
            "Transcript saved to: {}",
            config.report.transcript_path.display()
        );
    }
}

/// List capture devices (the `devices` subcommand).
#[cfg(feature = "cpal-audio")]
pub fn run_devices() -> Result<()> {
    use crate::audio::capture::{list_devices, suppress_audio_warnings};

    suppress_audio_warnings();
    let devices = list_devices()?;
    if devices.is_empty() {
        eprintln!("No audio input devices found.");
    } else {
        for device in devices {
            println!("{}", device);
        }
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
pub fn run_devices() -> Result<()> {
    Err(crate::error::IntervoxError::AudioCapture {
        message: "built without the cpal-audio feature".to_string(),
    })
}

/// Check collaborator prerequisites (the `check` subcommand).
pub fn run_check(config: &Config) {
    match std::env::var(crate::defaults::API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => {
            println!("API key ({}): set", crate::defaults::API_KEY_ENV)
        }
        _ => println!(
            "API key ({}): MISSING — transcription and generation will fail",
            crate::defaults::API_KEY_ENV
        ),
    }

    match &config.session.speech_command {
        Some(command) => {
            let program = command.split_whitespace().next().unwrap_or("");
            let available = !program.is_empty()
                && std::process::Command::new(program)
                    .arg("--version")
                    .output()
                    .is_ok();
            if available {
                println!("Speech command '{}': available", program);
            } else {
                println!(
                    "Speech command '{}': NOT FOUND — questions will not be spoken",
                    program
                );
            }
        }
        None => println!("Speech command: not configured (questions shown as text only)"),
    }

    println!("Generation model: {}", config.generation.model);
}
