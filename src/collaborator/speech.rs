//! Speech synthesis through an external playback command.
//!
//! The `CommandExecutor` trait enables full testability without external
//! dependencies: production uses `std::process::Command`, tests substitute a
//! recording mock.

use crate::collaborator::SpeechSynthesizer;
use crate::error::{IntervoxError, Result};
use std::process::Command;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns an error if the command fails or is not found.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IntervoxError::collaborator("speech", format!("command not found: {}", command))
            } else {
                IntervoxError::collaborator(
                    "speech",
                    format!("failed to execute {}: {}", command, e),
                )
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntervoxError::collaborator(
                "speech",
                format!("{} failed with status {:?}: {}", command, output.status, stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Speaks question text by running a configured external command with the
/// text appended as the final argument (e.g. `espeak`, `say`, `spd-say`).
///
/// The command's exit is the playback-completion signal the orchestrator
/// waits on.
pub struct CommandSpeaker<E: CommandExecutor> {
    executor: E,
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker<SystemCommandExecutor> {
    /// Builds a speaker from a whitespace-separated command line, e.g.
    /// `"espeak -s 150"`. Returns None for an empty command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?.to_string();
        Some(Self {
            executor: SystemCommandExecutor::new(),
            program,
            args: parts.map(|s| s.to_string()).collect(),
        })
    }
}

impl<E: CommandExecutor> CommandSpeaker<E> {
    /// Create a speaker with a custom executor (for tests).
    pub fn with_executor(executor: E, program: &str, args: &[&str]) -> Self {
        Self {
            executor,
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl<E: CommandExecutor> SpeechSynthesizer for CommandSpeaker<E> {
    fn speak(&self, text: &str) -> Result<()> {
        let mut args: Vec<&str> = self.args.iter().map(|s| s.as_str()).collect();
        args.push(text);
        self.executor.execute(&self.program, &args)?;
        Ok(())
    }
}

/// Speaker that discards all text, used when speech playback is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeaker;

impl SpeechSynthesizer for NullSpeaker {
    fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock executor that records calls and replays queued responses.
    #[derive(Default)]
    struct MockCommandExecutor {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        responses: Mutex<VecDeque<Result<String>>>,
    }

    impl MockCommandExecutor {
        fn queue_response(&self, response: Result<String>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandExecutor for &MockCommandExecutor {
        fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
            self.calls.lock().unwrap().push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[test]
    fn test_speaker_appends_text_as_final_argument() {
        let executor = MockCommandExecutor::default();
        let speaker = CommandSpeaker::with_executor(&executor, "espeak", &["-s", "150"]);

        speaker.speak("What is overfitting?").unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "espeak");
        assert_eq!(calls[0].1, vec!["-s", "150", "What is overfitting?"]);
    }

    #[test]
    fn test_speaker_propagates_command_failure() {
        let executor = MockCommandExecutor::default();
        executor.queue_response(Err(IntervoxError::collaborator("speech", "no audio sink")));
        let speaker = CommandSpeaker::with_executor(&executor, "espeak", &[]);

        let err = speaker.speak("hello").unwrap_err();
        assert!(matches!(err, IntervoxError::Collaborator { .. }));
    }

    #[test]
    fn test_from_command_line_splits_program_and_args() {
        let speaker = CommandSpeaker::from_command_line("espeak -s 150").unwrap();
        assert_eq!(speaker.program, "espeak");
        assert_eq!(speaker.args, vec!["-s", "150"]);
    }

    #[test]
    fn test_from_command_line_empty_is_none() {
        assert!(CommandSpeaker::from_command_line("").is_none());
        assert!(CommandSpeaker::from_command_line("   ").is_none());
    }

    #[test]
    fn test_null_speaker_accepts_everything() {
        let speaker = NullSpeaker;
        assert!(speaker.speak("anything").is_ok());
    }

    #[test]
    fn test_system_executor_runs_real_command() {
        // `true` exists on any Unix test host and exits 0.
        let executor = SystemCommandExecutor::new();
        assert!(executor.execute("true", &[]).is_ok());
    }

    #[test]
    fn test_system_executor_missing_command() {
        let executor = SystemCommandExecutor::new();
        let err = executor
            .execute("intervox-no-such-binary-xyz", &[])
            .unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }

    #[test]
    fn test_system_executor_nonzero_exit() {
        let executor = SystemCommandExecutor::new();
        let err = executor.execute("false", &[]).unwrap_err();
        assert!(matches!(err, IntervoxError::Collaborator { .. }));
    }
}
