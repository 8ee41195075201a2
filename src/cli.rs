//! Command-line interface for intervox
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voice-driven mock interview assistant
#[derive(Parser, Debug)]
#[command(
    name = "intervox",
    version,
    about = "Voice-driven mock interview assistant"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Generation model id (default: gemini-2.5-flash)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Transcription worker pool size
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Transcript output path
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Disable spoken question playback
    #[arg(long)]
    pub no_speech: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Check collaborator prerequisites (API key, speech command)
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_no_args_runs_interview() {
        let cli = Cli::try_parse_from(["intervox"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert!(!cli.no_speech);
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "intervox",
            "--device",
            "pulse",
            "--model",
            "gemini-2.5-pro",
            "--workers",
            "2",
            "--transcript",
            "/tmp/t.txt",
            "--no-speech",
            "-q",
        ])
        .unwrap();

        assert_eq!(cli.device.as_deref(), Some("pulse"));
        assert_eq!(cli.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(cli.workers, Some(2));
        assert_eq!(cli.transcript, Some(PathBuf::from("/tmp/t.txt")));
        assert!(cli.no_speech);
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_devices_subcommand() {
        let cli = Cli::try_parse_from(["intervox", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_check_subcommand() {
        let cli = Cli::try_parse_from(["intervox", "check"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["intervox", "--bogus"]).is_err());
    }
}
