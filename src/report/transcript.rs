//! Human-readable interview transcript.
//!
//! The ledger is the source of truth and responses arrive out of order, so
//! every update rewrites the whole file from a snapshot instead of
//! appending.

use crate::defaults;
use crate::error::Result;
use crate::session::ledger::LedgerEntry;
use chrono::Local;
use std::path::{Path, PathBuf};

const RULE: &str = "================================================================================";
const TURN_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Writes the transcript file from ledger snapshots.
pub struct TranscriptWriter {
    path: PathBuf,
}

impl TranscriptWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the transcript from a ledger snapshot.
    ///
    /// Entries without a response render the pending marker; a later rewrite
    /// fills them in once the background transcription lands.
    pub fn rewrite(&self, entries: &[LedgerEntry]) -> Result<()> {
        std::fs::write(&self.path, render(entries))?;
        Ok(())
    }
}

fn render(entries: &[LedgerEntry]) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("\nINTERVIEW TRANSCRIPT\n");
    out.push_str(&format!(
        "Date: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(RULE);
    out.push_str("\n\n");

    for entry in entries {
        let number = entry.index + 1;
        out.push_str(&format!(
            "Q{}. [{}] INTERVIEWER:\n{}\n\n",
            number,
            entry.question_time.format("%H:%M:%S"),
            entry.question
        ));

        match (&entry.response, &entry.response_time) {
            (Some(response), Some(time)) => {
                out.push_str(&format!(
                    "A{}. [{}] CANDIDATE:\n{}\n\n",
                    number,
                    time.format("%H:%M:%S"),
                    response
                ));
            }
            _ => {
                out.push_str(&format!(
                    "A{}. CANDIDATE:\n{}\n\n",
                    number,
                    defaults::PENDING_RESPONSE_MARKER
                ));
            }
        }

        out.push_str(TURN_RULE);
        out.push_str("\n\n");
    }

    out
}
