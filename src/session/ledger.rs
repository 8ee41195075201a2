//! The conversation ledger: an ordered record of question/answer turns.
//!
//! Questions are append-only and strictly ordered; responses arrive later,
//! possibly out of order relative to the questions, and are written by
//! worker threads against an explicit target index.

use crate::error::{IntervoxError, Result};
use chrono::{DateTime, Local};
use std::sync::Mutex;

/// One question/answer turn.
///
/// `index` equals the entry's position in the ledger at creation time and
/// never changes. `response` is the only field mutated after creation,
/// exactly once: the first write wins and later writes are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub index: usize,
    pub question: String,
    pub question_time: DateTime<Local>,
    pub response: Option<String>,
    pub response_time: Option<DateTime<Local>>,
}

/// Thread-safe ordered sequence of ledger entries.
pub struct Ledger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends a question and returns its index.
    ///
    /// Indices are assigned 0, 1, 2, ... with no gaps or repeats.
    pub fn append_question(&self, text: impl Into<String>) -> usize {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let index = entries.len();
        entries.push(LedgerEntry {
            index,
            question: text.into(),
            question_time: Local::now(),
            response: None,
            response_time: None,
        });
        index
    }

    /// Writes the response for `index`.
    ///
    /// Fails with `LedgerIndexOutOfRange` if the entry does not exist — jobs
    /// are created strictly after the entry they target, so this indicates a
    /// programming error, not a user-facing condition. Fails with
    /// `ResponseAlreadyRecorded` if a response was already written; the first
    /// write wins.
    pub fn write_response(&self, index: usize, text: impl Into<String>) -> Result<()> {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let len = entries.len();
        let entry = entries
            .get_mut(index)
            .ok_or(IntervoxError::LedgerIndexOutOfRange { index, len })?;

        if entry.response.is_some() {
            return Err(IntervoxError::ResponseAlreadyRecorded { index });
        }

        entry.response = Some(text.into());
        entry.response_time = Some(Local::now());
        Ok(())
    }

    /// Immutable copy of all entries, taken under the mutation lock so a
    /// torn entry can never be observed.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.lock().expect("ledger lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the most recently appended entry.
    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_returns_monotonic_indices() {
        let ledger = Ledger::new();
        for expected in 0..5 {
            let index = ledger.append_question(format!("question {}", expected));
            assert_eq!(index, expected);
        }
        assert_eq!(ledger.len(), 5);

        let snapshot = ledger.snapshot();
        for (position, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.index, position);
        }
    }

    #[test]
    fn test_new_entry_has_no_response() {
        let ledger = Ledger::new();
        ledger.append_question("Tell me about yourself");

        let entry = &ledger.snapshot()[0];
        assert_eq!(entry.question, "Tell me about yourself");
        assert!(entry.response.is_none());
        assert!(entry.response_time.is_none());
    }

    #[test]
    fn test_write_response_sets_text_and_time() {
        let ledger = Ledger::new();
        let index = ledger.append_question("Q");

        ledger.write_response(index, "A").unwrap();

        let entry = &ledger.snapshot()[index];
        assert_eq!(entry.response.as_deref(), Some("A"));
        assert!(entry.response_time.is_some());
    }

    #[test]
    fn test_write_response_out_of_range_fails() {
        let ledger = Ledger::new();
        ledger.append_question("Q");

        let err = ledger.write_response(7, "A").unwrap_err();
        match err {
            IntervoxError::LedgerIndexOutOfRange { index, len } => {
                assert_eq!(index, 7);
                assert_eq!(len, 1);
            }
            other => panic!("expected LedgerIndexOutOfRange, got {other}"),
        }
    }

    #[test]
    fn test_second_write_is_rejected_first_wins() {
        let ledger = Ledger::new();
        let index = ledger.append_question("Q");

        ledger.write_response(index, "first").unwrap();
        let err = ledger.write_response(index, "second").unwrap_err();
        assert!(matches!(
            err,
            IntervoxError::ResponseAlreadyRecorded { index: 0 }
        ));

        assert_eq!(ledger.snapshot()[index].response.as_deref(), Some("first"));
    }

    #[test]
    fn test_out_of_order_writes_land_on_correct_entries() {
        let ledger = Ledger::new();
        ledger.append_question("Q0");
        ledger.append_question("Q1");

        // The later-targeted response completes first.
        ledger.write_response(1, "A1").unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot[1].response.as_deref(), Some("A1"));
        assert!(snapshot[0].response.is_none());

        ledger.write_response(0, "A0").unwrap();
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot[0].response.as_deref(), Some("A0"));
        assert_eq!(snapshot[1].response.as_deref(), Some("A1"));
    }

    #[test]
    fn test_last_index() {
        let ledger = Ledger::new();
        assert_eq!(ledger.last_index(), None);
        ledger.append_question("Q0");
        assert_eq!(ledger.last_index(), Some(0));
        ledger.append_question("Q1");
        assert_eq!(ledger.last_index(), Some(1));
    }

    #[test]
    fn test_concurrent_response_writes_from_many_threads() {
        let ledger = Arc::new(Ledger::new());
        for i in 0..16 {
            ledger.append_question(format!("Q{}", i));
        }

        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                ledger.write_response(i, format!("A{}", i)).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = ledger.snapshot();
        for (i, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.response.as_deref(), Some(format!("A{}", i).as_str()));
        }
    }
}
