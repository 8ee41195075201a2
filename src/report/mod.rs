//! Session artifacts: the interview transcript and the performance report.

pub mod performance;
pub mod transcript;

pub use performance::{PerformanceLog, SessionStats, TurnRecord};
pub use transcript::TranscriptWriter;
