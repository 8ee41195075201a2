//! The concurrency/session core: capture gating, clip buffering, the
//! conversation ledger, the transcription worker pool, and the orchestrated
//! turn/shutdown protocol.

pub mod capture;
pub mod clip;
pub mod ledger;
pub mod orchestrator;
pub mod queue;
pub mod state;

pub use capture::{CaptureGate, FrameSink};
pub use clip::{Clip, ClipBuffer, Frame};
pub use ledger::{Ledger, LedgerEntry};
pub use orchestrator::{DrainOutcome, Session, SessionBuilder, SessionOptions, TurnOutcome};
pub use queue::{Job, JobQueue, WorkerPool};
pub use state::{SessionPhase, SessionState, TaskTracker, Transition};
