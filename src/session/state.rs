//! Session state machine and in-flight task tracking.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// The lifecycle phase of a session.
///
/// Exactly one authoritative instance exists per session, mutated only
/// through the validated transitions on [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Capturing audio; frames flow into the clip buffer.
    Listening,
    /// Muted while the current turn is processed (clip finalized, next
    /// question being generated/spoken).
    MutedProcessing,
    /// Shutdown requested; no new turns are accepted.
    ShutdownRequested,
    /// Waiting for in-flight work to settle.
    Draining,
    /// All work settled; the session is over.
    Terminated,
}

/// Result of a requested phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transition was applied.
    Applied,
    /// The session was already in the requested phase; nothing changed.
    AlreadyThere,
    /// The transition is not allowed while shutting down.
    RejectedShutdown,
}

/// Authoritative session phase with validated transitions.
///
/// Mute and unmute are rejected once shutdown has been requested, so a late
/// keypress cannot race the drain. A second shutdown request is a no-op.
pub struct SessionState {
    phase: Mutex<SessionPhase>,
    changed: Condvar,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(SessionPhase::MutedProcessing),
            changed: Condvar::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().expect("session state lock poisoned")
    }

    /// True while frames should be admitted into the clip buffer.
    pub fn is_listening(&self) -> bool {
        self.phase() == SessionPhase::Listening
    }

    /// True once shutdown has been requested (any of the final three phases).
    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self.phase(),
            SessionPhase::ShutdownRequested | SessionPhase::Draining | SessionPhase::Terminated
        )
    }

    /// Listening → MutedProcessing.
    pub fn mute(&self) -> Transition {
        let mut phase = self.phase.lock().expect("session state lock poisoned");
        match *phase {
            SessionPhase::Listening => {
                *phase = SessionPhase::MutedProcessing;
                self.changed.notify_all();
                Transition::Applied
            }
            SessionPhase::MutedProcessing => Transition::AlreadyThere,
            _ => Transition::RejectedShutdown,
        }
    }

    /// MutedProcessing → Listening.
    pub fn unmute(&self) -> Transition {
        let mut phase = self.phase.lock().expect("session state lock poisoned");
        match *phase {
            SessionPhase::MutedProcessing => {
                *phase = SessionPhase::Listening;
                self.changed.notify_all();
                Transition::Applied
            }
            SessionPhase::Listening => Transition::AlreadyThere,
            _ => Transition::RejectedShutdown,
        }
    }

    /// Listening/MutedProcessing → ShutdownRequested.
    ///
    /// Returns `AlreadyThere` when shutdown was already in progress, so a
    /// repeated interrupt cannot re-enter the drain.
    pub fn request_shutdown(&self) -> Transition {
        let mut phase = self.phase.lock().expect("session state lock poisoned");
        match *phase {
            SessionPhase::Listening | SessionPhase::MutedProcessing => {
                *phase = SessionPhase::ShutdownRequested;
                self.changed.notify_all();
                Transition::Applied
            }
            _ => Transition::AlreadyThere,
        }
    }

    /// ShutdownRequested → Draining.
    pub fn begin_drain(&self) -> Transition {
        let mut phase = self.phase.lock().expect("session state lock poisoned");
        match *phase {
            SessionPhase::ShutdownRequested => {
                *phase = SessionPhase::Draining;
                self.changed.notify_all();
                Transition::Applied
            }
            SessionPhase::Draining => Transition::AlreadyThere,
            _ => Transition::RejectedShutdown,
        }
    }

    /// Draining → Terminated.
    pub fn terminate(&self) -> Transition {
        let mut phase = self.phase.lock().expect("session state lock poisoned");
        match *phase {
            SessionPhase::Draining => {
                *phase = SessionPhase::Terminated;
                self.changed.notify_all();
                Transition::Applied
            }
            SessionPhase::Terminated => Transition::AlreadyThere,
            _ => Transition::RejectedShutdown,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks which synchronous collaborator calls are currently running.
///
/// The drain coordinator waits on the condition variable instead of
/// sleep-polling: every time a task clears, waiters re-check idleness.
pub struct TaskTracker {
    running: Mutex<HashMap<&'static str, bool>>,
    idle: Condvar,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
            idle: Condvar::new(),
        }
    }

    /// Marks `name` as running and returns a guard that clears it on drop,
    /// so an erroring (or panicking) collaborator call can never leave a
    /// task stuck "running".
    pub fn begin(&self, name: &'static str) -> TaskGuard<'_> {
        let mut running = self.running.lock().expect("task tracker lock poisoned");
        running.insert(name, true);
        TaskGuard {
            tracker: self,
            name,
        }
    }

    fn end(&self, name: &'static str) {
        let mut running = self.running.lock().expect("task tracker lock poisoned");
        running.insert(name, false);
        self.idle.notify_all();
    }

    /// True if no tracked task is currently running.
    pub fn is_idle(&self) -> bool {
        let running = self.running.lock().expect("task tracker lock poisoned");
        !running.values().any(|&v| v)
    }

    /// Names of tasks currently running.
    pub fn busy_tasks(&self) -> Vec<&'static str> {
        let running = self.running.lock().expect("task tracker lock poisoned");
        running
            .iter()
            .filter(|&(_, &v)| v)
            .map(|(&k, _)| k)
            .collect()
    }

    /// Blocks until all tracked tasks have cleared or the timeout elapses.
    ///
    /// Returns true if idle was reached within the timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut running = self.running.lock().expect("task tracker lock poisoned");
        while running.values().any(|&v| v) {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return false,
            };
            let (guard, result) = self
                .idle
                .wait_timeout(running, remaining)
                .expect("task tracker lock poisoned");
            running = guard;
            if result.timed_out() && running.values().any(|&v| v) {
                return false;
            }
        }
        true
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard marking a tracked task as running for its lifetime.
pub struct TaskGuard<'a> {
    tracker: &'a TaskTracker,
    name: &'static str,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.tracker.end(self.name);
    }
}
