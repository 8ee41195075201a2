//! Session orchestration: the per-turn protocol and the shutdown drain.
//!
//! One `Session` object owns the state machine, clip buffer, ledger, task
//! tracker, job queue and worker pool — no ambient globals — so multiple
//! independent sessions can coexist and tests stay deterministic.
//!
//! The defining performance property lives in `mute()`: transcription of the
//! previous answer is enqueued as background work *before* the blocking
//! generation call, so the perceptible "thinking" delay for the next
//! question never waits on it.

use crate::audio::encode::{self, EncodedClip};
use crate::collaborator::{QuestionGenerator, SpeechSynthesizer, Transcriber};
use crate::config::Config;
use crate::error::{ErrorReporter, IntervoxError, StderrReporter};
use crate::report::performance::{GenerationTiming, PerformanceLog};
use crate::report::transcript::TranscriptWriter;
use crate::session::capture::CaptureGate;
use crate::session::clip::{Clip, ClipBuffer};
use crate::session::ledger::{Ledger, LedgerEntry};
use crate::session::queue::{Job, JobQueue, WorkerContext, WorkerPool};
use crate::session::state::{SessionPhase, SessionState, TaskTracker, Transition};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tunables distilled from [`Config`] for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub sample_rate: u32,
    pub channels: u16,
    pub workers: usize,
    pub worker_poll: Duration,
    pub drain_ceiling: Duration,
    pub opening_question: String,
    /// Directory for WAV clip artifacts; None keeps clips in memory only.
    pub clip_dir: Option<PathBuf>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            workers: config.session.workers,
            worker_poll: Duration::from_millis(config.session.worker_poll_ms),
            drain_ceiling: Duration::from_secs(config.session.drain_ceiling_secs),
            opening_question: config.session.opening_question.clone(),
            clip_dir: config.session.clip_dir.clone(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to a mute command.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn completed: the next question was appended and capture
    /// resumed.
    Completed {
        question_index: usize,
        question: String,
    },
    /// Nothing was recorded; capture resumed immediately.
    EmptyClip,
    /// The clip could not be encoded; capture resumed, no turn ran.
    EncodeFailed,
    /// The generation collaborator failed. The session stays muted; an
    /// explicit unmute is required to resume.
    GenerationFailed,
    /// The command was ignored (already muted, or shutting down).
    Rejected,
}

/// How the shutdown drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All in-flight work settled within the ceiling.
    Clean,
    /// The ceiling elapsed with work still outstanding; remaining worker
    /// threads were detached.
    TimedOut,
}

/// Builds a [`Session`], mirroring the usual reporter/transcript hooks.
pub struct SessionBuilder {
    options: SessionOptions,
    reporter: Arc<dyn ErrorReporter>,
    transcript: Option<Arc<TranscriptWriter>>,
}

impl SessionBuilder {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            reporter: Arc::new(StderrReporter),
            transcript: None,
        }
    }

    /// Sets a custom error reporter (tests collect instead of printing).
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Enables transcript output to the given path.
    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(Arc::new(TranscriptWriter::new(path.into())));
        self
    }

    /// Spawns the worker pool and returns the running session.
    pub fn start(
        self,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn QuestionGenerator>,
        speaker: Arc<dyn SpeechSynthesizer>,
    ) -> Session {
        let state = Arc::new(SessionState::new());
        let buffer = Arc::new(ClipBuffer::new(
            self.options.sample_rate,
            self.options.channels,
        ));
        let ledger = Arc::new(Ledger::new());
        let tracker = Arc::new(TaskTracker::new());
        let queue = Arc::new(JobQueue::new());
        let performance = Arc::new(PerformanceLog::new());
        let gate = CaptureGate::new(Arc::clone(&state), Arc::clone(&buffer));

        let workers = WorkerPool::spawn(
            self.options.workers,
            self.options.worker_poll,
            WorkerContext {
                queue: Arc::clone(&queue),
                state: Arc::clone(&state),
                ledger: Arc::clone(&ledger),
                transcriber,
                transcript: self.transcript.clone(),
                performance: Arc::clone(&performance),
                reporter: Arc::clone(&self.reporter),
            },
        );

        Session {
            options: self.options,
            state,
            buffer,
            ledger,
            tracker,
            queue,
            workers: Mutex::new(Some(workers)),
            generator,
            speaker,
            transcript: self.transcript,
            performance,
            reporter: self.reporter,
            gate,
            current_question: Mutex::new(None),
            shutdown_started: AtomicBool::new(false),
        }
    }
}

/// One interview session: capture gating, turn protocol, background
/// transcription, shutdown drain.
pub struct Session {
    options: SessionOptions,
    state: Arc<SessionState>,
    buffer: Arc<ClipBuffer>,
    ledger: Arc<Ledger>,
    tracker: Arc<TaskTracker>,
    queue: Arc<JobQueue>,
    workers: Mutex<Option<WorkerPool>>,
    generator: Arc<dyn QuestionGenerator>,
    speaker: Arc<dyn SpeechSynthesizer>,
    transcript: Option<Arc<TranscriptWriter>>,
    performance: Arc<PerformanceLog>,
    reporter: Arc<dyn ErrorReporter>,
    gate: CaptureGate,
    /// Index of the question the next clip answers: the value returned by
    /// the most recent `append_question`. Explicit rather than inferred
    /// from ledger length at mute time, so the targeting contract is
    /// testable.
    current_question: Mutex<Option<usize>>,
    shutdown_started: AtomicBool,
}

impl Session {
    /// Opens the session: appends and speaks the opening question, then
    /// starts listening. Returns the opening question's index (0).
    pub fn open(&self) -> usize {
        let index = self.ledger.append_question(&self.options.opening_question);
        self.set_current_question(index);
        self.rewrite_transcript();
        self.speak(&self.options.opening_question, None);
        self.state.unmute();
        index
    }

    /// The frame sink the platform audio layer delivers into.
    pub fn frame_sink(&self) -> CaptureGate {
        self.gate.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn ledger_snapshot(&self) -> Vec<LedgerEntry> {
        self.ledger.snapshot()
    }

    pub fn performance(&self) -> &Arc<PerformanceLog> {
        &self.performance
    }

    /// Index of the question the next clip will answer.
    pub fn current_question(&self) -> Option<usize> {
        *self
            .current_question
            .lock()
            .expect("current question lock poisoned")
    }

    /// Jobs not yet finished by the worker pool.
    pub fn outstanding_jobs(&self) -> usize {
        self.queue.outstanding()
    }

    /// Runs the per-turn protocol on a mute command:
    /// finalize clip → enqueue background transcription → generate the next
    /// question synchronously → append it → speak it → resume capture.
    pub fn mute(&self) -> TurnOutcome {
        match self.state.mute() {
            Transition::Applied => {}
            Transition::AlreadyThere => {
                self.reporter.warn("session", "mute ignored: already muted");
                return TurnOutcome::Rejected;
            }
            Transition::RejectedShutdown => {
                self.reporter
                    .warn("session", "mute ignored: shutdown in progress");
                return TurnOutcome::Rejected;
            }
        }

        let Some(clip) = self.buffer.finalize() else {
            // Accidental toggle with nothing captured: resume immediately.
            self.state.unmute();
            return TurnOutcome::EmptyClip;
        };

        self.run_turn(clip)
    }

    /// Resumes capture after a mute (or after a failed generation).
    /// Stale frames accumulated while muted are dropped.
    pub fn unmute(&self) -> bool {
        match self.state.unmute() {
            Transition::Applied => {
                let dropped = self.buffer.clear();
                if dropped > 0 {
                    self.reporter.warn(
                        "session",
                        &format!("discarded {} stale frame(s) on unmute", dropped),
                    );
                }
                true
            }
            Transition::AlreadyThere => true,
            Transition::RejectedShutdown => {
                self.reporter
                    .warn("session", "unmute ignored: shutdown in progress");
                false
            }
        }
    }

    fn run_turn(&self, clip: Clip) -> TurnOutcome {
        let target_index = self.current_question();

        let encode_started = Instant::now();
        let encoded = match encode::encode_clip(&clip) {
            Ok(encoded) => Arc::new(encoded),
            Err(e) => {
                self.reporter.report("encode", &e);
                self.state.unmute();
                return TurnOutcome::EncodeFailed;
            }
        };
        let encode_time = encode_started.elapsed();

        self.persist_clip(&encoded);
        self.performance.begin_turn(
            &encoded.id,
            target_index,
            encoded.duration,
            encoded.bytes.len(),
            encode_time,
        );

        // Background transcription of the answer just given. Enqueued
        // before the blocking generation call so the next question never
        // waits on it.
        match target_index {
            Some(target) => self.enqueue_job(Arc::clone(&encoded), target),
            None => self
                .reporter
                .warn("session", "no open question; clip will not be transcribed"),
        }

        // Synchronous: the turn (not the capture thread or the workers)
        // suspends until the next question is ready.
        let reply = {
            let _guard = self.tracker.begin("generate");
            let started = Instant::now();
            let result = self.generator.next_question(&encoded);
            let duration = started.elapsed();
            self.performance.record_generation(
                &encoded.id,
                GenerationTiming {
                    duration,
                    success: result.is_ok(),
                    first_chunk: result.as_ref().ok().and_then(|r| r.first_chunk),
                    chunk_count: result.as_ref().map(|r| r.chunk_count).unwrap_or(0),
                },
            );
            result
        };

        match reply {
            Ok(reply) => {
                let index = self.ledger.append_question(&reply.text);
                self.set_current_question(index);
                self.rewrite_transcript();
                self.speak(&reply.text, Some(&encoded.id));
                if self.state.unmute() != Transition::Applied {
                    self.reporter
                        .warn("session", "capture not resumed: shutdown in progress");
                }
                TurnOutcome::Completed {
                    question_index: index,
                    question: reply.text,
                }
            }
            Err(e) => {
                self.reporter.report("generation", &e);
                // Stay muted: resuming silently would record an answer to a
                // question that was never asked.
                TurnOutcome::GenerationFailed
            }
        }
    }

    /// Requests shutdown. Any partial recording is finalized and enqueued
    /// as a final answer *before* the phase flips, so a worker can never
    /// observe an empty queue mid-handoff. Returns false if shutdown was
    /// already in progress.
    pub fn request_shutdown(&self) -> bool {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            self.reporter
                .warn("session", "shutdown already in progress");
            return false;
        }

        if let Some(clip) = self.buffer.finalize() {
            match encode::encode_clip(&clip) {
                Ok(encoded) => {
                    let encoded = Arc::new(encoded);
                    self.persist_clip(&encoded);
                    let target = self.current_question();
                    self.performance.begin_turn(
                        &encoded.id,
                        target,
                        encoded.duration,
                        encoded.bytes.len(),
                        Duration::ZERO,
                    );
                    match target {
                        Some(target) => self.enqueue_job(encoded, target),
                        None => self
                            .reporter
                            .warn("session", "final clip has no open question; dropped"),
                    }
                }
                Err(e) => self.reporter.report("encode", &e),
            }
        }

        self.state.request_shutdown();
        true
    }

    /// Drains all in-flight work, then terminates the session.
    ///
    /// Waits on the task tracker's idle signal and the queue's join
    /// primitive, bounded by the configured ceiling. On timeout the
    /// remaining worker threads are detached and the session terminates
    /// anyway.
    pub fn drain(&self) -> DrainOutcome {
        if !self.shutdown_started.load(Ordering::SeqCst) {
            self.request_shutdown();
        }
        self.state.begin_drain();

        let deadline = Instant::now() + self.options.drain_ceiling;
        let tasks_idle = self.tracker.wait_idle(self.options.drain_ceiling);
        let queue_drained = tasks_idle
            && self.queue.join_timeout(
                deadline
                    .checked_duration_since(Instant::now())
                    .unwrap_or(Duration::ZERO),
            );

        let outcome = if tasks_idle && queue_drained {
            DrainOutcome::Clean
        } else {
            self.reporter.report(
                "shutdown",
                &IntervoxError::ShutdownTimeout {
                    ceiling_secs: self.options.drain_ceiling.as_secs(),
                },
            );
            DrainOutcome::TimedOut
        };

        self.state.terminate();
        self.rewrite_transcript();

        let pool = self
            .workers
            .lock()
            .expect("worker pool lock poisoned")
            .take();
        if let Some(pool) = pool {
            match outcome {
                DrainOutcome::Clean => pool.join(),
                DrainOutcome::TimedOut => pool.detach(),
            }
        }

        outcome
    }

    /// Convenience: request shutdown and drain in one call.
    pub fn shutdown(&self) -> DrainOutcome {
        self.request_shutdown();
        self.drain()
    }

    fn enqueue_job(&self, encoded: Arc<EncodedClip>, target: usize) {
        if matches!(
            self.state.phase(),
            SessionPhase::Draining | SessionPhase::Terminated
        ) {
            self.reporter
                .warn("queue", "job dropped: session is draining");
            return;
        }
        self.queue.enqueue(Job::new(encoded, target));
    }

    fn persist_clip(&self, encoded: &EncodedClip) {
        if let Some(dir) = &self.options.clip_dir
            && let Err(e) = encode::persist_clip(encoded, dir)
        {
            self.reporter.report("encode", &e);
        }
    }

    fn set_current_question(&self, index: usize) {
        *self
            .current_question
            .lock()
            .expect("current question lock poisoned") = Some(index);
    }

    fn rewrite_transcript(&self) {
        if let Some(writer) = &self.transcript
            && let Err(e) = writer.rewrite(&self.ledger.snapshot())
        {
            self.reporter.report("transcript", &e);
        }
    }

    /// Speaks `text`, tracking the call so the drain can wait on it.
    /// Failure is logged and otherwise ignored: losing playback must not
    /// lose the turn.
    fn speak(&self, text: &str, perf_key: Option<&str>) {
        let _guard = self.tracker.begin("speak");
        let started = Instant::now();
        let result = self.speaker.speak(text);
        if let Some(key) = perf_key {
            self.performance
                .record_speech(key, started.elapsed(), result.is_ok());
        }
        if let Err(e) = result {
            self.reporter.report("speech", &e);
        }
    }
}
