//! Transcription job queue and worker pool.
//!
//! Jobs flow through an unbounded crossbeam channel; a pending/in-flight
//! counter pair with a condition variable provides the queue "join"
//! primitive the drain coordinator waits on. Workers pop with a bounded
//! timeout so they can observe shutdown without busy-spinning.

use crate::audio::encode::EncodedClip;
use crate::collaborator::{Transcriber, parse};
use crate::error::ErrorReporter;
use crate::report::performance::PerformanceLog;
use crate::report::transcript::TranscriptWriter;
use crate::session::ledger::Ledger;
use crate::session::state::SessionState;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A unit of background transcription work targeting one ledger entry.
///
/// Immutable once created. `target_index` references a ledger entry that
/// exists at creation time: jobs are built strictly after the entry they
/// target.
pub struct Job {
    pub clip: Arc<EncodedClip>,
    pub target_index: usize,
    pub enqueued_at: Instant,
}

impl Job {
    pub fn new(clip: Arc<EncodedClip>, target_index: usize) -> Self {
        Self {
            clip,
            target_index,
            enqueued_at: Instant::now(),
        }
    }
}

struct Counts {
    pending: usize,
    in_flight: usize,
}

/// Queue of transcription jobs with a drain-completion signal.
pub struct JobQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    counts: Mutex<Counts>,
    drained: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            counts: Mutex::new(Counts {
                pending: 0,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    /// Adds a job. Non-blocking; the queue itself never rejects — the
    /// session stops calling this once draining has begun.
    pub fn enqueue(&self, job: Job) {
        {
            let mut counts = self.counts.lock().expect("job queue lock poisoned");
            counts.pending += 1;
        }
        // The queue owns both channel ends, so send cannot fail.
        let _ = self.tx.send(job);
    }

    /// Pops the next job, blocking up to `timeout`. Returns None on timeout
    /// so the caller can re-check the session phase.
    pub fn take(&self, timeout: Duration) -> Option<Job> {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                let mut counts = self.counts.lock().expect("job queue lock poisoned");
                counts.pending -= 1;
                counts.in_flight += 1;
                Some(job)
            }
            Err(_) => None,
        }
    }

    /// Marks one taken job as finished (whether it succeeded or not).
    pub fn complete(&self) {
        let mut counts = self.counts.lock().expect("job queue lock poisoned");
        counts.in_flight = counts.in_flight.saturating_sub(1);
        if counts.pending + counts.in_flight == 0 {
            self.drained.notify_all();
        }
    }

    /// Jobs not yet finished: pending plus in-flight.
    pub fn outstanding(&self) -> usize {
        let counts = self.counts.lock().expect("job queue lock poisoned");
        counts.pending + counts.in_flight
    }

    /// Blocks until every enqueued job has been completed, or the timeout
    /// elapses. Returns true when fully drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counts = self.counts.lock().expect("job queue lock poisoned");
        while counts.pending + counts.in_flight > 0 {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return false,
            };
            let (guard, result) = self
                .drained
                .wait_timeout(counts, remaining)
                .expect("job queue lock poisoned");
            counts = guard;
            if result.timed_out() && counts.pending + counts.in_flight > 0 {
                return false;
            }
        }
        true
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker needs to process jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<JobQueue>,
    pub state: Arc<SessionState>,
    pub ledger: Arc<Ledger>,
    pub transcriber: Arc<dyn Transcriber>,
    pub transcript: Option<Arc<TranscriptWriter>>,
    pub performance: Arc<PerformanceLog>,
    pub reporter: Arc<dyn ErrorReporter>,
}

/// Pool of transcription worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads popping from the shared queue.
    pub fn spawn(workers: usize, poll: Duration, context: WorkerContext) -> Self {
        let handles = (0..workers.max(1))
            .map(|_| {
                let context = context.clone();
                thread::spawn(move || run_worker(poll, context))
            })
            .collect();
        Self { handles }
    }

    /// Waits for all workers to exit, reporting panics to stderr.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                eprintln!("intervox: transcription worker panicked");
            }
        }
    }

    /// Drops the handles without waiting; the threads die with the process.
    /// Used when the drain ceiling has already been exceeded.
    pub fn detach(self) {
        drop(self.handles);
    }
}

fn run_worker(poll: Duration, ctx: WorkerContext) {
    loop {
        match ctx.queue.take(poll) {
            Some(job) => {
                process_job(&ctx, &job);
                ctx.queue.complete();
            }
            None => {
                // Idle: exit once the session is shutting down and no work
                // remains. The final clip is enqueued before the phase
                // flips, so this cannot race a pending hand-off.
                if ctx.state.is_shutting_down() && ctx.queue.outstanding() == 0 {
                    break;
                }
            }
        }
    }
}

/// Transcribes one clip and writes the answer into its ledger entry.
///
/// Best effort: any failure is reported and the job is dropped without
/// retry. The entry keeps `response = None` and the transcript shows it as
/// pending.
fn process_job(ctx: &WorkerContext, job: &Job) {
    let started = Instant::now();
    let mut success = false;

    match ctx.transcriber.transcribe(&job.clip) {
        Ok(raw) => match parse::extract_answer(&raw) {
            Some(answer) => match ctx.ledger.write_response(job.target_index, answer) {
                Ok(()) => {
                    success = true;
                    if let Some(writer) = &ctx.transcript
                        && let Err(e) = writer.rewrite(&ctx.ledger.snapshot())
                    {
                        ctx.reporter.report("transcript", &e);
                    }
                }
                Err(e) => ctx.reporter.report("transcription", &e),
            },
            None => ctx.reporter.warn(
                "transcription",
                &format!("no candidate speech in clip {}", job.clip.id),
            ),
        },
        Err(e) => ctx.reporter.report("transcription", &e),
    }

    ctx.performance
        .record_transcription(&job.clip.id, started.elapsed(), success);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::MockTranscriber;
    use crate::error::{IntervoxError, StderrReporter};

    fn encoded(id: &str) -> Arc<EncodedClip> {
        Arc::new(EncodedClip {
            id: id.to_string(),
            mime_type: "audio/wav",
            bytes: vec![0u8; 32],
            duration: Duration::from_secs(1),
        })
    }

    fn context(transcriber: MockTranscriber) -> (WorkerContext, Arc<SessionState>, Arc<Ledger>) {
        let queue = Arc::new(JobQueue::new());
        let state = Arc::new(SessionState::new());
        let ledger = Arc::new(Ledger::new());
        let ctx = WorkerContext {
            queue,
            state: Arc::clone(&state),
            ledger: Arc::clone(&ledger),
            transcriber: Arc::new(transcriber),
            transcript: None,
            performance: Arc::new(PerformanceLog::new()),
            reporter: Arc::new(StderrReporter),
        };
        (ctx, state, ledger)
    }

    #[test]
    fn test_queue_counts_through_lifecycle() {
        let queue = JobQueue::new();
        assert_eq!(queue.outstanding(), 0);

        queue.enqueue(Job::new(encoded("a"), 0));
        queue.enqueue(Job::new(encoded("b"), 1));
        assert_eq!(queue.outstanding(), 2);

        let job = queue.take(Duration::from_millis(10)).unwrap();
        assert_eq!(job.clip.id, "a"); // FIFO
        assert_eq!(queue.outstanding(), 2); // one pending, one in flight

        queue.complete();
        assert_eq!(queue.outstanding(), 1);

        queue.take(Duration::from_millis(10)).unwrap();
        queue.complete();
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_take_times_out_on_empty_queue() {
        let queue = JobQueue::new();
        assert!(queue.take(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_join_timeout_immediate_when_empty() {
        let queue = JobQueue::new();
        assert!(queue.join_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_join_timeout_fails_with_outstanding_work() {
        let queue = JobQueue::new();
        queue.enqueue(Job::new(encoded("a"), 0));
        assert!(!queue.join_timeout(Duration::from_millis(30)));
    }

    #[test]
    fn test_join_wakes_when_last_job_completes() {
        let queue = Arc::new(JobQueue::new());
        queue.enqueue(Job::new(encoded("a"), 0));
        queue.take(Duration::from_millis(10)).unwrap();

        let completer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            completer.complete();
        });

        assert!(queue.join_timeout(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn test_worker_writes_answer_to_target_entry() {
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_response("my answer"));
        ledger.append_question("Q0");
        ctx.queue.enqueue(Job::new(encoded("a"), 0));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        assert_eq!(ledger.snapshot()[0].response.as_deref(), Some("my answer"));

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_worker_drops_failed_job_without_retry() {
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_failure());
        ledger.append_question("Q0");
        ctx.queue.enqueue(Job::new(encoded("a"), 0));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        // Entry stays unanswered; the job was not re-enqueued.
        assert!(ledger.snapshot()[0].response.is_none());
        assert_eq!(ctx.queue.outstanding(), 0);

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_worker_records_transcription_timing() {
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_response("answer"));
        ledger.append_question("Q0");
        ctx.performance
            .begin_turn("a", Some(0), Duration::from_secs(1), 32, Duration::ZERO);
        ctx.queue.enqueue(Job::new(encoded("a"), 0));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        let record = &ctx.performance.snapshot()[0];
        let timing = record.transcription.as_ref().unwrap();
        assert!(timing.success);

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_duplicate_target_second_write_rejected() {
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_response("answer"));
        ledger.append_question("Q0");
        ctx.queue.enqueue(Job::new(encoded("a"), 0));
        ctx.queue.enqueue(Job::new(encoded("b"), 0));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        // First write wins; the duplicate was reported and dropped.
        assert_eq!(ledger.snapshot()[0].response.as_deref(), Some("answer"));

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_worker_exits_on_shutdown_with_empty_queue() {
        let (ctx, state, _ledger) = context(MockTranscriber::new("mock"));
        let pool = WorkerPool::spawn(2, Duration::from_millis(10), ctx);

        state.request_shutdown();

        // Workers observe the phase at the next poll boundary and exit.
        pool.join();
    }

    #[test]
    fn test_worker_processes_structured_payload() {
        let structured = r#"{"conversation": [
            {"speaker": "Interviewer", "text": "next?"},
            {"speaker": "Speaker2", "text": "structured answer"}
        ]}"#;
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_response(structured));
        ledger.append_question("Q0");
        ctx.queue.enqueue(Job::new(encoded("a"), 0));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        assert_eq!(
            ledger.snapshot()[0].response.as_deref(),
            Some("structured answer")
        );

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_out_of_order_completion_lands_on_correct_indices() {
        // Two workers, first job much slower than the second: the second
        // response lands first, on its own entry.
        let (ctx, state, ledger) = context(MockTranscriber::new("mock").with_response("answer"));
        ledger.append_question("Q0");
        ledger.append_question("Q1");

        let slow = MockTranscriber::new("slow")
            .with_response("slow answer")
            .with_delay(Duration::from_millis(150));
        let slow_ctx = WorkerContext {
            transcriber: Arc::new(slow),
            ..ctx.clone()
        };

        // Worker A (slow) takes job 0; worker B (fast) takes job 1.
        ctx.queue.enqueue(Job::new(encoded("a"), 0));
        let job0 = ctx.queue.take(Duration::from_millis(10)).unwrap();
        let slow_handle = thread::spawn(move || {
            process_job(&slow_ctx, &job0);
            slow_ctx.queue.complete();
        });

        ctx.queue.enqueue(Job::new(encoded("b"), 1));
        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());

        // The fast worker finishes while the slow one is still running.
        let deadline = Instant::now() + Duration::from_secs(2);
        while ledger.snapshot()[1].response.is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        {
            let snapshot = ledger.snapshot();
            assert_eq!(snapshot[1].response.as_deref(), Some("answer"));
            assert!(snapshot[0].response.is_none(), "slow job still in flight");
        }

        slow_handle.join().unwrap();
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot[0].response.as_deref(), Some("slow answer"));

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_out_of_range_target_reported_not_fatal() {
        let (ctx, state, _ledger) = context(MockTranscriber::new("mock").with_response("answer"));
        // No ledger entries exist; target 5 violates the job-creation
        // invariant and must surface as a reported error, not a panic.
        ctx.queue.enqueue(Job::new(encoded("a"), 5));

        let pool = WorkerPool::spawn(1, Duration::from_millis(10), ctx.clone());
        assert!(ctx.queue.join_timeout(Duration::from_secs(2)));

        state.request_shutdown();
        pool.join();
    }

    #[test]
    fn test_error_matches_ledger_variant() {
        let ledger = Ledger::new();
        let err = ledger.write_response(0, "x").unwrap_err();
        assert!(matches!(err, IntervoxError::LedgerIndexOutOfRange { .. }));
    }
}
