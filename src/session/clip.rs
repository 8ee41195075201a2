//! Frames, clips, and the buffer that accumulates audio between unmute and
//! mute.

use chrono::{DateTime, Local};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A fixed-size block of captured audio samples.
///
/// Ephemeral: owned exclusively by the [`ClipBuffer`] until consumed into a
/// [`Clip`].
#[derive(Debug, Clone)]
pub struct Frame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Sequence number assigned by the buffer, for gap detection in tests.
    pub sequence: u64,
    /// Timestamp when this frame was captured.
    pub captured_at: Instant,
}

/// One finalized, immutable audio segment bounded by mute/unmute.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Identifier derived from the creation time plus a per-buffer counter.
    pub id: String,
    /// All frame samples concatenated in capture order.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Number of frames that went into this clip.
    pub frame_count: usize,
    pub created_at: DateTime<Local>,
}

impl Clip {
    /// Duration of the audio content.
    pub fn duration(&self) -> Duration {
        let per_channel = self.samples.len() as f64 / self.channels.max(1) as f64;
        Duration::from_secs_f64(per_channel / self.sample_rate as f64)
    }
}

struct BufferInner {
    frames: Vec<Frame>,
    next_sequence: u64,
    clips_finalized: u64,
}

/// Accumulates frames while listening; `finalize` atomically swaps them out
/// as a new [`Clip`].
///
/// `ingest` and `finalize` share one lock, so no frame can be lost mid-swap:
/// every ingested frame lands in exactly one clip (or is dropped explicitly
/// by `clear`).
pub struct ClipBuffer {
    inner: Mutex<BufferInner>,
    sample_rate: u32,
    channels: u16,
}

impl ClipBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            inner: Mutex::new(BufferInner {
                frames: Vec::new(),
                next_sequence: 0,
                clips_finalized: 0,
            }),
            sample_rate,
            channels,
        }
    }

    /// Appends a frame, assigning it the next sequence number.
    ///
    /// The caller (the capture gate) decides whether the session is in a
    /// state that admits frames; the buffer itself accepts unconditionally.
    pub fn ingest(&self, samples: Vec<i16>) -> u64 {
        let mut inner = self.inner.lock().expect("clip buffer lock poisoned");
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.frames.push(Frame {
            samples,
            sequence,
            captured_at: Instant::now(),
        });
        sequence
    }

    /// Atomically swaps the accumulated frames for an empty list and returns
    /// them as a new clip, or `None` if nothing was captured.
    ///
    /// Calling twice with no intervening `ingest` returns `None` the second
    /// time.
    pub fn finalize(&self) -> Option<Clip> {
        let mut inner = self.inner.lock().expect("clip buffer lock poisoned");
        if inner.frames.is_empty() {
            return None;
        }

        let frames = std::mem::take(&mut inner.frames);
        inner.clips_finalized += 1;
        let serial = inner.clips_finalized;
        drop(inner);

        let created_at = Local::now();
        let frame_count = frames.len();
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for frame in frames {
            samples.extend_from_slice(&frame.samples);
        }

        Some(Clip {
            id: format!("clip_{}_{:03}", created_at.format("%Y%m%d_%H%M%S"), serial),
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_count,
            created_at,
        })
    }

    /// Drops any accumulated frames (stale audio captured before an unmute).
    ///
    /// Returns the number of frames dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().expect("clip buffer lock poisoned");
        let dropped = inner.frames.len();
        inner.frames.clear();
        dropped
    }

    /// Number of frames currently buffered.
    pub fn pending_frames(&self) -> usize {
        self.inner
            .lock()
            .expect("clip buffer lock poisoned")
            .frames
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn buffer() -> ClipBuffer {
        ClipBuffer::new(44_100, 1)
    }

    #[test]
    fn test_finalize_empty_returns_none() {
        let buf = buffer();
        assert!(buf.finalize().is_none());
    }

    #[test]
    fn test_ingest_then_finalize_preserves_samples_in_order() {
        let buf = buffer();
        buf.ingest(vec![1, 2, 3]);
        buf.ingest(vec![4, 5]);
        buf.ingest(vec![6]);

        let clip = buf.finalize().unwrap();
        assert_eq!(clip.samples, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(clip.frame_count, 3);
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.channels, 1);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let buf = buffer();
        buf.ingest(vec![1, 2, 3]);

        assert!(buf.finalize().is_some());
        assert!(buf.finalize().is_none());
    }

    #[test]
    fn test_sequences_are_monotonic_across_clips() {
        let buf = buffer();
        let s0 = buf.ingest(vec![0]);
        let s1 = buf.ingest(vec![1]);
        buf.finalize();
        let s2 = buf.ingest(vec![2]);

        assert_eq!((s0, s1, s2), (0, 1, 2));
    }

    #[test]
    fn test_clip_ids_are_distinct_within_one_second() {
        let buf = buffer();
        buf.ingest(vec![1]);
        let a = buf.finalize().unwrap();
        buf.ingest(vec![2]);
        let b = buf.finalize().unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("clip_"));
    }

    #[test]
    fn test_clear_drops_pending_frames() {
        let buf = buffer();
        buf.ingest(vec![1]);
        buf.ingest(vec![2]);
        assert_eq!(buf.pending_frames(), 2);

        assert_eq!(buf.clear(), 2);
        assert_eq!(buf.pending_frames(), 0);
        assert!(buf.finalize().is_none());
    }

    #[test]
    fn test_clip_duration() {
        let buf = ClipBuffer::new(1000, 1);
        buf.ingest(vec![0i16; 500]);
        let clip = buf.finalize().unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_clip_duration_stereo() {
        let buf = ClipBuffer::new(1000, 2);
        buf.ingest(vec![0i16; 1000]);
        let clip = buf.finalize().unwrap();
        // 1000 interleaved samples over 2 channels = 500 frames.
        assert_eq!(clip.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_frame_conservation_under_concurrent_ingest_and_finalize() {
        // Every ingested frame must land in exactly one clip: finalize swaps
        // under the same lock as ingest, so nothing is lost or duplicated.
        let buf = Arc::new(buffer());
        let producer = Arc::clone(&buf);

        const FRAMES: u64 = 500;
        let handle = thread::spawn(move || {
            for i in 0..FRAMES {
                producer.ingest(vec![i as i16]);
            }
        });

        let mut clips = Vec::new();
        for _ in 0..50 {
            if let Some(clip) = buf.finalize() {
                clips.push(clip);
            }
            thread::yield_now();
        }
        handle.join().unwrap();
        if let Some(clip) = buf.finalize() {
            clips.push(clip);
        }

        let collected: usize = clips.iter().map(|c| c.samples.len()).sum();
        assert_eq!(collected as u64, FRAMES, "no frame lost or duplicated");

        // Capture order is preserved across clip boundaries.
        let mut all: Vec<i16> = Vec::new();
        for clip in &clips {
            all.extend_from_slice(&clip.samples);
        }
        let expected: Vec<i16> = (0..FRAMES).map(|i| i as i16).collect();
        assert_eq!(all, expected);
    }
}
