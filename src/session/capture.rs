//! Mute-gated frame ingestion.
//!
//! The platform audio layer delivers frames through the [`FrameSink`] trait;
//! the [`CaptureGate`] admits them into the clip buffer only while the
//! session is listening. Segmentation is entirely user-driven: the
//! Listening → Muted transition is the sole trigger for producing a clip.

use crate::session::clip::ClipBuffer;
use crate::session::state::SessionState;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Producer interface the platform audio layer invokes for each block of
/// captured samples.
///
/// Implementations must never block: the device callback runs on the audio
/// driver's thread.
pub trait FrameSink: Send + Sync {
    /// Deliver one block of PCM samples.
    fn on_frame(&self, samples: &[i16]);
}

/// Implement FrameSink for Arc<T> so the gate can be shared with the device.
impl<T: FrameSink> FrameSink for Arc<T> {
    fn on_frame(&self, samples: &[i16]) {
        (**self).on_frame(samples)
    }
}

/// Admits frames into the clip buffer only while the session is listening.
///
/// A frame arriving while muted is a no-op, not an error; it is counted for
/// diagnostics and dropped.
#[derive(Clone)]
pub struct CaptureGate {
    state: Arc<SessionState>,
    buffer: Arc<ClipBuffer>,
    muted_drops: Arc<AtomicU64>,
}

impl CaptureGate {
    pub fn new(state: Arc<SessionState>, buffer: Arc<ClipBuffer>) -> Self {
        Self {
            state,
            buffer,
            muted_drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of frames dropped because they arrived while muted.
    pub fn muted_drop_count(&self) -> u64 {
        self.muted_drops.load(Ordering::Relaxed)
    }
}

impl FrameSink for CaptureGate {
    fn on_frame(&self, samples: &[i16]) {
        if self.state.is_listening() {
            self.buffer.ingest(samples.to_vec());
        } else {
            self.muted_drops.fetch_add(1, Ordering::Relaxed);
        }
    }
}
