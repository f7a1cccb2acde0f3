//! Microphone side: where buffered audio comes from, and the session that drains it.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::VoiceResult;
use crate::poller::PollerHandle;

/// A microphone (or anything that buffers encoded audio between polls).
pub trait AudioSource: Send + Sync {
    fn start(&self) -> VoiceResult<()>;

    fn stop(&self);

    /// Drain everything buffered since the last call. `None` when nothing is buffered.
    fn take_buffered(&self) -> Option<Vec<u8>>;

    /// Drop buffered audio without sending it.
    fn discard(&self);
}

/// In-memory source fed by the host (device callback, file, test).
#[derive(Debug, Clone, Default)]
pub struct BufferedAudio {
    inner: Arc<Mutex<BufferState>>,
}

#[derive(Debug, Default)]
struct BufferState {
    recording: bool,
    buffer: Vec<u8>,
}

impl BufferedAudio {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append encoded audio. Ignored unless recording.
    pub fn push(&self, chunk: &[u8]) {
        let mut state = self.state();
        if state.recording {
            state.buffer.extend_from_slice(chunk);
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state().recording
    }

    pub fn buffered_len(&self) -> usize {
        self.state().buffer.len()
    }
}

impl AudioSource for BufferedAudio {
    fn start(&self) -> VoiceResult<()> {
        self.state().recording = true;
        Ok(())
    }

    fn stop(&self) {
        self.state().recording = false;
    }

    fn take_buffered(&self) -> Option<Vec<u8>> {
        let mut state = self.state();
        if state.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut state.buffer))
        }
    }

    fn discard(&self) {
        self.state().buffer.clear();
    }
}

/// One listening session. Dropping it stops the microphone poll.
#[derive(Debug)]
pub struct CaptureSession {
    poller: PollerHandle,
    started_at: DateTime<Utc>,
}

impl CaptureSession {
    pub(crate) fn new(poller: PollerHandle) -> Self {
        Self {
            poller,
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub(crate) fn cancel(self) {
        self.poller.cancel();
    }
}
