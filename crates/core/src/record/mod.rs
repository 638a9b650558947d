use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Configuration handed to the recorder when a recording starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Full recorder MIME type, codecs included.
    pub mime_type: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=vp8".to_string(),
        }
    }
}

/// Media recorder attached to the live stream.
///
/// Chunks and the stop acknowledgment arrive later as controller events. Each
/// chunk carries the id returned when its recording started, and every chunk
/// is delivered before the stop is acknowledged.
pub trait Recorder: Send {
    fn start(&mut self, settings: &RecordingSettings) -> Result<()>;

    /// Asks the recorder to stop. Completion is signalled separately.
    fn request_stop(&mut self) -> Result<()>;
}

/// Media chunks of one recording, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    chunks: Vec<Bytes>,
    overlay_key: Option<String>,
    finalized: bool,
}

impl RecordingSession {
    pub fn new(overlay_key: Option<String>) -> Self {
        Self {
            chunks: Vec::new(),
            overlay_key,
            finalized: false,
        }
    }

    /// Appends a chunk. Empty chunks are dropped and nothing is appended once
    /// the session is finalized. Returns whether the chunk was kept.
    pub fn push_chunk(&mut self, chunk: Bytes) -> bool {
        if self.finalized || chunk.is_empty() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn overlay_key(&self) -> Option<&str> {
        self.overlay_key.as_deref()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The recording as one contiguous buffer.
    pub fn payload(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(self.len());
                for chunk in chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}
