//! Camera acquisition seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Requested stream shape. Devices treat these as ideals, not guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing_mode: "user".to_string(),
        }
    }
}

/// A live device stream. Released synchronously when the user stops.
pub trait StreamHandle: Send {
    /// Stops every track. Calling it twice is harmless.
    fn release(&mut self);
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Opens the device. Fails with [`crate::MaskCamError::Capture`] when it
    /// is missing or permission is denied.
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<Box<dyn StreamHandle>>;
}
