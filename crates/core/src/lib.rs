//! Core library for Maskcam.
//!
//! Places an overlay sprite on a live face from detector landmarks, and runs
//! the record → upload → playback lifecycle around it. Camera access, the
//! landmark model, the media recorder and the preview element are external
//! collaborators reached through the traits in [`capture`], [`landmarks`],
//! [`record`] and [`playback`]; [`studio::Studio`] wires them together.

pub mod assets;
pub mod capture;
pub mod config;
pub mod error;
pub mod landmarks;
pub mod overlay;
pub mod playback;
pub mod record;
pub mod render;
pub mod session;
pub mod studio;
pub mod upload;

pub use assets::{AssetConfig, OverlaySprite, SpriteStore};
pub use capture::{CaptureConstraints, CaptureDevice, StreamHandle};
pub use config::{AppConfig, OverlayConfig};
pub use error::{MaskCamError, Result, UploadError};
pub use landmarks::{
    DetectorOptions, FaceLandmarks, Landmark, LandmarkPoint, LandmarkRegistry, LandmarkSource,
    StaticLandmarkSource,
};
pub use overlay::{compute_placement, Dimensions, OverlayCompositor, OverlayStyle, Placement};
pub use playback::{MediaHandle, MemorySurface, PlayableMedia, PlaybackSlot, PreviewSurface};
pub use record::{Recorder, RecordingSession, RecordingSettings};
pub use render::{Canvas, FrameOutcome, RenderLoop};
pub use session::{Controls, SessionController, SessionEvent, SessionFailure, SessionState};
pub use studio::{Collaborators, PendingUpload, Studio, UploadOutcome};
pub use upload::{HttpReencodeService, ReencodeService, UploadConfig, UploadPipeline};
