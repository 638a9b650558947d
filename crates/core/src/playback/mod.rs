use std::collections::HashMap;

use bytes::Bytes;

use crate::{MaskCamError, Result};

/// Re-encoded media returned by the service, tagged with an explicit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableMedia {
    pub bytes: Bytes,
    pub media_type: String,
}

impl PlayableMedia {
    pub fn new(bytes: Bytes, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }
}

/// Opaque handle to media loaded into a preview surface. Not `Clone`: the
/// holder is the only one who can give it back.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MediaHandle(u64);

impl MediaHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The element that shows either the live preview or recorded playback.
pub trait PreviewSurface: Send {
    fn show_live(&mut self);

    /// Loads `media` for playback and starts it.
    fn load(&mut self, media: PlayableMedia) -> Result<MediaHandle>;

    fn release(&mut self, handle: MediaHandle);
}

/// Holds at most one playback handle. The previous handle is released only
/// once its replacement has loaded.
#[derive(Debug, Default)]
pub struct PlaybackSlot {
    current: Option<MediaHandle>,
}

impl PlaybackSlot {
    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&MediaHandle> {
        self.current.as_ref()
    }

    /// Loads `media`, then releases the old handle. A refused load leaves the
    /// slot as it was.
    pub fn replace(
        &mut self,
        surface: &mut dyn PreviewSurface,
        media: PlayableMedia,
    ) -> Result<()> {
        let next = surface.load(media)?;
        self.clear(surface);
        self.current = Some(next);
        Ok(())
    }

    pub fn clear(&mut self, surface: &mut dyn PreviewSurface) {
        if let Some(previous) = self.current.take() {
            tracing::debug!(handle = previous.id(), "releasing playback media");
            surface.release(previous);
        }
    }
}

/// What a [`MemorySurface`] is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Showing {
    Live,
    Playback(u64),
}

/// Keeps loaded media in memory. Used by the CLI and tests.
#[derive(Debug)]
pub struct MemorySurface {
    loaded: HashMap<u64, PlayableMedia>,
    next_id: u64,
    showing: Showing,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self {
            loaded: HashMap::new(),
            next_id: 1,
            showing: Showing::Live,
        }
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn showing(&self) -> Showing {
        self.showing
    }

    pub fn live_handles(&self) -> usize {
        self.loaded.len()
    }

    pub fn media(&self, id: u64) -> Option<&PlayableMedia> {
        self.loaded.get(&id)
    }

    /// Media currently being played, if any.
    pub fn playing(&self) -> Option<&PlayableMedia> {
        match self.showing {
            Showing::Playback(id) => self.loaded.get(&id),
            Showing::Live => None,
        }
    }
}

impl PreviewSurface for MemorySurface {
    fn show_live(&mut self) {
        self.showing = Showing::Live;
    }

    fn load(&mut self, media: PlayableMedia) -> Result<MediaHandle> {
        if media.media_type.is_empty() {
            return Err(MaskCamError::InvalidInput(
                "playback media must carry a media type",
            ));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.loaded.insert(id, media);
        self.showing = Showing::Playback(id);
        Ok(MediaHandle::new(id))
    }

    fn release(&mut self, handle: MediaHandle) {
        self.loaded.remove(&handle.id());
        if self.showing == Showing::Playback(handle.id()) {
            self.showing = Showing::Live;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4(bytes: &'static [u8]) -> PlayableMedia {
        PlayableMedia::new(Bytes::from_static(bytes), "video/mp4")
    }

    #[test]
    fn replacing_releases_previous_handle() {
        let mut surface = MemorySurface::new();
        let mut slot = PlaybackSlot::default();

        slot.replace(&mut surface, mp4(b"first")).unwrap();
        slot.replace(&mut surface, mp4(b"second")).unwrap();

        assert_eq!(surface.live_handles(), 1);
        assert_eq!(surface.playing().unwrap().bytes, Bytes::from_static(b"second"));
    }

    #[test]
    fn clearing_returns_surface_to_live() {
        let mut surface = MemorySurface::new();
        let mut slot = PlaybackSlot::default();
        slot.replace(&mut surface, mp4(b"clip")).unwrap();

        slot.clear(&mut surface);
        assert!(!slot.is_loaded());
        assert_eq!(surface.live_handles(), 0);
        assert_eq!(surface.showing(), Showing::Live);
    }

    #[test]
    fn untyped_media_is_refused() {
        let mut surface = MemorySurface::new();
        let mut slot = PlaybackSlot::default();
        let err = slot
            .replace(&mut surface, PlayableMedia::new(Bytes::from_static(b"x"), ""))
            .unwrap_err();
        assert!(matches!(err, MaskCamError::InvalidInput(_)));
        assert!(!slot.is_loaded());
    }

    #[test]
    fn refused_replacement_keeps_current_clip() {
        let mut surface = MemorySurface::new();
        let mut slot = PlaybackSlot::default();
        slot.replace(&mut surface, mp4(b"first")).unwrap();

        assert!(slot
            .replace(&mut surface, PlayableMedia::new(Bytes::from_static(b"x"), ""))
            .is_err());
        assert!(slot.is_loaded());
        assert_eq!(surface.live_handles(), 1);
        assert_eq!(surface.playing().unwrap().bytes, Bytes::from_static(b"first"));
    }
}
