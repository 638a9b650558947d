use bytes::Bytes;
use image::RgbaImage;

use crate::{
    assets::SpriteStore,
    capture::CaptureDevice,
    landmarks::{LandmarkRegistry, LandmarkSource},
    overlay::{OverlayCompositor, OverlayStyle},
    playback::{PlayableMedia, PreviewSurface},
    record::Recorder,
    render::{FrameOutcome, RenderLoop},
    session::{Controls, SessionController, SessionState, UploadTicket},
    upload::UploadPipeline,
    AppConfig, Result, UploadError,
};

/// External collaborators a [`Studio`] drives.
pub struct Collaborators {
    pub landmarks: Box<dyn LandmarkSource>,
    pub recorder: Box<dyn Recorder>,
    pub surface: Box<dyn PreviewSurface>,
    pub pipeline: UploadPipeline,
}

/// An upload that has been handed its recording but not yet run. Owns
/// everything it needs, so the caller can keep handling events while it is
/// in flight.
#[derive(Debug)]
pub struct PendingUpload {
    ticket: UploadTicket,
    pipeline: UploadPipeline,
}

impl PendingUpload {
    pub fn ticket(&self) -> u64 {
        self.ticket.id()
    }

    pub async fn run(self) -> UploadOutcome {
        let result = self.pipeline.upload(self.ticket.session()).await;
        UploadOutcome {
            ticket: self.ticket.id(),
            result,
        }
    }
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub ticket: u64,
    pub result: std::result::Result<PlayableMedia, UploadError>,
}

/// Wires the per-frame render path and the session lifecycle together.
pub struct Studio {
    config: AppConfig,
    render: RenderLoop,
    controller: SessionController,
    landmarks: Box<dyn LandmarkSource>,
    pipeline: UploadPipeline,
}

impl Studio {
    /// Validates the landmark registry against the detector and selects the
    /// configured default mask.
    pub fn new(config: AppConfig, sprites: SpriteStore, parts: Collaborators) -> Result<Self> {
        config.validate()?;
        let registry = LandmarkRegistry::face_mesh(parts.landmarks.landmark_count())?;

        let mut render = RenderLoop::new(
            OverlayCompositor::new(registry),
            sprites,
            config.overlay.style,
        );
        if let Some(mask) = &config.overlay.default_mask {
            render.set_mask(mask)?;
        }
        render.halt();

        let controller =
            SessionController::new(parts.recorder, parts.surface, config.recording.clone());

        Ok(Self {
            config,
            render,
            controller,
            landmarks: parts.landmarks,
            pipeline: parts.pipeline,
        })
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn controls(&self) -> Controls {
        self.controller.controls()
    }

    pub fn render(&self) -> &RenderLoop {
        &self.render
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Acquires the camera, waits for the detector, then starts drawing.
    pub async fn start(&mut self, device: &dyn CaptureDevice) -> Result<()> {
        self.controller
            .acquire_stream(device, &self.config.capture)
            .await?;
        if let Err(err) = self.landmarks.initialize(&self.config.detector).await {
            tracing::warn!(error = %err, "landmark detector failed to initialise");
            self.controller.stop_stream()?;
            return Err(err);
        }
        self.render.resume();
        Ok(())
    }

    pub fn on_frame(&mut self, frame: &RgbaImage) -> FrameOutcome {
        self.render.process(frame, self.landmarks.as_mut())
    }

    pub fn select_mask(&mut self, key: &str) -> Result<()> {
        self.render.set_mask(key)
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.render.set_style(style);
    }

    /// Returns the id the recorder labels its chunks with.
    pub fn start_recording(&mut self) -> Result<u64> {
        let overlay = self.render.active_mask().map(str::to_string);
        self.controller.start_recording(overlay)
    }

    pub fn on_chunk(&mut self, recording: u64, chunk: Bytes) -> Result<bool> {
        self.controller.chunk_available(recording, chunk)
    }

    pub fn stop_recording(&mut self) -> Result<()> {
        self.controller.stop_recording()
    }

    pub fn on_recorder_stopped(&mut self) -> Result<PendingUpload> {
        let ticket = self.controller.recorder_stopped()?;
        Ok(PendingUpload {
            ticket,
            pipeline: self.pipeline.clone(),
        })
    }

    pub fn finish_upload(&mut self, outcome: UploadOutcome) -> bool {
        self.controller.upload_finished(outcome.ticket, outcome.result)
    }

    pub fn acknowledge_failure(&mut self) -> Result<()> {
        self.controller.acknowledge_failure()
    }

    /// Halts frame processing and releases the device before returning.
    pub fn stop(&mut self) -> Result<()> {
        self.render.halt();
        self.controller.stop_stream()
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("render", &self.render)
            .field("controller", &self.controller)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};

    use async_trait::async_trait;
    use image::Rgba;

    use super::*;
    use crate::{
        assets::{AssetConfig, OverlaySprite},
        landmarks::{DetectorOptions, Landmark, LandmarkPoint, StaticLandmarkSource},
        session::tests::{FakeDevice, FakeRecorder, FakeSurface, Probe},
        upload::{ReencodeService, UploadRequest},
        MaskCamError,
    };

    struct EchoService;

    struct BrokenDetector;

    #[async_trait]
    impl LandmarkSource for BrokenDetector {
        async fn initialize(&mut self, _options: &DetectorOptions) -> Result<()> {
            Err(MaskCamError::msg("model weights missing"))
        }

        fn landmark_count(&self) -> usize {
            478
        }

        fn detect(&mut self, _frame: &RgbaImage) -> Option<Vec<LandmarkPoint>> {
            None
        }
    }

    #[async_trait]
    impl ReencodeService for EchoService {
        async fn exchange(
            &self,
            request: UploadRequest,
        ) -> std::result::Result<Bytes, UploadError> {
            match request.overlay_key.as_deref() {
                Some("bear") => Ok(request.payload),
                _ => Err(UploadError::Rejected { status: 400 }),
            }
        }
    }

    fn face() -> Vec<LandmarkPoint> {
        let registry = LandmarkRegistry::face_mesh(478).unwrap();
        registry.dense_from_named(&[
            (Landmark::LeftEye, LandmarkPoint::new(0.4, 0.5)),
            (Landmark::RightEye, LandmarkPoint::new(0.6, 0.5)),
            (Landmark::Nose, LandmarkPoint::new(0.5, 0.6)),
            (Landmark::Chin, LandmarkPoint::new(0.5, 0.8)),
            (Landmark::LeftEar, LandmarkPoint::new(0.3, 0.5)),
            (Landmark::RightEar, LandmarkPoint::new(0.7, 0.5)),
            (Landmark::Forehead, LandmarkPoint::new(0.5, 0.3)),
        ])
    }

    fn studio(default_mask: Option<&str>) -> (Studio, Probe) {
        studio_with(
            default_mask,
            Box::new(StaticLandmarkSource::new(Some(face()), 478)),
        )
    }

    fn studio_with(
        default_mask: Option<&str>,
        landmarks: Box<dyn LandmarkSource>,
    ) -> (Studio, Probe) {
        let probe = Probe::default();
        let mut config = AppConfig::default();
        config.overlay.default_mask = default_mask.map(str::to_string);

        let mut sprites = SpriteStore::new(AssetConfig::default());
        sprites.insert(OverlaySprite::from_image(
            "bear",
            RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255])),
        ));

        let studio = Studio::new(
            config,
            sprites,
            Collaborators {
                landmarks,
                recorder: Box::new(FakeRecorder(probe.clone())),
                surface: Box::new(FakeSurface(probe.clone())),
                pipeline: UploadPipeline::new(Arc::new(EchoService), "video/mp4"),
            },
        )
        .unwrap();
        (studio, probe)
    }

    fn device(probe: &Probe) -> FakeDevice {
        FakeDevice {
            probe: probe.clone(),
            available: true,
        }
    }

    #[tokio::test]
    async fn frames_are_ignored_until_started() {
        let (mut studio, probe) = studio(Some("bear"));
        let frame = RgbaImage::new(100, 100);
        assert_eq!(studio.on_frame(&frame), FrameOutcome::Halted);

        studio.start(&device(&probe)).await.unwrap();
        assert!(matches!(studio.on_frame(&frame), FrameOutcome::Overlaid(_)));
    }

    #[tokio::test]
    async fn recording_is_tagged_with_active_mask_and_played_back() {
        let (mut studio, probe) = studio(Some("bear"));
        studio.start(&device(&probe)).await.unwrap();

        let recording = studio.start_recording().unwrap();
        studio.on_chunk(recording, Bytes::from_static(b"web")).unwrap();
        studio.on_chunk(recording, Bytes::from_static(b"m")).unwrap();
        studio.stop_recording().unwrap();
        let pending = studio.on_recorder_stopped().unwrap();

        let outcome = pending.run().await;
        assert_eq!(outcome.result.as_ref().unwrap().bytes, Bytes::from_static(b"webm"));
        assert!(studio.finish_upload(outcome));
        assert_eq!(studio.state(), SessionState::Playing);
    }

    #[tokio::test]
    async fn rejected_upload_can_be_acknowledged() {
        let (mut studio, probe) = studio(None);
        studio.start(&device(&probe)).await.unwrap();

        let recording = studio.start_recording().unwrap();
        studio.on_chunk(recording, Bytes::from_static(b"data")).unwrap();
        studio.stop_recording().unwrap();
        let outcome = studio.on_recorder_stopped().unwrap().run().await;
        studio.finish_upload(outcome);

        assert_eq!(studio.state(), SessionState::Failed);
        studio.acknowledge_failure().unwrap();
        assert!(studio.controls().start_recording);
    }

    #[tokio::test]
    async fn stop_halts_frames_and_discards_in_flight_upload() {
        let (mut studio, probe) = studio(Some("bear"));
        studio.start(&device(&probe)).await.unwrap();
        let recording = studio.start_recording().unwrap();
        studio.on_chunk(recording, Bytes::from_static(b"data")).unwrap();
        studio.stop_recording().unwrap();
        let pending = studio.on_recorder_stopped().unwrap();

        studio.stop().unwrap();
        assert!(probe.stream_released.load(Ordering::SeqCst));
        assert_eq!(
            studio.on_frame(&RgbaImage::new(10, 10)),
            FrameOutcome::Halted
        );

        let outcome = pending.run().await;
        assert!(outcome.result.is_ok());
        assert!(!studio.finish_upload(outcome));
        assert_eq!(studio.state(), SessionState::Idle);
        assert_eq!(probe.live_handles(), 0);
    }

    #[tokio::test]
    async fn unavailable_camera_is_reported_once() {
        let (mut studio, probe) = studio(None);
        let device = FakeDevice {
            probe,
            available: false,
        };
        let err = studio.start(&device).await.unwrap_err();
        assert!(matches!(err, MaskCamError::Capture(_)));
        assert_eq!(studio.state(), SessionState::Idle);
        assert!(!studio.render().is_running());
    }

    #[tokio::test]
    async fn detector_failure_releases_the_camera() {
        let (mut studio, probe) = studio_with(Some("bear"), Box::new(BrokenDetector));

        assert!(studio.start(&device(&probe)).await.is_err());
        assert!(probe.stream_released.load(Ordering::SeqCst));
        assert_eq!(studio.state(), SessionState::Idle);
        assert!(!studio.render().is_running());
        assert_eq!(
            studio.on_frame(&RgbaImage::new(10, 10)),
            FrameOutcome::Halted
        );
    }

    #[test]
    fn detector_too_small_for_registry_is_rejected() {
        let probe = Probe::default();
        let result = Studio::new(
            AppConfig::default(),
            SpriteStore::default(),
            Collaborators {
                landmarks: Box::new(StaticLandmarkSource::new(None, 68)),
                recorder: Box::new(FakeRecorder(probe.clone())),
                surface: Box::new(FakeSurface(probe)),
                pipeline: UploadPipeline::new(Arc::new(EchoService), "video/mp4"),
            },
        );
        assert!(result.is_err());
    }
}
