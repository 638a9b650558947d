use image::{Rgba, RgbaImage};

use crate::{
    assets::{OverlaySprite, SpriteStore},
    landmarks::{FaceLandmarks, Landmark, LandmarkPoint, LandmarkSource},
    overlay::{compute_placement, Dimensions, OverlayCompositor, OverlayStyle, Placement},
    Result,
};

mod canvas;

pub use canvas::{Canvas, CanvasState, Transform};

const LEFT_MARKER: Rgba<u8> = Rgba([0x30, 0xff, 0x30, 0xff]);
const RIGHT_MARKER: Rgba<u8> = Rgba([0xff, 0x30, 0x30, 0xff]);
const CENTRE_MARKER: Rgba<u8> = Rgba([0xe0, 0xe0, 0xe0, 0xff]);

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The sprite was composited at this placement.
    Overlaid(Placement),
    /// A face was found but no overlay was drawn; landmarks were plotted.
    Debug,
    /// Only the raw frame was drawn.
    NoFace,
    /// Frame processing has been halted; nothing was drawn.
    Halted,
}

/// Owns the canvas and draws each incoming frame plus the overlay.
#[derive(Debug)]
pub struct RenderLoop {
    canvas: Canvas,
    compositor: OverlayCompositor,
    sprites: SpriteStore,
    active_mask: Option<String>,
    style: OverlayStyle,
    source_size: Option<Dimensions>,
    running: bool,
    debug_markers: bool,
}

impl RenderLoop {
    pub fn new(compositor: OverlayCompositor, sprites: SpriteStore, style: OverlayStyle) -> Self {
        Self {
            canvas: Canvas::new(0, 0),
            compositor,
            sprites,
            active_mask: None,
            style,
            source_size: None,
            running: true,
            debug_markers: true,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn style(&self) -> OverlayStyle {
        self.style
    }

    /// Takes effect on the next frame.
    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn set_debug_markers(&mut self, enabled: bool) {
        self.debug_markers = enabled;
    }

    /// Selects the overlay, loading its sprite on first use.
    pub fn set_mask(&mut self, key: &str) -> Result<()> {
        self.sprites.get_or_load(key)?;
        tracing::info!(mask = key, "mask selected");
        self.active_mask = Some(key.to_string());
        Ok(())
    }

    pub fn clear_mask(&mut self) {
        self.active_mask = None;
    }

    pub fn active_mask(&self) -> Option<&str> {
        self.active_mask.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops drawing. Frames delivered afterwards are ignored.
    pub fn halt(&mut self) {
        if self.running {
            tracing::info!("frame processing halted");
        }
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Runs detection on `frame` and renders the result.
    pub fn process(&mut self, frame: &RgbaImage, source: &mut dyn LandmarkSource) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Halted;
        }
        let landmarks = source.detect(frame);
        self.render_frame(frame, landmarks.as_deref())
    }

    /// Draws the raw frame and, when a face is present, the overlay or the
    /// debug markers.
    pub fn render_frame(
        &mut self,
        frame: &RgbaImage,
        landmarks: Option<&[LandmarkPoint]>,
    ) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Halted;
        }

        let source = Dimensions::new(frame.width(), frame.height());
        if self.source_size != Some(source) {
            tracing::info!(width = source.width, height = source.height, "sizing canvas to source");
            self.canvas.resize(source.width, source.height);
            self.source_size = Some(source);
        }

        self.canvas.clear();
        self.canvas.draw_frame(frame);

        let Some(points) = landmarks else {
            return FrameOutcome::NoFace;
        };
        let Some(face) = FaceLandmarks::resolve(points, self.compositor.registry()) else {
            tracing::debug!(points = points.len(), "required landmarks missing, skipping overlay");
            return FrameOutcome::NoFace;
        };

        let sprite = self
            .active_mask
            .as_deref()
            .and_then(|key| self.sprites.get(key));
        let placement = sprite.and_then(|sprite| {
            compute_placement(&face, sprite.dimensions(), source, &self.style)
                .map(|placement| (sprite, placement))
        });

        match placement {
            Some((sprite, placement)) => {
                composite(&mut self.canvas, sprite, &placement);
                FrameOutcome::Overlaid(placement)
            }
            None if self.debug_markers => {
                draw_markers(&mut self.canvas, &face, source);
                FrameOutcome::Debug
            }
            None => FrameOutcome::NoFace,
        }
    }
}

fn composite(canvas: &mut Canvas, sprite: &OverlaySprite, placement: &Placement) {
    let mut scoped = canvas.save();
    scoped.translate(placement.center_x, placement.center_y);
    scoped.rotate(placement.angle_radians);
    scoped.draw_image(
        sprite.image(),
        -placement.width / 2.0,
        -placement.height / 2.0,
        placement.width,
        placement.height,
    );
}

fn draw_markers(canvas: &mut Canvas, face: &FaceLandmarks, size: Dimensions) {
    for (landmark, point) in face.named() {
        let color = match landmark {
            Landmark::LeftEye | Landmark::LeftEar => LEFT_MARKER,
            Landmark::RightEye | Landmark::RightEar => RIGHT_MARKER,
            _ => CENTRE_MARKER,
        };
        canvas.fill_marker(
            point.x * f64::from(size.width),
            point.y * f64::from(size.height),
            2,
            color,
        );
    }
}
