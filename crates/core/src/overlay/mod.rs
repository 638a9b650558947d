//! Per-frame overlay placement.
//!
//! Everything here is a pure function of its inputs: no allocation, no IO and
//! no hidden state, so it can run inline on the frame callback.

use serde::{Deserialize, Serialize};

use crate::landmarks::{FaceLandmarks, LandmarkPoint, LandmarkRegistry};

/// Eye distances below this many pixels are treated as "no face".
pub const MIN_EYE_DISTANCE_PX: f64 = 1e-6;

/// User-tunable overlay anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Upward shift of the overlay centre as a fraction of its own height.
    pub vertical_offset: f64,
    /// Overlay width relative to the measured eye distance.
    pub scale_multiplier: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            vertical_offset: 0.0,
            scale_multiplier: 2.0,
        }
    }
}

/// Pixel width and height of a sprite or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where and how to draw the sprite for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub center_x: f64,
    pub center_y: f64,
    pub angle_radians: f64,
    pub width: f64,
    pub height: f64,
}

/// Computes the overlay placement for one face.
///
/// Returns `None` when the eyes coincide or the sprite has no width; callers
/// treat that exactly like a frame without a face.
pub fn compute_placement(
    face: &FaceLandmarks,
    sprite: Dimensions,
    canvas: Dimensions,
    style: &OverlayStyle,
) -> Option<Placement> {
    if sprite.width == 0 || sprite.height == 0 {
        return None;
    }

    let left = to_pixels(face.left_eye, canvas);
    let right = to_pixels(face.right_eye, canvas);

    let dx = right.0 - left.0;
    let dy = right.1 - left.1;
    let eye_distance = dx.hypot(dy);
    if eye_distance.is_nan() || eye_distance < MIN_EYE_DISTANCE_PX {
        return None;
    }

    let scale = eye_distance * style.scale_multiplier / f64::from(sprite.width);
    let width = f64::from(sprite.width) * scale;
    let height = f64::from(sprite.height) * scale;
    if !width.is_finite() || width <= 0.0 || !height.is_finite() || height <= 0.0 {
        return None;
    }

    let center_x = (left.0 + right.0) / 2.0;
    let center_y = (left.1 + right.1) / 2.0 - height * style.vertical_offset;

    Some(Placement {
        center_x,
        center_y,
        angle_radians: dy.atan2(dx),
        width,
        height,
    })
}

fn to_pixels(point: LandmarkPoint, canvas: Dimensions) -> (f64, f64) {
    (
        point.x * f64::from(canvas.width),
        point.y * f64::from(canvas.height),
    )
}

/// Resolves raw detector output and places the overlay in one step.
#[derive(Debug, Clone)]
pub struct OverlayCompositor {
    registry: LandmarkRegistry,
}

impl OverlayCompositor {
    pub fn new(registry: LandmarkRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LandmarkRegistry {
        &self.registry
    }

    pub fn place(
        &self,
        points: &[LandmarkPoint],
        sprite: Dimensions,
        canvas: Dimensions,
        style: &OverlayStyle,
    ) -> Option<Placement> {
        let face = FaceLandmarks::resolve(points, &self.registry)?;
        compute_placement(&face, sprite, canvas, style)
    }
}
