//! Facial landmark types and the detector seam.
//!
//! Detectors emit dense, index-addressed point sequences. The handful of
//! points the overlay needs are looked up through [`LandmarkRegistry`], which
//! is checked once against the detector's declared landmark count instead of
//! sprinkling raw indices through the compositor.

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{MaskCamError, Result};

/// Landmark count of the refined face mesh (468 mesh points plus irises).
pub const FACE_MESH_REFINED_LANDMARKS: usize = 478;
/// Landmark count of the face mesh without iris refinement.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// A single detector point in normalized frame coordinates.
///
/// `x` and `y` are nominally in `[0, 1]` but may fall slightly outside at the
/// frame edges. `z` is carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl LandmarkPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// Semantic names the overlay relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Landmark {
    LeftEye,
    RightEye,
    Nose,
    Chin,
    LeftEar,
    RightEar,
    Forehead,
}

impl Landmark {
    pub const ALL: [Landmark; 7] = [
        Landmark::LeftEye,
        Landmark::RightEye,
        Landmark::Nose,
        Landmark::Chin,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::Forehead,
    ];
}

/// Face mesh indices for each semantic landmark.
const FACE_MESH_INDICES: [(Landmark, usize); 7] = [
    (Landmark::LeftEye, 33),
    (Landmark::RightEye, 263),
    (Landmark::Nose, 1),
    (Landmark::Chin, 152),
    (Landmark::LeftEar, 234),
    (Landmark::RightEar, 454),
    (Landmark::Forehead, 10),
];

/// Maps semantic landmark names to positions in a detector's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkRegistry {
    entries: [(Landmark, usize); 7],
    declared_count: usize,
}

impl LandmarkRegistry {
    /// Registry for the face mesh detector, validated against the number of
    /// landmarks the detector says it emits.
    pub fn face_mesh(declared_count: usize) -> Result<Self> {
        Self::validated(FACE_MESH_INDICES, declared_count)
    }

    pub fn validated(entries: [(Landmark, usize); 7], declared_count: usize) -> Result<Self> {
        for landmark in Landmark::ALL {
            let count = entries.iter().filter(|(name, _)| *name == landmark).count();
            if count != 1 {
                return Err(MaskCamError::msg(format!(
                    "landmark registry must map {landmark:?} exactly once (found {count})"
                )));
            }
        }
        if let Some((name, index)) = entries.iter().find(|(_, index)| *index >= declared_count) {
            return Err(MaskCamError::msg(format!(
                "landmark {name:?} uses index {index} but the detector only emits {declared_count} points"
            )));
        }
        Ok(Self {
            entries,
            declared_count,
        })
    }

    pub fn index_of(&self, landmark: Landmark) -> usize {
        self.entries
            .iter()
            .find(|(name, _)| *name == landmark)
            .map(|(_, index)| *index)
            .unwrap_or(usize::MAX)
    }

    pub fn declared_count(&self) -> usize {
        self.declared_count
    }

    /// Builds a dense point sequence from named points; unnamed slots are
    /// zeroed.
    pub fn dense_from_named(&self, named: &[(Landmark, LandmarkPoint)]) -> Vec<LandmarkPoint> {
        let mut points = vec![LandmarkPoint::default(); self.declared_count];
        for (landmark, point) in named {
            points[self.index_of(*landmark)] = *point;
        }
        points
    }
}

/// The required landmark subset for one face, resolved from a dense
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLandmarks {
    pub left_eye: LandmarkPoint,
    pub right_eye: LandmarkPoint,
    pub nose: LandmarkPoint,
    pub chin: LandmarkPoint,
    pub left_ear: LandmarkPoint,
    pub right_ear: LandmarkPoint,
    pub forehead: LandmarkPoint,
}

impl FaceLandmarks {
    /// Returns `None` when any required point is missing from `points`.
    pub fn resolve(points: &[LandmarkPoint], registry: &LandmarkRegistry) -> Option<Self> {
        let get = |landmark| points.get(registry.index_of(landmark)).copied();
        Some(Self {
            left_eye: get(Landmark::LeftEye)?,
            right_eye: get(Landmark::RightEye)?,
            nose: get(Landmark::Nose)?,
            chin: get(Landmark::Chin)?,
            left_ear: get(Landmark::LeftEar)?,
            right_ear: get(Landmark::RightEar)?,
            forehead: get(Landmark::Forehead)?,
        })
    }

    pub fn named(&self) -> [(Landmark, LandmarkPoint); 7] {
        [
            (Landmark::LeftEye, self.left_eye),
            (Landmark::RightEye, self.right_eye),
            (Landmark::Nose, self.nose),
            (Landmark::Chin, self.chin),
            (Landmark::LeftEar, self.left_ear),
            (Landmark::RightEar, self.right_ear),
            (Landmark::Forehead, self.forehead),
        ]
    }
}

/// Knobs forwarded to the detector. The core never interprets the
/// confidence thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_faces: u32,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub landmark_count: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            landmark_count: FACE_MESH_REFINED_LANDMARKS,
        }
    }
}

/// Face landmark detector.
///
/// `initialize` may suspend while the model loads; `detect` runs on the frame
/// callback and must not.
#[async_trait]
pub trait LandmarkSource: Send {
    async fn initialize(&mut self, options: &DetectorOptions) -> Result<()>;

    /// Number of points emitted per face.
    fn landmark_count(&self) -> usize;

    /// Landmarks of the primary face in `frame`, or `None` if no face.
    fn detect(&mut self, frame: &RgbaImage) -> Option<Vec<LandmarkPoint>>;
}

/// Replays the same landmark set for every frame.
#[derive(Debug, Clone)]
pub struct StaticLandmarkSource {
    points: Option<Vec<LandmarkPoint>>,
    landmark_count: usize,
    ready: bool,
}

impl StaticLandmarkSource {
    pub fn new(points: Option<Vec<LandmarkPoint>>, landmark_count: usize) -> Self {
        Self {
            points,
            landmark_count,
            ready: false,
        }
    }
}

#[async_trait]
impl LandmarkSource for StaticLandmarkSource {
    async fn initialize(&mut self, options: &DetectorOptions) -> Result<()> {
        if options.max_faces != 1 {
            return Err(MaskCamError::InvalidInput(
                "only a single tracked face is supported",
            ));
        }
        tracing::debug!(
            min_detection_confidence = options.min_detection_confidence,
            min_tracking_confidence = options.min_tracking_confidence,
            "static landmark source ready"
        );
        self.ready = true;
        Ok(())
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    fn detect(&mut self, _frame: &RgbaImage) -> Option<Vec<LandmarkPoint>> {
        if !self.ready {
            return None;
        }
        self.points.clone()
    }
}
