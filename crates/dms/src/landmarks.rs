//! Facial landmarks and eye aspect ratio

use serde::{Deserialize, Serialize};

/// Face-mesh indices of the left eye, ordered p1..p6
pub const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Face-mesh indices of the right eye, ordered p1..p6
pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Horizontal spans shorter than this are treated as degenerate
const MIN_EYE_WIDTH: f32 = 1e-6;

/// Landmark in normalized image coordinates (0..1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One detected face in face-mesh topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub points: Vec<Landmark>,
    /// Face presence probability reported by the detector
    pub presence: f32,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>, presence: f32) -> Self {
        Self { points, presence }
    }

    fn eye(&self, indices: &[usize; 6]) -> Option<[Landmark; 6]> {
        let mut eye = [Landmark::default(); 6];
        for (slot, &idx) in eye.iter_mut().zip(indices) {
            *slot = *self.points.get(idx)?;
        }
        Some(eye)
    }

    pub fn left_ear(&self) -> Option<f32> {
        self.eye(&LEFT_EYE).and_then(|eye| eye_aspect_ratio(&eye))
    }

    pub fn right_ear(&self) -> Option<f32> {
        self.eye(&RIGHT_EYE).and_then(|eye| eye_aspect_ratio(&eye))
    }

    /// Mean EAR of both eyes, `None` if either eye is unusable
    pub fn average_ear(&self) -> Option<f32> {
        Some((self.left_ear()? + self.right_ear()?) / 2.0)
    }

    /// Points of both eyes, for overlays
    pub fn eye_points(&self) -> impl Iterator<Item = &Landmark> {
        LEFT_EYE
            .iter()
            .chain(RIGHT_EYE.iter())
            .filter_map(|&idx| self.points.get(idx))
    }
}

/// EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)
pub fn eye_aspect_ratio(eye: &[Landmark; 6]) -> Option<f32> {
    let horizontal = eye[0].distance(&eye[3]);
    if !horizontal.is_finite() || horizontal < MIN_EYE_WIDTH {
        return None;
    }
    let vertical1 = eye[1].distance(&eye[5]);
    let vertical2 = eye[2].distance(&eye[4]);
    let ear = (vertical1 + vertical2) / (2.0 * horizontal);
    ear.is_finite().then_some(ear)
}
