//! Eye geometry over facial landmark points.
//!
//! The landmark detector produces 68 ordered 2-D points per face (iBUG
//! convention). Indices 36–41 and 42–47 form the left and right eye rings:
//! two horizontal corners and two pairs of lid points, in a fixed
//! anatomical order. The eye aspect ratio collapses a ring into a single
//! openness measure used as the blink proxy by [`crate::liveness`].

/// A 2-D landmark point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Six ordered eye landmarks: indices 0 and 3 are the horizontal corners,
/// 1/2 the upper lid, 4/5 the lower lid. The ordering is anatomically
/// fixed; [`eye_aspect_ratio`] is only meaningful under it. The arity is
/// enforced by the type, never checked at runtime.
pub type EyeShape = [Point; 6];

/// Number of points in a full landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Index range of the left eye ring within a 68-point landmark set.
pub const LEFT_EYE_RANGE: std::ops::Range<usize> = 36..42;
/// Index range of the right eye ring within a 68-point landmark set.
pub const RIGHT_EYE_RANGE: std::ops::Range<usize> = 42..48;

/// Eye aspect ratio: `(‖p1−p5‖ + ‖p2−p4‖) / (2·‖p0−p3‖)`.
///
/// Sits around 0.3 for an open eye and drops toward zero as the lids
/// close; exactly zero when all four lid points lie on the corner-to-corner
/// line. Pure, no side effects. A degenerate shape with coincident corners
/// divides by zero and yields a non-finite value; detector output always
/// has distinct corners.
pub fn eye_aspect_ratio(eye: &EyeShape) -> f32 {
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);
    (vertical_a + vertical_b) / (2.0 * horizontal)
}

/// A full 68-point landmark set for one detected face.
///
/// Produced once per sampling tick per face and consumed immediately; not
/// retained across ticks.
#[derive(Debug, Clone)]
pub struct Landmarks {
    points: [Point; LANDMARK_COUNT],
}

impl Landmarks {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point; LANDMARK_COUNT] {
        &self.points
    }

    fn eye_at(&self, start: usize) -> EyeShape {
        std::array::from_fn(|i| self.points[start + i])
    }

    /// Left eye ring (indices 36–41).
    pub fn left_eye(&self) -> EyeShape {
        self.eye_at(LEFT_EYE_RANGE.start)
    }

    /// Right eye ring (indices 42–47).
    pub fn right_eye(&self) -> EyeShape {
        self.eye_at(RIGHT_EYE_RANGE.start)
    }

    /// Per-face EAR: the two eyes' ratios averaged into one value.
    pub fn average_ear(&self) -> f32 {
        let left = eye_aspect_ratio(&self.left_eye());
        let right = eye_aspect_ratio(&self.right_eye());
        (left + right) / 2.0
    }
}
