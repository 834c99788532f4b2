//! Capability seams for the external collaborators.
//!
//! The camera, landmark detector, face encoder, and emotion classifier are
//! hardware- or model-backed components that live outside this crate. Each
//! is abstracted as a small trait so the session controller can be driven
//! by real backends in production and by deterministic doubles in tests.
//! None of the traits require `Send`: the whole station runs on one
//! cooperative task.

use image::{GrayImage, RgbImage};
use ndarray::Array2;
use thiserror::Error;

use crate::emotion::EMOTION_LABEL_COUNT;
use crate::geometry::Landmarks;

/// Fixed dimension of a face encoding vector.
pub const ENCODING_DIM: usize = 128;

/// A captured video frame.
pub type Frame = RgbImage;

/// Failure reported by a model-backed collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("classifier failure: {0}")]
    Classifier(String),
}

/// Axis-aligned face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl FaceBox {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// Fixed-length identity signature produced by the face encoder.
///
/// Owned by the gallery once enrolled; ephemeral when used as a login
/// probe. Dimension and finiteness are validated at the persistence
/// boundary; in-process the encoder contract is trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding {
    values: Vec<f32>,
}

impl FaceEncoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// One enrolled identity: a name and its encoding. The gallery is an
/// ordered sequence of these; the first matching entry wins ties.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub encoding: FaceEncoding,
}

/// Video frame acquisition device.
pub trait FrameSource {
    /// Grab the next frame. `None` means the device produced nothing this
    /// tick; the caller skips the tick without retry or backoff.
    fn read(&mut self) -> Option<Frame>;
}

/// 68-point facial landmark detector.
pub trait LandmarkDetector {
    /// Detect face bounding boxes in a grayscale frame.
    fn detect_faces(&mut self, gray: &GrayImage) -> Vec<FaceBox>;

    /// Fit the 68-point landmark set for one detected face.
    fn landmarks(&mut self, gray: &GrayImage, face: &FaceBox) -> Landmarks;
}

/// Face encoding extractor and comparator.
pub trait FaceEncoder {
    /// Locate faces in an RGB frame.
    fn locate(&mut self, rgb: &Frame) -> Vec<FaceBox>;

    /// Extract one encoding per located face, in detector order.
    fn encode(&mut self, rgb: &Frame, faces: &[FaceBox]) -> Vec<FaceEncoding>;

    /// One is-match verdict per gallery encoding, decided at the
    /// comparator's own fixed similarity threshold.
    fn compare(&self, gallery: &[FaceEncoding], probe: &FaceEncoding) -> Vec<bool>;
}

/// Emotion classifier over a normalized 48×48 grayscale tensor.
pub trait EmotionClassifier {
    /// Probability distribution over the fixed label set.
    fn predict(&mut self, input: &Array2<f32>) -> Result<[f32; EMOTION_LABEL_COUNT], BackendError>;
}
