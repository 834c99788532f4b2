//! Facegate core pipeline: eye geometry, blink liveness, identity matching,
//! and emotion reporting.
//!
//! This crate is pure logic over in-memory types. Frame acquisition,
//! landmark fitting, face encoding, and emotion classification are external
//! collaborators abstracted behind the traits in [`backend`]; persistence
//! and scheduling live in the station crate.

pub mod backend;
pub mod emotion;
pub mod geometry;
pub mod liveness;
pub mod matcher;

pub use backend::{
    BackendError, EmotionClassifier, FaceBox, FaceEncoder, FaceEncoding, Frame, FrameSource,
    GalleryEntry, LandmarkDetector, ENCODING_DIM,
};
pub use emotion::{EmotionError, EmotionReading, EMOTION_LABELS, EMOTION_LABEL_COUNT};
pub use geometry::{eye_aspect_ratio, EyeShape, Landmarks, Point};
pub use liveness::{LivenessGate, LivenessState, EAR_BLINK_THRESHOLD};
pub use matcher::match_probe;
