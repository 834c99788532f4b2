//! Deterministic in-process backends for development and tests.
//!
//! The rig stands in for the camera, landmark detector, face encoder, and
//! emotion classifier so the full station loop can run on a machine with no
//! capture hardware and no trained models. Behavior is scripted through a
//! shared control block: whether a face is visible, when the subject
//! blinks, which identity vector the encoder extracts, what distribution
//! the classifier emits, and whether it fails.
//!
//! All four backends share one `Rc<RefCell<RigState>>`; the station runs on
//! a single cooperative task, so the cell is never borrowed reentrantly.

use std::cell::RefCell;
use std::rc::Rc;

use image::{GrayImage, Rgb, RgbImage};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use facegate_core::{
    BackendError, EmotionClassifier, FaceBox, FaceEncoder, FaceEncoding, Frame, FrameSource,
    LandmarkDetector, Landmarks, Point, EMOTION_LABEL_COUNT, ENCODING_DIM,
};

use crate::controller::Backends;

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 240;

/// The one face the rig ever shows, centered in the frame.
const FACE_BOX: FaceBox = FaceBox {
    left: 100,
    top: 70,
    right: 220,
    bottom: 190,
};

/// Comparator threshold: Euclidean distance below this is a match.
const MATCH_DISTANCE: f32 = 0.6;

/// Seed for the frame noise; fixed so runs are reproducible.
const NOISE_SEED: u64 = 0x5EED_FACE;

#[derive(Debug)]
struct RigState {
    frames_available: bool,
    face_visible: bool,
    /// Consumed by the next landmark fit: that tick reports closed eyes.
    pending_blink: bool,
    /// When set, every n-th landmark fit reports closed eyes.
    auto_blink_every: Option<usize>,
    /// Identity vector the encoder extracts from every visible face.
    subject: Vec<f32>,
    /// Distribution the classifier emits.
    emotion: [f32; EMOTION_LABEL_COUNT],
    /// When set, the classifier fails with this message instead.
    classifier_error: Option<String>,
    frames_read: usize,
    detect_calls: usize,
    landmark_calls: usize,
}

/// Shared handle scripting and observing the rig.
#[derive(Clone)]
pub struct RigControl {
    state: Rc<RefCell<RigState>>,
}

impl RigControl {
    /// Make the frame source produce (or stop producing) frames.
    pub fn set_frames_available(&self, available: bool) {
        self.state.borrow_mut().frames_available = available;
    }

    /// Show or hide the subject's face.
    pub fn set_face_visible(&self, visible: bool) {
        self.state.borrow_mut().face_visible = visible;
    }

    /// Script exactly one blink: the next landmark fit reports closed eyes.
    pub fn blink_once(&self) {
        self.state.borrow_mut().pending_blink = true;
    }

    /// Blink on every n-th landmark fit (`None` disables).
    pub fn set_auto_blink(&self, every: Option<usize>) {
        self.state.borrow_mut().auto_blink_every = every;
    }

    /// Replace the identity vector the encoder extracts.
    pub fn set_subject(&self, values: Vec<f32>) {
        self.state.borrow_mut().subject = values;
    }

    /// Replace the classifier's output distribution.
    pub fn set_emotion(&self, distribution: [f32; EMOTION_LABEL_COUNT]) {
        self.state.borrow_mut().emotion = distribution;
    }

    /// Make the classifier fail with the given message until cleared.
    pub fn fail_classifier(&self, message: &str) {
        self.state.borrow_mut().classifier_error = Some(message.to_string());
    }

    pub fn clear_classifier_failure(&self) {
        self.state.borrow_mut().classifier_error = None;
    }

    pub fn frames_read(&self) -> usize {
        self.state.borrow().frames_read
    }

    pub fn detect_calls(&self) -> usize {
        self.state.borrow().detect_calls
    }
}

/// An encoding concentrated on one axis; distinct axes are far apart
/// (distance √2 for unit magnitudes), same-axis vectors are close.
pub fn axis_encoding(axis: usize, magnitude: f32) -> Vec<f32> {
    let mut values = vec![0.0; ENCODING_DIM];
    values[axis] = magnitude;
    values
}

/// Build a full backend set plus its control handle.
pub fn rig() -> (Backends, RigControl) {
    let state = Rc::new(RefCell::new(RigState {
        frames_available: true,
        face_visible: true,
        pending_blink: false,
        auto_blink_every: None,
        subject: axis_encoding(0, 1.0),
        emotion: [0.02, 0.02, 0.02, 0.05, 0.04, 0.05, 0.80],
        classifier_error: None,
        frames_read: 0,
        detect_calls: 0,
        landmark_calls: 0,
    }));

    let backends = Backends {
        frames: Box::new(SyntheticFrameSource::new(state.clone())),
        landmarks: Box::new(SyntheticLandmarkDetector {
            state: state.clone(),
        }),
        encoder: Box::new(SyntheticFaceEncoder {
            state: state.clone(),
        }),
        classifier: Box::new(SyntheticEmotionClassifier {
            state: state.clone(),
        }),
    };
    (backends, RigControl { state })
}

struct SyntheticFrameSource {
    state: Rc<RefCell<RigState>>,
    base: Frame,
}

impl SyntheticFrameSource {
    fn new(state: Rc<RefCell<RigState>>) -> Self {
        // One seeded sensor-noise frame, cloned per read
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        let base = RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |_, _| {
            Rgb([rng.gen(), rng.gen(), rng.gen()])
        });
        Self { state, base }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn read(&mut self) -> Option<Frame> {
        let mut st = self.state.borrow_mut();
        if !st.frames_available {
            return None;
        }
        st.frames_read += 1;
        Some(self.base.clone())
    }
}

struct SyntheticLandmarkDetector {
    state: Rc<RefCell<RigState>>,
}

impl LandmarkDetector for SyntheticLandmarkDetector {
    fn detect_faces(&mut self, _gray: &GrayImage) -> Vec<FaceBox> {
        let mut st = self.state.borrow_mut();
        st.detect_calls += 1;
        if st.face_visible {
            vec![FACE_BOX]
        } else {
            Vec::new()
        }
    }

    fn landmarks(&mut self, _gray: &GrayImage, _face: &FaceBox) -> Landmarks {
        let mut st = self.state.borrow_mut();
        st.landmark_calls += 1;
        let closed = st.pending_blink
            || st
                .auto_blink_every
                .is_some_and(|n| n > 0 && st.landmark_calls % n == 0);
        st.pending_blink = false;
        synthetic_landmarks(closed)
    }
}

/// A landmark set with eyes open (EAR 0.5) or closed (EAR 0.0); all other
/// points sit at the face center and play no role.
fn synthetic_landmarks(eyes_closed: bool) -> Landmarks {
    let center = Point::new(
        (FACE_BOX.left + FACE_BOX.right) / 2,
        (FACE_BOX.top + FACE_BOX.bottom) / 2,
    );
    let mut points = [center; 68];
    write_eye(&mut points, 36, Point::new(130, 110), eyes_closed);
    write_eye(&mut points, 42, Point::new(170, 110), eyes_closed);
    Landmarks::new(points)
}

fn write_eye(points: &mut [Point; 68], start: usize, corner: Point, closed: bool) {
    let lid = if closed { 0 } else { 2 };
    points[start] = corner;
    points[start + 1] = Point::new(corner.x + 2, corner.y - lid);
    points[start + 2] = Point::new(corner.x + 6, corner.y - lid);
    points[start + 3] = Point::new(corner.x + 8, corner.y);
    points[start + 4] = Point::new(corner.x + 6, corner.y + lid);
    points[start + 5] = Point::new(corner.x + 2, corner.y + lid);
}

struct SyntheticFaceEncoder {
    state: Rc<RefCell<RigState>>,
}

impl FaceEncoder for SyntheticFaceEncoder {
    fn locate(&mut self, _rgb: &Frame) -> Vec<FaceBox> {
        if self.state.borrow().face_visible {
            vec![FACE_BOX]
        } else {
            Vec::new()
        }
    }

    fn encode(&mut self, _rgb: &Frame, faces: &[FaceBox]) -> Vec<FaceEncoding> {
        let st = self.state.borrow();
        faces
            .iter()
            .map(|_| FaceEncoding::new(st.subject.clone()))
            .collect()
    }

    fn compare(&self, gallery: &[FaceEncoding], probe: &FaceEncoding) -> Vec<bool> {
        gallery
            .iter()
            .map(|candidate| euclidean(candidate.values(), probe.values()) < MATCH_DISTANCE)
            .collect()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

struct SyntheticEmotionClassifier {
    state: Rc<RefCell<RigState>>,
}

impl EmotionClassifier for SyntheticEmotionClassifier {
    fn predict(
        &mut self,
        _input: &Array2<f32>,
    ) -> Result<[f32; EMOTION_LABEL_COUNT], BackendError> {
        let st = self.state.borrow();
        if let Some(message) = &st.classifier_error {
            return Err(BackendError::Classifier(message.clone()));
        }
        Ok(st.emotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::EAR_BLINK_THRESHOLD;

    #[test]
    fn test_open_eyes_are_above_threshold() {
        let lm = synthetic_landmarks(false);
        assert!(lm.average_ear() > EAR_BLINK_THRESHOLD);
    }

    #[test]
    fn test_closed_eyes_are_below_threshold() {
        let lm = synthetic_landmarks(true);
        assert!(lm.average_ear() < EAR_BLINK_THRESHOLD);
        assert_eq!(lm.average_ear(), 0.0);
    }

    #[test]
    fn test_blink_once_is_consumed() {
        let (mut backends, control) = rig();
        let gray = GrayImage::new(FRAME_WIDTH, FRAME_HEIGHT);

        control.blink_once();
        let faces = backends.landmarks.detect_faces(&gray);
        let closed = backends.landmarks.landmarks(&gray, &faces[0]);
        assert!(closed.average_ear() < EAR_BLINK_THRESHOLD);

        // Consumed: the next fit is open-eyed again
        let open = backends.landmarks.landmarks(&gray, &faces[0]);
        assert!(open.average_ear() > EAR_BLINK_THRESHOLD);
    }

    #[test]
    fn test_axis_encodings_compare_as_expected() {
        let (backends, _control) = rig();
        let near = FaceEncoding::new(axis_encoding(0, 1.05));
        let far = FaceEncoding::new(axis_encoding(1, 1.0));
        let gallery = [FaceEncoding::new(axis_encoding(0, 1.0))];

        assert_eq!(backends.encoder.compare(&gallery, &near), vec![true]);
        assert_eq!(backends.encoder.compare(&gallery, &far), vec![false]);
    }

    #[test]
    fn test_hidden_face_yields_no_encodings() {
        let (mut backends, control) = rig();
        control.set_face_visible(false);
        let frame = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
        let faces = backends.encoder.locate(&frame);
        assert!(faces.is_empty());
        assert!(backends.encoder.encode(&frame, &faces).is_empty());
    }
}
