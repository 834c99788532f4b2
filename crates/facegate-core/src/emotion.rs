//! Emotion reporting for the display surface.
//!
//! Purely cosmetic: the label and confidence feed the station display and
//! never influence liveness or matching. Each report is a pure function of
//! the face crop — grayscale, a 48×48 resize, unit-interval normalization,
//! then the classifier's distribution reduced to an argmax label and a
//! rounded percentage.

use image::{imageops, RgbImage};
use ndarray::Array2;
use thiserror::Error;

use crate::backend::{BackendError, EmotionClassifier};

/// The classifier's fixed label set, in output-distribution order.
pub const EMOTION_LABELS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Happy", "Sad", "Surprise", "Neutral",
];

/// Number of classes in the classifier distribution.
pub const EMOTION_LABEL_COUNT: usize = EMOTION_LABELS.len();

/// Side length of the classifier input tensor.
pub const EMOTION_INPUT_SIZE: u32 = 48;

#[derive(Debug, Error)]
pub enum EmotionError {
    #[error("face crop has zero area")]
    EmptyCrop,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One emotion readout for the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmotionReading {
    pub label: &'static str,
    /// Rounded percentage of the winning class, 0–100.
    pub confidence: u8,
}

/// Convert a face crop into the classifier input tensor: grayscale, resized
/// to 48×48, pixel values scaled to the unit interval.
pub fn preprocess(crop: &RgbImage) -> Result<Array2<f32>, EmotionError> {
    if crop.width() == 0 || crop.height() == 0 {
        return Err(EmotionError::EmptyCrop);
    }

    let gray = imageops::grayscale(crop);
    let resized = imageops::resize(
        &gray,
        EMOTION_INPUT_SIZE,
        EMOTION_INPUT_SIZE,
        imageops::FilterType::Triangle,
    );

    let size = EMOTION_INPUT_SIZE as usize;
    let mut tensor = Array2::zeros((size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[y as usize, x as usize]] = f32::from(pixel.0[0]) / 255.0;
    }
    Ok(tensor)
}

/// Classify a face crop: label is the argmax class, confidence the rounded
/// percentage of its probability.
pub fn report(
    classifier: &mut dyn EmotionClassifier,
    crop: &RgbImage,
) -> Result<EmotionReading, EmotionError> {
    let input = preprocess(crop)?;
    let distribution = classifier.predict(&input)?;

    // First maximum wins, matching the classifier's argmax convention
    let mut best = 0;
    for i in 1..distribution.len() {
        if distribution[i] > distribution[best] {
            best = i;
        }
    }

    Ok(EmotionReading {
        label: EMOTION_LABELS[best],
        confidence: (distribution[best] * 100.0).round() as u8,
    })
}
