//! Display read-model for the station frontend.
//!
//! The controller publishes a [`DisplayState`] snapshot over a watch
//! channel after every detection tick; any frontend (the bundled terminal
//! loop, or a GUI) renders from the latest value. The raw video view is a
//! separate per-frame channel on the station handle.

use facegate_core::EmotionReading;

/// Width of the confidence bar at 100% confidence, in display units.
pub const BAR_FULL_WIDTH: u32 = 300;

/// Everything a frontend renders besides the raw video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    /// Most recent emotion readout; carried over from earlier ticks when
    /// the current tick classified nothing.
    pub emotion: Option<EmotionReading>,
    /// Whether the blink gate is currently unlocked.
    pub liveness_confirmed: bool,
    /// Faces found on the last detection tick.
    pub faces_in_view: usize,
}

/// Confidence-proportional bar width: 0–100% maps linearly to 0–300 units.
pub fn bar_width(reading: &EmotionReading) -> u32 {
    u32::from(reading.confidence) * BAR_FULL_WIDTH / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(confidence: u8) -> EmotionReading {
        EmotionReading {
            label: "Neutral",
            confidence,
        }
    }

    #[test]
    fn test_bar_width_endpoints() {
        assert_eq!(bar_width(&reading(0)), 0);
        assert_eq!(bar_width(&reading(100)), BAR_FULL_WIDTH);
    }

    #[test]
    fn test_bar_width_is_proportional() {
        assert_eq!(bar_width(&reading(50)), 150);
        assert_eq!(bar_width(&reading(33)), 99);
        assert_eq!(bar_width(&reading(1)), 3);
    }
}
