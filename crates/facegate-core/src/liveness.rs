//! Blink-based liveness gating.
//!
//! A static photograph held in front of the camera never blinks: its eye
//! aspect ratio stays in the open-eye band indefinitely. A live subject
//! blinks involuntarily every few seconds, driving the averaged EAR below
//! the closed-eye threshold for at least one sampling tick.
//!
//! The gate is a one-shot latch, not a continuously monitored state: it
//! confirms on the first sub-threshold observation and stays confirmed
//! until the session controller completes a login attempt and re-arms it.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs and other static images.
//! - **Does not block:** Video replay attacks (recorded subjects blink),
//!   or 3D masks with articulated eyelids.

/// Averaged EAR below this value is treated as closed eyes (a blink).
pub const EAR_BLINK_THRESHOLD: f32 = 0.22;

/// State of the blink gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessState {
    /// No blink observed since the gate was (re-)armed.
    #[default]
    AwaitingBlink,
    /// A blink was observed; identity matching is unlocked.
    BlinkConfirmed,
}

/// One-shot blink latch.
///
/// Fed one averaged EAR per face per sampling tick via [`observe`]. Ticks
/// where no face is present must not call `observe`, so the state is
/// unchanged on such ticks by construction.
///
/// [`observe`]: LivenessGate::observe
#[derive(Debug, Clone, Default)]
pub struct LivenessGate {
    state: LivenessState,
}

impl LivenessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one averaged EAR observation. Latches on the first value below
    /// [`EAR_BLINK_THRESHOLD`]; once confirmed, further observations are
    /// no-ops regardless of their value.
    pub fn observe(&mut self, avg_ear: f32) {
        if self.state == LivenessState::AwaitingBlink && avg_ear < EAR_BLINK_THRESHOLD {
            self.state = LivenessState::BlinkConfirmed;
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Whether a blink has been observed since the last re-arm.
    pub fn is_confirmed(&self) -> bool {
        self.state == LivenessState::BlinkConfirmed
    }

    /// Re-arm the gate. The controller calls this after every completed
    /// login attempt so one blink never unlocks more than one attempt.
    pub fn reset(&mut self) {
        self.state = LivenessState::AwaitingBlink;
    }
}
