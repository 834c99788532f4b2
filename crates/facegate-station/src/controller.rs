//! The session controller: a single cooperative task driving the station's
//! periodic activities.
//!
//! Three timers share one `select!` loop — the frame grab (~10 ms), the
//! detection + emotion sampling tick (~500 ms), and the login poll
//! (~500 ms, armed only while a login attempt is pending). No arm ever
//! runs concurrently with another, so the current-frame slot, the blink
//! gate, and the gallery are plain fields with no locking.
//!
//! The detection tick never performs identity matching. A login attempt is
//! armed by an explicit start request and sits behind the blink gate: the
//! poll requeues itself via its interval until the gate confirms, so a
//! waiting attempt never starves the frame or detection ticks. One blink
//! unlocks exactly one attempt — the gate re-arms after every completed
//! attempt, whatever its outcome.

use image::imageops;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use facegate_core::{
    emotion, match_probe, EmotionClassifier, FaceBox, FaceEncoder, Frame, FrameSource,
    LandmarkDetector, LivenessGate,
};

use crate::config::Config;
use crate::display::DisplayState;
use crate::store::{GalleryStore, LoginLog, StoreError};

#[derive(Error, Debug)]
pub enum StationError {
    #[error("no face detected in the current frame")]
    NoFaceDetected,
    #[error("a login attempt is already in progress")]
    AttemptInProgress,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("login log write failed: {0}")]
    LoginLog(#[source] std::io::Error),
    #[error("controller task exited")]
    ChannelClosed,
}

/// Outcome of a completed login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The probe matched an enrolled identity; a login record was appended.
    Granted { name: String },
    /// The probe matched nothing in the gallery — a normal negative
    /// outcome, not an error.
    NotRecognized,
}

impl LoginOutcome {
    /// The user-facing message for this outcome.
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Granted { name } => format!("Welcome, {name}!"),
            LoginOutcome::NotRecognized => "Face not recognized.".to_string(),
        }
    }
}

/// Controller state snapshot for the status command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusReport {
    pub enrolled: usize,
    pub liveness_confirmed: bool,
    pub attempt_pending: bool,
}

/// External collaborators the controller drives.
pub struct Backends {
    pub frames: Box<dyn FrameSource>,
    pub landmarks: Box<dyn LandmarkDetector>,
    pub encoder: Box<dyn FaceEncoder>,
    pub classifier: Box<dyn EmotionClassifier>,
}

enum StationRequest {
    Enroll {
        name: String,
        reply: oneshot::Sender<Result<(), StationError>>,
    },
    StartLogin {
        reply: oneshot::Sender<Result<LoginOutcome, StationError>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Clone-safe handle to a running session controller.
#[derive(Clone)]
pub struct StationHandle {
    tx: mpsc::Sender<StationRequest>,
    display: watch::Receiver<DisplayState>,
    video: watch::Receiver<Option<Frame>>,
}

impl StationHandle {
    /// Enroll the subject in the current frame under the given name.
    pub async fn enroll(&self, name: &str) -> Result<(), StationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StationRequest::Enroll {
                name: name.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StationError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StationError::ChannelClosed)?
    }

    /// Run one liveness-gated recognition attempt.
    ///
    /// Resolves only when the attempt completes; while no blink has been
    /// observed it stays pending indefinitely. The frame and detection
    /// ticks keep running the whole time.
    pub async fn start_login(&self) -> Result<LoginOutcome, StationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StationRequest::StartLogin { reply: reply_tx })
            .await
            .map_err(|_| StationError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StationError::ChannelClosed)?
    }

    /// Snapshot of controller state.
    pub async fn status(&self) -> Result<StatusReport, StationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StationRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| StationError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StationError::ChannelClosed)
    }

    /// Subscribe to display updates (emotion readout, liveness, face count).
    pub fn subscribe_display(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    /// Subscribe to the live video view (one frame per frame tick).
    pub fn subscribe_video(&self) -> watch::Receiver<Option<Frame>> {
        self.video.clone()
    }
}

struct SessionController {
    config: Config,
    backends: Backends,
    store: GalleryStore,
    login_log: LoginLog,
    liveness: LivenessGate,
    current_frame: Option<Frame>,
    pending_login: Option<oneshot::Sender<Result<LoginOutcome, StationError>>>,
    display: watch::Sender<DisplayState>,
    video: watch::Sender<Option<Frame>>,
}

/// Spawn the session controller on the current `LocalSet` and return its
/// handle. The controller exits when every handle clone is dropped.
pub fn spawn(config: Config, backends: Backends, store: GalleryStore) -> StationHandle {
    let (tx, rx) = mpsc::channel(4);
    let (display_tx, display_rx) = watch::channel(DisplayState::default());
    let (video_tx, video_rx) = watch::channel(None);
    let login_log = LoginLog::new(&config.data_dir);

    let controller = SessionController {
        config,
        backends,
        store,
        login_log,
        liveness: LivenessGate::new(),
        current_frame: None,
        pending_login: None,
        display: display_tx,
        video: video_tx,
    };
    tokio::task::spawn_local(controller.run(rx));

    StationHandle {
        tx,
        display: display_rx,
        video: video_rx,
    }
}

impl SessionController {
    async fn run(mut self, mut requests: mpsc::Receiver<StationRequest>) {
        let mut frame_tick = tokio::time::interval(self.config.frame_interval);
        let mut detect_tick = tokio::time::interval(self.config.detect_interval);
        let mut login_tick = tokio::time::interval(self.config.poll_interval);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        detect_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        login_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(enrolled = self.store.len(), "session controller started");

        loop {
            tokio::select! {
                _ = frame_tick.tick() => self.refresh_frame(),
                _ = detect_tick.tick() => self.detect_and_report(),
                _ = login_tick.tick(), if self.pending_login.is_some() => self.poll_login(),
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        tracing::info!("session controller stopped");
    }

    /// Frame tick: refresh the current-frame slot. A failed read is a
    /// skipped tick; the device owes no retry.
    fn refresh_frame(&mut self) {
        let Some(frame) = self.backends.frames.read() else {
            return;
        };
        if self.video.receiver_count() > 0 {
            self.video.send_replace(Some(frame.clone()));
        }
        self.current_frame = Some(frame);
    }

    /// Detection tick: per detected face, feed the blink gate and refresh
    /// the emotion readout. Never performs identity matching.
    fn detect_and_report(&mut self) {
        let Some(frame) = self.current_frame.as_ref() else {
            return;
        };

        let gray = imageops::grayscale(frame);
        let faces = self.backends.landmarks.detect_faces(&gray);

        let mut emotion = None;
        for face in &faces {
            let landmarks = self.backends.landmarks.landmarks(&gray, face);
            self.liveness.observe(landmarks.average_ear());

            let crop = crop_face(frame, face);
            match emotion::report(self.backends.classifier.as_mut(), &crop) {
                Ok(reading) => emotion = Some(reading),
                Err(error) => {
                    // A reporting failure never stops the sampling loop
                    tracing::warn!(%error, "emotion report failed");
                }
            }
        }

        let last_emotion = self.display.borrow().emotion;
        self.display.send_replace(DisplayState {
            emotion: emotion.or(last_emotion),
            liveness_confirmed: self.liveness.is_confirmed(),
            faces_in_view: faces.len(),
        });
    }

    /// Login poll tick: runs only while an attempt is pending. Requeues
    /// (by doing nothing) until the blink gate confirms, then performs one
    /// identity-match attempt and re-arms the gate.
    fn poll_login(&mut self) {
        if !self.liveness.is_confirmed() {
            return;
        }

        let result = self.attempt_recognition();
        if let Some(reply) = self.pending_login.take() {
            let _ = reply.send(result);
        }
        // One blink unlocks exactly one attempt
        self.liveness.reset();
    }

    fn handle_request(&mut self, request: StationRequest) {
        match request {
            StationRequest::Enroll { name, reply } => {
                let result = self.enroll(&name);
                let _ = reply.send(result);
            }
            StationRequest::StartLogin { reply } => {
                if self.pending_login.is_some() {
                    let _ = reply.send(Err(StationError::AttemptInProgress));
                } else {
                    tracing::info!("login attempt armed, waiting for blink");
                    self.pending_login = Some(reply);
                }
            }
            StationRequest::Status { reply } => {
                let _ = reply.send(StatusReport {
                    enrolled: self.store.len(),
                    liveness_confirmed: self.liveness.is_confirmed(),
                    attempt_pending: self.pending_login.is_some(),
                });
            }
        }
    }

    /// Enroll from the current frame at full resolution.
    fn enroll(&mut self, name: &str) -> Result<(), StationError> {
        let Some(frame) = self.current_frame.as_ref() else {
            return Err(StationError::NoFaceDetected);
        };

        let faces = self.backends.encoder.locate(frame);
        let mut encodings = self.backends.encoder.encode(frame, &faces);
        if encodings.is_empty() {
            tracing::warn!(name, "enroll: no face in frame");
            return Err(StationError::NoFaceDetected);
        }

        // Single-subject station: the first detected face wins
        let encoding = encodings.swap_remove(0);
        self.store.enroll(name, encoding)?;
        Ok(())
    }

    /// One identity-match attempt against the current frame. Only called
    /// once the blink gate has confirmed.
    fn attempt_recognition(&mut self) -> Result<LoginOutcome, StationError> {
        let Some(frame) = self.current_frame.as_ref() else {
            return Err(StationError::NoFaceDetected);
        };

        // Probe at reduced resolution; purely a performance knob
        let probe_frame = downscale(frame, self.config.probe_scale);
        let faces = self.backends.encoder.locate(&probe_frame);
        let encodings = self.backends.encoder.encode(&probe_frame, &faces);
        let Some(probe) = encodings.first() else {
            tracing::warn!("login: no face in probe frame");
            return Err(StationError::NoFaceDetected);
        };

        match match_probe(self.backends.encoder.as_ref(), self.store.entries(), probe) {
            Some(name) => {
                let name = name.to_string();
                self.login_log
                    .append(&name)
                    .map_err(StationError::LoginLog)?;
                tracing::info!(name, "login granted");
                Ok(LoginOutcome::Granted { name })
            }
            None => {
                tracing::info!("login: face not recognized");
                Ok(LoginOutcome::NotRecognized)
            }
        }
    }
}

/// Crop the face box out of the frame, clamped to the frame bounds.
fn crop_face(frame: &Frame, face: &FaceBox) -> Frame {
    let left = face.left.max(0) as u32;
    let top = face.top.max(0) as u32;
    let right = (face.right.max(0) as u32).min(frame.width());
    let bottom = (face.bottom.max(0) as u32).min(frame.height());
    let width = right.saturating_sub(left);
    let height = bottom.saturating_sub(top);
    imageops::crop_imm(frame, left, top, width, height).to_image()
}

fn downscale(frame: &Frame, scale: f32) -> Frame {
    let width = ((frame.width() as f32 * scale).round() as u32).max(1);
    let height = ((frame.height() as f32 * scale).round() as u32).max(1);
    imageops::resize(frame, width, height, imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::from_pixel(width, height, Rgb([10, 20, 30]))
    }

    #[test]
    fn test_crop_face_clamps_to_bounds() {
        let f = frame(100, 80);
        let face = FaceBox {
            left: -10,
            top: -5,
            right: 150,
            bottom: 200,
        };
        let crop = crop_face(&f, &face);
        assert_eq!((crop.width(), crop.height()), (100, 80));
    }

    #[test]
    fn test_crop_face_interior_box() {
        let f = frame(100, 80);
        let face = FaceBox {
            left: 20,
            top: 10,
            right: 60,
            bottom: 50,
        };
        let crop = crop_face(&f, &face);
        assert_eq!((crop.width(), crop.height()), (40, 40));
    }

    #[test]
    fn test_crop_face_degenerate_box_is_empty() {
        let f = frame(100, 80);
        let face = FaceBox {
            left: 50,
            top: 40,
            right: 50,
            bottom: 40,
        };
        let crop = crop_face(&f, &face);
        assert_eq!((crop.width(), crop.height()), (0, 0));
    }

    #[test]
    fn test_downscale_quarter() {
        let f = frame(320, 240);
        let small = downscale(&f, 0.25);
        assert_eq!((small.width(), small.height()), (80, 60));
    }

    #[test]
    fn test_downscale_never_hits_zero() {
        let f = frame(2, 2);
        let small = downscale(&f, 0.25);
        assert!(small.width() >= 1 && small.height() >= 1);
    }

    #[test]
    fn test_outcome_messages() {
        let granted = LoginOutcome::Granted {
            name: "Alice".to_string(),
        };
        assert_eq!(granted.message(), "Welcome, Alice!");
        assert_eq!(LoginOutcome::NotRecognized.message(), "Face not recognized.");
    }
}
