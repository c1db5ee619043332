//! Coaching engine - per-frame orchestration
//!
//! Pulls joints for each frame, measures the angles the active exercise
//! needs, classifies form, advances the rep counter and forwards feedback.
//! Consumers implement `FeedbackSink` to receive engine events; camera, pose
//! estimation and frame display are plain traits so any backend can drive it.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::CoachConfig;
use crate::debounce::NotificationDebouncer;
use crate::exercise::{AngleReadings, ExerciseType, Stage};
use crate::feedback::{classify, FeedbackVerdict};
use crate::joints::JointSet;
use crate::session::{SessionState, SessionSummary, StopReason};
use crate::speech::SpeechDispatcher;

/// Warning surfaced when the camera stops supplying frames
pub const CAMERA_FAILURE_MESSAGE: &str = "Camera not detected.";

// ============================================
// Collaborators
// ============================================

/// Camera or any other frame supplier. Blocks until a frame is available.
pub trait FrameSource {
    type Frame;

    fn read_frame(&mut self) -> Result<Self::Frame, CameraError>;
}

/// Pose estimation: `None` means no body is visible in the frame
pub trait PoseEstimator<F> {
    fn detect(&mut self, frame: &F) -> Option<JointSet>;
}

/// Display of the (annotated) camera frame
pub trait FrameRenderer<F> {
    fn show_frame(&mut self, frame: &F, joints: Option<&JointSet>);
}

/// Renderer that discards frames
pub struct NoopFrameRenderer;

impl<F> FrameRenderer<F> for NoopFrameRenderer {
    fn show_frame(&mut self, _frame: &F, _joints: Option<&JointSet>) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera stream ended")]
    EndOfStream,
    #[error("Camera read failed: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("No session is running")]
    NotRunning,
}

// ============================================
// Events
// ============================================

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoachEvent {
    SessionStarted {
        exercise: ExerciseType,
    },
    /// Sent every frame, whether or not the message is spoken
    Feedback {
        rep_count: u32,
        verdict: FeedbackVerdict,
        stage: Option<Stage>,
    },
    RepCompleted {
        rep_count: u32,
    },
    Warning {
        message: String,
    },
    SessionStopped {
        summary: SessionSummary,
    },
}

impl CoachEvent {
    pub fn to_json(&self) -> Value {
        match self {
            CoachEvent::SessionStarted { exercise } => json!({
                "event": "session_started",
                "exercise": exercise.as_str(),
            }),
            CoachEvent::Feedback {
                rep_count,
                verdict,
                stage,
            } => json!({
                "event": "feedback",
                "repCount": rep_count,
                "message": verdict.message,
                "severity": verdict.severity.as_str(),
                "color": verdict.severity.color(),
                "shouldNotify": verdict.should_notify,
                "stage": stage.map(Stage::as_str),
            }),
            CoachEvent::RepCompleted { rep_count } => json!({
                "event": "rep_completed",
                "repCount": rep_count,
            }),
            CoachEvent::Warning { message } => json!({
                "event": "warning",
                "message": message,
            }),
            CoachEvent::SessionStopped { summary } => json!({
                "event": "session_stopped",
                "summary": summary,
            }),
        }
    }
}

/// Trait for receiving engine events (the on-screen feedback channel)
pub trait FeedbackSink: Send + Sync {
    fn on_event(&self, event: CoachEvent);
}

/// No-op event sink (silent operation)
pub struct NoopFeedbackSink;
impl FeedbackSink for NoopFeedbackSink {
    fn on_event(&self, _event: CoachEvent) {}
}

/// Logging event sink
pub struct LogFeedbackSink;
impl FeedbackSink for LogFeedbackSink {
    fn on_event(&self, event: CoachEvent) {
        match &event {
            CoachEvent::SessionStarted { exercise } => {
                log::info!("[Engine] Session started: {}", exercise)
            }
            CoachEvent::Feedback {
                rep_count,
                verdict,
                stage,
            } => log::debug!(
                "[Engine] reps={} stage={:?} {:?}: {}",
                rep_count,
                stage,
                verdict.severity,
                verdict.message
            ),
            CoachEvent::RepCompleted { rep_count } => log::info!("[Engine] Rep {}", rep_count),
            CoachEvent::Warning { message } => log::warn!("[Engine] {}", message),
            CoachEvent::SessionStopped { summary } => log::info!(
                "[Engine] Session stopped ({:?}): {} reps of {}",
                summary.reason,
                summary.rep_count,
                summary.exercise
            ),
        }
    }
}

/// Sink that buffers events until drained
#[derive(Default)]
pub struct CollectingFeedbackSink {
    events: Mutex<Vec<CoachEvent>>,
}

impl CollectingFeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<CoachEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl FeedbackSink for CollectingFeedbackSink {
    fn on_event(&self, event: CoachEvent) {
        self.events.lock().push(event);
    }
}

// ============================================
// Engine
// ============================================

/// Shared flag that lets any thread stop the running session.
/// The loop notices it before reading the next frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    fn running() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub verdict: FeedbackVerdict,
    pub rep_count: u32,
    pub stage: Option<Stage>,
    /// `None` when no body was detected
    pub readings: Option<AngleReadings>,
    pub rep_completed: bool,
    /// The message was handed to the speech backend
    pub spoken: bool,
}

pub struct Engine {
    config: CoachConfig,
    debouncer: NotificationDebouncer,
    feedback: Arc<dyn FeedbackSink>,
    speech: SpeechDispatcher,
    session: Option<SessionState>,
    stop_handle: StopHandle,
}

impl Engine {
    pub fn new(
        config: CoachConfig,
        feedback: Arc<dyn FeedbackSink>,
        speech: SpeechDispatcher,
    ) -> Self {
        Self {
            debouncer: config.debouncer(),
            speech: voice_for(&config, speech),
            config,
            feedback,
            session: None,
            stop_handle: StopHandle::default(),
        }
    }

    /// Swap settings and speech backend. A running session keeps its
    /// counters; the new interval and voice setting apply from the next frame.
    pub fn reconfigure(&mut self, config: CoachConfig, speech: SpeechDispatcher) {
        log::info!(
            "[Engine] Reconfigured: interval={}ms voice={}",
            config.notify_interval_ms,
            config.voice_enabled
        );
        self.debouncer = config.debouncer();
        self.speech = voice_for(&config, speech);
        self.config = config;
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// A session exists and nobody asked it to stop
    pub fn is_running(&self) -> bool {
        self.session.is_some() && self.stop_handle.is_running()
    }

    /// Handle for stopping the current session from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Begin a fresh session: zero reps, no stage, nothing spoken yet.
    /// Returns the summary of the session this one replaced, if any.
    pub fn start(&mut self, exercise: ExerciseType) -> Option<SessionSummary> {
        self.start_at(exercise, Instant::now())
    }

    pub fn start_at(&mut self, exercise: ExerciseType, now: Instant) -> Option<SessionSummary> {
        let replaced = self.end_session(now, StopReason::Replaced);

        self.session = Some(SessionState::new(exercise, now));
        self.stop_handle = StopHandle::running();
        self.feedback.on_event(CoachEvent::SessionStarted { exercise });

        replaced
    }

    /// End the session after the current frame and return its summary
    pub fn stop(&mut self) -> Option<SessionSummary> {
        self.stop_at(Instant::now())
    }

    pub fn stop_at(&mut self, now: Instant) -> Option<SessionSummary> {
        self.end_session(now, StopReason::Stopped)
    }

    /// A failed camera read ends the session; there is no retry.
    pub fn camera_failed(&mut self, err: &CameraError, now: Instant) -> Option<SessionSummary> {
        log::warn!("[Engine] {} - stopping session", err);
        self.feedback.on_event(CoachEvent::Warning {
            message: CAMERA_FAILURE_MESSAGE.to_string(),
        });
        self.end_session(now, StopReason::CameraFailure)
    }

    fn end_session(&mut self, now: Instant, reason: StopReason) -> Option<SessionSummary> {
        let session = self.session.take()?;
        self.stop_handle.stop();

        let summary = session.summarize(now, reason);
        self.feedback.on_event(CoachEvent::SessionStopped {
            summary: summary.clone(),
        });
        Some(summary)
    }

    /// Process one frame's joints (`None` when no body was detected).
    pub fn process_frame(
        &mut self,
        joints: Option<&JointSet>,
        now: Instant,
    ) -> Result<FrameReport, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NotRunning)?;

        let Some(joints) = joints else {
            session.record_missing_body();
            let verdict = FeedbackVerdict::no_body();
            self.feedback.on_event(CoachEvent::Feedback {
                rep_count: session.rep_count(),
                verdict,
                stage: session.stage(),
            });
            return Ok(FrameReport {
                verdict,
                rep_count: session.rep_count(),
                stage: session.stage(),
                readings: None,
                rep_completed: false,
                spoken: false,
            });
        };

        let exercise = session.exercise();
        let readings = AngleReadings::measure(exercise.rules(), joints);
        let mut verdict = classify(exercise, &readings);
        let rep_completed = session.advance(&readings);

        let mut spoken = false;
        if self
            .debouncer
            .try_acquire(now, session.last_notified_at_mut())
        {
            verdict.should_notify = true;
            spoken = self.speech.dispatch(verdict.message);
        }

        if rep_completed {
            log::debug!("[Engine] {} rep {}", exercise, session.rep_count());
            self.feedback.on_event(CoachEvent::RepCompleted {
                rep_count: session.rep_count(),
            });
        }
        self.feedback.on_event(CoachEvent::Feedback {
            rep_count: session.rep_count(),
            verdict,
            stage: session.stage(),
        });

        Ok(FrameReport {
            verdict,
            rep_count: session.rep_count(),
            stage: session.stage(),
            readings: Some(readings),
            rep_completed,
            spoken,
        })
    }

    /// Drive the session from a camera until it is stopped or the camera
    /// fails. Each iteration blocks on `read_frame`.
    pub fn run<S, P, R>(
        &mut self,
        camera: &mut S,
        pose: &mut P,
        renderer: &mut R,
    ) -> Result<SessionSummary, EngineError>
    where
        S: FrameSource,
        P: PoseEstimator<S::Frame>,
        R: FrameRenderer<S::Frame>,
    {
        if self.session.is_none() {
            return Err(EngineError::NotRunning);
        }

        while self.stop_handle.is_running() {
            let frame = match camera.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    return self
                        .camera_failed(&err, Instant::now())
                        .ok_or(EngineError::NotRunning);
                }
            };

            let joints = pose.detect(&frame);
            self.process_frame(joints.as_ref(), Instant::now())?;
            renderer.show_frame(&frame, joints.as_ref());
        }

        self.stop().ok_or(EngineError::NotRunning)
    }
}

fn voice_for(config: &CoachConfig, speech: SpeechDispatcher) -> SpeechDispatcher {
    if config.voice_enabled {
        speech
    } else {
        SpeechDispatcher::muted()
    }
}
