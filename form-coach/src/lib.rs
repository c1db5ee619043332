//! Form Coach - exercise form feedback and rep counting
//!
//! Turns per-frame body joint positions into a stage label, a rep count and a
//! color-coded feedback message, with spoken notifications throttled to one
//! per interval. Camera, pose estimation, rendering and speech synthesis are
//! traits implemented by the host.

// Core modules
pub mod angle;
pub mod config;
pub mod counter;
pub mod debounce;
pub mod engine;
pub mod exercise;
pub mod feedback;
pub mod joints;
pub mod session;
pub mod speech;

// Re-export main types for convenience
pub use angle::{joint_angle, Point2D};
pub use config::{CoachConfig, ConfigError};
pub use counter::{RepPhase, RepStep};
pub use debounce::{should_notify, NotificationDebouncer, DEFAULT_NOTIFY_INTERVAL};
pub use engine::{
    CameraError, CoachEvent, CollectingFeedbackSink, Engine, EngineError, FeedbackSink,
    FrameRenderer, FrameReport, FrameSource, LogFeedbackSink, NoopFeedbackSink,
    NoopFrameRenderer, PoseEstimator, StopHandle,
};
pub use exercise::{
    AngleReadings, Condition, ExerciseRuleSet, ExerciseType, FeedbackRule, JointAngle, RepRule,
    Stage, UnknownExercise,
};
pub use feedback::{classify, FeedbackVerdict, Severity, NO_BODY_MESSAGE};
pub use joints::{Joint, JointSet, Side};
pub use session::{SessionState, SessionSummary, StopReason};
pub use speech::{LogSpeech, SpeechDispatcher, SpeechError, SpeechSink};
