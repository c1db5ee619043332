//! Feedback classification
//!
//! Turns one frame's angle readings into a verdict for the active exercise.

use serde::{Deserialize, Serialize};

use crate::exercise::{AngleReadings, ExerciseType};

/// Warning shown when the pose estimator finds no body
pub const NO_BODY_MESSAGE: &str = "Stay in frame.";

/// Severity of a feedback message, which decides its display color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Bad,
    /// Warnings outside the exercise rules (no body in frame)
    Neutral,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Bad => "bad",
            Severity::Neutral => "neutral",
        }
    }

    /// Display color; `None` means the renderer's default text color
    pub fn color(self) -> Option<&'static str> {
        match self {
            Severity::Good => Some("#4CAF50"),
            Severity::Bad => Some("#FF5252"),
            Severity::Neutral => None,
        }
    }
}

/// Per-frame classifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedbackVerdict {
    pub message: &'static str,
    pub severity: Severity,
    /// Set by the engine when the debouncer lets this verdict be spoken
    pub should_notify: bool,
}

impl FeedbackVerdict {
    pub fn new(message: &'static str, severity: Severity) -> Self {
        Self {
            message,
            severity,
            should_notify: false,
        }
    }

    pub fn no_body() -> Self {
        Self::new(NO_BODY_MESSAGE, Severity::Neutral)
    }
}

/// Classify one frame for `exercise`.
///
/// Walks the exercise's feedback rules in order and returns the first match;
/// falls back to the exercise's good message.
pub fn classify(exercise: ExerciseType, readings: &AngleReadings) -> FeedbackVerdict {
    let rules = exercise.rules();

    rules
        .rules
        .iter()
        .find(|rule| rule.when.holds(readings))
        .map(|rule| FeedbackVerdict::new(rule.message, rule.severity))
        .unwrap_or_else(|| FeedbackVerdict::new(rules.fallback, Severity::Good))
}
