//! Session state
//!
//! One `SessionState` lives from `start` to `stop` and is owned exclusively
//! by the engine. Maintains:
//! - Active exercise and current stage label
//! - Rep counter (only ever increases within a session)
//! - Last spoken-notification time for the debouncer
//! - Frame counters for the end-of-session summary

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::counter::RepPhase;
use crate::exercise::{AngleReadings, ExerciseType, Stage};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// User asked to stop
    Stopped,
    /// The camera could not supply a frame
    CameraFailure,
    /// A new session replaced this one
    Replaced,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    exercise: ExerciseType,
    stage: Option<Stage>,
    rep_count: u32,
    last_notified_at: Option<Instant>,
    started_at: Instant,
    frames: u64,
    frames_without_body: u64,
}

impl SessionState {
    pub fn new(exercise: ExerciseType, now: Instant) -> Self {
        Self {
            exercise,
            stage: None,
            rep_count: 0,
            last_notified_at: None,
            started_at: now,
            frames: 0,
            frames_without_body: 0,
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn last_notified_at(&self) -> Option<Instant> {
        self.last_notified_at
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frames_without_body(&self) -> u64 {
        self.frames_without_body
    }

    /// Rep cycle phase, `None` for exercises without reps
    pub fn phase(&self) -> Option<RepPhase> {
        self.exercise.rules().reps.map(|rule| rule.phase(self.stage))
    }

    /// Feed one frame's angles to the exercise's rep rule.
    /// Returns true when this frame completed a rep.
    pub fn advance(&mut self, readings: &AngleReadings) -> bool {
        self.frames += 1;

        let Some(rule) = self.exercise.rules().reps else {
            return false;
        };

        let step = rule.advance(self.stage, readings);
        self.stage = step.stage;
        if step.counted {
            self.rep_count = self.rep_count.saturating_add(1);
        }
        step.counted
    }

    /// A frame with no detected body leaves stage and count untouched
    pub fn record_missing_body(&mut self) {
        self.frames += 1;
        self.frames_without_body += 1;
    }

    pub(crate) fn last_notified_at_mut(&mut self) -> &mut Option<Instant> {
        &mut self.last_notified_at
    }

    pub fn duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn summarize(&self, now: Instant, reason: StopReason) -> SessionSummary {
        SessionSummary {
            exercise: self.exercise,
            rep_count: self.rep_count,
            duration_ms: self.duration(now).as_millis() as u64,
            frames: self.frames,
            frames_without_body: self.frames_without_body,
            reason,
        }
    }
}

/// What is left of a session once it ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub exercise: ExerciseType,
    pub rep_count: u32,
    pub duration_ms: u64,
    pub frames: u64,
    pub frames_without_body: u64,
    pub reason: StopReason,
}
