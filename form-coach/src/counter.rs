//! Two-threshold rep counting
//!
//! The entry threshold arms the counter, the completion threshold counts a
//! rep and disarms it. A single noisy boundary can never count twice because
//! the angle has to travel back past the entry threshold to re-arm.

use crate::exercise::{AngleReadings, RepRule, Stage};

/// Where the counter is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepPhase {
    /// No stage yet this session
    Unarmed,
    Armed,
    PostRep,
}

/// Result of feeding one frame to a rep rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepStep {
    pub stage: Option<Stage>,
    pub counted: bool,
}

impl RepRule {
    /// Advance the stage for one frame.
    ///
    /// Entry is checked first and always re-labels the stage as armed, even
    /// straight out of post-rep. Completion only counts while armed.
    pub fn advance(&self, stage: Option<Stage>, readings: &AngleReadings) -> RepStep {
        let mut stage = stage;

        if self.entry.holds(readings) {
            stage = Some(self.armed);
        }

        if stage == Some(self.armed) && self.completion.holds(readings) {
            return RepStep {
                stage: Some(self.post_rep),
                counted: true,
            };
        }

        RepStep {
            stage,
            counted: false,
        }
    }

    pub fn phase(&self, stage: Option<Stage>) -> RepPhase {
        match stage {
            None => RepPhase::Unarmed,
            Some(s) if s == self.armed => RepPhase::Armed,
            Some(_) => RepPhase::PostRep,
        }
    }
}
