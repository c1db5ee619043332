//! Tracked joints for one side of the body
//!
//! A `JointSet` is produced fresh each frame by the pose estimator. It is
//! never retained past the frame it was detected in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::angle::Point2D;

// ============================================================================
// LANDMARK INDICES (MediaPipe Pose - 33 total)
// ============================================================================

pub const POSE_LANDMARK_COUNT: usize = 33;

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

/// Named joints used by the exercise rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
}

impl Joint {
    pub const ALL: [Joint; 6] = [
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Wrist,
        Joint::Hip,
        Joint::Knee,
        Joint::Ankle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Wrist => "wrist",
            Joint::Hip => "hip",
            Joint::Knee => "knee",
            Joint::Ankle => "ankle",
        }
    }

    /// Pose landmark index of this joint on the given side
    pub fn landmark_index(self, side: Side) -> usize {
        match (self, side) {
            (Joint::Shoulder, Side::Left) => LEFT_SHOULDER,
            (Joint::Shoulder, Side::Right) => RIGHT_SHOULDER,
            (Joint::Elbow, Side::Left) => LEFT_ELBOW,
            (Joint::Elbow, Side::Right) => RIGHT_ELBOW,
            (Joint::Wrist, Side::Left) => LEFT_WRIST,
            (Joint::Wrist, Side::Right) => RIGHT_WRIST,
            (Joint::Hip, Side::Left) => LEFT_HIP,
            (Joint::Hip, Side::Right) => RIGHT_HIP,
            (Joint::Knee, Side::Left) => LEFT_KNEE,
            (Joint::Knee, Side::Right) => RIGHT_KNEE,
            (Joint::Ankle, Side::Left) => LEFT_ANKLE,
            (Joint::Ankle, Side::Right) => RIGHT_ANKLE,
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked side of the body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            other => Err(format!("Unknown body side '{other}'")),
        }
    }
}

/// One frame's joint positions for a single side of the body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSet {
    pub shoulder: Point2D,
    pub elbow: Point2D,
    pub wrist: Point2D,
    pub hip: Point2D,
    pub knee: Point2D,
    pub ankle: Point2D,
}

impl JointSet {
    pub fn get(&self, joint: Joint) -> Point2D {
        match joint {
            Joint::Shoulder => self.shoulder,
            Joint::Elbow => self.elbow,
            Joint::Wrist => self.wrist,
            Joint::Hip => self.hip,
            Joint::Knee => self.knee,
            Joint::Ankle => self.ankle,
        }
    }

    /// Build a joint set from a full pose landmark list.
    ///
    /// Returns `None` when the list is too short to contain the lower body or
    /// any required coordinate is not finite; both mean no usable body.
    pub fn from_landmarks(landmarks: &[Point2D], side: Side) -> Option<Self> {
        let pick = |joint: Joint| -> Option<Point2D> {
            landmarks
                .get(joint.landmark_index(side))
                .copied()
                .filter(Point2D::is_finite)
        };

        Some(Self {
            shoulder: pick(Joint::Shoulder)?,
            elbow: pick(Joint::Elbow)?,
            wrist: pick(Joint::Wrist)?,
            hip: pick(Joint::Hip)?,
            knee: pick(Joint::Knee)?,
            ankle: pick(Joint::Ankle)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_with_marker(side: Side) -> Vec<Point2D> {
        let mut landmarks = vec![Point2D::default(); POSE_LANDMARK_COUNT];
        for joint in Joint::ALL {
            let idx = joint.landmark_index(side);
            landmarks[idx] = Point2D::new(idx as f64 / 100.0, 0.5);
        }
        landmarks
    }

    #[test]
    fn picks_requested_side() {
        let landmarks = pose_with_marker(Side::Right);
        let joints = JointSet::from_landmarks(&landmarks, Side::Right).unwrap();
        assert_eq!(joints.shoulder.x, 0.12);
        assert_eq!(joints.ankle.x, 0.28);
        assert_eq!(joints.get(Joint::Knee).x, 0.26);
    }

    #[test]
    fn short_landmark_list_means_no_body() {
        let landmarks = vec![Point2D::new(0.5, 0.5); 20];
        assert!(JointSet::from_landmarks(&landmarks, Side::Left).is_none());
    }

    #[test]
    fn non_finite_landmark_means_no_body() {
        let mut landmarks = pose_with_marker(Side::Left);
        landmarks[LEFT_HIP] = Point2D::new(f64::NAN, 0.4);
        assert!(JointSet::from_landmarks(&landmarks, Side::Left).is_none());
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("LEFT".parse::<Side>(), Ok(Side::Left));
        assert_eq!(" right ".parse::<Side>(), Ok(Side::Right));
        assert!("middle".parse::<Side>().is_err());
    }
}
