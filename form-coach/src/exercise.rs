//! Exercise rule table
//!
//! Every supported exercise is a declarative `ExerciseRuleSet`: which joint
//! angles it reads, an ordered list of feedback rules (first match wins), a
//! fallback message, and an optional two-threshold rep rule. One generic
//! classifier and one generic counter run every exercise off this table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::angle::joint_angle;
use crate::feedback::Severity;
use crate::joints::{Joint, JointSet};

use Condition::{Above, AnyOf, Below};
use JointAngle::{BodyLine, Elbow, Hip, Knee};

/// Supported exercise types, selected once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    PushUp,
    BicepCurl,
    Tricep,
    ShoulderPress,
    JumpingJack,
    Plank,
    SideBend,
    MountainClimber,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 9] = [
        ExerciseType::Squat,
        ExerciseType::PushUp,
        ExerciseType::BicepCurl,
        ExerciseType::Tricep,
        ExerciseType::ShoulderPress,
        ExerciseType::JumpingJack,
        ExerciseType::Plank,
        ExerciseType::SideBend,
        ExerciseType::MountainClimber,
    ];

    /// Machine name, matches the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::PushUp => "push_up",
            ExerciseType::BicepCurl => "bicep_curl",
            ExerciseType::Tricep => "tricep",
            ExerciseType::ShoulderPress => "shoulder_press",
            ExerciseType::JumpingJack => "jumping_jack",
            ExerciseType::Plank => "plank",
            ExerciseType::SideBend => "side_bend",
            ExerciseType::MountainClimber => "mountain_climber",
        }
    }

    /// Name shown in the exercise picker
    pub fn display_name(self) -> &'static str {
        match self {
            ExerciseType::Squat => "Squat",
            ExerciseType::PushUp => "Push-up",
            ExerciseType::BicepCurl => "Bicep Curl",
            ExerciseType::Tricep => "Triceps",
            ExerciseType::ShoulderPress => "Shoulder Press",
            ExerciseType::JumpingJack => "Jumping Jack",
            ExerciseType::Plank => "Plank",
            ExerciseType::SideBend => "Side Bend",
            ExerciseType::MountainClimber => "Mountain Climber",
        }
    }

    pub fn rules(self) -> &'static ExerciseRuleSet {
        match self {
            ExerciseType::Squat => &SQUAT,
            ExerciseType::PushUp => &PUSH_UP,
            ExerciseType::BicepCurl => &BICEP_CURL,
            ExerciseType::Tricep => &TRICEP,
            ExerciseType::ShoulderPress => &SHOULDER_PRESS,
            ExerciseType::JumpingJack => &JUMPING_JACK,
            ExerciseType::Plank => &PLANK,
            ExerciseType::SideBend => &SIDE_BEND,
            ExerciseType::MountainClimber => &MOUNTAIN_CLIMBER,
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown exercise '{0}'")]
pub struct UnknownExercise(pub String);

impl FromStr for ExerciseType {
    type Err = UnknownExercise;

    /// Accepts display names ("Push-up") as well as snake, kebab and
    /// squashed forms ("push_up", "push-up", "pushup").
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "squat" | "squats" => Ok(ExerciseType::Squat),
            "pushup" | "pushups" => Ok(ExerciseType::PushUp),
            "bicepcurl" | "bicepcurls" | "curl" => Ok(ExerciseType::BicepCurl),
            "tricep" | "triceps" => Ok(ExerciseType::Tricep),
            "shoulderpress" => Ok(ExerciseType::ShoulderPress),
            "jumpingjack" | "jumpingjacks" => Ok(ExerciseType::JumpingJack),
            "plank" => Ok(ExerciseType::Plank),
            "sidebend" | "sidebends" => Ok(ExerciseType::SideBend),
            "mountainclimber" | "mountainclimbers" => Ok(ExerciseType::MountainClimber),
            _ => Err(UnknownExercise(value.to_string())),
        }
    }
}

/// A joint angle the rules can read, named by its vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAngle {
    /// shoulder-elbow-wrist
    Elbow,
    /// hip-knee-ankle
    Knee,
    /// shoulder-hip-knee (back uprightness, side bend)
    Hip,
    /// shoulder-hip-ankle (straight body line)
    BodyLine,
}

impl JointAngle {
    const COUNT: usize = 4;

    pub const ALL: [JointAngle; Self::COUNT] = [
        JointAngle::Elbow,
        JointAngle::Knee,
        JointAngle::Hip,
        JointAngle::BodyLine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JointAngle::Elbow => "elbow",
            JointAngle::Knee => "knee",
            JointAngle::Hip => "hip",
            JointAngle::BodyLine => "body_line",
        }
    }

    /// (endpoint, vertex, endpoint)
    pub fn joints(self) -> (Joint, Joint, Joint) {
        match self {
            JointAngle::Elbow => (Joint::Shoulder, Joint::Elbow, Joint::Wrist),
            JointAngle::Knee => (Joint::Hip, Joint::Knee, Joint::Ankle),
            JointAngle::Hip => (Joint::Shoulder, Joint::Hip, Joint::Knee),
            JointAngle::BodyLine => (Joint::Shoulder, Joint::Hip, Joint::Ankle),
        }
    }

    pub fn measure(self, joints: &JointSet) -> f64 {
        let (a, b, c) = self.joints();
        joint_angle(joints.get(a), joints.get(b), joints.get(c))
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Angles measured for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AngleReadings {
    values: [Option<f64>; JointAngle::COUNT],
}

impl AngleReadings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure every angle the exercise needs from this frame's joints
    pub fn measure(rules: &ExerciseRuleSet, joints: &JointSet) -> Self {
        rules
            .angles
            .iter()
            .fold(Self::new(), |readings, &angle| {
                readings.with(angle, angle.measure(joints))
            })
    }

    pub fn with(mut self, angle: JointAngle, degrees: f64) -> Self {
        self.values[angle.slot()] = Some(degrees);
        self
    }

    pub fn get(&self, angle: JointAngle) -> Option<f64> {
        self.values[angle.slot()]
    }

    /// Measured angles only, in `JointAngle::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (JointAngle, f64)> + '_ {
        JointAngle::ALL
            .into_iter()
            .filter_map(|angle| self.get(angle).map(|degrees| (angle, degrees)))
    }
}

/// Threshold test on measured angles. Comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Below(JointAngle, f64),
    Above(JointAngle, f64),
    AnyOf(&'static [Condition]),
}

impl Condition {
    /// A condition on an angle that was not measured never holds.
    pub fn holds(&self, readings: &AngleReadings) -> bool {
        match *self {
            Condition::Below(angle, limit) => readings.get(angle).is_some_and(|v| v < limit),
            Condition::Above(angle, limit) => readings.get(angle).is_some_and(|v| v > limit),
            Condition::AnyOf(conditions) => conditions.iter().any(|c| c.holds(readings)),
        }
    }
}

/// One ordered branch of an exercise's feedback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackRule {
    pub when: Condition,
    pub severity: Severity,
    pub message: &'static str,
}

/// Stage labels used to gate rep counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Up,
    Down,
    Open,
    Close,
    In,
    Out,
    Bend,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Up => "up",
            Stage::Down => "down",
            Stage::Open => "open",
            Stage::Close => "close",
            Stage::In => "in",
            Stage::Out => "out",
            Stage::Bend => "bend",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-threshold rep rule.
///
/// `entry` arms the counter by setting `armed`; `completion` while armed
/// counts one rep and moves to `post_rep`, which must be re-armed before the
/// next rep can count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepRule {
    pub entry: Condition,
    pub armed: Stage,
    pub completion: Condition,
    pub post_rep: Stage,
}

/// Declarative definition of one exercise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseRuleSet {
    pub exercise: ExerciseType,
    pub angles: &'static [JointAngle],
    pub rules: &'static [FeedbackRule],
    pub fallback: &'static str,
    /// `None` for static holds
    pub reps: Option<RepRule>,
}

const fn bad(when: Condition, message: &'static str) -> FeedbackRule {
    FeedbackRule {
        when,
        severity: Severity::Bad,
        message,
    }
}

const fn good(when: Condition, message: &'static str) -> FeedbackRule {
    FeedbackRule {
        when,
        severity: Severity::Good,
        message,
    }
}

pub static SQUAT: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::Squat,
    angles: &[Knee, Hip],
    rules: &[
        bad(Below(Knee, 70.0), "Go deeper"),
        bad(Above(Knee, 120.0), "Too low, rise up"),
        bad(Below(Hip, 160.0), "Keep your back upright"),
    ],
    fallback: "Good squat!",
    reps: Some(RepRule {
        entry: Above(Knee, 140.0),
        armed: Stage::Up,
        completion: Below(Knee, 90.0),
        post_rep: Stage::Down,
    }),
};

pub static PUSH_UP: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::PushUp,
    angles: &[Elbow, BodyLine],
    rules: &[
        good(Above(Elbow, 160.0), "Arms extended"),
        bad(Below(Elbow, 90.0), "Go lower in push-up"),
        bad(Below(BodyLine, 160.0), "Keep body straight"),
    ],
    fallback: "Good push-up form!",
    reps: Some(RepRule {
        entry: Above(Elbow, 160.0),
        armed: Stage::Up,
        completion: Below(Elbow, 90.0),
        post_rep: Stage::Down,
    }),
};

pub static BICEP_CURL: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::BicepCurl,
    angles: &[Elbow],
    rules: &[
        good(Above(Elbow, 150.0), "Arm extended"),
        good(Below(Elbow, 40.0), "Full curl!"),
    ],
    fallback: "Controlled curl",
    reps: Some(RepRule {
        entry: Above(Elbow, 150.0),
        armed: Stage::Down,
        completion: Below(Elbow, 40.0),
        post_rep: Stage::Up,
    }),
};

pub static TRICEP: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::Tricep,
    angles: &[Elbow],
    rules: &[
        good(Above(Elbow, 160.0), "Arms straightened fully"),
        bad(Below(Elbow, 60.0), "Bend your elbow more"),
    ],
    fallback: "Good tricep motion",
    reps: Some(RepRule {
        entry: Below(Elbow, 60.0),
        armed: Stage::Down,
        completion: Above(Elbow, 160.0),
        post_rep: Stage::Up,
    }),
};

pub static SHOULDER_PRESS: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::ShoulderPress,
    angles: &[Elbow],
    rules: &[
        good(Above(Elbow, 160.0), "Arms straight up"),
        bad(Below(Elbow, 80.0), "Push higher"),
    ],
    fallback: "Controlled press",
    reps: Some(RepRule {
        entry: Below(Elbow, 80.0),
        armed: Stage::Down,
        completion: Above(Elbow, 160.0),
        post_rep: Stage::Up,
    }),
};

pub static JUMPING_JACK: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::JumpingJack,
    angles: &[Elbow, Knee],
    rules: &[bad(
        AnyOf(&[Below(Elbow, 60.0), Below(Knee, 40.0)]),
        "Jump wider",
    )],
    fallback: "Good jumping jack",
    reps: Some(RepRule {
        entry: Above(Knee, 100.0),
        armed: Stage::Open,
        completion: Below(Knee, 60.0),
        post_rep: Stage::Close,
    }),
};

pub static PLANK: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::Plank,
    angles: &[BodyLine],
    rules: &[bad(Below(BodyLine, 160.0), "Keep your body straight")],
    fallback: "Good plank hold",
    reps: None,
};

pub static SIDE_BEND: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::SideBend,
    angles: &[Hip],
    rules: &[bad(Below(Hip, 150.0), "Bend more to the side")],
    fallback: "Good side bend",
    reps: Some(RepRule {
        entry: Below(Hip, 150.0),
        armed: Stage::Bend,
        completion: Above(Hip, 170.0),
        post_rep: Stage::Up,
    }),
};

pub static MOUNTAIN_CLIMBER: ExerciseRuleSet = ExerciseRuleSet {
    exercise: ExerciseType::MountainClimber,
    angles: &[Knee],
    rules: &[good(Below(Knee, 60.0), "Drive knee in")],
    fallback: "Controlled motion",
    reps: Some(RepRule {
        entry: Below(Knee, 60.0),
        armed: Stage::In,
        completion: Above(Knee, 120.0),
        post_rep: Stage::Out,
    }),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exercise_maps_to_its_own_rule_set() {
        for exercise in ExerciseType::ALL {
            let rules = exercise.rules();
            assert_eq!(rules.exercise, exercise);
            assert!(!rules.angles.is_empty() && rules.angles.len() <= 2);
            assert!(!rules.fallback.is_empty());
        }
    }

    #[test]
    fn only_plank_has_no_rep_rule() {
        for exercise in ExerciseType::ALL {
            assert_eq!(
                exercise.rules().reps.is_none(),
                exercise == ExerciseType::Plank,
                "{exercise}"
            );
        }
    }

    #[test]
    fn rules_only_read_measured_angles() {
        fn angles_of(condition: &Condition, out: &mut Vec<JointAngle>) {
            match condition {
                Condition::Below(a, _) | Condition::Above(a, _) => out.push(*a),
                Condition::AnyOf(cs) => cs.iter().for_each(|c| angles_of(c, out)),
            }
        }

        for exercise in ExerciseType::ALL {
            let rules = exercise.rules();
            let mut used = Vec::new();
            for rule in rules.rules {
                angles_of(&rule.when, &mut used);
            }
            if let Some(reps) = rules.reps {
                angles_of(&reps.entry, &mut used);
                angles_of(&reps.completion, &mut used);
            }
            for angle in used {
                assert!(rules.angles.contains(&angle), "{exercise} reads {angle:?}");
            }
        }
    }

    #[test]
    fn parses_display_and_machine_names() {
        for exercise in ExerciseType::ALL {
            assert_eq!(exercise.display_name().parse::<ExerciseType>(), Ok(exercise));
            assert_eq!(exercise.as_str().parse::<ExerciseType>(), Ok(exercise));
        }
        assert_eq!("pushup".parse::<ExerciseType>(), Ok(ExerciseType::PushUp));
        assert_eq!("Tricep".parse::<ExerciseType>(), Ok(ExerciseType::Tricep));
        assert!("burpee".parse::<ExerciseType>().is_err());
    }

    #[test]
    fn serde_uses_machine_names() {
        let json = serde_json::to_string(&ExerciseType::MountainClimber).unwrap();
        assert_eq!(json, "\"mountain_climber\"");
        let parsed: ExerciseType = serde_json::from_str("\"push_up\"").unwrap();
        assert_eq!(parsed, ExerciseType::PushUp);
    }

    #[test]
    fn conditions_are_strict() {
        let readings = AngleReadings::new().with(JointAngle::Knee, 90.0);
        assert!(!Condition::Below(JointAngle::Knee, 90.0).holds(&readings));
        assert!(!Condition::Above(JointAngle::Knee, 90.0).holds(&readings));
        assert!(Condition::Below(JointAngle::Knee, 90.5).holds(&readings));
    }

    #[test]
    fn missing_angle_never_holds() {
        let readings = AngleReadings::new().with(JointAngle::Knee, 10.0);
        assert!(!Condition::Below(JointAngle::Elbow, 90.0).holds(&readings));
        assert!(Condition::AnyOf(&[
            Condition::Below(JointAngle::Elbow, 90.0),
            Condition::Below(JointAngle::Knee, 40.0),
        ])
        .holds(&readings));
    }
}
