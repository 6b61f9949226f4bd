use enum_map::Enum;
use strum_macros::Display;

/// Source body-model conventions supported by the estimator feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ModelType {
    /// Body-only, 24 joints. Hand joints are absent, so no hand cleanup runs.
    Smpl,
    /// Full body + 30 finger joints + jaw/eyes, 55 joints.
    SmplX,
}

/// Classification that drives which cleanup stages touch a joint and with
/// what parameters. Wrists and fingers come from the hand detector, which is
/// much noisier than the body branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, Display)]
pub enum JointClass {
    BodyCore,
    Wrist,
    Finger,
}

impl JointClass {
    /// Wrists and fingers get outlier rejection, clamping and the wide
    /// smoothing window.
    pub fn is_noisy(self) -> bool {
        matches!(self, JointClass::Wrist | JointClass::Finger)
    }
}
