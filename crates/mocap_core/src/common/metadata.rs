use super::types::{JointClass, ModelType};

/// SMPL-X kinematic joints: body (0-21), face (22-24), left hand (25-39),
/// right hand (40-54). Names follow the standard humanoid convention used by
/// the export side.
pub const SMPLX_JOINT_NAMES: [&str; 55] = [
    "Hips",
    "LeftUpLeg",
    "RightUpLeg",
    "Spine",
    "LeftLeg",
    "RightLeg",
    "Chest",
    "LeftFoot",
    "RightFoot",
    "UpperChest",
    "LeftToeBase",
    "RightToeBase",
    "Neck",
    "LeftShoulder",
    "RightShoulder",
    "Head",
    "LeftArm",
    "RightArm",
    "LeftForeArm",
    "RightForeArm",
    "LeftHand",
    "RightHand",
    "Jaw",
    "LeftEye",
    "RightEye",
    "LeftIndex1",
    "LeftIndex2",
    "LeftIndex3",
    "LeftMiddle1",
    "LeftMiddle2",
    "LeftMiddle3",
    "LeftPinky1",
    "LeftPinky2",
    "LeftPinky3",
    "LeftRing1",
    "LeftRing2",
    "LeftRing3",
    "LeftThumb1",
    "LeftThumb2",
    "LeftThumb3",
    "RightIndex1",
    "RightIndex2",
    "RightIndex3",
    "RightMiddle1",
    "RightMiddle2",
    "RightMiddle3",
    "RightPinky1",
    "RightPinky2",
    "RightPinky3",
    "RightRing1",
    "RightRing2",
    "RightRing3",
    "RightThumb1",
    "RightThumb2",
    "RightThumb3",
];

#[rustfmt::skip]
pub const SMPLX_PARENT_ID_PER_JOINT: [i16; 55] = [
    -1, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19,
    15, 15, 15,
    20, 25, 26, 20, 28, 29, 20, 31, 32, 20, 34, 35, 20, 37, 38,
    21, 40, 41, 21, 43, 44, 21, 46, 47, 21, 49, 50, 21, 52, 53,
];

/// Body-only SMPL, 24 joints. The two hand-end leaves carry no animation of
/// their own.
pub const SMPL_JOINT_NAMES: [&str; 24] = [
    "Hips",
    "LeftUpLeg",
    "RightUpLeg",
    "Spine",
    "LeftLeg",
    "RightLeg",
    "Chest",
    "LeftFoot",
    "RightFoot",
    "UpperChest",
    "LeftToeBase",
    "RightToeBase",
    "Neck",
    "LeftShoulder",
    "RightShoulder",
    "Head",
    "LeftArm",
    "RightArm",
    "LeftForeArm",
    "RightForeArm",
    "LeftHand",
    "RightHand",
    "LeftHandEnd",
    "RightHandEnd",
];

#[rustfmt::skip]
pub const SMPL_PARENT_ID_PER_JOINT: [i16; 24] = [
    -1, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19, 20, 21,
];

const SMPLX_WRIST_JOINTS: [usize; 2] = [20, 21];
const SMPLX_FIRST_FINGER_JOINT: usize = 25;

/// Static description of the source skeleton for one model convention.
#[derive(Clone)]
pub struct ModelMetadata {
    pub model: ModelType,
    pub num_joints: usize,
    pub joint_names: Vec<String>,
    pub joint_parents: Vec<i16>,
    pub joint_classes: Vec<JointClass>,
}

impl ModelMetadata {
    pub fn parent(&self, joint: usize) -> Option<usize> {
        let p = self.joint_parents[joint];
        usize::try_from(p).ok()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_names.iter().position(|n| n == name)
    }

    /// Joints eligible for outlier rejection and rotation clamping.
    pub fn noisy_joints(&self) -> Vec<usize> {
        (0..self.num_joints).filter(|&j| self.joint_classes[j].is_noisy()).collect()
    }

    pub fn wrist_joints(&self) -> Vec<usize> {
        (0..self.num_joints)
            .filter(|&j| self.joint_classes[j] == JointClass::Wrist)
            .collect()
    }
}

pub fn model_metadata(model: &ModelType) -> ModelMetadata {
    match model {
        ModelType::SmplX => {
            let classes = (0..SMPLX_JOINT_NAMES.len())
                .map(|j| {
                    if SMPLX_WRIST_JOINTS.contains(&j) {
                        JointClass::Wrist
                    } else if j >= SMPLX_FIRST_FINGER_JOINT {
                        JointClass::Finger
                    } else {
                        JointClass::BodyCore
                    }
                })
                .collect();
            ModelMetadata {
                model: ModelType::SmplX,
                num_joints: SMPLX_JOINT_NAMES.len(),
                joint_names: SMPLX_JOINT_NAMES.map(ToString::to_string).to_vec(),
                joint_parents: SMPLX_PARENT_ID_PER_JOINT.to_vec(),
                joint_classes: classes,
            }
        }
        // Body-only capture carries no usable hand signal, so every joint is
        // treated as body-core and the hand stages become no-ops.
        ModelType::Smpl => ModelMetadata {
            model: ModelType::Smpl,
            num_joints: SMPL_JOINT_NAMES.len(),
            joint_names: SMPL_JOINT_NAMES.map(ToString::to_string).to_vec(),
            joint_parents: SMPL_PARENT_ID_PER_JOINT.to_vec(),
            joint_classes: vec![JointClass::BodyCore; SMPL_JOINT_NAMES.len()],
        },
    }
}
