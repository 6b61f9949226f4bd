pub mod mapping;
pub mod skeleton;

use crate::common::animation::CleanAnimation;
use crate::common::types::{JointClass, ModelType};
use crate::error::StructuralError;
use log::{info, warn};
use mapping::{BoneMap, MapEntry, RenameTable};
use mocap_utils::quat::{assign_quat, quat_from_row, raw_from_unit, unit_from_raw};
use nalgebra as na;
use ndarray as nd;
use rayon::prelude::*;
use skeleton::TargetSkeleton;

/// Index of the first finger joint in the SMPL-X ordering; rows of the
/// hand-mean table line up with joints starting here.
const FIRST_FINGER_JOINT: usize = 25;
const NUM_FINGER_JOINTS: usize = 30;

/// How a source rotation is re-expressed in a target bone's local frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetargetFormula {
    /// `pose = rest⁻¹ · source · rest`. Correct when the bone's own rest
    /// orientation fully explains the difference from the source convention.
    Conjugation,
    /// `pose = rest⁻¹ · parent_rest · source`. Needed where a bone's rest
    /// orientation differs materially from its parent's (wrists, fingers);
    /// conjugation there leaks tens of degrees of world-space error into
    /// every descendant.
    RestLocal,
}

/// Fixed per-class policy; never inferred at run time.
pub fn formula_for(class: JointClass) -> RetargetFormula {
    match class {
        JointClass::BodyCore => RetargetFormula::Conjugation,
        JointClass::Wrist | JointClass::Finger => RetargetFormula::RestLocal,
    }
}

pub struct RetargetOptions {
    pub renames: RenameTable,
    /// Mean curled hand pose baked into the source rest convention, one
    /// axis-angle row per finger joint, shape `(30, 3)`. Supply it when the
    /// target rig's hands rest flat: the mean is added back into each
    /// finger's delta (axis-angle addition) so the retargeted rotation is a
    /// rotation from true anatomical rest.
    pub hand_mean: Option<nd::Array2<f32>>,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            renames: RenameTable::default(),
            hand_mean: None,
        }
    }
}

/// The retargeted output contract: one rotation channel per mapped bone,
/// in target bone-local frames, plus the names of everything that could
/// not be mapped.
pub struct RetargetedAnimation {
    pub bone_names: Vec<String>,
    /// `(N, mapped_bones, 4)` quaternions `[w, x, y, z]`.
    pub rotations: nd::Array3<f32>,
    /// Root displacement in the target root bone's local rest frame.
    pub root_translation: Option<nd::Array2<f32>>,
    pub skipped_joints: Vec<String>,
    pub fps: f32,
}

/// Re-express a cleaned source animation on the target skeleton.
///
/// # Errors
/// [`StructuralError::NoJointsMapped`] when nothing resolves,
/// [`StructuralError::EmptyTargetSkeleton`] for an empty target,
/// [`StructuralError::HandMeanShapeMismatch`] for a malformed hand mean.
pub fn retarget(
    anim: &CleanAnimation,
    target: &TargetSkeleton,
    options: &RetargetOptions,
) -> Result<RetargetedAnimation, StructuralError> {
    if target.bones.is_empty() {
        return Err(StructuralError::EmptyTargetSkeleton);
    }
    if let Some(hand_mean) = &options.hand_mean {
        if hand_mean.dim() != (NUM_FINGER_JOINTS, 3) {
            return Err(StructuralError::HandMeanShapeMismatch {
                expected: NUM_FINGER_JOINTS,
                got: hand_mean.dim(),
            });
        }
        if anim.metadata.model != ModelType::SmplX {
            warn!("hand mean supplied for a model without finger joints, ignoring");
        }
    }

    let map = BoneMap::build(&anim.metadata, target, &options.renames);
    let mut skipped = map.skipped.clone();

    // bones without a recoverable rest orientation cannot be retargeted
    let entries: Vec<MapEntry> = map
        .entries
        .into_iter()
        .filter(|e| {
            if target.bones[e.target_bone].rest.is_some() {
                true
            } else {
                let name = &anim.metadata.joint_names[e.source_joint];
                warn!("joint {name}: target bone has no recoverable rest orientation, skipping");
                skipped.push(name.clone());
                false
            }
        })
        .collect();
    if entries.is_empty() {
        return Err(StructuralError::NoJointsMapped);
    }

    let n = anim.num_frames();
    let use_hand_mean = options.hand_mean.is_some() && anim.metadata.model == ModelType::SmplX;

    let channels: Vec<nd::Array2<f32>> = entries
        .par_iter()
        .map(|entry| {
            let class = anim.metadata.joint_classes[entry.source_joint];
            let rest = target.bones[entry.target_bone]
                .rest
                .expect("degenerate bones filtered above");
            let parent_rest = target
                .parent_rest(entry.target_bone)
                .unwrap_or_else(na::UnitQuaternion::identity);
            let mean = if use_hand_mean && class == JointClass::Finger {
                let row = entry.source_joint - FIRST_FINGER_JOINT;
                let hand_mean = options.hand_mean.as_ref().unwrap();
                Some(na::Vector3::new(
                    hand_mean[(row, 0)],
                    hand_mean[(row, 1)],
                    hand_mean[(row, 2)],
                ))
            } else {
                None
            };

            let mut channel = nd::Array2::<f32>::zeros((n, 4));
            for i in 0..n {
                let raw = quat_from_row(anim.rotations.slice(nd::s![i, entry.source_joint, ..]));
                let mut source = unit_from_raw(&raw);
                if let Some(mean) = mean {
                    // the source convention bakes a mean curl into its rest
                    // state; adding it back in axis-angle space makes the
                    // delta a rotation from true anatomical rest
                    source = na::UnitQuaternion::from_scaled_axis(source.scaled_axis() + mean);
                }
                let pose = match formula_for(class) {
                    RetargetFormula::Conjugation => rest.inverse() * source * rest,
                    RetargetFormula::RestLocal => rest.inverse() * parent_rest * source,
                };
                assign_quat(channel.row_mut(i), &raw_from_unit(&pose));
            }
            channel
        })
        .collect();

    let mut rotations = nd::Array3::<f32>::zeros((n, entries.len(), 4));
    for (slot, channel) in channels.iter().enumerate() {
        rotations.slice_mut(nd::s![.., slot, ..]).assign(channel);
    }

    let bone_names: Vec<String> = entries
        .iter()
        .map(|e| target.bones[e.target_bone].name.clone())
        .collect();

    let root_translation = transform_root_translation(anim, target, &entries);

    info!(
        "retargeted {} channels over {n} frames ({} joints skipped)",
        entries.len(),
        skipped.len()
    );
    Ok(RetargetedAnimation {
        bone_names,
        rotations,
        root_translation,
        skipped_joints: skipped,
        fps: anim.fps,
    })
}

/// Pose-bone location is defined in the bone's local rest frame, while the
/// estimated displacement is an armature-space vector; the root bone's
/// inverse rest rotation converts between them.
fn transform_root_translation(
    anim: &CleanAnimation,
    target: &TargetSkeleton,
    entries: &[MapEntry],
) -> Option<nd::Array2<f32>> {
    let translation = anim.root_translation.as_ref()?;
    let root_entry = entries.iter().find(|e| e.source_joint == 0);
    let Some(root_entry) = root_entry else {
        warn!("root joint not mapped, dropping root translation");
        return None;
    };
    let rest_inv = target.bones[root_entry.target_bone].rest?.inverse();

    let n = translation.dim().0;
    let mut out = nd::Array2::<f32>::zeros((n, 3));
    for i in 0..n {
        let v = na::Vector3::new(translation[(i, 0)], translation[(i, 1)], translation[(i, 2)]);
        let local = rest_inv * v;
        out.row_mut(i).assign(&nd::arr1(&[local.x, local.y, local.z]));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::metadata::{model_metadata, SMPLX_JOINT_NAMES};
    use approx::assert_relative_eq;

    fn identity_animation(model: ModelType, n: usize) -> CleanAnimation {
        let metadata = model_metadata(&model);
        let mut rotations = nd::Array3::<f32>::zeros((n, metadata.num_joints, 4));
        rotations.slice_mut(nd::s![.., .., 0]).fill(1.0);
        CleanAnimation {
            metadata,
            rotations,
            root_translation: None,
            mean_betas: None,
            fps: 30.0,
        }
    }

    fn full_target(rest: na::Matrix3<f32>) -> TargetSkeleton {
        TargetSkeleton::from_rest_matrices(
            SMPLX_JOINT_NAMES
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    let parent = usize::try_from(
                        crate::common::metadata::SMPLX_PARENT_ID_PER_JOINT[j],
                    )
                    .ok();
                    (name.to_string(), parent, rest)
                })
                .collect(),
        )
    }

    #[test]
    fn rest_local_with_matching_parent_rest_introduces_no_twist() {
        // every bone shares one rest orientation, so rest == parent_rest for
        // all non-root bones; identity input must stay identity
        let rest = *na::Rotation3::from_euler_angles(0.4, 0.1, -0.7).matrix();
        let target = full_target(rest);
        let anim = identity_animation(ModelType::SmplX, 5);
        let out = retarget(&anim, &target, &RetargetOptions::default()).unwrap();

        let wrist_slot = out.bone_names.iter().position(|n| n == "LeftHand").unwrap();
        for i in 0..5 {
            let q = quat_from_row(out.rotations.slice(nd::s![i, wrist_slot, ..]));
            assert_relative_eq!(q.x.abs(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn conjugation_with_identity_rest_passes_rotations_through() {
        let target = full_target(na::Matrix3::identity());
        let mut anim = identity_animation(ModelType::SmplX, 3);
        // 60 degrees about z on the spine
        let spine = anim.metadata.joint_index("Spine").unwrap();
        for i in 0..3 {
            anim.rotations[(i, spine, 0)] = (0.5f32).cos();
            anim.rotations[(i, spine, 3)] = (0.5f32).sin();
        }
        let out = retarget(&anim, &target, &RetargetOptions::default()).unwrap();
        let slot = out.bone_names.iter().position(|n| n == "Spine").unwrap();
        assert_relative_eq!(out.rotations[(0, slot, 0)], (0.5f32).cos(), epsilon = 1e-5);
        assert_relative_eq!(out.rotations[(0, slot, 3)], (0.5f32).sin(), epsilon = 1e-5);
    }

    #[test]
    fn unmapped_everything_is_fatal() {
        let target = TargetSkeleton::from_rest_matrices(vec![(
            "Unrelated".to_string(),
            None,
            na::Matrix3::identity(),
        )]);
        let anim = identity_animation(ModelType::Smpl, 2);
        let err = retarget(&anim, &target, &RetargetOptions::default());
        assert!(matches!(err, Err(StructuralError::NoJointsMapped)));
    }

    #[test]
    fn degenerate_rest_bones_are_skipped_not_fatal() {
        let target = TargetSkeleton::from_rest_matrices(vec![
            ("Hips".to_string(), None, na::Matrix3::identity()),
            ("Spine".to_string(), Some(0), na::Matrix3::zeros()),
        ]);
        let anim = identity_animation(ModelType::Smpl, 2);
        let out = retarget(&anim, &target, &RetargetOptions::default()).unwrap();
        assert_eq!(out.bone_names, vec!["Hips".to_string()]);
        assert!(out.skipped_joints.iter().any(|n| n == "Spine"));
    }

    #[test]
    fn hand_mean_is_added_in_axis_angle_space() {
        let target = full_target(na::Matrix3::identity());
        let mut anim = identity_animation(ModelType::SmplX, 1);
        let index1 = anim.metadata.joint_index("LeftIndex1").unwrap();
        // delta of 0.2 rad about x, mean of 0.3 rad about x: expect 0.5
        anim.rotations[(0, index1, 0)] = (0.1f32).cos();
        anim.rotations[(0, index1, 1)] = (0.1f32).sin();
        let mut hand_mean = nd::Array2::<f32>::zeros((30, 3));
        hand_mean[(index1 - FIRST_FINGER_JOINT, 0)] = 0.3;
        let options = RetargetOptions {
            hand_mean: Some(hand_mean),
            ..Default::default()
        };
        let out = retarget(&anim, &target, &options).unwrap();
        let slot = out.bone_names.iter().position(|n| n == "LeftIndex1").unwrap();
        let q = quat_from_row(out.rotations.slice(nd::s![0, slot, ..]));
        let angle = 2.0 * q.x.clamp(-1.0, 1.0).acos();
        assert_relative_eq!(angle, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn malformed_hand_mean_is_fatal() {
        let target = full_target(na::Matrix3::identity());
        let anim = identity_animation(ModelType::SmplX, 1);
        let options = RetargetOptions {
            hand_mean: Some(nd::Array2::<f32>::zeros((15, 3))),
            ..Default::default()
        };
        let err = retarget(&anim, &target, &options);
        assert!(matches!(err, Err(StructuralError::HandMeanShapeMismatch { .. })));
    }

    #[test]
    fn root_translation_moves_into_the_root_bones_local_frame() {
        // root bone rest: 90 degrees about z; armature-space +x becomes
        // local -y after the inverse rest rotation
        let rest = *na::Rotation3::from_euler_angles(0.0, 0.0, std::f32::consts::FRAC_PI_2).matrix();
        let target = TargetSkeleton::from_rest_matrices(vec![("Hips".to_string(), None, rest)]);
        let mut anim = identity_animation(ModelType::Smpl, 2);
        let mut trans = nd::Array2::<f32>::zeros((2, 3));
        trans[(1, 0)] = 1.0;
        anim.root_translation = Some(trans);
        let out = retarget(&anim, &target, &RetargetOptions::default()).unwrap();
        let local = out.root_translation.unwrap();
        assert_relative_eq!(local[(1, 0)], 0.0, epsilon = 1e-5);
        assert_relative_eq!(local[(1, 1)], -1.0, epsilon = 1e-5);
    }
}
