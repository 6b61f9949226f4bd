use enum_map::{enum_map, EnumMap};
use log::info;

use crate::cleanup::clamp::clamp_rotations;
use crate::cleanup::continuity::fix_signs;
use crate::cleanup::outlier::reject_outliers;
use crate::cleanup::smooth::smooth_tracks;
use crate::cleanup::velocity::limit_angular_velocity;
use crate::common::animation::{CleanAnimation, PipelineReport};
use crate::common::sequence::SequenceInput;
use crate::common::types::JointClass;
use crate::conversions::normalize::quats_from_rotmats;
use crate::conversions::root_trans::estimate_root_translation;
use crate::error::StructuralError;

/// Stage parameters for [`clean`]. All angles are radians.
#[derive(Clone)]
pub struct CleanupConfig {
    /// Per-frame jump thresholds for the outlier passes on noisy joints,
    /// run in order. Two passes with a tightening threshold catch spikes
    /// that survive the first repair.
    pub outlier_passes: Vec<f32>,
    /// Per-frame angular velocity cap applied to the wrists.
    pub wrist_velocity_cap: f32,
    /// Anatomical hard limit on noisy-joint rotation magnitude.
    pub max_rotation_angle: f32,
    /// Savitzky-Golay window per joint class.
    pub smoothing_windows: EnumMap<JointClass, usize>,
    pub smoothing_order: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            outlier_passes: vec![45f32.to_radians(), 35f32.to_radians()],
            wrist_velocity_cap: 30f32.to_radians(),
            max_rotation_angle: 120f32.to_radians(),
            smoothing_windows: enum_map! {
                JointClass::BodyCore => 5,
                JointClass::Wrist => 11,
                JointClass::Finger => 11,
            },
            smoothing_order: 2,
        }
    }
}

/// Run the full temporal cleanup over one ingested sequence.
///
/// Stage order matters: sign continuity must come first because every later
/// stage measures angular distance between neighbors, outlier repair must
/// precede velocity limiting so spikes are not smeared into their neighbors,
/// and smoothing runs last over an already plausible signal.
///
/// # Errors
/// Only structural failures abort; see [`StructuralError`]. Per-frame
/// problems are repaired in place and counted in the report.
pub fn clean(
    input: &SequenceInput,
    config: &CleanupConfig,
) -> Result<(CleanAnimation, PipelineReport), StructuralError> {
    let mut quats = quats_from_rotmats(&input.rotations)?;
    let mut report = PipelineReport {
        dropped_frames: input.dropped_frames,
        ..PipelineReport::default()
    };

    report.sign_flips = fix_signs(&mut quats);

    let noisy = input.metadata.noisy_joints();
    for &threshold in &config.outlier_passes {
        report.outliers_rejected += reject_outliers(&mut quats, &noisy, threshold);
    }

    let wrists = input.metadata.wrist_joints();
    report.frames_velocity_limited =
        limit_angular_velocity(&mut quats, &wrists, config.wrist_velocity_cap);

    report.rotations_clamped = clamp_rotations(&mut quats, &noisy, config.max_rotation_angle);

    smooth_tracks(
        &mut quats,
        &input.metadata.joint_classes,
        &config.smoothing_windows,
        config.smoothing_order,
    );

    let root_translation = estimate_root_translation(&input.camera);

    info!(
        "cleaned {} frames: {} sign flips, {} outliers, {} velocity-limited frames, {} clamps",
        input.num_frames(),
        report.sign_flips,
        report.outliers_rejected,
        report.frames_velocity_limited,
        report.rotations_clamped
    );

    Ok((
        CleanAnimation {
            metadata: input.metadata.clone(),
            rotations: quats,
            root_translation,
            mean_betas: input.mean_betas.clone(),
            fps: input.fps,
        },
        report,
    ))
}
