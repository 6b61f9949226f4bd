use super::metadata::{model_metadata, ModelMetadata};
use super::types::ModelType;
use crate::error::StructuralError;
use log::{info, warn};
use ndarray as nd;

/// One raw sample from the frame loader. Rotation matrices are required;
/// every other field is estimator metadata that may be missing per frame.
#[derive(Clone, Default)]
pub struct FrameRecord {
    /// Per-joint 3x3 rotation matrices, shape `(J, 3, 3)`.
    pub rotations: Option<nd::Array3<f32>>,
    /// Body shape parameters, typically 10 coefficients.
    pub betas: Option<nd::Array1<f32>>,
    /// Weak-perspective camera `[s, tx, ty]`.
    pub camera: Option<[f32; 3]>,
    /// Detection-box top-left corner in image pixels.
    pub bbox_top_left: Option<[f32; 2]>,
    /// Detection-box scale ratio (crop size / box size).
    pub bbox_scale_ratio: Option<f32>,
}

/// Per-sequence camera metadata, resolved once at ingestion rather than
/// per frame. A category is present only when every surviving frame
/// carries it.
pub enum CameraTrack {
    Absent,
    /// `(N, 3)` rows of `[s, tx, ty]`.
    WeakPerspective { cams: nd::Array2<f32> },
    /// Weak-perspective cameras plus detection-box placement, enough to
    /// reconstruct image-space root motion.
    BboxCalibrated {
        cams: nd::Array2<f32>,
        bbox_top_left: nd::Array2<f32>,
        bbox_scale_ratio: nd::Array1<f32>,
    },
}

/// A validated input sequence: dense rotation matrices for every surviving
/// frame, camera metadata resolved to one of the [`CameraTrack`] modes, and
/// the shape coefficients averaged for the external body-model pass.
pub struct SequenceInput {
    pub metadata: ModelMetadata,
    /// `(N, J, 3, 3)`.
    pub rotations: nd::Array4<f32>,
    pub camera: CameraTrack,
    pub mean_betas: Option<nd::Array1<f32>>,
    pub fps: f32,
    pub dropped_frames: usize,
}

impl SequenceInput {
    /// Assemble a sequence from loader records.
    ///
    /// Frames without rotation data are dropped with a warning; the declared
    /// frame rate is kept as-is. Fails only when the result would be empty
    /// or a frame's joint count does not match the model.
    ///
    /// # Errors
    /// [`StructuralError::EmptySequence`] if no frame carries rotations,
    /// [`StructuralError::JointCountMismatch`] on a wrong-shaped frame.
    pub fn from_records(
        records: Vec<FrameRecord>,
        model: ModelType,
        fps: f32,
    ) -> Result<Self, StructuralError> {
        let metadata = model_metadata(&model);
        let num_joints = metadata.num_joints;

        let total = records.len();
        let mut kept = Vec::with_capacity(total);
        for (idx, record) in records.into_iter().enumerate() {
            if record.rotations.is_some() {
                kept.push(record);
            } else {
                warn!("frame {idx}: no rotation data, dropping");
            }
        }
        let dropped_frames = total - kept.len();
        if kept.is_empty() {
            return Err(StructuralError::EmptySequence);
        }

        let n = kept.len();
        let mut rotations = nd::Array4::<f32>::zeros((n, num_joints, 3, 3));
        for (i, record) in kept.iter().enumerate() {
            let rotmats = record.rotations.as_ref().unwrap();
            if rotmats.dim() != (num_joints, 3, 3) {
                return Err(StructuralError::JointCountMismatch {
                    expected: num_joints,
                    got: rotmats.dim().0,
                });
            }
            rotations.index_axis_mut(nd::Axis(0), i).assign(rotmats);
        }

        let camera = resolve_camera_track(&kept);
        let mean_betas = mean_betas(&kept);

        info!("ingested {n} frames ({dropped_frames} dropped) at {fps} fps, model {model}");
        Ok(Self {
            metadata,
            rotations,
            camera,
            mean_betas,
            fps,
            dropped_frames,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.rotations.dim().0
    }
}

fn resolve_camera_track(frames: &[FrameRecord]) -> CameraTrack {
    let n = frames.len();
    if !frames.iter().all(|f| f.camera.is_some()) {
        if frames.iter().any(|f| f.camera.is_some()) {
            warn!("camera parameters present on some frames only, ignoring them all");
        }
        return CameraTrack::Absent;
    }
    let mut cams = nd::Array2::<f32>::zeros((n, 3));
    for (i, f) in frames.iter().enumerate() {
        let c = f.camera.unwrap();
        cams.row_mut(i).assign(&nd::arr1(&c));
    }

    let has_bbox = frames
        .iter()
        .all(|f| f.bbox_top_left.is_some() && f.bbox_scale_ratio.is_some());
    if !has_bbox {
        return CameraTrack::WeakPerspective { cams };
    }
    let mut bbox_top_left = nd::Array2::<f32>::zeros((n, 2));
    let mut bbox_scale_ratio = nd::Array1::<f32>::zeros(n);
    for (i, f) in frames.iter().enumerate() {
        bbox_top_left.row_mut(i).assign(&nd::arr1(&f.bbox_top_left.unwrap()));
        bbox_scale_ratio[i] = f.bbox_scale_ratio.unwrap();
    }
    CameraTrack::BboxCalibrated {
        cams,
        bbox_top_left,
        bbox_scale_ratio,
    }
}

fn mean_betas(frames: &[FrameRecord]) -> Option<nd::Array1<f32>> {
    let with_betas: Vec<&nd::Array1<f32>> = frames.iter().filter_map(|f| f.betas.as_ref()).collect();
    let first = with_betas.first()?;
    let mut acc = nd::Array1::<f32>::zeros(first.len());
    let mut count = 0usize;
    for betas in &with_betas {
        if betas.len() == acc.len() {
            acc += *betas;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(acc / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_frame(num_joints: usize) -> FrameRecord {
        let mut rot = nd::Array3::<f32>::zeros((num_joints, 3, 3));
        for j in 0..num_joints {
            for d in 0..3 {
                rot[(j, d, d)] = 1.0;
            }
        }
        FrameRecord {
            rotations: Some(rot),
            ..Default::default()
        }
    }

    #[test]
    fn frames_without_rotations_are_dropped() {
        let frames = vec![
            identity_frame(24),
            FrameRecord::default(),
            identity_frame(24),
        ];
        let seq = SequenceInput::from_records(frames, ModelType::Smpl, 30.0).unwrap();
        assert_eq!(seq.num_frames(), 2);
        assert_eq!(seq.dropped_frames, 1);
    }

    #[test]
    fn empty_sequences_are_a_structural_error() {
        let err = SequenceInput::from_records(vec![FrameRecord::default()], ModelType::Smpl, 30.0);
        assert!(matches!(err, Err(StructuralError::EmptySequence)));
    }

    #[test]
    fn wrong_joint_count_is_a_structural_error() {
        let err = SequenceInput::from_records(vec![identity_frame(10)], ModelType::Smpl, 30.0);
        assert!(matches!(
            err,
            Err(StructuralError::JointCountMismatch { expected: 24, got: 10 })
        ));
    }

    #[test]
    fn partial_camera_metadata_resolves_to_absent() {
        let mut a = identity_frame(24);
        a.camera = Some([1.0, 0.0, 0.0]);
        let b = identity_frame(24);
        let seq = SequenceInput::from_records(vec![a, b], ModelType::Smpl, 30.0).unwrap();
        assert!(matches!(seq.camera, CameraTrack::Absent));
    }

    #[test]
    fn camera_without_bbox_resolves_to_weak_perspective() {
        let mut frames = vec![identity_frame(24), identity_frame(24)];
        for f in &mut frames {
            f.camera = Some([0.9, 0.1, -0.1]);
        }
        let seq = SequenceInput::from_records(frames, ModelType::Smpl, 30.0).unwrap();
        assert!(matches!(seq.camera, CameraTrack::WeakPerspective { .. }));
    }
}
