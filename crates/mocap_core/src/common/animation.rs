use super::metadata::ModelMetadata;
use ndarray as nd;

/// The cleaned, still source-skeleton animation signal handed to the
/// retargeter or exporter.
///
/// Invariants after the pipeline: every `(frame, joint)` quaternion row is
/// unit length within 1e-6, and consecutive rows per joint sit on the same
/// hemisphere.
pub struct CleanAnimation {
    pub metadata: ModelMetadata,
    /// `(N, J, 4)` quaternions `[w, x, y, z]`.
    pub rotations: nd::Array3<f32>,
    /// `(N, 3)` root displacement relative to frame 0, when camera metadata
    /// allowed estimating one.
    pub root_translation: Option<nd::Array2<f32>>,
    /// Averaged shape coefficients for the external body-model forward pass.
    pub mean_betas: Option<nd::Array1<f32>>,
    pub fps: f32,
}

impl CleanAnimation {
    pub fn num_frames(&self) -> usize {
        self.rotations.dim().0
    }

    pub fn num_joints(&self) -> usize {
        self.rotations.dim().1
    }
}

/// Per-stage diagnostic counters. Informational only; none of these imply
/// an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineReport {
    pub dropped_frames: usize,
    pub sign_flips: usize,
    pub outliers_rejected: usize,
    pub frames_velocity_limited: usize,
    pub rotations_clamped: usize,
}
