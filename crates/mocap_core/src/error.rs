use thiserror::Error;

/// Fatal conversion errors. Anything recoverable (a frame missing fields, a
/// joint with no counterpart bone, a degenerate SLERP) is logged and handled
/// locally instead; the pipeline either returns a complete track or one of
/// these.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("no frames with rotation data in the input sequence")]
    EmptySequence,
    #[error("expected {expected} joints per frame, got {got}")]
    JointCountMismatch { expected: usize, got: usize },
    #[error("rotation matrix at frame {frame}, joint {joint} is not orthonormal (deviation {deviation})")]
    NonOrthonormalRotation {
        frame: usize,
        joint: usize,
        deviation: f32,
    },
    #[error("no source joint mapped to any target bone, nothing to animate")]
    NoJointsMapped,
    #[error("target skeleton is empty")]
    EmptyTargetSkeleton,
    #[error("hand mean pose has shape {got:?}, expected ({expected}, 3)")]
    HandMeanShapeMismatch { expected: usize, got: (usize, usize) },
}
