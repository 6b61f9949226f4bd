use crate::error::StructuralError;
use nalgebra as na;
use ndarray as nd;

const ORTHONORMAL_TOL: f32 = 1e-3;

/// The estimator expresses rotations in the capture camera frame
/// (X-right, Y-down, Z-forward); the animation convention is Y-up. A 180
/// degree rotation about X, applied to the root only, flips between them.
const ROOT_AXIS_FIX: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];

/// Convert `(N, J, 3, 3)` rotation matrices to `(N, J, 4)` quaternions
/// `[w, x, y, z]`, applying the camera-to-world fix on the root joint.
///
/// # Errors
/// [`StructuralError::NonOrthonormalRotation`] if any input matrix deviates
/// from orthonormality by more than 1e-3.
pub fn quats_from_rotmats(rotmats: &nd::Array4<f32>) -> Result<nd::Array3<f32>, StructuralError> {
    let (n, j, _, _) = rotmats.dim();

    for frame in 0..n {
        for joint in 0..j {
            let deviation = orthonormal_deviation(rotmats.slice(nd::s![frame, joint, .., ..]));
            if deviation > ORTHONORMAL_TOL {
                return Err(StructuralError::NonOrthonormalRotation {
                    frame,
                    joint,
                    deviation,
                });
            }
        }
    }

    let fix = na::Matrix3::from_fn(|r, c| ROOT_AXIS_FIX[r][c]);
    let mut quats = nd::Array3::<f32>::zeros((n, j, 4));
    nd::Zip::from(quats.axis_iter_mut(nd::Axis(0)))
        .and(rotmats.axis_iter(nd::Axis(0)))
        .par_for_each(|mut quat_frame, rot_frame| {
            for joint in 0..j {
                let mut m = na::Matrix3::from_fn(|r, c| rot_frame[(joint, r, c)]);
                if joint == 0 {
                    m = fix * m;
                }
                let rot = na::Rotation3::from_matrix_unchecked(m);
                let q = na::UnitQuaternion::from_rotation_matrix(&rot);
                quat_frame[(joint, 0)] = q.w;
                quat_frame[(joint, 1)] = q.i;
                quat_frame[(joint, 2)] = q.j;
                quat_frame[(joint, 3)] = q.k;
            }
        });

    Ok(quats)
}

fn orthonormal_deviation(m: nd::ArrayView2<f32>) -> f32 {
    // max abs entry of R R^T - I
    let mut worst = 0.0f32;
    for r in 0..3 {
        for c in 0..3 {
            let mut acc = 0.0f32;
            for k in 0..3 {
                acc += m[(r, k)] * m[(c, k)];
            }
            let expected = if r == c { 1.0 } else { 0.0 };
            worst = worst.max((acc - expected).abs());
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity_rotmats(n: usize, j: usize) -> nd::Array4<f32> {
        let mut rot = nd::Array4::<f32>::zeros((n, j, 3, 3));
        for frame in 0..n {
            for joint in 0..j {
                for d in 0..3 {
                    rot[(frame, joint, d, d)] = 1.0;
                }
            }
        }
        rot
    }

    #[test]
    fn root_gets_the_axis_fix_and_children_do_not() {
        let rot = identity_rotmats(1, 2);
        let quats = quats_from_rotmats(&rot).unwrap();
        // root: identity composed with 180 degrees about X
        assert_relative_eq!(quats[(0, 0, 0)].abs(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(quats[(0, 0, 1)].abs(), 1.0, epsilon = 1e-6);
        // child: plain identity
        assert_relative_eq!(quats[(0, 1, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(quats[(0, 1, 1)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn outputs_are_unit_quaternions() {
        let mut rot = identity_rotmats(3, 4);
        // a real rotation: 90 degrees about Z on joint 2
        for frame in 0..3 {
            rot[(frame, 2, 0, 0)] = 0.0;
            rot[(frame, 2, 0, 1)] = -1.0;
            rot[(frame, 2, 1, 0)] = 1.0;
            rot[(frame, 2, 1, 1)] = 0.0;
        }
        let quats = quats_from_rotmats(&rot).unwrap();
        for frame in 0..3 {
            for joint in 0..4 {
                let row = quats.slice(nd::s![frame, joint, ..]);
                let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                assert_relative_eq!(norm, 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn non_orthonormal_input_is_rejected() {
        let mut rot = identity_rotmats(1, 2);
        rot[(0, 1, 0, 0)] = 1.5;
        let err = quats_from_rotmats(&rot);
        assert!(matches!(
            err,
            Err(StructuralError::NonOrthonormalRotation { frame: 0, joint: 1, .. })
        ));
    }
}
