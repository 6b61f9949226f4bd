use log::debug;
use ndarray as nd;
use ndarray::parallel::prelude::*;

const MIN_SIN_HALF: f32 = 1e-8;
// tolerance keeps the clamp idempotent under float rounding
const ANGLE_EPS: f32 = 1e-6;

/// Hard-limit each frame's total rotation to `max_angle` radians on the
/// given joints, independent of neighboring frames.
///
/// Spike and velocity filters both reason about change over time; a wrist
/// held fully inverted for fifty frames looks perfectly smooth to them.
/// This bound catches it. When a quaternion's angle `2*acos(|w|)` exceeds
/// the maximum, the vector part is rescaled so the angle lands exactly on
/// the maximum, keeping the rotation axis and the sign of w.
///
/// Re-applying the clamp to its own output is a no-op.
///
/// Returns the number of clamped rotations.
pub fn clamp_rotations(quats: &mut nd::Array3<f32>, joints: &[usize], max_angle: f32) -> usize {
    let n = quats.dim().0;
    if joints.is_empty() {
        return 0;
    }

    let clamped: usize = quats
        .axis_iter_mut(nd::Axis(1))
        .into_par_iter()
        .enumerate()
        .filter(|(j, _)| joints.contains(j))
        .map(|(_, mut track)| {
            let mut count = 0usize;
            for i in 0..n {
                let mut row = track.row_mut(i);
                let w = row[0];
                let angle = 2.0 * w.abs().clamp(0.0, 1.0).acos();
                if angle <= max_angle + ANGLE_EPS {
                    continue;
                }
                let old_sin = (angle / 2.0).sin();
                if old_sin <= MIN_SIN_HALF {
                    continue;
                }
                let half = max_angle / 2.0;
                let factor = half.sin() / old_sin;
                row[0] = half.cos().copysign(w);
                row[1] *= factor;
                row[2] *= factor;
                row[3] *= factor;
                count += 1;
            }
            count
        })
        .sum();

    debug!(
        "clamped {clamped} rotations on {} joints (max {:.0} deg)",
        joints.len(),
        max_angle.to_degrees()
    );
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mocap_utils::quat::{quat_from_row, rotation_angle};

    fn single_joint_track(rows: &[[f32; 4]]) -> nd::Array3<f32> {
        let mut quats = nd::Array3::<f32>::zeros((rows.len(), 1, 4));
        for (i, row) in rows.iter().enumerate() {
            quats.slice_mut(nd::s![i, 0, ..]).assign(&nd::arr1(row));
        }
        quats
    }

    fn quat_about_axis(angle: f32, axis: [f32; 3]) -> [f32; 4] {
        let s = (angle / 2.0).sin();
        [(angle / 2.0).cos(), s * axis[0], s * axis[1], s * axis[2]]
    }

    #[test]
    fn oversized_rotations_land_exactly_on_the_maximum() {
        let max = 120f32.to_radians();
        let mut quats = single_joint_track(&[quat_about_axis(2.8, [0.0, 1.0, 0.0])]);
        let clamped = clamp_rotations(&mut quats, &[0], max);
        assert_eq!(clamped, 1);

        let q = quat_from_row(quats.slice(nd::s![0, 0, ..]));
        assert_relative_eq!(rotation_angle(&q), max, epsilon = 1e-5);
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-6);
        // axis preserved
        assert!(q.z > 0.0);
        assert_relative_eq!(q.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn clamping_is_idempotent() {
        let max = 120f32.to_radians();
        let mut quats = single_joint_track(&[
            quat_about_axis(3.0, [1.0, 0.0, 0.0]),
            quat_about_axis(0.5, [0.0, 0.0, 1.0]),
        ]);
        clamp_rotations(&mut quats, &[0], max);
        let once = quats.clone();
        let second = clamp_rotations(&mut quats, &[0], max);
        assert_eq!(second, 0);
        assert_eq!(quats, once);
    }

    #[test]
    fn negative_w_keeps_its_sign() {
        let max = 120f32.to_radians();
        let q = quat_about_axis(3.0, [1.0, 0.0, 0.0]);
        let mut quats = single_joint_track(&[[-q[0], -q[1], -q[2], -q[3]]]);
        clamp_rotations(&mut quats, &[0], max);
        let out = quat_from_row(quats.slice(nd::s![0, 0, ..]));
        assert!(out.x < 0.0);
        assert_relative_eq!(rotation_angle(&out), max, epsilon = 1e-5);
    }

    #[test]
    fn small_rotations_are_untouched() {
        let mut quats = single_joint_track(&[quat_about_axis(0.4, [1.0, 0.0, 0.0])]);
        let before = quats.clone();
        assert_eq!(clamp_rotations(&mut quats, &[0], 120f32.to_radians()), 0);
        assert_eq!(quats, before);
    }
}
