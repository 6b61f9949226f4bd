use log::debug;
use mocap_utils::quat::{assign_quat, quat_from_row, slerp_step};
use ndarray as nd;
use ndarray::parallel::prelude::*;

/// Cap the frame-to-frame rotation of the given joints to `max_delta`
/// radians per frame by partial SLERP toward each frame's target.
///
/// Unlike outlier rejection this handles sustained level shifts: a held
/// wrong orientation has no clean neighbor to interpolate through, but it
/// can be turned into a bounded ramp. A forward pass alone would make every
/// correction lag the motion, so a backward pass with the same rule runs
/// afterwards. Both passes are strictly sequential within a joint.
///
/// Returns the number of limited frames.
pub fn limit_angular_velocity(quats: &mut nd::Array3<f32>, joints: &[usize], max_delta: f32) -> usize {
    let n = quats.dim().0;
    if n < 2 || joints.is_empty() {
        return 0;
    }

    let limited: usize = quats
        .axis_iter_mut(nd::Axis(1))
        .into_par_iter()
        .enumerate()
        .filter(|(j, _)| joints.contains(j))
        .map(|(_, mut track)| {
            let mut count = 0usize;
            for i in 1..n {
                let prev = quat_from_row(track.row(i - 1));
                let cur = quat_from_row(track.row(i));
                let (out, was_limited) = slerp_step(&prev, &cur, max_delta);
                assign_quat(track.row_mut(i), &out);
                if was_limited {
                    count += 1;
                }
            }
            for i in (0..n - 1).rev() {
                let next = quat_from_row(track.row(i + 1));
                let cur = quat_from_row(track.row(i));
                let (out, was_limited) = slerp_step(&next, &cur, max_delta);
                assign_quat(track.row_mut(i), &out);
                if was_limited {
                    count += 1;
                }
            }
            count
        })
        .sum();

    debug!(
        "velocity-limited {limited} frames on {} joints (cap {:.0} deg/frame)",
        joints.len(),
        max_delta.to_degrees()
    );
    limited
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap_utils::quat::angular_delta;

    fn quat_about_x(angle: f32) -> [f32; 4] {
        [(angle / 2.0).cos(), (angle / 2.0).sin(), 0.0, 0.0]
    }

    fn single_joint_track(rows: &[[f32; 4]]) -> nd::Array3<f32> {
        let mut quats = nd::Array3::<f32>::zeros((rows.len(), 1, 4));
        for (i, row) in rows.iter().enumerate() {
            quats.slice_mut(nd::s![i, 0, ..]).assign(&nd::arr1(row));
        }
        quats
    }

    #[test]
    fn post_condition_bounds_every_consecutive_delta() {
        // a level shift: identity for 10 frames, then 120 degrees held
        let mut rows = vec![quat_about_x(0.0); 10];
        rows.extend(vec![quat_about_x(2.0); 10]);
        let mut quats = single_joint_track(&rows);

        let cap = 30f32.to_radians();
        let limited = limit_angular_velocity(&mut quats, &[0], cap);
        assert!(limited > 0);

        for i in 1..20 {
            let prev = quat_from_row(quats.slice(nd::s![i - 1, 0, ..]));
            let cur = quat_from_row(quats.slice(nd::s![i, 0, ..]));
            assert!(angular_delta(&cur, &prev) <= cap + 1e-6);
        }
    }

    #[test]
    fn slow_motion_passes_through() {
        let rows: Vec<[f32; 4]> = (0..10).map(|i| quat_about_x(0.05 * i as f32)).collect();
        let mut quats = single_joint_track(&rows);
        let limited = limit_angular_velocity(&mut quats, &[0], 30f32.to_radians());
        assert_eq!(limited, 0);
    }

    #[test]
    fn joints_outside_the_set_are_untouched() {
        let rows = vec![quat_about_x(0.0), quat_about_x(2.0)];
        let mut quats = single_joint_track(&rows);
        let before = quats.clone();
        assert_eq!(limit_angular_velocity(&mut quats, &[], 0.1), 0);
        assert_eq!(quats, before);
    }
}
