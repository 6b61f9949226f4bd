use mocap_utils::quat::quat_from_row;
use ndarray as nd;
use ndarray::parallel::prelude::*;

/// Remove the quaternion double-cover sign ambiguity: walk each joint's
/// track and negate any frame whose dot with its predecessor is negative.
/// `q` and `-q` are the same rotation, but channel-wise smoothing is not
/// sign-blind, so all later stages rely on this running first.
///
/// Returns the number of sign flips applied (diagnostic only).
pub fn fix_signs(quats: &mut nd::Array3<f32>) -> usize {
    quats
        .axis_iter_mut(nd::Axis(1))
        .into_par_iter()
        .map(|mut joint_track| {
            let n = joint_track.dim().0;
            let mut flips = 0usize;
            for i in 1..n {
                let prev = quat_from_row(joint_track.row(i - 1));
                let cur = quat_from_row(joint_track.row(i));
                if cur.dot(&prev) < 0.0 {
                    let mut row = joint_track.row_mut(i);
                    row.mapv_inplace(|v| -v);
                    flips += 1;
                }
            }
            flips
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_from_rows(rows: &[[f32; 4]]) -> nd::Array3<f32> {
        let n = rows.len();
        let mut quats = nd::Array3::<f32>::zeros((n, 1, 4));
        for (i, row) in rows.iter().enumerate() {
            quats.slice_mut(nd::s![i, 0, ..]).assign(&nd::arr1(row));
        }
        quats
    }

    #[test]
    fn alternating_signs_are_flattened() {
        let q = [0.9238795, 0.3826834, 0.0, 0.0]; // 45 degrees about x
        let rows: Vec<[f32; 4]> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    q
                } else {
                    [-q[0], -q[1], -q[2], -q[3]]
                }
            })
            .collect();
        let mut quats = track_from_rows(&rows);
        let flips = fix_signs(&mut quats);
        assert_eq!(flips, 15);

        // no residual discontinuity: consecutive rows agree up to rounding
        // (dot is the right measure here, acos of a near-1 dot floors well
        // above zero in f32)
        for i in 1..30usize {
            let prev = quat_from_row(quats.slice(nd::s![i - 1, 0, ..]));
            let cur = quat_from_row(quats.slice(nd::s![i, 0, ..]));
            assert!(cur.dot(&prev) > 1.0 - 1e-6);
        }

        // running again finds nothing left to fix
        assert_eq!(fix_signs(&mut quats), 0);
    }

    #[test]
    fn continuous_tracks_are_untouched() {
        let rows = vec![[1.0, 0.0, 0.0, 0.0]; 10];
        let mut quats = track_from_rows(&rows);
        assert_eq!(fix_signs(&mut quats), 0);
    }
}
