use log::debug;
use mocap_utils::quat::{angular_delta, assign_quat, quat_from_row, slerp};
use ndarray as nd;
use ndarray::parallel::prelude::*;

/// Detect and repair rotation spikes on the noise-prone joints.
///
/// A frame is marked an outlier when its angular delta from the previous
/// frame exceeds `max_delta` radians. Marked runs are replaced by SLERP
/// between the nearest clean frames on either side; a run touching the
/// track boundary takes the value of its one clean side, and a track that
/// is outliers end to end is left alone.
///
/// A genuine fast transition where both neighbors disagree is flattened
/// too; over-rejection is preferred to letting a detector glitch through.
///
/// Returns the number of repaired frames.
pub fn reject_outliers(quats: &mut nd::Array3<f32>, joints: &[usize], max_delta: f32) -> usize {
    let n = quats.dim().0;
    if n < 3 || joints.is_empty() {
        return 0;
    }

    let rejected: usize = quats
        .axis_iter_mut(nd::Axis(1))
        .into_par_iter()
        .enumerate()
        .filter(|(j, _)| joints.contains(j))
        .map(|(_, mut track)| reject_joint(&mut track, max_delta))
        .sum();

    debug!(
        "rejected {rejected} outlier frames across {} joints (threshold {:.0} deg)",
        joints.len(),
        max_delta.to_degrees()
    );
    rejected
}

fn reject_joint(track: &mut nd::ArrayViewMut2<f32>, max_delta: f32) -> usize {
    let n = track.dim().0;
    let mut outlier = vec![false; n];
    for i in 1..n {
        let prev = quat_from_row(track.row(i - 1));
        let cur = quat_from_row(track.row(i));
        if angular_delta(&cur, &prev) > max_delta {
            outlier[i] = true;
        }
    }
    if !outlier.iter().any(|&o| o) {
        return 0;
    }

    let mut repaired = 0usize;
    for idx in 0..n {
        if !outlier[idx] {
            continue;
        }
        let before = (0..idx).rev().find(|&i| !outlier[i]);
        let after = (idx + 1..n).find(|&i| !outlier[i]);
        match (before, after) {
            (None, None) => {} // the whole track is outliers, nothing to anchor on
            (Some(b), None) => {
                let q = quat_from_row(track.row(b));
                assign_quat(track.row_mut(idx), &q);
                repaired += 1;
            }
            (None, Some(a)) => {
                let q = quat_from_row(track.row(a));
                assign_quat(track.row_mut(idx), &q);
                repaired += 1;
            }
            (Some(b), Some(a)) => {
                let t = (idx - b) as f32 / (a - b) as f32;
                let q0 = quat_from_row(track.row(b));
                let q1 = quat_from_row(track.row(a));
                let q = slerp(&q0, &q1, t);
                assign_quat(track.row_mut(idx), &q);
                repaired += 1;
            }
        }
    }
    repaired
}
