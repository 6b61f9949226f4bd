use crate::common::types::JointClass;
use enum_map::EnumMap;
use log::debug;
use mocap_utils::numerical::{odd_window, savgol_filter};
use ndarray as nd;
use ndarray::parallel::prelude::*;

const MIN_WINDOW: usize = 3;

/// Savitzky-Golay smoothing of every quaternion channel, with a
/// per-joint-class window. The hand detector is noisier than the body
/// branch, so wrists and fingers get the wide window.
///
/// Smoothing the four channels independently does not preserve unit norm,
/// so each row is renormalized afterwards. Tracks shorter than the minimum
/// window pass through unchanged.
pub fn smooth_tracks(
    quats: &mut nd::Array3<f32>,
    classes: &[JointClass],
    windows: &EnumMap<JointClass, usize>,
    order: usize,
) {
    let n = quats.dim().0;
    if n < MIN_WINDOW {
        return;
    }

    quats
        .axis_iter_mut(nd::Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(j, mut track)| {
            let window = odd_window(windows[classes[j]], n);
            if window < MIN_WINDOW {
                return;
            }
            for c in 0..4 {
                let channel: Vec<f32> = track.column(c).to_vec();
                let smoothed = savgol_filter(&channel, window, order);
                for (i, v) in smoothed.into_iter().enumerate() {
                    track[(i, c)] = v;
                }
            }
            for i in 0..n {
                let mut row = track.row_mut(i);
                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > f32::EPSILON {
                    row.mapv_inplace(|v| v / norm);
                }
            }
        });

    debug!("smoothed {} joint tracks over {n} frames", classes.len());
}
