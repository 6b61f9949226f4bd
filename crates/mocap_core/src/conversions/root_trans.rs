use crate::common::sequence::CameraTrack;
use log::{debug, info};
use mocap_utils::numerical::{odd_window, savgol_filter};
use ndarray as nd;

/// Side length of the square crop the estimator's camera is expressed in.
const CROP_SIZE: f32 = 224.0;

const SMOOTH_WINDOW: usize = 11;
const SMOOTH_ORDER: usize = 2;
const MIN_SMOOTH_WINDOW: usize = 5;

/// Back-project the weak-perspective camera track into a per-frame 3D root
/// displacement, relative to frame 0. Returns `None` when no camera
/// metadata survived ingestion; downstream treats that as root-stationary.
///
/// With detection-box data the image-space root position is reconstructed
/// and converted to world units through an averaged pixels-per-unit factor;
/// the average is a deliberate stability-over-accuracy tradeoff (a per-frame
/// factor would couple bbox jitter straight into translation). Without bbox
/// data the camera offsets themselves serve as a world-unit proxy.
pub fn estimate_root_translation(camera: &CameraTrack) -> Option<nd::Array2<f32>> {
    let mut translations = match camera {
        CameraTrack::Absent => {
            info!("no camera parameters, skipping root translation");
            return None;
        }
        CameraTrack::BboxCalibrated {
            cams,
            bbox_top_left,
            bbox_scale_ratio,
        } => bbox_calibrated(cams, bbox_top_left, bbox_scale_ratio),
        CameraTrack::WeakPerspective { cams } => fallback(cams),
    };

    let n = translations.dim().0;
    let window = odd_window(SMOOTH_WINDOW, n);
    if window >= MIN_SMOOTH_WINDOW {
        for axis in 0..3 {
            let channel: Vec<f32> = translations.column(axis).to_vec();
            let smoothed = savgol_filter(&channel, window, SMOOTH_ORDER);
            for (i, v) in smoothed.into_iter().enumerate() {
                translations[(i, axis)] = v;
            }
        }
    }
    Some(translations)
}

fn bbox_calibrated(
    cams: &nd::Array2<f32>,
    bbox_top_left: &nd::Array2<f32>,
    bbox_scale_ratio: &nd::Array1<f32>,
) -> nd::Array2<f32> {
    let n = cams.dim().0;

    // crop-space root position from [s, tx, ty], then undo the crop
    let mut x_img = nd::Array1::<f32>::zeros(n);
    let mut y_img = nd::Array1::<f32>::zeros(n);
    for i in 0..n {
        let x_crop = (cams[(i, 1)] + 1.0) / 2.0 * CROP_SIZE;
        // image y grows downward
        let y_crop = (1.0 - cams[(i, 2)]) / 2.0 * CROP_SIZE;
        x_img[i] = x_crop / bbox_scale_ratio[i] + bbox_top_left[(i, 0)];
        y_img[i] = y_crop / bbox_scale_ratio[i] + bbox_top_left[(i, 1)];
    }

    // sequence-averaged pixel-to-unit conversion
    let s_avg = cams.column(0).mean().unwrap_or(1.0);
    let sr_avg = bbox_scale_ratio.mean().unwrap_or(1.0);
    let crop_px = CROP_SIZE / sr_avg;
    let pix_per_unit = s_avg * crop_px / 2.0;
    debug!("root translation: pix_per_unit={pix_per_unit:.1} (s_avg={s_avg:.4}, sr_avg={sr_avg:.4})");

    let mut translations = nd::Array2::<f32>::zeros((n, 3));
    for i in 0..n {
        translations[(i, 0)] = (x_img[i] - x_img[0]) / pix_per_unit;
        // image-down maps to world-down negative
        translations[(i, 1)] = -(y_img[i] - y_img[0]) / pix_per_unit;
    }
    translations
}

fn fallback(cams: &nd::Array2<f32>) -> nd::Array2<f32> {
    let n = cams.dim().0;
    let mut translations = nd::Array2::<f32>::zeros((n, 3));
    for i in 0..n {
        translations[(i, 0)] = cams[(i, 1)] - cams[(0, 1)];
        translations[(i, 1)] = -(cams[(i, 2)] - cams[(0, 2)]);
    }
    translations
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_cams(n: usize, cam: [f32; 3]) -> nd::Array2<f32> {
        let mut cams = nd::Array2::<f32>::zeros((n, 3));
        for i in 0..n {
            cams.row_mut(i).assign(&nd::arr1(&cam));
        }
        cams
    }

    #[test]
    fn absent_camera_yields_no_track() {
        assert!(estimate_root_translation(&CameraTrack::Absent).is_none());
    }

    #[test]
    fn constant_camera_yields_all_zero_translation() {
        let track = CameraTrack::WeakPerspective {
            cams: constant_cams(20, [0.8, 0.3, -0.2]),
        };
        let trans = estimate_root_translation(&track).unwrap();
        assert_eq!(trans.dim(), (20, 3));
        for v in trans.iter() {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn constant_bbox_calibrated_camera_is_also_static() {
        let n = 12;
        let track = CameraTrack::BboxCalibrated {
            cams: constant_cams(n, [0.9, 0.1, 0.05]),
            bbox_top_left: nd::Array2::from_elem((n, 2), 40.0),
            bbox_scale_ratio: nd::Array1::from_elem(n, 0.5),
        };
        let trans = estimate_root_translation(&track).unwrap();
        for v in trans.iter() {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn fallback_tracks_are_relative_to_frame_zero() {
        let mut cams = constant_cams(8, [0.8, 0.0, 0.0]);
        for i in 0..8 {
            cams[(i, 1)] = 0.1 * i as f32;
        }
        let track = CameraTrack::WeakPerspective { cams };
        let trans = estimate_root_translation(&track).unwrap();
        assert_relative_eq!(trans[(0, 0)], 0.0, epsilon = 1e-5);
        // linear motion survives the quadratic smoother
        assert_relative_eq!(trans[(7, 0)], 0.7, epsilon = 1e-3);
    }

    #[test]
    fn short_tracks_skip_smoothing_but_still_report() {
        let track = CameraTrack::WeakPerspective {
            cams: constant_cams(3, [1.0, 0.2, 0.2]),
        };
        let trans = estimate_root_translation(&track).unwrap();
        assert_eq!(trans.dim(), (3, 3));
    }
}
