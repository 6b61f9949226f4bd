use nalgebra as na;

/// Savitzky-Golay smoothing of a single channel.
///
/// `window` must be odd and larger than `order`; the caller is expected to
/// clamp it to the track length first. Edges are handled by fitting a
/// polynomial to the first/last full window and evaluating it at the edge
/// positions (the same behavior as scipy's `mode="interp"` default).
///
/// Returns the input unchanged when the window is too small to fit or the
/// normal equations degenerate.
pub fn savgol_filter(data: &[f32], window: usize, order: usize) -> Vec<f32> {
    let n = data.len();
    if n < window || window < order + 2 || window % 2 == 0 {
        return data.to_vec();
    }
    let half = window / 2;

    let Some(weights) = central_weights(window, order) else {
        return data.to_vec();
    };

    let mut out = vec![0.0f32; n];

    // interior: convolution with the central weights
    for i in half..n - half {
        let mut acc = 0.0f64;
        for (k, w) in weights.iter().enumerate() {
            acc += w * f64::from(data[i - half + k]);
        }
        out[i] = acc as f32;
    }

    // edges: polynomial fit over the first/last window, evaluated in place
    let head = match polyfit(&data[..window], order) {
        Some(c) => c,
        None => return data.to_vec(),
    };
    for (i, v) in out.iter_mut().take(half).enumerate() {
        *v = polyval(&head, i as f64) as f32;
    }
    let tail = match polyfit(&data[n - window..], order) {
        Some(c) => c,
        None => return data.to_vec(),
    };
    for (off, v) in out.iter_mut().skip(n - half).enumerate() {
        *v = polyval(&tail, (half + 1 + off) as f64) as f32;
    }

    out
}

/// Central smoothing weights: row of the least-squares projector that
/// evaluates the fitted polynomial at the window center.
fn central_weights(window: usize, order: usize) -> Option<Vec<f64>> {
    let half = (window / 2) as i64;
    let a = na::DMatrix::<f64>::from_fn(window, order + 1, |r, c| {
        let x = (r as i64 - half) as f64;
        x.powi(c as i32)
    });
    let ata = a.transpose() * &a;
    let inv = ata.try_inverse()?;
    let proj = inv * a.transpose();
    // evaluating at x = 0 picks out the constant coefficient
    Some(proj.row(0).iter().copied().collect())
}

/// Least-squares fit of a polynomial over `y` sampled at x = 0..len-1.
/// Coefficients are returned lowest order first.
fn polyfit(y: &[f32], order: usize) -> Option<na::DVector<f64>> {
    let n = y.len();
    let a = na::DMatrix::<f64>::from_fn(n, order + 1, |r, c| (r as f64).powi(c as i32));
    let b = na::DVector::<f64>::from_fn(n, |r, _| f64::from(y[r]));
    let ata = a.transpose() * &a;
    let atb = a.transpose() * b;
    ata.try_inverse().map(|inv| inv * atb)
}

fn polyval(coeffs: &na::DVector<f64>, x: f64) -> f64 {
    let mut acc = 0.0;
    for c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

/// Largest odd window not exceeding `n`, starting from `preferred`.
pub fn odd_window(preferred: usize, n: usize) -> usize {
    let w = preferred.min(n);
    if w % 2 == 1 {
        w
    } else {
        w.saturating_sub(1)
    }
}
