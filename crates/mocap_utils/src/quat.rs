use nalgebra as na;
use ndarray as nd;

/// Raw quaternion as stored in the track arrays: `[w, x, y, z]`.
/// The vector lanes follow storage order, so `.x` holds the scalar w.
/// Not necessarily unit length; the cleanup stages renormalize where needed.
pub type RawQuat = na::Vector4<f32>;

pub fn quat_from_row(row: nd::ArrayView1<f32>) -> RawQuat {
    na::Vector4::new(row[0], row[1], row[2], row[3])
}

pub fn assign_quat(mut row: nd::ArrayViewMut1<f32>, q: &RawQuat) {
    row[0] = q.x;
    row[1] = q.y;
    row[2] = q.z;
    row[3] = q.w;
}

/// Convert a `[w,x,y,z]` raw quaternion to a nalgebra unit quaternion,
/// renormalizing on the way.
pub fn unit_from_raw(q: &RawQuat) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::new_normalize(na::Quaternion::new(q.x, q.y, q.z, q.w))
}

pub fn raw_from_unit(q: &na::UnitQuaternion<f32>) -> RawQuat {
    na::Vector4::new(q.w, q.i, q.j, q.k)
}

/// Rotation angle encoded by a unit quaternion, in radians: `2*acos(|w|)`.
/// Insensitive to the double-cover sign.
pub fn rotation_angle(q: &RawQuat) -> f32 {
    2.0 * q.x.abs().clamp(0.0, 1.0).acos()
}

/// Angular difference between two unit quaternions in radians,
/// `2*acos(|a . b|)`, insensitive to hemisphere.
pub fn angular_delta(a: &RawQuat, b: &RawQuat) -> f32 {
    let dot = a.dot(b).abs().clamp(0.0, 1.0);
    2.0 * dot.acos()
}

/// Shortest-arc SLERP between two unit quaternions.
///
/// Falls back to normalized LERP when the quaternions are nearly parallel,
/// where the sine denominator degenerates.
pub fn slerp(q0: &RawQuat, q1: &RawQuat, t: f32) -> RawQuat {
    let mut q1 = *q1;
    let mut dot = q0.dot(&q1);
    if dot < 0.0 {
        q1 = -q1;
        dot = -dot;
    }
    let dot = dot.clamp(0.0, 1.0);
    if dot > 0.9995 {
        let out = q0 + (q1 - q0) * t;
        return out.normalize();
    }
    let theta = dot.acos();
    let sin_theta = theta.sin();
    (q0 * ((1.0 - t) * theta).sin() + q1 * (t * theta).sin()) / sin_theta
}

/// SLERP from `q_from` toward `q_to`, but never rotating by more than
/// `max_angle` radians. Returns the (possibly hemisphere-corrected) result
/// and whether limiting kicked in.
pub fn slerp_step(q_from: &RawQuat, q_to: &RawQuat, max_angle: f32) -> (RawQuat, bool) {
    let mut q_to = *q_to;
    let mut dot = q_from.dot(&q_to);
    if dot < 0.0 {
        q_to = -q_to;
        dot = -dot;
    }
    let dot = dot.min(1.0);
    let angle = 2.0 * dot.acos();
    if angle <= max_angle {
        return (q_to, false);
    }
    let t = max_angle / angle;
    let out = if dot > 0.9995 {
        q_from + (q_to - q_from) * t
    } else {
        let theta = dot.acos();
        let sin_theta = theta.sin();
        (q_from * ((1.0 - t) * theta).sin() + q_to * (t * theta).sin()) / sin_theta
    };
    (out.normalize(), true)
}
