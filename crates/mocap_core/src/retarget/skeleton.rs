use log::warn;
use nalgebra as na;
use serde::Deserialize;

const REST_ORTHONORMAL_TOL: f32 = 1e-3;

/// One bone of the target armature. `rest` is the bone's armature-space
/// rest orientation; `None` marks a degenerate rest frame the retargeter
/// must skip.
pub struct TargetBone {
    pub name: String,
    pub parent: Option<usize>,
    pub rest: Option<na::UnitQuaternion<f32>>,
}

/// The armature the animation is re-expressed onto. Unlike the source
/// skeleton, bones here carry arbitrary limb-aligned rest orientations.
pub struct TargetSkeleton {
    pub bones: Vec<TargetBone>,
}

impl TargetSkeleton {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn parent_rest(&self, bone: usize) -> Option<na::UnitQuaternion<f32>> {
        let parent = self.bones[bone].parent?;
        self.bones[parent].rest
    }

    /// Build from per-bone armature-space rest rotation matrices. A matrix
    /// that is not orthonormal yields a bone with no recoverable rest
    /// orientation; the retargeter will skip it with a warning.
    pub fn from_rest_matrices(bones: Vec<(String, Option<usize>, na::Matrix3<f32>)>) -> Self {
        let bones = bones
            .into_iter()
            .map(|(name, parent, m)| {
                let rest = rest_quat_from_matrix(&m);
                if rest.is_none() {
                    warn!("target bone {name}: degenerate rest matrix");
                }
                TargetBone { name, parent, rest }
            })
            .collect();
        Self { bones }
    }

    /// Load a target skeleton description from JSON (see [`TargetBoneSpec`]).
    ///
    /// # Errors
    /// Propagates JSON syntax/shape errors; a spec naming an unknown parent
    /// is reported through `serde_json::Error` semantics by the caller.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let specs: Vec<TargetBoneSpec> = serde_json::from_str(json)?;
        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let bones = specs
            .into_iter()
            .map(|spec| {
                let parent = spec
                    .parent
                    .as_ref()
                    .and_then(|p| names.iter().position(|n| n == p));
                if spec.parent.is_some() && parent.is_none() {
                    warn!(
                        "target bone {}: parent {:?} not found, treating as root",
                        spec.name, spec.parent
                    );
                }
                let q = na::Quaternion::new(spec.rest[0], spec.rest[1], spec.rest[2], spec.rest[3]);
                let rest = if q.norm() > f32::EPSILON {
                    Some(na::UnitQuaternion::new_normalize(q))
                } else {
                    warn!("target bone {}: zero rest quaternion", spec.name);
                    None
                };
                TargetBone {
                    name: spec.name,
                    parent,
                    rest,
                }
            })
            .collect();
        Ok(Self { bones })
    }
}

/// JSON description of one target bone: armature-space rest orientation as
/// `[w, x, y, z]` plus the parent bone's name.
#[derive(Deserialize)]
pub struct TargetBoneSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub rest: [f32; 4],
}

fn rest_quat_from_matrix(m: &na::Matrix3<f32>) -> Option<na::UnitQuaternion<f32>> {
    let deviation = (m * m.transpose() - na::Matrix3::identity()).abs().max();
    if deviation > REST_ORTHONORMAL_TOL || m.determinant() < 0.0 {
        return None;
    }
    let rot = na::Rotation3::from_matrix_unchecked(*m);
    Some(na::UnitQuaternion::from_rotation_matrix(&rot))
}
