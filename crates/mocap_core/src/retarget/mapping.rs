use super::skeleton::TargetSkeleton;
use crate::common::metadata::ModelMetadata;
use log::{debug, warn};
use std::collections::HashMap;

/// Source joints with no equivalent in standard humanoid target rigs.
const ALWAYS_SKIP: [&str; 3] = ["Jaw", "LeftEye", "RightEye"];

const SIDES: [&str; 2] = ["Left", "Right"];
const FINGERS: [&str; 5] = ["Thumb", "Index", "Middle", "Ring", "Pinky"];

/// Explicit source-name to target-name overrides, applied before exact
/// matching, for joints whose semantic name differs between skeletons.
#[derive(Default)]
pub struct RenameTable {
    entries: HashMap<String, String>,
}

impl RenameTable {
    /// Load user-supplied overrides from JSON `{ "source": "target", ... }`.
    ///
    /// # Errors
    /// Propagates JSON parse errors.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let custom: HashMap<String, String> = serde_json::from_str(json)?;
        let mut table = Self::default();
        table.entries.extend(custom);
        Ok(table)
    }

    pub fn insert(&mut self, source: &str, target: &str) {
        self.entries.insert(source.to_string(), target.to_string());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }
}

#[derive(Clone, Copy)]
pub struct MapEntry {
    pub source_joint: usize,
    pub target_bone: usize,
}

/// The resolved partial mapping from source joints to target bones.
/// Unmapped joints contribute no animation; their names are kept so the
/// exporter can report them to an operator.
pub struct BoneMap {
    pub entries: Vec<MapEntry>,
    pub skipped: Vec<String>,
}

impl BoneMap {
    /// Resolve each source joint against the target skeleton, in order:
    /// rename table, exact name match, finger naming pattern
    /// (`LeftIndex1` -> `LeftHandIndex1`). Jaw/eye joints are skipped
    /// outright.
    pub fn build(source: &ModelMetadata, target: &TargetSkeleton, renames: &RenameTable) -> Self {
        let mut entries = Vec::new();
        let mut skipped = Vec::new();

        for (joint, name) in source.joint_names.iter().enumerate() {
            if ALWAYS_SKIP.contains(&name.as_str()) {
                debug!("joint {name}: no counterpart in target topology, skipping");
                skipped.push(name.clone());
                continue;
            }
            let resolved = renames
                .get(name)
                .and_then(|renamed| target.bone_index(renamed))
                .or_else(|| target.bone_index(name))
                .or_else(|| finger_pattern(name).and_then(|alt| target.bone_index(&alt)));
            match resolved {
                Some(bone) => entries.push(MapEntry {
                    source_joint: joint,
                    target_bone: bone,
                }),
                None => {
                    warn!("joint {name}: no target bone found, skipping");
                    skipped.push(name.clone());
                }
            }
        }

        debug!("mapped {} joints, skipped {}", entries.len(), skipped.len());
        Self { entries, skipped }
    }
}

/// `{Side}{Finger}{Digit}` -> `{Side}Hand{Finger}{Digit}`, the common
/// difference between estimator joint names and humanoid rig bone names.
fn finger_pattern(name: &str) -> Option<String> {
    let side = SIDES.iter().find(|s| name.starts_with(*s))?;
    let rest = &name[side.len()..];
    let finger = FINGERS.iter().find(|f| rest.starts_with(*f))?;
    let digit = &rest[finger.len()..];
    if digit.len() == 1 && matches!(digit, "1" | "2" | "3") {
        Some(format!("{side}Hand{finger}{digit}"))
    } else {
        None
    }
}
