//! Capturing poses from a rig, applying them, and blending a whole book
//!
//! Blending is morph-style: per bone, locations sum linearly, rotations sum
//! their XYZ Euler components and convert back to a quaternion once at the
//! end, and scales sum their offsets from one. The Euler sum is not a proper
//! rotation composition; existing libraries are authored against it.

use glam::{DQuat, DVec3};
use hashbrown::HashMap;

use crate::model::{BoneEntry, Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::{DEFAULT_THRESHOLD, EulerOrder, Transform, euler_to_quat, quat_to_euler};

// ============================================================================
// Capture
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureOptions {
    /// Skip bones hidden in the host viewport
    pub ignore_hidden: bool,
    /// Skip bones whose location / rotation / scale is driven
    pub ignore_driven: bool,
    /// Tolerance of the "differs from identity" test
    pub threshold: f64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            ignore_hidden: true,
            ignore_driven: true,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Driver paths that touch a transform channel
fn transform_driver_paths<R: Rig + ?Sized>(rig: &R) -> Vec<String> {
    rig.driver_paths()
        .into_iter()
        .filter(|p| p.contains(".loc") || p.contains(".rot") || p.contains(".sca"))
        .collect()
}

fn is_driven(bone: &str, driver_paths: &[String]) -> bool {
    let needle = format!("bones[\"{bone}\"]");
    driver_paths.iter().any(|p| p.contains(&needle))
}

/// Bones of the rig whose local transform differs from identity, in rig order
pub fn capture<R: Rig + ?Sized>(rig: &R, options: &CaptureOptions) -> Vec<BoneEntry> {
    let driver_paths = if options.ignore_driven {
        transform_driver_paths(rig)
    } else {
        Vec::new()
    };

    let mut bones = Vec::new();
    for name in rig.bone_names() {
        let Some(transform) = rig.local_transform(&name) else {
            continue;
        };
        if !transform.has_transform(options.threshold) {
            continue;
        }
        if options.ignore_hidden && !rig.is_visible(&name) {
            tracing::debug!("Skipping hidden bone '{}'", name);
            continue;
        }
        if options.ignore_driven && is_driven(&name, &driver_paths) {
            tracing::debug!("Skipping driven bone '{}'", name);
            continue;
        }
        bones.push(BoneEntry::new(name, transform));
    }
    bones
}

// ============================================================================
// Apply
// ============================================================================

/// How [`apply_pose`] combines with what is already on the rig
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// Overwrite: location and scale offset scaled by influence, rotation
    /// slerped from identity
    #[default]
    Replace,
    /// Add onto the current channels, rotation slerped from the current one
    Additive,
}

/// Write one pose onto the rig at `influence`. Bones missing from the rig are
/// skipped. Returns the number of bones written.
pub fn apply_pose<R: Rig + ?Sized>(
    pose: &Pose,
    rig: &mut R,
    influence: f64,
    reset_others: bool,
    mode: ApplyMode,
) -> usize {
    if reset_others {
        rig.reset_pose();
    }

    let mut applied = 0;
    for bone in pose.bones() {
        let Some(current) = rig.local_transform(&bone.name) else {
            tracing::debug!("Bone '{}' not found in '{}'", bone.name, rig.name());
            continue;
        };
        let t = &bone.transform;
        let loc_diff = t.location() * influence;
        let sca_diff = (t.scale() - DVec3::ONE) * influence;

        let result = match mode {
            ApplyMode::Replace => Transform::new(
                loc_diff,
                DQuat::IDENTITY.slerp(t.rotation(), influence),
                sca_diff + DVec3::ONE,
            ),
            ApplyMode::Additive => Transform::new(
                current.location() + loc_diff,
                current.rotation().slerp(t.rotation(), influence),
                current.scale() + sca_diff,
            ),
        };
        rig.set_local_transform(&bone.name, &result);
        applied += 1;
    }
    applied
}

// ============================================================================
// Blend
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct Accum {
    location: DVec3,
    euler: DVec3,
    scale_offset: DVec3,
}

impl Accum {
    const ZERO: Self = Self {
        location: DVec3::ZERO,
        euler: DVec3::ZERO,
        scale_offset: DVec3::ZERO,
    };
}

/// Net per-bone transforms of a blended book, in first-seen bone order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlendResult {
    bones: Vec<BoneEntry>,
}

impl BlendResult {
    pub fn bones(&self) -> &[BoneEntry] {
        &self.bones
    }

    pub fn get(&self, bone: &str) -> Option<&Transform> {
        self.bones.iter().find(|b| b.name == bone).map(|b| &b.transform)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Blend every pose of `book` by its weight.
///
/// Every bone named by any pose appears in the result, even when all of its
/// contributing weights are zero; such bones come back as identity so that
/// applying the result clears poses that were switched off.
pub fn blend(book: &PoseBook) -> BlendResult {
    let mut order: Vec<String> = Vec::new();
    let mut accum: HashMap<String, Accum> = HashMap::new();

    for pose in book.poses() {
        let weight = pose.weight;
        for bone in pose.bones() {
            let entry = accum.entry(bone.name.clone()).or_insert_with(|| {
                order.push(bone.name.clone());
                Accum::ZERO
            });
            if weight == 0.0 {
                continue;
            }

            let t = &bone.transform;
            entry.location += t.location() * weight;
            if t.rotation() != DQuat::IDENTITY {
                entry.euler += quat_to_euler(EulerOrder::XYZ, t.rotation()) * weight;
            }
            entry.scale_offset += (t.scale() - DVec3::ONE) * weight;
        }
    }

    let bones = order
        .into_iter()
        .map(|name| {
            let a = accum.get(&name).copied().unwrap_or(Accum::ZERO);
            let transform = Transform::new(
                a.location,
                euler_to_quat(EulerOrder::XYZ, a.euler),
                DVec3::ONE + a.scale_offset,
            );
            BoneEntry::new(name, transform)
        })
        .collect();
    BlendResult { bones }
}

/// Write a blend result onto the rig; bones the rig lacks are skipped.
/// Returns the number of bones written.
pub fn apply_blend<R: Rig + ?Sized>(result: &BlendResult, rig: &mut R) -> usize {
    let mut applied = 0;
    for bone in result.bones() {
        if rig.set_local_transform(&bone.name, &bone.transform) {
            applied += 1;
        } else {
            tracing::debug!("Bone '{}' not found in '{}'", bone.name, rig.name());
        }
    }
    applied
}
