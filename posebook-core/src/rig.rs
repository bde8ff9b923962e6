//! Host skeleton surface
//!
//! The core never owns the skeleton it poses. Everything it needs is behind
//! the [`Rig`] trait: bone lookup by name or external alias, rest and pose
//! matrices, the per-bone local channels, visibility and driver information.
//! [`Armature`] is an in-memory implementation loadable from JSON or TOML.

use glam::{DMat4, DVec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::transform::{LocalRotation, Transform};

/// Local channels of one bone, rotation kept in the bone's own mode
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalPose {
    #[serde(default)]
    pub location: DVec3,
    #[serde(default)]
    pub rotation: LocalRotation,
    #[serde(default = "default_scale")]
    pub scale: DVec3,
}

fn default_scale() -> DVec3 {
    DVec3::ONE
}

impl Default for LocalPose {
    fn default() -> Self {
        Self {
            location: DVec3::ZERO,
            rotation: LocalRotation::default(),
            scale: DVec3::ONE,
        }
    }
}

impl LocalPose {
    pub fn to_transform(&self) -> Transform {
        Transform::new(self.location, self.rotation.to_quat(), self.scale)
    }
}

/// Query / mutation surface of a host skeleton.
///
/// Bone names are weak references: every method taking a bone name tolerates
/// unknown names (returning `None` / `false`).
pub trait Rig {
    fn name(&self) -> &str;

    /// All bone names in host order
    fn bone_names(&self) -> Vec<String>;

    fn has_bone(&self, bone: &str) -> bool;

    /// Armature-space rest (bind) matrix
    fn rest_matrix(&self, bone: &str) -> Option<DMat4>;

    /// Armature-space matrix of the bone in its current pose
    fn pose_matrix(&self, bone: &str) -> Option<DMat4>;

    /// Object-to-world matrix of the whole rig
    fn world_matrix(&self) -> DMat4;

    fn local_pose(&self, bone: &str) -> Option<LocalPose>;

    /// Write a transform into the bone's channels, respecting its rotation mode
    fn set_local_transform(&mut self, bone: &str, transform: &Transform) -> bool;

    fn is_visible(&self, bone: &str) -> bool;

    /// Data paths of all valid drivers on the rig
    fn driver_paths(&self) -> Vec<String>;

    /// Name of the bone in the external model tool, if it has one
    fn external_name(&self, bone: &str) -> Option<String>;

    /// Host bone name for an external-tool name
    fn find_by_external_name(&self, external: &str) -> Option<String>;

    /// External model bone id; negative when unassigned
    fn bone_id(&self, bone: &str) -> Option<i32>;

    fn set_bone_id(&mut self, bone: &str, id: i32) -> bool;

    /// Rig is displayed in its rest position rather than posed
    fn is_rest_position(&self) -> bool;

    /// Local channels collapsed to a [`Transform`]
    fn local_transform(&self, bone: &str) -> Option<Transform> {
        self.local_pose(bone).map(|p| p.to_transform())
    }

    /// Reset every bone to identity
    fn reset_pose(&mut self) {
        for bone in self.bone_names() {
            self.set_local_transform(&bone, &Transform::IDENTITY);
        }
    }

    /// Resolve a name that may be either an external alias or a host name
    fn resolve_bone(&self, name: &str) -> Option<String> {
        self.find_by_external_name(name)
            .or_else(|| self.has_bone(name).then(|| name.to_string()))
    }
}

// ============================================================================
// Armature
// ============================================================================

/// One bone of an [`Armature`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigBone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Armature-space rest matrix
    #[serde(default = "identity_matrix")]
    pub rest: DMat4,
    #[serde(default)]
    pub pose: LocalPose,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub external_name: Option<String>,
    #[serde(default = "unassigned_id")]
    pub bone_id: i32,
}

fn identity_matrix() -> DMat4 {
    DMat4::IDENTITY
}

fn default_visible() -> bool {
    true
}

fn unassigned_id() -> i32 {
    -1
}

impl RigBone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest: DMat4::IDENTITY,
            pose: LocalPose::default(),
            visible: true,
            external_name: None,
            bone_id: -1,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_rest(mut self, rest: DMat4) -> Self {
        self.rest = rest;
        self
    }

    pub fn with_rotation(mut self, rotation: LocalRotation) -> Self {
        self.pose.rotation = rotation;
        self
    }

    pub fn with_external_name(mut self, external: impl Into<String>) -> Self {
        self.external_name = Some(external.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct ArmatureData {
    name: String,
    #[serde(default = "identity_matrix")]
    world: DMat4,
    #[serde(default)]
    rest_position: bool,
    #[serde(default)]
    bones: Vec<RigBone>,
    #[serde(default)]
    drivers: Vec<String>,
}

/// In-memory skeleton used by tests and the CLI
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "ArmatureData", into = "ArmatureData")]
pub struct Armature {
    pub name: String,
    pub world: DMat4,
    pub rest_position: bool,
    bones: Vec<RigBone>,
    pub drivers: Vec<String>,
    index: HashMap<String, usize>,
}

impl From<ArmatureData> for Armature {
    fn from(data: ArmatureData) -> Self {
        let mut armature = Armature {
            name: data.name,
            world: data.world,
            rest_position: data.rest_position,
            bones: data.bones,
            drivers: data.drivers,
            index: HashMap::new(),
        };
        armature.rebuild_index();
        armature
    }
}

impl From<Armature> for ArmatureData {
    fn from(armature: Armature) -> Self {
        ArmatureData {
            name: armature.name,
            world: armature.world,
            rest_position: armature.rest_position,
            bones: armature.bones,
            drivers: armature.drivers,
        }
    }
}

impl Armature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: DMat4::IDENTITY,
            rest_position: false,
            bones: Vec::new(),
            drivers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a bone; a bone with the same name is replaced
    pub fn with_bone(mut self, bone: RigBone) -> Self {
        self.add_bone(bone);
        self
    }

    pub fn add_bone(&mut self, bone: RigBone) {
        match self.index.get(&bone.name) {
            Some(&i) => self.bones[i] = bone,
            None => {
                self.index.insert(bone.name.clone(), self.bones.len());
                self.bones.push(bone);
            }
        }
    }

    pub fn bones(&self) -> &[RigBone] {
        &self.bones
    }

    pub fn bone(&self, name: &str) -> Option<&RigBone> {
        self.index.get(name).map(|&i| &self.bones[i])
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut RigBone> {
        self.index.get(name).map(|&i| &mut self.bones[i])
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
    }

    /// Armature-space pose matrix: parent pose · parent-relative rest · basis.
    /// `depth` guards against malformed parent cycles.
    fn pose_matrix_at(&self, bone: &RigBone, depth: usize) -> DMat4 {
        let basis = bone.pose.to_transform().to_matrix();
        let parent = bone
            .parent
            .as_deref()
            .and_then(|p| self.bone(p))
            .filter(|_| depth < self.bones.len());
        match parent {
            Some(parent) => {
                let parent_pose = self.pose_matrix_at(parent, depth + 1);
                parent_pose * parent.rest.inverse() * bone.rest * basis
            }
            None => bone.rest * basis,
        }
    }
}

impl Rig for Armature {
    fn name(&self) -> &str {
        &self.name
    }

    fn bone_names(&self) -> Vec<String> {
        self.bones.iter().map(|b| b.name.clone()).collect()
    }

    fn has_bone(&self, bone: &str) -> bool {
        self.index.contains_key(bone)
    }

    fn rest_matrix(&self, bone: &str) -> Option<DMat4> {
        self.bone(bone).map(|b| b.rest)
    }

    fn pose_matrix(&self, bone: &str) -> Option<DMat4> {
        let bone = self.bone(bone)?;
        if self.rest_position {
            Some(bone.rest)
        } else {
            Some(self.pose_matrix_at(bone, 0))
        }
    }

    fn world_matrix(&self) -> DMat4 {
        self.world
    }

    fn local_pose(&self, bone: &str) -> Option<LocalPose> {
        self.bone(bone).map(|b| b.pose)
    }

    fn set_local_transform(&mut self, bone: &str, transform: &Transform) -> bool {
        let Some(bone) = self.bone_mut(bone) else {
            return false;
        };
        let mode = bone.pose.rotation.mode();
        bone.pose = LocalPose {
            location: transform.location(),
            rotation: LocalRotation::from_quat(mode, transform.rotation()),
            scale: transform.scale(),
        };
        true
    }

    fn is_visible(&self, bone: &str) -> bool {
        self.bone(bone).is_some_and(|b| b.visible)
    }

    fn driver_paths(&self) -> Vec<String> {
        self.drivers.clone()
    }

    fn external_name(&self, bone: &str) -> Option<String> {
        self.bone(bone).and_then(|b| b.external_name.clone())
    }

    fn find_by_external_name(&self, external: &str) -> Option<String> {
        self.bones
            .iter()
            .find(|b| b.external_name.as_deref() == Some(external))
            .map(|b| b.name.clone())
    }

    fn bone_id(&self, bone: &str) -> Option<i32> {
        self.bone(bone).map(|b| b.bone_id)
    }

    fn set_bone_id(&mut self, bone: &str, id: i32) -> bool {
        match self.bone_mut(bone) {
            Some(b) => {
                b.bone_id = id;
                true
            }
            None => false,
        }
    }

    fn is_rest_position(&self) -> bool {
        self.rest_position
    }
}
