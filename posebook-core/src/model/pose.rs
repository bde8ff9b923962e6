use serde::{Deserialize, Serialize};

use super::{BoneEntry, PoseId, clamp_index, index_after_removal};
use crate::blend::{CaptureOptions, capture};
use crate::category::PoseCategory;
use crate::naming::{RenameOutcome, Renamer, resolve_name_collision};
use crate::rig::Rig;
use crate::transform::Transform;

/// A named sparse set of per-bone offsets
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pose {
    #[serde(skip, default = "PoseId::next")]
    id: PoseId,
    name: String,
    /// Alternate display name (translation); never used as an identifier
    #[serde(default)]
    pub name_alt: String,
    #[serde(default)]
    pub category: PoseCategory,
    /// Blend weight, nominally `[0, 1]`
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    bones: Vec<BoneEntry>,
    #[serde(default)]
    active_bone_index: Option<usize>,
}

/// Content equality; ids are ignored
impl PartialEq for Pose {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.name_alt == other.name_alt
            && self.category == other.category
            && self.weight == other.weight
            && self.bones == other.bones
            && self.active_bone_index == other.active_bone_index
    }
}

impl Pose {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PoseId::next(),
            name: name.into(),
            name_alt: String::new(),
            category: PoseCategory::default(),
            weight: 0.0,
            bones: Vec::new(),
            active_bone_index: None,
        }
    }

    pub fn with_category(mut self, category: PoseCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_bone(mut self, name: impl Into<String>, transform: Transform) -> Self {
        self.upsert_bone(name, transform);
        self
    }

    pub fn id(&self) -> PoseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename without sibling checks; books go through
    /// [`PoseBook::rename_pose`](super::PoseBook::rename_pose)
    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Copy of this pose with a fresh id
    pub fn duplicate(&self) -> Self {
        Self {
            id: PoseId::next(),
            ..self.clone()
        }
    }

    /// Copy alternate name, category and bones from `other`. The name stays,
    /// since books index poses by name.
    pub fn copy_from(&mut self, other: &Pose) {
        self.name_alt = other.name_alt.clone();
        self.category = other.category;
        self.bones = other.bones.clone();
        self.active_bone_index = clamp_index(other.active_bone_index, self.bones.len());
    }

    // ------------------------------------------------------------------------
    // Bones
    // ------------------------------------------------------------------------

    pub fn bones(&self) -> &[BoneEntry] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.iter().map(|b| b.name.as_str())
    }

    pub fn bone(&self, name: &str) -> Option<&BoneEntry> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut BoneEntry> {
        self.bones.iter_mut().find(|b| b.name == name)
    }

    /// Set the transform for `name`; an existing entry keeps its position
    /// (last write wins), a new one is appended and becomes active.
    pub fn upsert_bone(&mut self, name: impl Into<String>, transform: Transform) {
        let name = name.into();
        match self.bones.iter_mut().find(|b| b.name == name) {
            Some(entry) => entry.transform = transform,
            None => {
                self.bones.push(BoneEntry::new(name, transform));
                self.active_bone_index = Some(self.bones.len() - 1);
            }
        }
    }

    pub fn remove_bone(&mut self, name: &str) -> bool {
        match self.bones.iter().position(|b| b.name == name) {
            Some(index) => {
                self.remove_bone_at(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_bone_at(&mut self, index: usize) -> Option<BoneEntry> {
        if index >= self.bones.len() {
            return None;
        }
        let entry = self.bones.remove(index);
        self.active_bone_index =
            index_after_removal(self.active_bone_index, index, self.bones.len());
        Some(entry)
    }

    pub fn clear_bones(&mut self) {
        self.bones.clear();
        self.active_bone_index = None;
    }

    /// Keep only entries matching `keep`
    pub fn retain_bones(&mut self, mut keep: impl FnMut(&BoneEntry) -> bool) {
        self.bones.retain(|b| keep(b));
        self.active_bone_index = clamp_index(self.active_bone_index, self.bones.len());
    }

    pub fn active_bone_index(&self) -> Option<usize> {
        self.active_bone_index
    }

    pub fn set_active_bone_index(&mut self, index: Option<usize>) {
        self.active_bone_index = clamp_index(index, self.bones.len());
    }

    pub fn active_bone(&self) -> Option<&BoneEntry> {
        self.active_bone_index.and_then(|i| self.bones.get(i))
    }

    /// Rename bone entries; the pose's own name is untouched. A new name that
    /// collides with another entry gets a numeric suffix.
    pub fn rename_bones(&mut self, renamer: &Renamer) -> Vec<RenameOutcome> {
        let mut outcomes = Vec::new();
        for i in 0..self.bones.len() {
            let renamed = renamer.apply(&self.bones[i].name).into_owned();
            if renamed == self.bones[i].name {
                continue;
            }
            let siblings = self
                .bones
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, b)| b.name.as_str());
            let to = resolve_name_collision(&renamed, siblings);
            outcomes.push(RenameOutcome {
                conflicted: to != renamed,
                from: std::mem::replace(&mut self.bones[i].name, to.clone()),
                to,
            });
        }
        outcomes
    }

    // ------------------------------------------------------------------------
    // Rig interaction
    // ------------------------------------------------------------------------

    /// Replace all bones with the rig's current non-identity bones
    pub fn capture_from<R: Rig + ?Sized>(&mut self, rig: &R, options: &CaptureOptions) {
        self.bones = capture(rig, options);
        self.active_bone_index = clamp_index(None, self.bones.len());
    }

    /// Add or refresh the named bones from the rig's current channels,
    /// regardless of whether they differ from identity. Unknown bones are skipped.
    pub fn update_bones_from_rig<R, S>(&mut self, rig: &R, names: &[S]) -> usize
    where
        R: Rig + ?Sized,
        S: AsRef<str>,
    {
        let mut updated = 0;
        for name in names {
            let name = name.as_ref();
            if let Some(transform) = rig.local_transform(name) {
                self.upsert_bone(name, transform);
                updated += 1;
            } else {
                tracing::warn!("Bone '{}' not found in '{}', skipping", name, rig.name());
            }
        }
        updated
    }
}
