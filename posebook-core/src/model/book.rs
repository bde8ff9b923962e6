use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{BookId, MoveDirection, Placement, Pose, PoseId, clamp_index, index_after_removal, move_item};
use crate::blend::{CaptureOptions, apply_blend, blend};
use crate::category::{CategoryFilter, PoseCategory, guess_category};
use crate::error::{PoseLibError, Result};
use crate::naming::{RenameOutcome, Renamer, resolve_name_collision};
use crate::rig::Rig;
use crate::transform::has_transform;

/// Bone removal reasons reported by [`PoseBook::clean_poses`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanReason {
    NotInRig,
    NoDeformation,
}

impl std::fmt::Display for CleanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanReason::NotInRig => f.write_str("Not in armature"),
            CleanReason::NoDeformation => f.write_str("No deformation"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CleanOptions {
    /// Drop bones the rig doesn't have
    pub check_name: bool,
    /// Drop bones whose transform is within `threshold` of identity
    pub check_transform: bool,
    pub threshold: f64,
    /// Report without removing anything
    pub report_only: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            check_name: true,
            check_transform: true,
            threshold: 1e-5,
            report_only: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CleanedBone {
    pub pose: String,
    pub bone: String,
    pub reason: CleanReason,
}

pub type CleanReport = Vec<CleanedBone>;

#[derive(Clone, Serialize, Deserialize)]
struct PoseBookData {
    name: String,
    #[serde(default)]
    poses: Vec<Pose>,
    #[serde(default)]
    active_pose_index: Option<usize>,
    #[serde(default)]
    category_filter: CategoryFilter,
    #[serde(default)]
    show_alt_names: bool,
}

/// A named, ordered collection of poses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "PoseBookData", into = "PoseBookData")]
pub struct PoseBook {
    id: BookId,
    name: String,
    poses: Vec<Pose>,
    active_pose_index: Option<usize>,
    pub category_filter: CategoryFilter,
    pub show_alt_names: bool,
    /// Pose name → id, kept in sync by every mutator
    names: HashMap<String, PoseId>,
}

impl From<PoseBookData> for PoseBook {
    fn from(data: PoseBookData) -> Self {
        let mut book = PoseBook::new(data.name);
        for pose in data.poses {
            book.add_pose(pose);
        }
        book.active_pose_index = clamp_index(data.active_pose_index, book.poses.len());
        book.category_filter = data.category_filter;
        book.show_alt_names = data.show_alt_names;
        book
    }
}

impl From<PoseBook> for PoseBookData {
    fn from(book: PoseBook) -> Self {
        PoseBookData {
            name: book.name,
            poses: book.poses,
            active_pose_index: book.active_pose_index,
            category_filter: book.category_filter,
            show_alt_names: book.show_alt_names,
        }
    }
}

impl PartialEq for PoseBook {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.poses == other.poses
            && self.active_pose_index == other.active_pose_index
            && self.category_filter == other.category_filter
            && self.show_alt_names == other.show_alt_names
    }
}

impl PoseBook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: BookId::next(),
            name: name.into(),
            poses: Vec::new(),
            active_pose_index: None,
            category_filter: CategoryFilter::All,
            show_alt_names: false,
            names: HashMap::new(),
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename without sibling checks; libraries go through
    /// [`PoseLibrary::rename_book`](super::PoseLibrary::rename_book)
    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn pose(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index)
    }

    pub fn pose_mut(&mut self, index: usize) -> Option<&mut Pose> {
        self.poses.get_mut(index)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        let id = *self.names.get(name)?;
        self.position_of_id(id)
    }

    pub fn position_of_id(&self, id: PoseId) -> Option<usize> {
        self.poses.iter().position(|p| p.id() == id)
    }

    pub fn pose_by_name(&self, name: &str) -> Option<&Pose> {
        self.position_of(name).map(|i| &self.poses[i])
    }

    pub fn pose_by_name_mut(&mut self, name: &str) -> Option<&mut Pose> {
        let index = self.position_of(name)?;
        self.poses.get_mut(index)
    }

    /// Poses passing the book's category filter, with their indices
    pub fn visible_poses(&self) -> impl Iterator<Item = (usize, &Pose)> {
        let filter = self.category_filter;
        self.poses
            .iter()
            .enumerate()
            .filter(move |(_, p)| filter.matches(p.category))
    }

    pub fn active_pose_index(&self) -> Option<usize> {
        self.active_pose_index
    }

    /// Select a pose; out-of-range input is clamped, `None` only sticks on an empty book
    pub fn set_active_pose_index(&mut self, index: Option<usize>) {
        self.active_pose_index = clamp_index(index, self.poses.len());
    }

    pub fn active_pose(&self) -> Option<&Pose> {
        self.active_pose_index.and_then(|i| self.poses.get(i))
    }

    pub fn active_pose_mut(&mut self) -> Option<&mut Pose> {
        self.active_pose_index.and_then(|i| self.poses.get_mut(i))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.poses.len() {
            Ok(())
        } else {
            Err(PoseLibError::InvalidIndex {
                kind: "pose",
                index,
                len: self.poses.len(),
            })
        }
    }

    fn active_index_or_err(&self) -> Result<usize> {
        self.active_pose_index
            .filter(|&i| i < self.poses.len())
            .ok_or(PoseLibError::NoActivePose)
    }

    // ------------------------------------------------------------------------
    // Insertion / removal
    // ------------------------------------------------------------------------

    /// Append `pose`, resolving its name against the existing poses.
    /// Returns the new index; the active pose stays selected.
    pub fn add_pose(&mut self, pose: Pose) -> usize {
        let index = self.poses.len();
        self.insert_pose(index, pose)
    }

    /// Insert at `index` (clamped to the end)
    pub fn insert_pose(&mut self, index: usize, mut pose: Pose) -> usize {
        let index = index.min(self.poses.len());
        let name = resolve_name_collision(pose.name(), self.names.keys().map(String::as_str));
        pose.set_name(name.clone());
        self.names.insert(name, pose.id());
        self.poses.insert(index, pose);

        // Keep the active selection on the same pose
        self.active_pose_index = match self.active_pose_index {
            Some(active) if index <= active => Some(active + 1),
            Some(active) => Some(active),
            None => Some(0),
        };
        index
    }

    /// Add and select a pose at the given placement
    pub fn place_pose(&mut self, pose: Pose, placement: Placement) -> usize {
        let index = match placement {
            Placement::Append => self.add_pose(pose),
            Placement::Prepend => self.insert_pose(0, pose),
            Placement::Insert => {
                let at = self.active_pose_index.map_or(0, |i| i + 1);
                self.insert_pose(at, pose)
            }
        };
        self.active_pose_index = Some(index);
        index
    }

    pub fn remove_pose(&mut self, index: usize) -> Result<Pose> {
        self.check_index(index)?;
        let pose = self.poses.remove(index);
        self.names.remove(pose.name());
        self.active_pose_index = index_after_removal(self.active_pose_index, index, self.poses.len());
        Ok(pose)
    }

    pub fn remove_active_pose(&mut self) -> Result<Pose> {
        let index = self.active_index_or_err()?;
        self.remove_pose(index)
    }

    pub fn clear_poses(&mut self) {
        self.poses.clear();
        self.names.clear();
        self.active_pose_index = None;
    }

    /// Replace contents with a copy of `other`'s poses and view settings
    pub fn copy_from(&mut self, other: &PoseBook) {
        self.clear_poses();
        for pose in &other.poses {
            self.add_pose(pose.duplicate());
        }
        self.active_pose_index = clamp_index(other.active_pose_index, self.poses.len());
        self.category_filter = other.category_filter;
        self.show_alt_names = other.show_alt_names;
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Rename the pose at `index`; returns the name actually assigned
    pub fn rename_pose(&mut self, index: usize, name: &str) -> Result<String> {
        self.check_index(index)?;
        let id = self.poses[index].id();
        let old = self.poses[index].name().to_string();
        let siblings = self
            .names
            .iter()
            .filter(|(_, pid)| **pid != id)
            .map(|(n, _)| n.as_str());
        let resolved = resolve_name_collision(name, siblings);

        self.names.remove(&old);
        self.names.insert(resolved.clone(), id);
        self.poses[index].set_name(resolved.clone());
        Ok(resolved)
    }

    /// Move the active pose; returns its new index
    pub fn move_pose(&mut self, direction: MoveDirection) -> Result<usize> {
        let index = self.active_index_or_err()?;
        let target = move_item(&mut self.poses, index, direction);
        self.active_pose_index = Some(target);
        Ok(target)
    }

    /// Copy the active pose right after it with `+` appended to both names;
    /// the copy becomes active
    pub fn duplicate_active_pose(&mut self) -> Result<usize> {
        let index = self.active_index_or_err()?;
        let mut copy = self.poses[index].duplicate();
        copy.set_name(format!("{}+", copy.name()));
        copy.name_alt.push('+');
        let new_index = self.insert_pose(index + 1, copy);
        self.active_pose_index = Some(new_index);
        Ok(new_index)
    }

    /// Guess every pose's category from its name
    pub fn auto_set_categories(&mut self) {
        for pose in &mut self.poses {
            pose.category = guess_category(pose.name());
        }
    }

    /// Fill in a guessed category where none is set
    pub fn guess_missing_categories(&mut self) {
        for pose in &mut self.poses {
            if pose.category == PoseCategory::None {
                pose.category = guess_category(pose.name());
            }
        }
    }

    /// Batch rename poses; names are collision-resolved one at a time in order
    pub fn rename_poses(&mut self, renamer: &Renamer) -> Result<Vec<RenameOutcome>> {
        let mut outcomes = Vec::new();
        for index in 0..self.poses.len() {
            let from = self.poses[index].name().to_string();
            let wanted = renamer.apply(&from).into_owned();
            if wanted == from {
                continue;
            }
            let to = self.rename_pose(index, &wanted)?;
            if to != wanted {
                tracing::info!("Pose '{}' renamed to '{}', by naming conflict", wanted, to);
            }
            outcomes.push(RenameOutcome {
                conflicted: to != wanted,
                from,
                to,
            });
        }
        Ok(outcomes)
    }

    /// Batch rename bone entries in every pose
    pub fn rename_bones(&mut self, renamer: &Renamer) -> Vec<RenameOutcome> {
        self.poses
            .iter_mut()
            .flat_map(|pose| pose.rename_bones(renamer))
            .collect()
    }

    /// Drop (or just report) bones that are unknown to the rig or carry no
    /// deformation
    pub fn clean_poses<R: Rig + ?Sized>(&mut self, rig: &R, options: &CleanOptions) -> CleanReport {
        let mut report = CleanReport::new();
        for pose in &mut self.poses {
            let mut flagged: Vec<(String, CleanReason)> = Vec::new();
            for bone in pose.bones() {
                if options.check_name && !rig.has_bone(&bone.name) {
                    flagged.push((bone.name.clone(), CleanReason::NotInRig));
                    continue;
                }
                let t = &bone.transform;
                if options.check_transform
                    && !has_transform(t.location(), t.rotation(), t.scale(), options.threshold)
                {
                    flagged.push((bone.name.clone(), CleanReason::NoDeformation));
                }
            }

            if !options.report_only {
                pose.retain_bones(|b| !flagged.iter().any(|(name, _)| *name == b.name));
            }
            for (bone, reason) in flagged {
                tracing::info!("Bone '{}' in pose '{}' - {}", bone, pose.name(), reason);
                report.push(CleanedBone {
                    pose: pose.name().to_string(),
                    bone,
                    reason,
                });
            }
        }
        report
    }

    // ------------------------------------------------------------------------
    // Weights & rig application
    // ------------------------------------------------------------------------

    /// Set every weight to 0
    pub fn reset_weights(&mut self) {
        for pose in &mut self.poses {
            pose.weight = 0.0;
        }
    }

    /// Weight 1 for the pose at `index`, 0 for every other pose
    pub fn solo_weight(&mut self, index: Option<usize>) {
        for (i, pose) in self.poses.iter_mut().enumerate() {
            pose.weight = if Some(i) == index { 1.0 } else { 0.0 };
        }
    }

    /// Solo the pose at `index` and push the blended result onto the rig.
    /// `None` zeroes every weight, returning the book's bones to identity.
    pub fn apply_single_pose<R: Rig + ?Sized>(&mut self, index: Option<usize>, rig: &mut R) -> Result<()> {
        if let Some(index) = index {
            self.check_index(index)?;
        }
        self.solo_weight(index);
        apply_blend(&blend(self), rig);
        Ok(())
    }

    /// Blend the whole book onto the rig, optionally resetting it first
    pub fn apply_poses<R: Rig + ?Sized>(&self, rig: &mut R, reset_current: bool) {
        if reset_current {
            rig.reset_pose();
        }
        apply_blend(&blend(self), rig);
    }

    /// Capture the rig into a new pose, place it, and show it solo
    pub fn add_pose_from_rig<R: Rig + ?Sized>(
        &mut self,
        mut pose: Pose,
        rig: &mut R,
        options: &CaptureOptions,
        placement: Placement,
    ) -> usize {
        pose.capture_from(&*rig, options);
        let index = self.place_pose(pose, placement);
        self.solo_weight(Some(index));
        apply_blend(&blend(self), rig);
        index
    }

    /// Overwrite the bones of the pose at `index` (or the active pose) with
    /// the rig's current pose, then show it solo
    pub fn replace_pose<R: Rig + ?Sized>(
        &mut self,
        index: Option<usize>,
        rig: &mut R,
        options: &CaptureOptions,
    ) -> Result<()> {
        let index = match index {
            Some(i) => i,
            None => self.active_index_or_err()?,
        };
        self.check_index(index)?;
        self.poses[index].capture_from(&*rig, options);
        self.apply_single_pose(Some(index), rig)
    }
}
