//! VPD pose files
//!
//! A Shift_JIS, CRLF text format holding one pose of an external model:
//!
//! ```text
//! Vocaloid Pose Data file
//!
//! model.osm;      // parent file
//! 2;              // bone count
//!
//! Bone0{センター
//!   0.000000,1.250000,0.000000;            // trans x,y,z
//!   0.000000,0.000000,0.000000,1.000000;   // Quaternion x,y,z,w
//! }
//!
//! Morph0{まばたき
//!   1.000000;                              // weight
//! }
//! ```
//!
//! Values are in external model space. Parsing is strict: any structural
//! problem fails the whole file with [`PoseLibError::InvalidFile`].

mod parser;
mod writer;

#[cfg(test)]
mod tests;

use std::path::Path;

use glam::{DQuat, DVec3};

use super::{ImportReport, book_name_from_path, write_atomic};
use crate::convert::{Converter, DEFAULT_UNIT_SCALE};
use crate::error::{PoseLibError, Result};
use crate::model::{Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::Transform;

/// First line of every file
pub const VPD_MAGIC: &str = "Vocaloid Pose Data file";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VpdOptions {
    /// Host metres to model units
    pub scale: f64,
    /// Write the rig's external bone names where the bone has one
    pub use_external_bone_names: bool,
}

impl Default for VpdOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_UNIT_SCALE,
            use_external_bone_names: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VpdBone {
    pub name: String,
    pub location: DVec3,
    pub rotation: DQuat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VpdMorph {
    pub name: String,
    pub weight: f64,
}

/// Parsed file contents, still in model space
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VpdDocument {
    /// Parent file name, usually `<model>.osm`
    pub model_name: String,
    pub bones: Vec<VpdBone>,
    pub morphs: Vec<VpdMorph>,
}

impl VpdDocument {
    /// Decode Shift_JIS bytes and parse
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
        if had_errors {
            return Err(PoseLibError::Encoding("file is not valid Shift_JIS".to_string()));
        }
        Self::parse(&text)
    }

    /// Serialize and encode as Shift_JIS
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let text = self.to_text();
        let (bytes, _, unmappable) = encoding_rs::SHIFT_JIS.encode(&text);
        if unmappable {
            return Err(PoseLibError::Encoding(
                "text contains characters Shift_JIS cannot represent".to_string(),
            ));
        }
        Ok(bytes.into_owned())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PoseLibError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)
    }

    /// Host-space pose named `name`. Bones are resolved by external name
    /// first; unknown bones are skipped with a warning.
    pub fn to_pose(&self, name: &str, rig: &dyn Rig, options: &VpdOptions) -> (Pose, ImportReport) {
        let mut report = ImportReport::default();
        let mut pose = Pose::new(name);

        for bone in &self.bones {
            let Some(host) = rig.resolve_bone(&bone.name) else {
                report.warn(format!("Bone '{}' not found in '{}', skipping", bone.name, rig.name()));
                continue;
            };
            let converter = Converter::for_bone(rig, &host, 1.0 / options.scale, false);
            let transform = Transform::new(
                converter.convert_location(bone.location),
                converter.convert_rotation(bone.rotation),
                DVec3::ONE,
            );
            pose.upsert_bone(host, transform);
        }
        (pose, report)
    }

    /// Model-space document for one pose. Bones missing from the rig are
    /// skipped with a warning.
    pub fn from_pose(pose: &Pose, rig: &dyn Rig, options: &VpdOptions) -> (Self, ImportReport) {
        let mut report = ImportReport::default();
        let mut bones = Vec::with_capacity(pose.bone_count());

        for bone in pose.bones() {
            if !rig.has_bone(&bone.name) {
                report.warn(format!("Bone '{}' not found in '{}', skipping", bone.name, rig.name()));
                continue;
            }
            let converter = Converter::for_bone(rig, &bone.name, options.scale, true);
            let name = if options.use_external_bone_names {
                rig.external_name(&bone.name).unwrap_or_else(|| bone.name.clone())
            } else {
                bone.name.clone()
            };
            bones.push(VpdBone {
                name,
                location: converter.convert_location(bone.transform.location()),
                rotation: converter.convert_rotation(bone.transform.rotation()),
            });
        }

        let document = Self {
            model_name: format!("{}.osm", rig.name()),
            bones,
            morphs: Vec::new(),
        };
        (document, report)
    }

    /// Add a morph entry for every pose of `book` with a non-zero weight
    pub fn push_morphs_from_book(&mut self, book: &PoseBook) {
        self.morphs.extend(book.poses().iter().filter(|p| p.weight != 0.0).map(|p| VpdMorph {
            name: p.name().to_string(),
            weight: p.weight,
        }));
    }
}

/// Set the weight of each pose named by a morph entry. Poses are matched by
/// name, then by alternate name; unmatched morphs are reported.
pub fn apply_morph_weights(book: &mut PoseBook, document: &VpdDocument) -> ImportReport {
    let mut report = ImportReport::default();
    for morph in &document.morphs {
        let index = book
            .position_of(&morph.name)
            .or_else(|| book.poses().iter().position(|p| p.name_alt == morph.name));
        match index.and_then(|i| book.pose_mut(i)) {
            Some(pose) => pose.weight = morph.weight,
            None => report.warn(format!("Morph '{}' has no matching pose", morph.name)),
        }
    }
    report
}

/// Load a file as a pose named after the file stem
pub fn load_pose(path: &Path, rig: &dyn Rig, options: &VpdOptions) -> Result<(Pose, ImportReport)> {
    let document = VpdDocument::load(path)?;
    let name = book_name_from_path(path).unwrap_or_default();
    let (pose, report) = document.to_pose(&name, rig, options);
    tracing::info!("Loaded {} bones from {:?}", pose.bone_count(), path);
    Ok((pose, report))
}

/// Save one pose; with `book`, its weighted poses are written as morphs
pub fn save_pose(
    path: &Path,
    pose: &Pose,
    rig: &dyn Rig,
    options: &VpdOptions,
    book: Option<&PoseBook>,
) -> Result<ImportReport> {
    let (mut document, report) = VpdDocument::from_pose(pose, rig, options);
    if let Some(book) = book {
        document.push_morphs_from_book(book);
    }
    document.save(path)?;
    tracing::info!("Saved {} bones to {:?}", document.bones.len(), path);
    Ok(report)
}
