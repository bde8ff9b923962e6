//! JSON pose book files
//!
//! A pretty-printed array of pose objects:
//!
//! ```json
//! [{ "name": "smile", "name_alt": "", "category": "MOUTH", "space": "LOCAL",
//!    "bones": [{ "name": "jaw", "location": [0, 0, 0],
//!                "rotation": [1, 0, 0, 0], "scale": [1, 1, 1] }] }]
//! ```
//!
//! Rotations are `(w, x, y, z)`. With `"space": "ARMATURE"` the bone values are
//! expressed in armature space via the bone's rest matrix. There is no version
//! field; every field except `name` has a default.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::{ImportReport, book_name_from_path, write_atomic};
use crate::category::PoseCategory;
use crate::convert::to_armature_space;
use crate::error::{PoseLibError, Result};
use crate::model::{Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::Transform;

/// Space the bone values of a JSON pose are written in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinateSpace {
    #[default]
    Local,
    Armature,
}

#[derive(Serialize, Deserialize)]
struct PoseRecord {
    name: String,
    #[serde(default)]
    name_alt: String,
    #[serde(default = "category_none", deserialize_with = "lenient_category")]
    category: PoseCategory,
    #[serde(default, deserialize_with = "lenient_space")]
    space: CoordinateSpace,
    #[serde(default)]
    bones: Vec<BoneRecord>,
}

#[derive(Serialize, Deserialize)]
struct BoneRecord {
    name: String,
    #[serde(default)]
    location: [f64; 3],
    #[serde(default = "identity_wxyz")]
    rotation: [f64; 4],
    #[serde(default = "unit_scale")]
    scale: [f64; 3],
}

fn category_none() -> PoseCategory {
    PoseCategory::None
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

/// Unknown category names fall back to `NONE`
fn lenient_category<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<PoseCategory, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw
        .as_deref()
        .and_then(PoseCategory::parse)
        .unwrap_or(PoseCategory::None))
}

/// Unknown spaces fall back to `LOCAL`
fn lenient_space<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<CoordinateSpace, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(match raw.as_deref() {
        Some("ARMATURE") => CoordinateSpace::Armature,
        _ => CoordinateSpace::Local,
    })
}

// ============================================================================
// Export
// ============================================================================

/// Serialize a book. `rig` is required for armature space; bones it lacks are
/// written unconverted with a warning.
pub fn export_book(
    book: &PoseBook,
    rig: Option<&dyn Rig>,
    space: CoordinateSpace,
) -> Result<(String, ImportReport)> {
    let mut report = ImportReport::default();
    if space == CoordinateSpace::Armature && rig.is_none() {
        report.warn("No rig given for armature space, writing bone-local values");
    }

    let records: Vec<PoseRecord> = book
        .poses()
        .iter()
        .map(|pose| PoseRecord {
            name: pose.name().to_string(),
            name_alt: pose.name_alt.clone(),
            category: pose.category,
            space,
            bones: pose
                .bones()
                .iter()
                .map(|bone| {
                    let mut t = bone.transform;
                    if space == CoordinateSpace::Armature
                        && let Some(rig) = rig
                    {
                        match rig.rest_matrix(&bone.name) {
                            Some(rest) => t = to_armature_space(&t, Some(rest), false),
                            None => report.warn(format!(
                                "Bone '{}' not found in '{}', writing bone-local values",
                                bone.name,
                                rig.name()
                            )),
                        }
                    }
                    BoneRecord {
                        name: bone.name.clone(),
                        location: t.location().to_array(),
                        rotation: t.rotation_wxyz(),
                        scale: t.scale().to_array(),
                    }
                })
                .collect(),
        })
        .collect();

    Ok((serde_json::to_string_pretty(&records)?, report))
}

pub fn save_book(
    path: &Path,
    book: &PoseBook,
    rig: Option<&dyn Rig>,
    space: CoordinateSpace,
) -> Result<ImportReport> {
    let (text, report) = export_book(book, rig, space)?;
    write_atomic(path, text.as_bytes())?;
    tracing::info!("Saved {} poses to {:?}", book.len(), path);
    Ok(report)
}

// ============================================================================
// Import
// ============================================================================

/// Replace the book's poses with those in `text`. Categories are taken as
/// written; see [`PoseBook::guess_missing_categories`] for a fallback.
pub fn import_into(book: &mut PoseBook, text: &str, rig: Option<&dyn Rig>) -> Result<ImportReport> {
    let records: Vec<PoseRecord> = serde_json::from_str(text)?;
    let mut report = ImportReport::default();

    book.clear_poses();
    for record in records {
        let mut pose = Pose::new(record.name);
        pose.name_alt = record.name_alt;
        pose.category = record.category;

        for bone in record.bones {
            let mut t = Transform::from_arrays(bone.location, bone.rotation, bone.scale);
            if record.space == CoordinateSpace::Armature {
                match rig.and_then(|r| r.rest_matrix(&bone.name)) {
                    Some(rest) => t = to_armature_space(&t, Some(rest), true),
                    None => report.warn(format!(
                        "Bone '{}' not found in rig, keeping armature-space values",
                        bone.name
                    )),
                }
            }
            pose.upsert_bone(bone.name, t);
        }
        book.add_pose(pose);
    }
    Ok(report)
}

/// Load a book from a file; the book is named after the file stem
pub fn load_book(path: &Path, rig: Option<&dyn Rig>) -> Result<(PoseBook, ImportReport)> {
    let text = std::fs::read_to_string(path).map_err(|e| PoseLibError::io(path, e))?;
    let name = book_name_from_path(path).unwrap_or_default();
    let mut book = PoseBook::new(name);
    let report = import_into(&mut book, &text, rig)?;
    tracing::info!("Loaded {} poses from {:?}", book.len(), path);
    Ok((book, report))
}
