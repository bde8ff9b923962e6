//! PMX Editor bone-morph CSV
//!
//! Two record kinds, distinguished by the first column:
//!
//! ```text
//! PmxMorph,"name","english name",panel,2
//! PmxBoneMorph,"morph name",offset index,"bone name",tx,ty,tz,rx[deg],ry[deg],rz[deg]
//! ```
//!
//! Lines starting with `;` are comments. Locations are in model units (host
//! metres times the unit scale) and go through the bone's [`Converter`];
//! rotations are external Euler degrees.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use glam::{DQuat, DVec3};

use super::{ImportReport, book_name_from_path, write_atomic};
use crate::category::{PoseCategory, guess_category};
use crate::convert::{Converter, DEFAULT_UNIT_SCALE, degrees_to_quaternion, quaternion_to_degrees};
use crate::error::{PoseLibError, Result};
use crate::model::{Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::Transform;

const MORPH_HEADER: &str = ";PmxMorph,モーフ名,モーフ名(英),パネル(0:無効/1:眉(左下)/2:目(左上)/3:口(右上)/4:その他(右下)),モーフ種類(0:グループモーフ/1:頂点モーフ/2:ボーンモーフ/3:UV(Tex)モーフ/4:追加UV1モーフ/5:追加UV2モーフ/6:追加UV3モーフ/7:追加UV4モーフ/8:材質モーフ/9:フリップモーフ/10:インパルスモーフ)";
const BONE_HEADER: &str = ";PmxBoneMorph,親モーフ名,オフセットIndex,ボーン名,移動量_x,移動量_y,移動量_z,回転量_x[deg],回転量_y[deg],回転量_z[deg]";
const TRAILER: &str = ";This file is generated by posebook.";

/// Morph type column value for bone morphs
const BONE_MORPH_KIND: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CsvExportOptions {
    /// Host metres to model units
    pub scale: f64,
    /// Write the rig's external bone names where the bone has one
    pub use_external_bone_names: bool,
    /// Put the alternate pose name in the morph name column (and the pose
    /// name in the english column) when the pose has one
    pub use_alt_pose_names: bool,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_UNIT_SCALE,
            use_external_bone_names: true,
            use_alt_pose_names: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CsvImportOptions {
    /// Model units per host metre; locations are divided by it
    pub scale: f64,
}

impl Default for CsvImportOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_UNIT_SCALE,
        }
    }
}

// ============================================================================
// Number formatting
// ============================================================================

/// `%g`-style formatting with `precision` significant digits
pub(crate) fn format_g(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ============================================================================
// Export
// ============================================================================

/// Text field content with embedded quotes doubled
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') {
        Cow::Owned(s.replace('"', "\"\""))
    } else {
        Cow::Borrowed(s)
    }
}

/// Stream a book as CSV. Bones missing from the rig are skipped with a
/// warning; the offset index still counts them.
pub fn write_book<W: Write>(
    mut w: W,
    book: &PoseBook,
    rig: &dyn Rig,
    options: &CsvExportOptions,
) -> std::io::Result<ImportReport> {
    let mut report = ImportReport::default();
    writeln!(w, "{MORPH_HEADER}")?;

    for pose in book.poses() {
        let (morph_name, english_name) = if options.use_alt_pose_names && !pose.name_alt.is_empty() {
            (pose.name_alt.as_str(), pose.name())
        } else {
            (pose.name(), pose.name_alt.as_str())
        };
        writeln!(
            w,
            "PmxMorph,\"{}\",\"{}\",{},{}",
            escape_quotes(morph_name),
            escape_quotes(english_name),
            pose.category.index(),
            BONE_MORPH_KIND
        )?;
        writeln!(w, "{BONE_HEADER}")?;

        for (index, bone) in pose.bones().iter().enumerate() {
            if !rig.has_bone(&bone.name) {
                report.warn(format!(
                    "Bone '{}' not found in '{}', skipping",
                    bone.name,
                    rig.name()
                ));
                continue;
            }

            let converter = Converter::for_bone(rig, &bone.name, options.scale, true);
            let loc = converter.convert_location(bone.transform.location());
            let rot = quaternion_to_degrees(converter.convert_rotation(bone.transform.rotation()));
            let bone_name = if options.use_external_bone_names {
                rig.external_name(&bone.name).unwrap_or_else(|| bone.name.clone())
            } else {
                bone.name.clone()
            };

            writeln!(
                w,
                "PmxBoneMorph,\"{}\",{},\"{}\",{},{},{},{},{},{}",
                escape_quotes(morph_name),
                index,
                escape_quotes(&bone_name),
                format_g(loc.x, 5),
                format_g(loc.y, 5),
                format_g(loc.z, 5),
                format_g(rot[0], 5),
                format_g(rot[1], 5),
                format_g(rot[2], 5),
            )?;
        }
    }

    write!(w, "\n{TRAILER}\n")?;
    w.flush()?;
    Ok(report)
}

pub fn export_book(book: &PoseBook, rig: &dyn Rig, options: &CsvExportOptions) -> Result<(String, ImportReport)> {
    let mut buf = Vec::new();
    let report = write_book(&mut buf, book, rig, options).map_err(|e| PoseLibError::io("<memory>", e))?;
    Ok((String::from_utf8_lossy(&buf).into_owned(), report))
}

/// Render in memory, then replace `path` atomically
pub fn save_book(path: &Path, book: &PoseBook, rig: &dyn Rig, options: &CsvExportOptions) -> Result<ImportReport> {
    let mut buf = Vec::new();
    let report = write_book(&mut buf, book, rig, options).map_err(|e| PoseLibError::io(path, e))?;
    write_atomic(path, &buf)?;
    tracing::info!("Saved {} morphs to {:?}", book.len(), path);
    Ok(report)
}

// ============================================================================
// Import
// ============================================================================

fn field<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).map(str::trim).unwrap_or_default()
}

fn parse_floats(record: &csv::StringRecord, range: std::ops::Range<usize>) -> Option<Vec<f64>> {
    range.map(|i| field(record, i).parse::<f64>().ok()).collect()
}

/// Host-space value of one bone row
fn import_transform(
    rig: Option<&dyn Rig>,
    bone: &str,
    location: DVec3,
    degrees: [f64; 3],
    scale: f64,
) -> Transform {
    let rotation: DQuat = degrees_to_quaternion(degrees);
    match rig {
        Some(rig) => {
            let converter = Converter::for_bone(rig, bone, 1.0 / scale, false);
            Transform::new(
                converter.convert_location(location),
                converter.convert_rotation(rotation),
                DVec3::ONE,
            )
        }
        None => Transform::new(location / scale, rotation, DVec3::ONE),
    }
}

/// Merge CSV text into `book`. Pose headers create or overwrite poses, bone
/// rows add to the named pose. Problems with single rows are reported, never
/// fatal.
pub fn import_into(
    book: &mut PoseBook,
    text: &str,
    rig: Option<&dyn Rig>,
    options: &CsvImportOptions,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    if rig.is_none() {
        report.warn("No rig given, bone values are not axis converted");
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b';'))
        .from_reader(text.as_bytes());

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                report.warn(format!("Row {}: unreadable ({e}), skipping", row + 1));
                continue;
            }
        };

        match field(&record, 0) {
            "PmxMorph" => {
                let name = field(&record, 1).to_string();
                let Ok(category_index) = field(&record, 3).parse::<i64>() else {
                    report.warn(format!("Morph '{name}': bad panel value, skipping"));
                    continue;
                };
                let mut category = PoseCategory::from_index(category_index);
                if category == PoseCategory::None {
                    category = guess_category(&name);
                }

                let pose = match book.position_of(&name) {
                    Some(index) => {
                        report.warn(format!("Pose '{name}' already exists, overwriting"));
                        book.pose_mut(index)
                    }
                    None => {
                        let index = book.add_pose(Pose::new(name.as_str()));
                        book.pose_mut(index)
                    }
                };
                if let Some(pose) = pose {
                    pose.clear_bones();
                    pose.name_alt = field(&record, 2).to_string();
                    pose.category = category;
                }
            }
            "PmxBoneMorph" => {
                let pose_name = field(&record, 1).to_string();
                let bone_field = field(&record, 3);
                let Some(values) = parse_floats(&record, 4..10) else {
                    report.warn(format!(
                        "Morph '{pose_name}', bone '{bone_field}': malformed numbers, skipping"
                    ));
                    continue;
                };

                let bone = match rig {
                    Some(rig) => match rig.resolve_bone(bone_field) {
                        Some(bone) => bone,
                        None => {
                            report.warn(format!(
                                "Bone '{}' not found in '{}', skipping",
                                bone_field,
                                rig.name()
                            ));
                            continue;
                        }
                    },
                    None => bone_field.to_string(),
                };

                let index = match book.position_of(&pose_name) {
                    Some(index) => index,
                    None => {
                        report.warn(format!("Pose '{pose_name}' not declared, creating it"));
                        book.add_pose(Pose::new(pose_name.as_str()))
                    }
                };

                let transform = import_transform(
                    rig,
                    &bone,
                    DVec3::new(values[0], values[1], values[2]),
                    [values[3], values[4], values[5]],
                    options.scale,
                );
                if let Some(pose) = book.pose_mut(index) {
                    pose.upsert_bone(bone, transform);
                }
            }
            other => {
                report.warn(format!("Row {}: unknown record '{other}', skipping", row + 1));
            }
        }
    }
    Ok(report)
}

/// Load a book from a CSV file; the book is named after the file stem
pub fn load_book(
    path: &Path,
    rig: Option<&dyn Rig>,
    options: &CsvImportOptions,
) -> Result<(PoseBook, ImportReport)> {
    let text = std::fs::read_to_string(path).map_err(|e| PoseLibError::io(path, e))?;
    let mut book = PoseBook::new(book_name_from_path(path).unwrap_or_default());
    let report = import_into(&mut book, &text, rig, options)?;
    tracing::info!("Loaded {} morphs from {:?}", book.len(), path);
    Ok((book, report))
}
