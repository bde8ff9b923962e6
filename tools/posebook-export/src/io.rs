//! Book and rig file I/O
//!
//! Dispatches on [`BookFormat`] to the codecs in `posebook_core::formats`.
//! Warnings from tolerant codecs are already logged by the codec; callers only
//! see the count.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use posebook_core::formats::pose_clip::{self, PoseClip};
use posebook_core::formats::{ImportReport, json, pmx_csv, vpd, write_atomic};
use posebook_core::{Armature, Pose, PoseBook, Rig};
use std::path::Path;

use crate::config::Config;

/// On-disk book representation
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BookFormat {
    /// JSON pose list
    Json,
    /// PMX Editor bone-morph CSV
    Csv,
    /// Shift_JIS VPD pose file (one pose)
    Vpd,
    /// Keyframed pose clip serialized as JSON
    Clip,
}

impl BookFormat {
    /// Infer from the file extension; clips share `.json` and must be explicit
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Some(BookFormat::Json),
            "csv" => Some(BookFormat::Csv),
            "vpd" => Some(BookFormat::Vpd),
            _ => None,
        }
    }

    /// Explicit choice, else the extension
    pub fn resolve(explicit: Option<Self>, path: &Path) -> Result<Self> {
        match explicit.or_else(|| Self::from_path(path)) {
            Some(format) => Ok(format),
            None => bail!(
                "Unsupported book format: {:?} (use .json, .csv, or .vpd, or pass --format)",
                path
            ),
        }
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn log_report(report: &ImportReport, path: &Path) {
    if !report.is_clean() {
        tracing::warn!("{} warning(s) for {:?}", report.warnings.len(), path);
    }
}

/// Load a rig from JSON or TOML (by extension)
pub fn load_rig(path: &Path) -> Result<Armature> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read rig: {:?}", path))?;
    let is_toml = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let rig: Armature = if is_toml {
        toml::from_str(&content).with_context(|| format!("Failed to parse rig: {:?}", path))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse rig: {:?}", path))?
    };
    tracing::info!("Loaded rig '{}' with {} bones", rig.name, rig.bones().len());
    Ok(rig)
}

/// Save a rig (including its current pose) as JSON or TOML
pub fn save_rig(path: &Path, rig: &Armature) -> Result<()> {
    let is_toml = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let content = if is_toml {
        toml::to_string_pretty(rig).context("Failed to serialize rig")?
    } else {
        serde_json::to_string_pretty(rig).context("Failed to serialize rig")?
    };
    write_atomic(path, content.as_bytes()).with_context(|| format!("Failed to write rig: {:?}", path))?;
    Ok(())
}

fn require_rig<'a>(rig: Option<&'a Armature>, format: BookFormat) -> Result<&'a Armature> {
    match rig {
        Some(rig) => Ok(rig),
        None => bail!("{:?} conversion needs a rig (pass --rig)", format),
    }
}

/// Load a book in the given format. A VPD file becomes a one-pose book.
pub fn load_book(
    path: &Path,
    format: BookFormat,
    rig: Option<&Armature>,
    config: &Config,
) -> Result<PoseBook> {
    let dyn_rig = rig.map(|r| r as &dyn Rig);
    let (book, report) = match format {
        BookFormat::Json => json::load_book(path, dyn_rig)?,
        BookFormat::Csv => pmx_csv::load_book(path, dyn_rig, &config.csv_import())?,
        BookFormat::Vpd => {
            let rig = require_rig(rig, format)?;
            let (pose, report) = vpd::load_pose(path, rig, &config.vpd())?;
            let mut book = PoseBook::new(stem(path));
            book.add_pose(pose);
            (book, report)
        }
        BookFormat::Clip => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read clip: {:?}", path))?;
            let clip: PoseClip = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse clip: {:?}", path))?;
            pose_clip::import_book(&clip, dyn_rig)
        }
    };
    log_report(&report, path);
    Ok(book)
}

/// Pose written to a VPD file: `name`, else the active pose, else the first
fn pose_for_vpd<'a>(book: &'a PoseBook, name: Option<&str>) -> Result<&'a Pose> {
    if let Some(name) = name {
        return book
            .pose_by_name(name)
            .with_context(|| format!("Pose '{}' not found in '{}'", name, book.name()));
    }
    match book.active_pose().or_else(|| book.poses().first()) {
        Some(pose) => Ok(pose),
        None => bail!("PoseBook '{}' has no poses to write", book.name()),
    }
}

/// Save a book in the given format. `pose` picks the pose written to VPD.
pub fn save_book(
    path: &Path,
    format: BookFormat,
    book: &PoseBook,
    rig: Option<&Armature>,
    config: &Config,
    pose: Option<&str>,
) -> Result<()> {
    let dyn_rig = rig.map(|r| r as &dyn Rig);
    let report = match format {
        BookFormat::Json => json::save_book(path, book, dyn_rig, config.json.space)?,
        BookFormat::Csv => {
            let rig = require_rig(rig, format)?;
            pmx_csv::save_book(path, book, rig, &config.csv_export())?
        }
        BookFormat::Vpd => {
            let rig = require_rig(rig, format)?;
            let pose = pose_for_vpd(book, pose)?;
            vpd::save_pose(path, pose, rig, &config.vpd(), Some(book))?
        }
        BookFormat::Clip => {
            let clip = pose_clip::export_book(book, dyn_rig);
            let content = serde_json::to_string_pretty(&clip).context("Failed to serialize clip")?;
            write_atomic(path, content.as_bytes())
                .with_context(|| format!("Failed to write clip: {:?}", path))?;
            ImportReport::default()
        }
    };
    log_report(&report, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use posebook_core::{RigBone, Transform};
    use glam::DVec3;

    fn rig() -> Armature {
        Armature::new("Rig")
            .with_bone(RigBone::new("head").with_external_name("頭"))
            .with_bone(RigBone::new("jaw"))
    }

    fn book() -> PoseBook {
        let mut book = PoseBook::new("Face");
        book.add_pose(Pose::new("nod").with_bone("head", Transform::from_location(DVec3::Z)));
        book.add_pose(Pose::new("open").with_bone("jaw", Transform::from_location(DVec3::Y)));
        book
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(BookFormat::from_path(Path::new("a.JSON")), Some(BookFormat::Json));
        assert_eq!(BookFormat::from_path(Path::new("a.csv")), Some(BookFormat::Csv));
        assert_eq!(BookFormat::from_path(Path::new("a.vpd")), Some(BookFormat::Vpd));
        assert_eq!(BookFormat::from_path(Path::new("a.txt")), None);
        assert!(BookFormat::resolve(None, Path::new("a")).is_err());
        assert_eq!(
            BookFormat::resolve(Some(BookFormat::Clip), Path::new("a.json")).unwrap(),
            BookFormat::Clip
        );
    }

    #[test]
    fn test_csv_and_vpd_need_rig() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let path = dir.path().join("face.csv");
        assert!(save_book(&path, BookFormat::Csv, &book(), None, &config, None).is_err());
        let path = dir.path().join("face.vpd");
        assert!(save_book(&path, BookFormat::Vpd, &book(), None, &config, None).is_err());
    }

    #[test]
    fn test_vpd_writes_selected_pose() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let rig = rig();
        let path = dir.path().join("open.vpd");
        save_book(&path, BookFormat::Vpd, &book(), Some(&rig), &config, Some("open")).unwrap();

        let loaded = load_book(&path, BookFormat::Vpd, Some(&rig), &config).unwrap();
        assert_eq!(loaded.name(), "open");
        assert_eq!(loaded.len(), 1);
        let pose = &loaded.poses()[0];
        assert!(pose.bone("jaw").is_some());
        assert!(pose.bone("head").is_none());

        assert!(save_book(&path, BookFormat::Vpd, &book(), Some(&rig), &config, Some("nope")).is_err());
    }

    #[test]
    fn test_clip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let path = dir.path().join("face_clip.json");
        save_book(&path, BookFormat::Clip, &book(), None, &config, None).unwrap();

        let loaded = load_book(&path, BookFormat::Clip, None, &config).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.poses()[0].name(), "nod");
        let head = loaded.poses()[0].bone("head").unwrap();
        assert!(head.transform.location().abs_diff_eq(DVec3::Z, 1e-9));
    }

    #[test]
    fn test_failed_saves_keep_destination() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let clip = dir.path().join("face_clip.json");
        let rig_path = dir.path().join("rig.json");
        std::fs::write(&clip, "old clip").unwrap();
        std::fs::write(&rig_path, "old rig").unwrap();
        // Occupied temp slots make the write fail before the rename
        std::fs::create_dir(dir.path().join(".face_clip.json.tmp")).unwrap();
        std::fs::create_dir(dir.path().join(".rig.json.tmp")).unwrap();

        assert!(save_book(&clip, BookFormat::Clip, &book(), None, &config, None).is_err());
        assert!(save_rig(&rig_path, &rig()).is_err());
        assert_eq!(std::fs::read_to_string(&clip).unwrap(), "old clip");
        assert_eq!(std::fs::read_to_string(&rig_path).unwrap(), "old rig");
    }

    #[test]
    fn test_rig_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("rig.toml");
        std::fs::write(
            &toml_path,
            "name = \"Rig\"\n\n[[bones]]\nname = \"head\"\nexternal_name = \"頭\"\n\n[[bones]]\nname = \"jaw\"\n",
        )
        .unwrap();
        let rig = load_rig(&toml_path).unwrap();
        assert_eq!(rig.bones().len(), 2);
        assert_eq!(rig.external_name("head").as_deref(), Some("頭"));

        let json_path = dir.path().join("rig.json");
        save_rig(&json_path, &rig).unwrap();
        let again = load_rig(&json_path).unwrap();
        assert_eq!(again.bones(), rig.bones());
    }
}
