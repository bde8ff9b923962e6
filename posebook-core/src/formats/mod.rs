//! Interchange codecs
//!
//! | Codec | Direction | Failure policy |
//! |---|---|---|
//! | [`json`] | book ⇄ UTF-8 JSON | strict JSON, permissive fields |
//! | [`pmx_csv`] | book ⇄ PMX Editor morph CSV | tolerant, warnings |
//! | [`vpd`] | pose ⇄ Shift_JIS pose file | strict, no partial result |
//! | [`bone_morph`] | book ⇄ model root bone morphs | tolerant, warnings |
//! | [`pose_clip`] | book ⇄ keyframed pose clip | tolerant, warnings |

pub mod bone_morph;
pub mod json;
pub mod pmx_csv;
pub mod pose_clip;
pub mod vpd;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{PoseLibError, Result};

/// Non-fatal problems collected by a tolerant import or export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub warnings: Vec<String>,
}

impl ImportReport {
    /// Record and log a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: ImportReport) {
        self.warnings.extend(other.warnings);
    }
}

/// Write `bytes` to a sibling temp file, then rename over `path`. On failure
/// the destination is left as it was.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        PoseLibError::io(path, e)
    })
}

/// Book name derived from an import path (file stem)
pub(crate) fn book_name_from_path(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
