//! Tool configuration (posebook.toml)
//!
//! Every section and key is optional:
//!
//! ```toml
//! [csv]
//! scale = 12.5
//! use_external_bone_names = true
//! use_alt_pose_names = false
//!
//! [vpd]
//! scale = 12.5
//!
//! [json]
//! space = "ARMATURE"
//!
//! [capture]
//! ignore_hidden = true
//! ignore_driven = true
//!
//! [clean]
//! threshold = 1e-5
//! ```

use anyhow::{Context, Result};
use posebook_core::formats::json::CoordinateSpace;
use posebook_core::formats::pmx_csv::{CsvExportOptions, CsvImportOptions};
use posebook_core::formats::vpd::VpdOptions;
use posebook_core::{CaptureOptions, CleanOptions, DEFAULT_UNIT_SCALE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "posebook.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub vpd: VpdConfig,
    #[serde(default)]
    pub json: JsonConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub clean: CleanConfig,
}

/// PMX Editor CSV settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Host metres to model units (default: 12.5)
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Write external bone names where the rig has them (default: true)
    #[serde(default = "default_true")]
    pub use_external_bone_names: bool,
    /// Put alternate pose names in the morph name column (default: false)
    #[serde(default)]
    pub use_alt_pose_names: bool,
}

/// VPD settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpdConfig {
    /// Host metres to model units (default: 12.5)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

/// JSON settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsonConfig {
    /// Space bone values are written in (default: LOCAL)
    #[serde(default)]
    pub space: CoordinateSpace,
}

/// Rig capture filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Skip hidden bones (default: true)
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,
    /// Skip bones whose channels are driven (default: true)
    #[serde(default = "default_true")]
    pub ignore_driven: bool,
}

/// Pose cleanup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Transforms within this distance of identity count as no deformation
    #[serde(default = "default_clean_threshold")]
    pub threshold: f64,
}

fn default_true() -> bool {
    true
}
fn default_scale() -> f64 {
    DEFAULT_UNIT_SCALE
}
fn default_clean_threshold() -> f64 {
    1e-5
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            use_external_bone_names: default_true(),
            use_alt_pose_names: false,
        }
    }
}

impl Default for VpdConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ignore_hidden: default_true(),
            ignore_driven: default_true(),
        }
    }
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            threshold: default_clean_threshold(),
        }
    }
}

impl Config {
    pub fn csv_export(&self) -> CsvExportOptions {
        CsvExportOptions {
            scale: self.csv.scale,
            use_external_bone_names: self.csv.use_external_bone_names,
            use_alt_pose_names: self.csv.use_alt_pose_names,
        }
    }

    pub fn csv_import(&self) -> CsvImportOptions {
        CsvImportOptions {
            scale: self.csv.scale,
        }
    }

    pub fn vpd(&self) -> VpdOptions {
        VpdOptions {
            scale: self.vpd.scale,
            ..Default::default()
        }
    }

    pub fn capture(&self) -> CaptureOptions {
        CaptureOptions {
            ignore_hidden: self.capture.ignore_hidden,
            ignore_driven: self.capture.ignore_driven,
            ..Default::default()
        }
    }

    pub fn clean(&self) -> CleanOptions {
        CleanOptions {
            threshold: self.clean.threshold,
            ..Default::default()
        }
    }
}

/// Load `path`, or `posebook.toml` from the working directory when present.
/// An explicit path that can't be read is an error; a missing default file
/// means all defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}
