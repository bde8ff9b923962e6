//! Legacy keyframed pose clips
//!
//! The host's older pose-library mechanism: an animation clip where each pose
//! is a named marker and each bone channel is an fcurve keyed at the marker's
//! frame. Channel paths look like `pose.bones["jaw"].rotation_quaternion`.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::ImportReport;
use crate::model::{Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::{EulerOrder, Transform, angle_from_identity, euler_to_quat};

const BONE_PATH_PREFIX: &str = "pose.bones";
const CLIP_SUFFIX: &str = "_pose_library";
const FALLBACK_BOOK_NAME: &str = "PoseBook_from_PoseLib";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    pub data_path: String,
    pub array_index: usize,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl FCurve {
    pub fn new(data_path: impl Into<String>, array_index: usize) -> Self {
        Self {
            data_path: data_path.into(),
            array_index,
            keyframes: Vec::new(),
        }
    }

    /// Key `value` at `frame`, replacing an existing key there
    pub fn insert(&mut self, frame: f64, value: f64) {
        match self.keyframes.iter_mut().find(|k| k.frame == frame) {
            Some(key) => key.value = value,
            None => self.keyframes.push(Keyframe { frame, value }),
        }
    }

    /// Value of the key exactly at `frame`
    pub fn value_at(&self, frame: f64) -> Option<f64> {
        self.keyframes.iter().find(|k| k.frame == frame).map(|k| k.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub frame: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseClip {
    pub name: String,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub fcurves: Vec<FCurve>,
}

impl PoseClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_marker(&mut self, name: impl Into<String>, frame: i32) {
        self.markers.push(Marker {
            name: name.into(),
            frame,
        });
    }

    pub fn fcurve(&self, data_path: &str, array_index: usize) -> Option<&FCurve> {
        self.fcurves
            .iter()
            .find(|c| c.data_path == data_path && c.array_index == array_index)
    }

    /// Existing fcurve for the channel, or a new one appended
    pub fn ensure_fcurve(&mut self, data_path: &str, array_index: usize) -> &mut FCurve {
        let index = match self
            .fcurves
            .iter()
            .position(|c| c.data_path == data_path && c.array_index == array_index)
        {
            Some(index) => index,
            None => {
                self.fcurves.push(FCurve::new(data_path, array_index));
                self.fcurves.len() - 1
            }
        };
        &mut self.fcurves[index]
    }
}

/// `pose.bones["name"]`
fn bone_path(bone: &str) -> String {
    format!("{BONE_PATH_PREFIX}[\"{bone}\"]")
}

/// `pose.bones["jaw"].location` → `("jaw", "location")`
fn split_bone_path(data_path: &str) -> Option<(&str, &str)> {
    let rest = data_path.strip_prefix(BONE_PATH_PREFIX)?.strip_prefix("[\"")?;
    let (bone, channel) = rest.split_once("\"]")?;
    Some((bone, channel.strip_prefix('.')?))
}

// ============================================================================
// Rotation reconciliation
// ============================================================================

/// Choose between a rotation rebuilt from Euler channels and a stored
/// quaternion channel. Only one of them is normally authored, the other left
/// at identity: the Euler candidate wins when its angle from identity is
/// strictly larger, otherwise the quaternion wins.
pub fn reconcile_rotation_channels(euler: DQuat, quaternion: DQuat) -> DQuat {
    if angle_from_identity(euler) > angle_from_identity(quaternion) {
        euler
    } else {
        quaternion
    }
}

// ============================================================================
// Export
// ============================================================================

/// Build a clip named `<book>_pose_library` (or after the rig when the book
/// is unnamed). Pose `i` becomes a marker at frame `i`.
pub fn export_book(book: &PoseBook, rig: Option<&dyn Rig>) -> PoseClip {
    let base = if book.name().is_empty() {
        rig.map(|r| r.name().to_string()).unwrap_or_default()
    } else {
        book.name().to_string()
    };
    let mut clip = PoseClip::new(format!("{base}{CLIP_SUFFIX}"));

    for (index, pose) in book.poses().iter().enumerate() {
        let frame = index as i32;
        clip.add_marker(pose.name(), frame);
        let key = f64::from(frame);

        for bone in pose.bones() {
            let path = bone_path(&bone.name);
            let t = &bone.transform;
            for (i, value) in t.location().to_array().into_iter().enumerate() {
                clip.ensure_fcurve(&format!("{path}.location"), i).insert(key, value);
            }
            for (i, value) in t.rotation_wxyz().into_iter().enumerate() {
                clip.ensure_fcurve(&format!("{path}.rotation_quaternion"), i)
                    .insert(key, value);
            }
            for (i, value) in t.scale().to_array().into_iter().enumerate() {
                clip.ensure_fcurve(&format!("{path}.scale"), i).insert(key, value);
            }
        }
    }

    tracing::info!("Exported {} poses to clip '{}'", book.len(), clip.name);
    clip
}

// ============================================================================
// Import
// ============================================================================

/// Raw channel values of one bone at one marker
struct Channels {
    location: [f64; 3],
    quaternion: [f64; 4],
    euler: [f64; 3],
    axis_angle: [f64; 4],
    scale: [f64; 3],
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            quaternion: [1.0, 0.0, 0.0, 0.0],
            euler: [0.0; 3],
            axis_angle: [0.0; 4],
            scale: [1.0; 3],
        }
    }
}

impl Channels {
    /// Store one value; false for an unknown channel or index
    fn set(&mut self, channel: &str, index: usize, value: f64) -> bool {
        let slot = match channel {
            "location" => self.location.get_mut(index),
            "rotation_quaternion" => self.quaternion.get_mut(index),
            "rotation_euler" => self.euler.get_mut(index),
            "rotation_axis_angle" => self.axis_angle.get_mut(index),
            "scale" => self.scale.get_mut(index),
            _ => None,
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn to_transform(&self) -> Transform {
        let euler = euler_to_quat(EulerOrder::XYZ, DVec3::from_array(self.euler));
        let [w, x, y, z] = self.quaternion;
        let quaternion = DQuat::from_xyzw(x, y, z, w);
        let mut rotation = reconcile_rotation_channels(euler, quaternion);

        let [angle, ax, ay, az] = self.axis_angle;
        let axis = DVec3::new(ax, ay, az);
        if angle != 0.0 && axis.length_squared() > 0.0 {
            rotation = reconcile_rotation_channels(DQuat::from_axis_angle(axis.normalize(), angle), rotation);
        }

        Transform::new(DVec3::from_array(self.location), rotation, DVec3::from_array(self.scale))
    }
}

/// Rebuild a book from a clip: one pose per marker from the keys at its
/// frame. With a rig, bones it lacks are skipped with a warning.
pub fn import_book(clip: &PoseClip, rig: Option<&dyn Rig>) -> (PoseBook, ImportReport) {
    let mut report = ImportReport::default();
    let name = if !clip.name.is_empty() {
        clip.name.clone()
    } else {
        match rig.map(|r| r.name()).filter(|n| !n.is_empty()) {
            Some(rig_name) => rig_name.to_string(),
            None => FALLBACK_BOOK_NAME.to_string(),
        }
    };
    let mut book = PoseBook::new(name);

    for marker in &clip.markers {
        let frame = f64::from(marker.frame);
        // First-seen bone order
        let mut bones: Vec<(String, Channels)> = Vec::new();

        for curve in clip.fcurves.iter().filter(|c| c.data_path.starts_with(BONE_PATH_PREFIX)) {
            let Some(value) = curve.value_at(frame) else {
                continue;
            };
            let Some((bone, channel)) = split_bone_path(&curve.data_path) else {
                report.warn(format!("Unrecognized channel path '{}', skipping", curve.data_path));
                continue;
            };

            let index = match bones.iter().position(|(name, _)| name == bone) {
                Some(index) => index,
                None => {
                    bones.push((bone.to_string(), Channels::default()));
                    bones.len() - 1
                }
            };
            if !bones[index].1.set(channel, curve.array_index, value) {
                report.warn(format!(
                    "Unsupported channel '{}[{}]', skipping",
                    curve.data_path, curve.array_index
                ));
            }
        }

        let mut pose = Pose::new(marker.name.as_str());
        for (bone, channels) in bones {
            if let Some(rig) = rig
                && !rig.has_bone(&bone)
            {
                report.warn(format!("Bone '{}' not found in '{}', skipping", bone, rig.name()));
                continue;
            }
            pose.upsert_bone(bone, channels.to_transform());
        }
        book.add_pose(pose);
    }

    tracing::info!("Imported {} poses from clip '{}'", book.len(), clip.name);
    (book, report)
}
