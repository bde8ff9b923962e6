//! Per-bone rigid + scale offsets and rotation-mode helpers
//!
//! A [`Transform`] is the leaf value stored for every bone of a pose. The
//! rotation is always kept normalized; every constructor and setter goes
//! through [`normalize_or_identity`].

use glam::{DMat3, DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// Default tolerance used by the "has transform" tests
pub const DEFAULT_THRESHOLD: f64 = 1e-6;

// ============================================================================
// Transform
// ============================================================================

/// Location / rotation / scale offset of a single bone
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    location: DVec3,
    rotation: DQuat,
    scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        location: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn new(location: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            location,
            rotation: normalize_or_identity(rotation),
            scale,
        }
    }

    /// Build from raw arrays, rotation given as (w, x, y, z)
    pub fn from_arrays(location: [f64; 3], rotation_wxyz: [f64; 4], scale: [f64; 3]) -> Self {
        let [w, x, y, z] = rotation_wxyz;
        Self::new(
            DVec3::from_array(location),
            DQuat::from_xyzw(x, y, z, w),
            DVec3::from_array(scale),
        )
    }

    pub fn from_location(location: DVec3) -> Self {
        Self::new(location, DQuat::IDENTITY, DVec3::ONE)
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self::new(DVec3::ZERO, rotation, DVec3::ONE)
    }

    pub fn location(&self) -> DVec3 {
        self.location
    }

    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    pub fn scale(&self) -> DVec3 {
        self.scale
    }

    /// Rotation as (w, x, y, z), the order used by the JSON and clip codecs
    pub fn rotation_wxyz(&self) -> [f64; 4] {
        let q = self.rotation;
        [q.w, q.x, q.y, q.z]
    }

    pub fn set_location(&mut self, location: DVec3) {
        self.location = location;
    }

    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = normalize_or_identity(rotation);
    }

    pub fn set_scale(&mut self, scale: DVec3) {
        self.scale = scale;
    }

    /// True when any channel differs from identity beyond `threshold`
    pub fn has_transform(&self, threshold: f64) -> bool {
        has_transform(self.location, self.rotation, self.scale, threshold)
    }

    pub fn is_identity(&self) -> bool {
        !self.has_transform(DEFAULT_THRESHOLD)
    }

    /// Local basis matrix (translation · rotation · scale)
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.location)
    }

    /// Rotation · scale part of [`Self::to_matrix`]
    pub fn to_mat3(&self) -> DMat3 {
        DMat3::from_quat(self.rotation) * DMat3::from_diagonal(self.scale)
    }

    /// Component-wise comparison; `q` and `-q` are the same rotation
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        self.location.abs_diff_eq(other.location, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

/// Normalize a quaternion, collapsing degenerate input to identity
pub fn normalize_or_identity(q: DQuat) -> DQuat {
    let len_sq = q.length_squared();
    if !len_sq.is_finite() || len_sq < 1e-24 {
        DQuat::IDENTITY
    } else {
        q.normalize()
    }
}

// ============================================================================
// Tolerance tests
// ============================================================================

pub fn has_translation(location: DVec3, threshold: f64) -> bool {
    location.abs().max_element() > threshold
}

/// Angular deviation from identity exceeds `threshold` (radians)
pub fn has_rotation(rotation: DQuat, threshold: f64) -> bool {
    angle_from_identity(rotation) > threshold
}

pub fn has_scale(scale: DVec3, threshold: f64) -> bool {
    (scale - DVec3::ONE).abs().max_element() > threshold
}

pub fn has_transform(location: DVec3, rotation: DQuat, scale: DVec3, threshold: f64) -> bool {
    has_translation(location, threshold)
        || has_rotation(rotation, threshold)
        || has_scale(scale, threshold)
}

/// Full rotation angle between `q` and identity, in `[0, π]`
pub fn angle_from_identity(q: DQuat) -> f64 {
    let dot = normalize_or_identity(q).dot(DQuat::IDENTITY);
    2.0 * dot.abs().min(1.0).acos()
}

// ============================================================================
// Rotation modes
// ============================================================================

/// Euler axis order, named the host way: `XYZ` applies X first, then Y, then Z
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EulerOrder {
    #[default]
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl EulerOrder {
    /// Axis indices in application order
    fn axes(self) -> [usize; 3] {
        match self {
            EulerOrder::XYZ => [0, 1, 2],
            EulerOrder::XZY => [0, 2, 1],
            EulerOrder::YXZ => [1, 0, 2],
            EulerOrder::YZX => [1, 2, 0],
            EulerOrder::ZXY => [2, 0, 1],
            EulerOrder::ZYX => [2, 1, 0],
        }
    }

    /// Equivalent glam sequence (intrinsic, reversed axis order)
    fn glam(self) -> EulerRot {
        match self {
            EulerOrder::XYZ => EulerRot::ZYX,
            EulerOrder::XZY => EulerRot::YZX,
            EulerOrder::YXZ => EulerRot::ZXY,
            EulerOrder::YZX => EulerRot::XZY,
            EulerOrder::ZXY => EulerRot::YXZ,
            EulerOrder::ZYX => EulerRot::XYZ,
        }
    }
}

/// Euler angles (radians, indexed by axis x/y/z) to quaternion
pub fn euler_to_quat(order: EulerOrder, angles: DVec3) -> DQuat {
    let [first, second, third] = order.axes();
    DQuat::from_euler(order.glam(), angles[third], angles[second], angles[first])
}

/// Quaternion to Euler angles (radians, indexed by axis x/y/z)
pub fn quat_to_euler(order: EulerOrder, q: DQuat) -> DVec3 {
    let [first, second, third] = order.axes();
    let (c, b, a) = normalize_or_identity(q).to_euler(order.glam());
    let mut angles = DVec3::ZERO;
    angles[first] = a;
    angles[second] = b;
    angles[third] = c;
    angles
}

/// How a host bone stores its rotation channels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationMode {
    #[default]
    Quaternion,
    AxisAngle,
    Euler(EulerOrder),
}

/// Rotation value in the bone's own representation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalRotation {
    /// Stored (w, x, y, z) like the host's quaternion channel
    Quaternion { wxyz: [f64; 4] },
    AxisAngle { axis: DVec3, angle: f64 },
    Euler { order: EulerOrder, angles: DVec3 },
}

impl Default for LocalRotation {
    fn default() -> Self {
        LocalRotation::Quaternion {
            wxyz: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl LocalRotation {
    pub fn mode(&self) -> RotationMode {
        match self {
            LocalRotation::Quaternion { .. } => RotationMode::Quaternion,
            LocalRotation::AxisAngle { .. } => RotationMode::AxisAngle,
            LocalRotation::Euler { order, .. } => RotationMode::Euler(*order),
        }
    }

    /// Normalized quaternion for any mode; exact for quaternion mode
    pub fn to_quat(&self) -> DQuat {
        match *self {
            LocalRotation::Quaternion { wxyz: [w, x, y, z] } => {
                normalize_or_identity(DQuat::from_xyzw(x, y, z, w))
            }
            LocalRotation::AxisAngle { axis, angle } => match axis.try_normalize() {
                Some(axis) => DQuat::from_axis_angle(axis, angle),
                None => DQuat::IDENTITY,
            },
            LocalRotation::Euler { order, angles } => euler_to_quat(order, angles),
        }
    }

    /// Express `q` in the given mode
    pub fn from_quat(mode: RotationMode, q: DQuat) -> Self {
        let q = normalize_or_identity(q);
        match mode {
            RotationMode::Quaternion => LocalRotation::Quaternion {
                wxyz: [q.w, q.x, q.y, q.z],
            },
            RotationMode::AxisAngle => {
                let (axis, angle) = q.to_axis_angle();
                LocalRotation::AxisAngle { axis, angle }
            }
            RotationMode::Euler(order) => LocalRotation::Euler {
                order,
                angles: quat_to_euler(order, q),
            },
        }
    }
}
