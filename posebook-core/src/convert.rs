//! Coordinate conversion between host bone space and the external model space
//!
//! The external model tool uses a left-handed, Y-up basis: relative to the
//! host the Y and Z basis vectors are swapped, and rotations are re-expressed
//! by transforming the axis of their axis-angle form (negated for the
//! handedness flip) while keeping the angle.

use glam::{DMat3, DMat4, DQuat, DVec3};

use crate::rig::Rig;
use crate::transform::{EulerOrder, Transform, euler_to_quat, normalize_or_identity, quat_to_euler};

/// Unit scale between host metres and external model units
pub const DEFAULT_UNIT_SCALE: f64 = 12.5;

// ============================================================================
// Converter
// ============================================================================

/// Bone-scoped converter between host bone-local values and external values.
///
/// Built once per bone per operation; never cache across operations since the
/// host skeleton may change in between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Converter {
    /// Reference frame is the bone's rest (bind) matrix
    Rest { mat: DMat3, scale: f64 },
    /// Reference frame is the bone's live pose matrix, folding in the current
    /// local rotation and location offset
    Pose {
        mat: DMat3,
        mat_rot: DMat3,
        mat_loc: DMat3,
        offset: DVec3,
        scale: f64,
        invert: bool,
    },
    /// Unresolvable bone: conversion is a no-op
    Passthrough,
}

/// Rows 1 and 2 swapped, then transposed
fn swap_yz_basis(reference: DMat4) -> DMat3 {
    let m = DMat3::from_mat4(reference);
    DMat3::from_cols(m.row(0), m.row(2), m.row(1))
}

fn rotation_of(m: DMat3) -> DQuat {
    let (_, rotation, _) = DMat4::from_mat3(m).to_scale_rotation_translation();
    normalize_or_identity(rotation)
}

impl Converter {
    /// Rest-pose policy from an armature-space reference matrix
    pub fn rest(reference: DMat4, scale: f64, invert: bool) -> Self {
        let mut mat = swap_yz_basis(reference);
        if invert {
            mat = mat.inverse();
        }
        Converter::Rest { mat, scale }
    }

    /// Current-pose policy from the bone's armature-space pose matrix and its
    /// local basis (the bone's own location / rotation / scale channels)
    pub fn pose(reference: DMat4, basis: &Transform, scale: f64, invert: bool) -> Self {
        let mut mat = swap_yz_basis(reference);
        let mut mat_rot = basis.to_mat3();
        let mut mat_loc = mat_rot * mat;
        if invert {
            mat = mat.inverse();
            mat_rot = mat_rot.inverse();
            mat_loc = mat_loc.inverse();
        }
        Converter::Pose {
            mat,
            mat_rot,
            mat_loc,
            offset: basis.location(),
            scale,
            invert,
        }
    }

    /// Pick the policy the way the host is displaying the rig: the rest-pose
    /// policy while the rig shows its rest position, otherwise the live pose.
    pub fn for_bone<R: Rig + ?Sized>(rig: &R, bone: &str, scale: f64, invert: bool) -> Self {
        if !rig.has_bone(bone) {
            return Converter::Passthrough;
        }
        let world = rig.world_matrix();
        if rig.is_rest_position() {
            match rig.rest_matrix(bone) {
                Some(rest) => Converter::rest(world * rest, scale, invert),
                None => Converter::Passthrough,
            }
        } else {
            match (rig.pose_matrix(bone), rig.local_transform(bone)) {
                (Some(pose), Some(basis)) => Converter::pose(world * pose, &basis, scale, invert),
                _ => Converter::Passthrough,
            }
        }
    }

    pub fn convert_location(&self, location: DVec3) -> DVec3 {
        match *self {
            Converter::Rest { mat, scale } => mat * location * scale,
            Converter::Pose {
                mat_loc,
                offset,
                scale,
                invert: false,
                ..
            } => offset + mat_loc * location * scale,
            Converter::Pose {
                mat_loc,
                offset,
                scale,
                invert: true,
                ..
            } => mat_loc * (location - offset) * scale,
            Converter::Passthrough => location,
        }
    }

    pub fn convert_rotation(&self, rotation: DQuat) -> DQuat {
        match *self {
            Converter::Rest { mat, .. } => remap_axis(mat, rotation),
            Converter::Pose {
                mat,
                mat_rot,
                invert: false,
                ..
            } => {
                let rot = remap_axis_unnormalized(mat, rotation);
                rotation_of(mat_rot * DMat3::from_quat(rot))
            }
            Converter::Pose {
                mat,
                mat_rot,
                invert: true,
                ..
            } => {
                let rot = rotation_of(mat_rot * DMat3::from_quat(normalize_or_identity(rotation)));
                remap_axis(mat, rot)
            }
            Converter::Passthrough => rotation,
        }
    }
}

fn remap_axis_unnormalized(mat: DMat3, rotation: DQuat) -> DQuat {
    let (axis, angle) = normalize_or_identity(rotation).to_axis_angle();
    match (mat * axis * -1.0).try_normalize() {
        Some(axis) => DQuat::from_axis_angle(axis, angle),
        None => DQuat::IDENTITY,
    }
}

fn remap_axis(mat: DMat3, rotation: DQuat) -> DQuat {
    normalize_or_identity(remap_axis_unnormalized(mat, rotation))
}

// ============================================================================
// Armature space
// ============================================================================

/// Re-express a bone-local transform in armature space (or back with
/// `invert`). `rest` is the bone's rest matrix; `None` leaves the value
/// unchanged.
pub fn to_armature_space(transform: &Transform, rest: Option<DMat4>, invert: bool) -> Transform {
    let Some(rest) = rest else {
        return *transform;
    };
    let mut mtx = DMat3::from_mat4(rest);
    if invert {
        mtx = mtx.inverse();
    }

    let location = mtx * transform.location();
    let rotation = remap_axis(mtx, transform.rotation());
    let scale = mtx * (transform.scale() - DVec3::ONE) + DVec3::ONE;
    Transform::new(location, rotation, scale)
}

// ============================================================================
// Degrees
// ============================================================================

/// Axis order of the external tool's Euler degrees
pub const EXTERNAL_EULER_ORDER: EulerOrder = EulerOrder::YXZ;

/// External Euler degrees (x, y, z) to quaternion
pub fn degrees_to_quaternion(degrees: [f64; 3]) -> DQuat {
    let radians = DVec3::from_array(degrees.map(f64::to_radians));
    euler_to_quat(EXTERNAL_EULER_ORDER, radians)
}

/// Quaternion to external Euler degrees (x, y, z), each wrapped into `[0, 360)`
pub fn quaternion_to_degrees(q: DQuat) -> [f64; 3] {
    let radians = quat_to_euler(EXTERNAL_EULER_ORDER, q);
    radians.to_array().map(|r| wrap_degrees(r.to_degrees()))
}

fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative input
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
