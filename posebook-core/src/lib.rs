//! Pose library core
//!
//! Data model, coordinate conversion, weighted blending and interchange
//! codecs for named per-bone pose sets.
//!
//! Host-specific surfaces (the skeleton being posed, the scene graph holding
//! external model roots, animation clips) are modelled as narrow traits and
//! in-memory structs so the core stays independent of any host runtime.

pub mod blend;
pub mod category;
pub mod convert;
pub mod error;
pub mod formats;
pub mod model;
pub mod naming;
pub mod preview;
pub mod rig;
pub mod transform;

pub use blend::{ApplyMode, BlendResult, CaptureOptions, apply_blend, apply_pose, blend, capture};
pub use category::{CategoryFilter, PoseCategory, guess_category};
pub use convert::{Converter, DEFAULT_UNIT_SCALE, degrees_to_quaternion, quaternion_to_degrees, to_armature_space};
pub use error::{PoseLibError, Result};
pub use formats::ImportReport;
pub use model::{
    BoneEntry, BookId, CleanOptions, CleanReason, CleanReport, CleanedBone, MoveDirection, Placement, Pose, PoseBook,
    PoseId, PoseLibrary,
};
pub use naming::{RenameOutcome, Renamer, resolve_name_collision};
pub use preview::{PreviewEvent, PreviewSession, PreviewState};
pub use rig::{Armature, Rig, RigBone};
pub use transform::{EulerOrder, LocalRotation, RotationMode, Transform};
