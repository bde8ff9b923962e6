//! Bone morphs stored on an external model root
//!
//! An imported external model is a node tree whose top node is tagged as the
//! model root; the root owns a table of named bone morphs. Values are copied
//! as-is in both directions (no coordinate conversion).

use glam::{DQuat, DVec3};

use super::ImportReport;
use crate::category::PoseCategory;
use crate::model::{Pose, PoseBook};
use crate::rig::Rig;
use crate::transform::Transform;

/// One bone offset inside a morph
#[derive(Clone, Debug, PartialEq)]
pub struct BoneMorphData {
    pub bone: String,
    /// External bone id, `-1` when unassigned
    pub bone_id: i32,
    pub location: DVec3,
    pub rotation: DQuat,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneMorph {
    pub name: String,
    /// English name
    pub name_e: String,
    pub category: PoseCategory,
    pub data: Vec<BoneMorphData>,
}

/// Model-root tag with its morph table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRoot {
    pub bone_morphs: Vec<BoneMorph>,
}

impl ModelRoot {
    pub fn morph(&self, name: &str) -> Option<&BoneMorph> {
        self.bone_morphs.iter().find(|m| m.name == name)
    }

    pub fn morph_mut(&mut self, name: &str) -> Option<&mut BoneMorph> {
        self.bone_morphs.iter_mut().find(|m| m.name == name)
    }
}

// ============================================================================
// Scene graph
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub model_root: Option<ModelRoot>,
}

/// Parent-linked node arena
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node {
            name: name.into(),
            parent,
            model_root: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_model_root(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = self.add_node(name, parent);
        self.nodes[id.0].model_root = Some(ModelRoot::default());
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Nearest node tagged as model root, starting at `node` itself
    pub fn find_model_root(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        // Bounded walk so a malformed parent cycle cannot spin forever
        for _ in 0..=self.nodes.len() {
            let id = current?;
            let n = self.node(id)?;
            if n.model_root.is_some() {
                return Some(id);
            }
            current = n.parent;
        }
        None
    }

    /// Model root owning `node`, if any
    pub fn model_root_mut(&mut self, node: NodeId) -> Option<&mut ModelRoot> {
        let root = self.find_model_root(node)?;
        self.nodes.get_mut(root.0)?.model_root.as_mut()
    }

    pub fn model_root(&self, node: NodeId) -> Option<&ModelRoot> {
        let root = self.find_model_root(node)?;
        self.node(root)?.model_root.as_ref()
    }
}

// ============================================================================
// Conversion
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoneMorphOptions {
    /// Name morphs after the pose's alternate name when it has one
    pub use_alt_names: bool,
    /// Drop every existing morph first
    pub clear_existing: bool,
}

/// External id of `bone`, assigning `max + 1` over the rig on first use
fn ensure_bone_id(rig: &mut dyn Rig, bone: &str) -> i32 {
    match rig.bone_id(bone) {
        Some(id) if id >= 0 => id,
        _ => {
            let next = rig
                .bone_names()
                .iter()
                .filter_map(|b| rig.bone_id(b))
                .max()
                .unwrap_or(-1)
                + 1;
            rig.set_bone_id(bone, next);
            next
        }
    }
}

/// Write every pose of `book` into the morph table. Existing morphs with the
/// same name are refilled, others are created with the pose's category.
/// Bones missing from the rig are skipped with a warning.
pub fn send_to_bone_morphs(
    book: &PoseBook,
    rig: &mut dyn Rig,
    root: &mut ModelRoot,
    options: &BoneMorphOptions,
) -> ImportReport {
    let mut report = ImportReport::default();
    if options.clear_existing {
        root.bone_morphs.clear();
    }

    for pose in book.poses() {
        let (name, name_e) = if options.use_alt_names && !pose.name_alt.is_empty() {
            (pose.name_alt.clone(), pose.name().to_string())
        } else {
            (pose.name().to_string(), pose.name_alt.clone())
        };

        let mut data = Vec::with_capacity(pose.bone_count());
        for bone in pose.bones() {
            if !rig.has_bone(&bone.name) {
                report.warn(format!(
                    "Bone '{}' not found in '{}', skipping",
                    bone.name,
                    rig.name()
                ));
                continue;
            }
            data.push(BoneMorphData {
                bone: bone.name.clone(),
                bone_id: ensure_bone_id(rig, &bone.name),
                location: bone.transform.location(),
                rotation: bone.transform.rotation(),
            });
        }

        match root.morph_mut(&name) {
            Some(morph) => morph.data = data,
            None => root.bone_morphs.push(BoneMorph {
                name,
                name_e,
                category: pose.category,
                data,
            }),
        }
    }

    tracing::info!("Sent {} poses to bone morphs", book.len());
    report
}

/// One pose per morph, in table order, into a book named `<rig>_bonemorph`
pub fn load_from_bone_morphs(root: &ModelRoot, rig_name: &str) -> PoseBook {
    let mut book = PoseBook::new(format!("{rig_name}_bonemorph"));
    for morph in &root.bone_morphs {
        let mut pose = Pose::new(morph.name.as_str()).with_category(morph.category);
        pose.name_alt = morph.name_e.clone();
        for entry in &morph.data {
            pose.upsert_bone(
                entry.bone.as_str(),
                Transform::new(entry.location, entry.rotation, DVec3::ONE),
            );
        }
        book.add_pose(pose);
    }
    book
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::{Armature, RigBone};

    fn rig() -> Armature {
        Armature::new("Miku")
            .with_bone(RigBone::new("head"))
            .with_bone(RigBone::new("jaw"))
            .with_bone(RigBone::new("eye"))
    }

    fn book() -> PoseBook {
        let mut book = PoseBook::new("Face");
        let mut open = Pose::new("open")
            .with_category(PoseCategory::Mouth)
            .with_bone("jaw", Transform::from_rotation(DQuat::from_rotation_x(0.2)))
            .with_bone("head", Transform::from_location(DVec3::Y));
        open.name_alt = "あ".to_string();
        book.add_pose(open);
        book.add_pose(Pose::new("look").with_bone("eye", Transform::from_location(DVec3::X)));
        book
    }

    #[test]
    fn test_find_model_root_walks_parents() {
        let mut scene = SceneGraph::new();
        let root = scene.add_model_root("Miku", None);
        let armature = scene.add_node("Miku_arm", Some(root));
        let mesh = scene.add_node("Miku_mesh", Some(armature));
        let loose = scene.add_node("Camera", None);

        assert_eq!(scene.find_model_root(mesh), Some(root));
        assert_eq!(scene.find_model_root(root), Some(root));
        assert_eq!(scene.find_model_root(loose), None);
        assert!(scene.model_root_mut(armature).is_some());
    }

    #[test]
    fn test_find_model_root_survives_cycle() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node("a", None);
        let b = scene.add_node("b", Some(a));
        scene.node_mut(a).unwrap().parent = Some(b);
        assert_eq!(scene.find_model_root(a), None);
    }

    #[test]
    fn test_send_creates_morphs_and_ids() {
        let mut rig = rig();
        rig.set_bone_id("head", 4);
        let mut root = ModelRoot::default();

        let report = send_to_bone_morphs(&book(), &mut rig, &mut root, &BoneMorphOptions::default());
        assert!(report.is_clean());
        assert_eq!(root.bone_morphs.len(), 2);

        let open = root.morph("open").unwrap();
        assert_eq!(open.category, PoseCategory::Mouth);
        assert_eq!(open.name_e, "あ");
        // jaw gets max + 1, head keeps its id
        assert_eq!(open.data[0].bone_id, 5);
        assert_eq!(open.data[1].bone_id, 4);
        assert_eq!(root.morph("look").unwrap().data[0].bone_id, 6);
        assert_eq!(rig.bone_id("jaw"), Some(5));
    }

    #[test]
    fn test_send_refills_existing() {
        let mut rig = rig();
        let mut root = ModelRoot::default();
        root.bone_morphs.push(BoneMorph {
            name: "open".to_string(),
            category: PoseCategory::Other,
            data: vec![BoneMorphData {
                bone: "eye".to_string(),
                bone_id: 0,
                location: DVec3::Z,
                rotation: DQuat::IDENTITY,
            }],
            ..Default::default()
        });
        root.bone_morphs.push(BoneMorph {
            name: "keep".to_string(),
            ..Default::default()
        });

        send_to_bone_morphs(&book(), &mut rig, &mut root, &BoneMorphOptions::default());
        assert_eq!(root.bone_morphs.len(), 3);
        let open = root.morph("open").unwrap();
        // Existing category is kept, data replaced
        assert_eq!(open.category, PoseCategory::Other);
        assert_eq!(open.data.len(), 2);
        assert_eq!(open.data[0].bone, "jaw");

        let options = BoneMorphOptions {
            clear_existing: true,
            ..Default::default()
        };
        send_to_bone_morphs(&book(), &mut rig, &mut root, &options);
        assert!(root.morph("keep").is_none());
        assert_eq!(root.bone_morphs.len(), 2);
    }

    #[test]
    fn test_send_alt_names_and_missing_bones() {
        let mut rig = rig();
        let mut book = book();
        book.pose_mut(1)
            .unwrap()
            .upsert_bone("tail", Transform::from_location(DVec3::X));
        let mut root = ModelRoot::default();
        let options = BoneMorphOptions {
            use_alt_names: true,
            ..Default::default()
        };

        let report = send_to_bone_morphs(&book, &mut rig, &mut root, &options);
        assert_eq!(report.warnings.len(), 1);
        assert!(root.morph("あ").is_some());
        assert_eq!(root.morph("あ").unwrap().name_e, "open");
        assert_eq!(root.morph("look").unwrap().data.len(), 1);
    }

    #[test]
    fn test_load_copies_values() {
        let mut rig = rig();
        let mut root = ModelRoot::default();
        send_to_bone_morphs(&book(), &mut rig, &mut root, &BoneMorphOptions::default());

        let loaded = load_from_bone_morphs(&root, rig.name());
        assert_eq!(loaded.name(), "Miku_bonemorph");
        assert_eq!(loaded.len(), 2);
        let open = &loaded.poses()[0];
        assert_eq!(open.name(), "open");
        assert_eq!(open.category, PoseCategory::Mouth);
        assert_eq!(open.bone("head").unwrap().transform.location(), DVec3::Y);
        assert!(
            open.bone("jaw")
                .unwrap()
                .transform
                .rotation()
                .abs_diff_eq(DQuat::from_rotation_x(0.2), 1e-12)
        );
    }
}
