use super::*;
use crate::model::Pose;
use crate::rig::{Armature, RigBone};

const SAMPLE: &str = "Vocaloid Pose Data file\r\n\
\r\n\
miku.osm;\t\t// 親ファイル名\r\n\
2;\t\t\t\t// 総ポーズボーン数\r\n\
\r\n\
Bone0{センター\r\n\
  0.000000,1.250000,0.000000;\t\t\t\t// trans x,y,z\r\n\
  0.000000,0.000000,0.000000,1.000000;\t\t// Quaternion x,y,z,w\r\n\
}\r\n\
\r\n\
// a comment line\r\n\
Bone1{頭\r\n\
  0.000000,0.000000,0.000000;\r\n\
  0.000000,0.600000,0.000000,0.800000;\r\n\
}\r\n\
\r\n\
Morph0{まばたき\r\n\
  0.500000;\r\n\
}\r\n";

fn rig() -> Armature {
    let mut rig = Armature::new("Rig")
        .with_bone(RigBone::new("head").with_external_name("頭"))
        .with_bone(RigBone::new("root").with_external_name("センター"));
    rig.rest_position = true;
    rig
}

fn invalid_line(result: Result<VpdDocument>) -> usize {
    match result {
        Err(PoseLibError::InvalidFile { line, .. }) => line,
        other => panic!("expected InvalidFile, got {other:?}"),
    }
}

// ============================================================================
// Parser
// ============================================================================

#[test]
fn test_parse_sample() {
    let doc = VpdDocument::parse(SAMPLE).unwrap();
    assert_eq!(doc.model_name, "miku.osm");
    assert_eq!(doc.bones.len(), 2);
    assert_eq!(doc.bones[0].name, "センター");
    assert_eq!(doc.bones[0].location, DVec3::new(0.0, 1.25, 0.0));
    assert_eq!(doc.bones[1].name, "頭");
    // Stored x,y,z,w
    assert_eq!(doc.bones[1].rotation, DQuat::from_xyzw(0.0, 0.6, 0.0, 0.8));
    assert_eq!(
        doc.morphs,
        vec![VpdMorph {
            name: "まばたき".to_string(),
            weight: 0.5
        }]
    );
}

#[test]
fn test_declared_count_mismatch_is_invalid() {
    let text = SAMPLE.replace("2;\t\t\t\t", "3;\t\t\t\t");
    let result = VpdDocument::parse(&text);
    assert!(result.as_ref().is_err_and(PoseLibError::is_invalid_file));
    assert_eq!(invalid_line(result), 4);
}

#[test]
fn test_wrong_header_is_invalid() {
    let text = SAMPLE.replace(VPD_MAGIC, "Vocaloid Motion Data 0002");
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 1);
}

#[test]
fn test_missing_terminator_is_invalid() {
    let text = SAMPLE.replacen("}\r\n", "\r\n", 1);
    // Bone1 header found where '}' was expected
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 12);
}

#[test]
fn test_bad_number_is_invalid() {
    let text = SAMPLE.replace("0.000000,1.250000,0.000000;", "0.000000,abc,0.000000;");
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 7);

    let text = SAMPLE.replace("0.000000,1.250000,0.000000;", "0.000000,1.250000;");
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 7);

    let text = SAMPLE.replace("0.000000,1.250000,0.000000;", "0.000000,1.250000,0.000000");
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 7);
}

#[test]
fn test_truncated_file_is_invalid() {
    let text: String = SAMPLE.lines().take(7).map(|l| format!("{l}\n")).collect();
    let result = VpdDocument::parse(&text);
    assert!(result.as_ref().is_err_and(PoseLibError::is_invalid_file));
}

#[test]
fn test_trailing_garbage_is_invalid() {
    let text = format!("{SAMPLE}garbage;\r\n");
    assert!(VpdDocument::parse(&text).is_err_and(|e| e.is_invalid_file()));
}

#[test]
fn test_out_of_order_block_is_invalid() {
    let text = SAMPLE.replace("Bone1{", "Bone5{");
    assert_eq!(invalid_line(VpdDocument::parse(&text)), 12);
}

// ============================================================================
// Writer and encoding
// ============================================================================

#[test]
fn test_writer_format() {
    let doc = VpdDocument {
        model_name: "Rig.osm".to_string(),
        bones: vec![VpdBone {
            name: "頭".to_string(),
            location: DVec3::new(0.0, 1.25, 0.0),
            rotation: DQuat::from_xyzw(0.0, 0.6, 0.0, 0.8),
        }],
        morphs: Vec::new(),
    };
    let text = doc.to_text();

    assert!(text.starts_with("Vocaloid Pose Data file\r\n"));
    assert!(text.contains("\r\n1;"));
    assert!(text.contains("Bone0{頭\r\n"));
    assert!(text.contains("  0.000000,1.250000,0.000000;"));
    assert!(text.contains("  0.000000,0.600000,0.000000,0.800000;"));
    assert!(!text.replace("\r\n", "").contains('\n'));

    assert_eq!(VpdDocument::parse(&text).unwrap(), doc);
}

#[test]
fn test_shift_jis_roundtrip() {
    let doc = VpdDocument::parse(SAMPLE).unwrap();
    let bytes = doc.to_bytes().unwrap();
    // "頭" in Shift_JIS
    assert!(bytes.windows(2).any(|w| w == [0x93, 0xAA]));
    assert!(std::str::from_utf8(&bytes).is_err());
    assert_eq!(VpdDocument::from_bytes(&bytes).unwrap(), doc);
}

#[test]
fn test_unencodable_name_fails() {
    let doc = VpdDocument {
        model_name: "😀".to_string(),
        ..Default::default()
    };
    assert!(matches!(doc.to_bytes(), Err(PoseLibError::Encoding(_))));
}

// ============================================================================
// Pose conversion
// ============================================================================

#[test]
fn test_pose_roundtrip_through_rig() {
    let rig = rig();
    let pose = Pose::new("look")
        .with_bone("head", Transform::new(DVec3::new(0.0, 0.0, 0.1), DQuat::from_rotation_x(0.3), DVec3::ONE));

    let (doc, report) = VpdDocument::from_pose(&pose, &rig, &VpdOptions::default());
    assert!(report.is_clean());
    assert_eq!(doc.model_name, "Rig.osm");
    assert_eq!(doc.bones[0].name, "頭");
    assert!(doc.bones[0].location.abs_diff_eq(DVec3::new(0.0, 1.25, 0.0), 1e-12));

    let (back, report) = doc.to_pose("look", &rig, &VpdOptions::default());
    assert!(report.is_clean());
    let t = back.bone("head").unwrap().transform;
    assert!(t.location().abs_diff_eq(DVec3::new(0.0, 0.0, 0.1), 1e-12));
    assert!(t.rotation().angle_between(DQuat::from_rotation_x(0.3)) < 1e-9);
}

#[test]
fn test_unknown_bones_skipped() {
    let rig = rig();
    let pose = Pose::new("p").with_bone("tail", Transform::from_location(DVec3::X));
    let (doc, report) = VpdDocument::from_pose(&pose, &rig, &VpdOptions::default());
    assert_eq!(report.warnings.len(), 1);
    assert!(doc.bones.is_empty());

    let mut doc = VpdDocument::parse(SAMPLE).unwrap();
    doc.bones[1].name = "尻尾".to_string();
    let (pose, report) = doc.to_pose("p", &rig, &VpdOptions::default());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(pose.bone_names().collect::<Vec<_>>(), vec!["root"]);
}

#[test]
fn test_morph_weights() {
    let mut book = PoseBook::new("Face");
    book.add_pose(Pose::new("blink"));
    let mut smile = Pose::new("smile");
    smile.name_alt = "笑い".to_string();
    book.add_pose(smile);
    book.add_pose(Pose::new("idle"));

    let doc = VpdDocument {
        morphs: vec![
            VpdMorph {
                name: "blink".to_string(),
                weight: 0.5,
            },
            VpdMorph {
                name: "笑い".to_string(),
                weight: 1.0,
            },
            VpdMorph {
                name: "ghost".to_string(),
                weight: 1.0,
            },
        ],
        ..Default::default()
    };
    let report = apply_morph_weights(&mut book, &doc);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(book.poses()[0].weight, 0.5);
    assert_eq!(book.poses()[1].weight, 1.0);

    book.pose_mut(2).unwrap().weight = 0.0;
    let mut out = VpdDocument::default();
    out.push_morphs_from_book(&book);
    assert_eq!(out.morphs.len(), 2);
    assert_eq!(out.morphs[1].name, "smile");
}

#[test]
fn test_file_roundtrip_names_pose() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wave.vpd");
    let rig = rig();
    let pose = Pose::new("x").with_bone("root", Transform::from_location(DVec3::new(0.0, 0.0, 0.2)));

    save_pose(&path, &pose, &rig, &VpdOptions::default(), None).unwrap();
    let (loaded, report) = load_pose(&path, &rig, &VpdOptions::default()).unwrap();
    assert!(report.is_clean());
    assert_eq!(loaded.name(), "wave");
    let t = loaded.bone("root").unwrap().transform;
    assert!(t.location().abs_diff_eq(DVec3::new(0.0, 0.0, 0.2), 1e-6));
}
