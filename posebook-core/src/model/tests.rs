use glam::{DQuat, DVec3};

use super::*;
use crate::blend::CaptureOptions;
use crate::category::{CategoryFilter, PoseCategory};
use crate::error::PoseLibError;
use crate::naming::Renamer;
use crate::rig::{Armature, Rig, RigBone};

fn names(book: &PoseBook) -> Vec<&str> {
    book.poses().iter().map(|p| p.name()).collect()
}

fn book_names(library: &PoseLibrary) -> Vec<&str> {
    library.books().iter().map(|b| b.name()).collect()
}

fn abc_book() -> PoseBook {
    let mut book = PoseBook::new("Face");
    for name in ["a", "b", "c"] {
        book.add_pose(Pose::new(name).with_bone("jaw", Transform::from_location(DVec3::X)));
    }
    book
}

fn rig() -> Armature {
    Armature::new("Rig")
        .with_bone(RigBone::new("jaw"))
        .with_bone(RigBone::new("head"))
}

// ============================================================================
// Pose
// ============================================================================

#[test]
fn test_upsert_is_last_write_wins() {
    let mut pose = Pose::new("p");
    pose.upsert_bone("jaw", Transform::from_location(DVec3::X));
    pose.upsert_bone("head", Transform::IDENTITY);
    pose.upsert_bone("jaw", Transform::from_location(DVec3::Y));

    assert_eq!(pose.bone_names().collect::<Vec<_>>(), vec!["jaw", "head"]);
    assert_eq!(pose.bone("jaw").unwrap().transform.location(), DVec3::Y);
    assert_eq!(pose.active_bone_index(), Some(1));
}

#[test]
fn test_remove_bone_keeps_active_in_range() {
    let mut pose = Pose::new("p")
        .with_bone("a", Transform::IDENTITY)
        .with_bone("b", Transform::IDENTITY);
    assert_eq!(pose.active_bone_index(), Some(1));
    assert!(pose.remove_bone("b"));
    assert_eq!(pose.active_bone_index(), Some(0));
    assert!(!pose.remove_bone("b"));
    pose.remove_bone_at(0);
    assert_eq!(pose.active_bone_index(), None);
}

#[test]
fn test_duplicate_gets_fresh_id() {
    let pose = Pose::new("p").with_bone("jaw", Transform::IDENTITY);
    let copy = pose.duplicate();
    assert_ne!(pose.id(), copy.id());
    assert_eq!(pose, copy);
}

#[test]
fn test_pose_rename_bones_resolves_collisions() {
    let mut pose = Pose::new("p")
        .with_bone("arm_L", Transform::IDENTITY)
        .with_bone("arm.L", Transform::IDENTITY);
    let renamer = Renamer::new("_L", ".L", false).unwrap();
    let outcomes = pose.rename_bones(&renamer);

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].conflicted);
    assert_eq!(pose.bone_names().collect::<Vec<_>>(), vec!["arm.L.001", "arm.L"]);
}

#[test]
fn test_update_bones_from_rig() {
    let mut rig = rig();
    rig.set_local_transform("jaw", &Transform::from_location(DVec3::Z));
    let mut pose = Pose::new("p");
    let updated = pose.update_bones_from_rig(&rig, &["jaw", "head", "tail"]);

    assert_eq!(updated, 2);
    assert_eq!(pose.bone("jaw").unwrap().transform.location(), DVec3::Z);
    // Identity bones are taken too
    assert!(pose.bone("head").unwrap().transform.is_identity());
}

// ============================================================================
// Book
// ============================================================================

#[test]
fn test_add_resolves_names_and_selects_first() {
    let mut book = PoseBook::new("b");
    assert_eq!(book.active_pose_index(), None);
    book.add_pose(Pose::new("Pose"));
    book.add_pose(Pose::new("Pose"));
    book.add_pose(Pose::new("Pose"));

    assert_eq!(names(&book), vec!["Pose", "Pose.001", "Pose.002"]);
    assert_eq!(book.active_pose_index(), Some(0));
    assert_eq!(book.position_of("Pose.001"), Some(1));
}

#[test]
fn test_add_keeps_index_past_three_digit_suffixes() {
    let mut book = PoseBook::new("b");
    for _ in 0..1001 {
        book.add_pose(Pose::new("Pose"));
    }
    assert_eq!(book.poses()[999].name(), "Pose.999");
    assert_eq!(book.poses()[1000].name(), "Pose.1000");

    book.add_pose(Pose::new("Pose"));
    assert_eq!(book.len(), 1002);
    for (index, pose) in book.poses().iter().enumerate() {
        assert_eq!(book.position_of(pose.name()), Some(index), "{}", pose.name());
    }
}

#[test]
fn test_insert_shifts_active() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(1));
    book.insert_pose(0, Pose::new("z"));
    assert_eq!(book.active_pose().unwrap().name(), "b");
    book.insert_pose(99, Pose::new("end"));
    assert_eq!(names(&book), vec!["z", "a", "b", "c", "end"]);
}

#[test]
fn test_place_pose() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(0));
    assert_eq!(book.place_pose(Pose::new("ins"), Placement::Insert), 1);
    assert_eq!(book.place_pose(Pose::new("pre"), Placement::Prepend), 0);
    assert_eq!(book.place_pose(Pose::new("app"), Placement::Append), 5);
    assert_eq!(names(&book), vec!["pre", "a", "ins", "b", "c", "app"]);
    assert_eq!(book.active_pose_index(), Some(5));
}

#[test]
fn test_remove_pose() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(2));
    let removed = book.remove_pose(2).unwrap();
    assert_eq!(removed.name(), "c");
    assert_eq!(book.active_pose_index(), Some(1));
    assert_eq!(book.position_of("c"), None);

    assert!(matches!(
        book.remove_pose(5),
        Err(PoseLibError::InvalidIndex { index: 5, len: 2, .. })
    ));
    book.remove_active_pose().unwrap();
    book.remove_active_pose().unwrap();
    assert_eq!(book.active_pose_index(), None);
    assert!(matches!(book.remove_active_pose(), Err(PoseLibError::NoActivePose)));
}

#[test]
fn test_rename_pose() {
    let mut book = abc_book();
    assert_eq!(book.rename_pose(0, "b").unwrap(), "b.001");
    assert_eq!(book.rename_pose(1, "b").unwrap(), "b");
    assert_eq!(book.position_of("b.001"), Some(0));
    assert_eq!(book.position_of("a"), None);
}

#[test]
fn test_move_pose() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(0));
    assert_eq!(book.move_pose(MoveDirection::Down).unwrap(), 1);
    assert_eq!(names(&book), vec!["b", "a", "c"]);
    assert_eq!(book.move_pose(MoveDirection::Bottom).unwrap(), 2);
    assert_eq!(book.move_pose(MoveDirection::Down).unwrap(), 2);
    assert_eq!(book.move_pose(MoveDirection::Top).unwrap(), 0);
    assert_eq!(book.move_pose(MoveDirection::Up).unwrap(), 0);
    assert_eq!(names(&book), vec!["a", "b", "c"]);
}

#[test]
fn test_duplicate_active_pose() {
    let mut book = abc_book();
    book.pose_mut(0).unwrap().name_alt = "あ".to_string();
    book.set_active_pose_index(Some(0));

    assert_eq!(book.duplicate_active_pose().unwrap(), 1);
    assert_eq!(names(&book), vec!["a", "a+", "b", "c"]);
    let copy = book.active_pose().unwrap();
    assert_eq!(copy.name_alt, "あ+");
    assert_eq!(copy.bone_count(), 1);
    assert_ne!(copy.id(), book.poses()[0].id());
}

#[test]
fn test_categories() {
    let mut book = PoseBook::new("b");
    book.add_pose(Pose::new("brow_up").with_category(PoseCategory::None));
    book.add_pose(Pose::new("mouth_a").with_category(PoseCategory::Eye));
    book.guess_missing_categories();
    assert_eq!(book.poses()[0].category, PoseCategory::Eyebrow);
    assert_eq!(book.poses()[1].category, PoseCategory::Eye);

    book.auto_set_categories();
    assert_eq!(book.poses()[1].category, PoseCategory::Mouth);

    book.category_filter = CategoryFilter::Mouth;
    let visible: Vec<usize> = book.visible_poses().map(|(i, _)| i).collect();
    assert_eq!(visible, vec![1]);
}

#[test]
fn test_batch_rename_poses() {
    let mut book = PoseBook::new("b");
    book.add_pose(Pose::new("smile_L"));
    book.add_pose(Pose::new("smile.L"));
    book.add_pose(Pose::new("frown"));

    let renamer = Renamer::new(r"_(L|R)$", ".$1", true).unwrap();
    let outcomes = book.rename_poses(&renamer).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].from, "smile_L");
    assert_eq!(outcomes[0].to, "smile.L.001");
    assert!(outcomes[0].conflicted);
    assert_eq!(names(&book), vec!["smile.L.001", "smile.L", "frown"]);
}

#[test]
fn test_invalid_regex_changes_nothing() {
    assert!(matches!(Renamer::new("(", "", true), Err(PoseLibError::InvalidRegex(_))));
}

#[test]
fn test_clean_poses() {
    let mut book = PoseBook::new("b");
    book.add_pose(
        Pose::new("p")
            .with_bone("jaw", Transform::from_location(DVec3::X))
            .with_bone("head", Transform::from_location(DVec3::splat(1e-7)))
            .with_bone("tail", Transform::from_location(DVec3::X)),
    );
    let rig = rig();

    let dry = CleanOptions {
        report_only: true,
        ..Default::default()
    };
    let report = book.clean_poses(&rig, &dry);
    assert_eq!(report.len(), 2);
    assert_eq!(book.poses()[0].bone_count(), 3);

    let report = book.clean_poses(&rig, &CleanOptions::default());
    assert_eq!(
        report,
        vec![
            CleanedBone {
                pose: "p".to_string(),
                bone: "head".to_string(),
                reason: CleanReason::NoDeformation,
            },
            CleanedBone {
                pose: "p".to_string(),
                bone: "tail".to_string(),
                reason: CleanReason::NotInRig,
            },
        ]
    );
    assert_eq!(book.poses()[0].bone_names().collect::<Vec<_>>(), vec!["jaw"]);
    assert_eq!(CleanReason::NotInRig.to_string(), "Not in armature");
}

#[test]
fn test_apply_single_pose_solos() {
    let mut book = PoseBook::new("b");
    book.add_pose(Pose::new("x").with_bone("jaw", Transform::from_location(DVec3::X)));
    book.add_pose(Pose::new("y").with_bone("head", Transform::from_location(DVec3::Y)));
    let mut rig = rig();

    book.apply_single_pose(Some(1), &mut rig).unwrap();
    assert_eq!(book.poses()[0].weight, 0.0);
    assert_eq!(book.poses()[1].weight, 1.0);
    assert_eq!(rig.local_transform("head").unwrap().location(), DVec3::Y);
    assert!(rig.local_transform("jaw").unwrap().is_identity());

    assert!(book.apply_single_pose(Some(9), &mut rig).is_err());
    book.apply_single_pose(None, &mut rig).unwrap();
    assert!(rig.local_transform("head").unwrap().is_identity());
}

#[test]
fn test_add_and_replace_pose_from_rig() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(0));
    let mut rig = rig();
    rig.set_local_transform("head", &Transform::from_rotation(DQuat::from_rotation_z(0.5)));

    let index = book.add_pose_from_rig(Pose::new("captured"), &mut rig, &CaptureOptions::default(), Placement::Insert);
    assert_eq!(index, 1);
    let captured = &book.poses()[1];
    assert_eq!(captured.bone_names().collect::<Vec<_>>(), vec!["head"]);
    assert_eq!(captured.weight, 1.0);

    rig.set_local_transform("jaw", &Transform::from_location(DVec3::Z));
    book.replace_pose(Some(0), &mut rig, &CaptureOptions::default()).unwrap();
    assert_eq!(book.poses()[0].bone_count(), 2);
    assert!(book.replace_pose(Some(42), &mut rig, &CaptureOptions::default()).is_err());
}

#[test]
fn test_book_serde_roundtrip() {
    let mut book = abc_book();
    book.set_active_pose_index(Some(2));
    book.show_alt_names = true;
    let text = serde_json::to_string(&book).unwrap();
    let back: PoseBook = serde_json::from_str(&text).unwrap();
    assert_eq!(back, book);
    assert_ne!(back.id(), book.id());
    assert_eq!(back.position_of("c"), Some(2));
}

// ============================================================================
// Library
// ============================================================================

#[test]
fn test_add_books() {
    let mut library = PoseLibrary::new();
    assert_eq!(library.add_book(None), 0);
    assert_eq!(library.add_book(None), 1);
    assert_eq!(library.add_book(Some("Face")), 2);
    assert_eq!(book_names(&library), vec!["New Book", "New Book.001", "Face"]);
    assert_eq!(library.active_book_index(), Some(2));
}

#[test]
fn test_remove_and_rename_books() {
    let mut library = PoseLibrary::new();
    library.add_book(Some("a"));
    library.add_book(Some("b"));
    assert_eq!(library.rename_book(1, "a").unwrap(), "a.001");

    library.remove_active_book().unwrap();
    assert_eq!(library.active_book_index(), Some(0));
    library.remove_book(0).unwrap();
    assert_eq!(library.active_book_index(), None);
    assert!(matches!(library.remove_active_book(), Err(PoseLibError::NoActiveBook)));
    assert!(matches!(library.remove_book(0), Err(PoseLibError::InvalidIndex { .. })));
}

#[test]
fn test_move_and_duplicate_book() {
    let mut library = PoseLibrary::new();
    library.add_book(Some("a"));
    library.push_book(abc_book());
    assert_eq!(library.move_book(MoveDirection::Up).unwrap(), 0);
    assert_eq!(book_names(&library), vec!["Face", "a"]);

    assert_eq!(library.duplicate_active_book().unwrap(), 2);
    let copy = library.active_book().unwrap();
    assert_eq!(copy.name(), "Face - Copy");
    assert_eq!(names(copy), vec!["a", "b", "c"]);
    assert_ne!(copy.poses()[0].id(), library.books()[0].poses()[0].id());
}

#[test]
fn test_merge_book() {
    let mut library = PoseLibrary::new();
    let mut target = PoseBook::new("Target");
    target.add_pose(Pose::new("a"));
    library.push_book(target);
    library.push_book(abc_book());

    library.merge_active_book("Target", true).unwrap();
    assert_eq!(library.len(), 2);
    assert_eq!(names(library.book(0).unwrap()), vec!["a", "a.001", "b", "c"]);

    library.set_active_book_index(Some(1));
    library.merge_active_book("Target", false).unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(library.book(0).unwrap().len(), 7);
}

#[test]
fn test_merge_errors_leave_state() {
    let mut library = PoseLibrary::new();
    library.push_book(abc_book());
    let before = library.clone();

    assert!(matches!(
        library.merge_active_book("Nope", false),
        Err(PoseLibError::BookNotFound(name)) if name == "Nope"
    ));
    assert!(matches!(library.merge_active_book("Face", false), Err(PoseLibError::SameBook)));
    assert!(matches!(
        library.move_active_pose_to_book("Face", false),
        Err(PoseLibError::SameBook)
    ));
    assert_eq!(library, before);
}

#[test]
fn test_move_active_pose_to_book() {
    let mut library = PoseLibrary::new();
    library.add_book(Some("Target"));
    library.push_book(abc_book());
    library.active_book_mut().unwrap().set_active_pose_index(Some(1));

    library.move_active_pose_to_book("Target", true).unwrap();
    assert_eq!(library.active_book().unwrap().len(), 3);

    library.move_active_pose_to_book("Target", false).unwrap();
    assert_eq!(names(library.active_book().unwrap()), vec!["a", "c"]);
    assert_eq!(names(library.book(0).unwrap()), vec!["b", "b.001"]);
}

#[test]
fn test_library_rename_scopes() {
    let mut library = PoseLibrary::new();
    library.push_book(abc_book());
    library.push_book(abc_book());
    let renamer = Renamer::new("jaw", "chin", false).unwrap();

    let outcomes = library.rename_bones(&renamer, false).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(library.book(0).unwrap().poses()[0].bone("jaw").is_some());

    let outcomes = library.rename_bones(&renamer, true).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(library.book(0).unwrap().poses()[0].bone("chin").is_some());

    let renamer = Renamer::new("a", "x", false).unwrap();
    assert_eq!(library.rename_poses(&renamer, true).unwrap().len(), 2);
}

#[test]
fn test_library_json_roundtrip() {
    let mut library = PoseLibrary::new();
    library.push_book(abc_book());
    library.add_book(Some("Empty"));
    library.set_active_book_index(Some(0));

    let text = library.to_json_string().unwrap();
    let back = PoseLibrary::from_json_str(&text).unwrap();
    assert_eq!(back, library);
    assert_eq!(back.active_book_index(), Some(0));
}

#[test]
fn test_active_indices_clamp_on_load() {
    let text = r#"{"books": [{"name": "b", "poses": [{"name": "p"}], "active_pose_index": 7}],
                   "active_book_index": 3}"#;
    let library = PoseLibrary::from_json_str(text).unwrap();
    assert_eq!(library.active_book_index(), Some(0));
    assert_eq!(library.active_book().unwrap().active_pose_index(), Some(0));
}

#[test]
fn test_copy_library() {
    let mut source = PoseLibrary::new();
    source.push_book(abc_book());
    let mut copy = PoseLibrary::new();
    copy.add_book(Some("old"));
    copy.copy_from(&source);
    assert_eq!(copy, source);
    assert_ne!(copy.books()[0].id(), source.books()[0].id());
}
