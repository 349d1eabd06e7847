// Name resolution and grouping over whole directory listings

use couplet_processor::naming::{resolve_all, Role, SourceFile};
use couplet_processor::pairing::{group, PairingReport, RoleInference, UnpairedReason};

fn files(names: &[&str]) -> Vec<SourceFile> {
    names
        .iter()
        .map(|n| SourceFile::new(format!("/scans/{}", n)))
        .collect()
}

fn pair_up(names: &[&str]) -> PairingReport {
    group(&resolve_all(&files(names)), RoleInference::Complement)
}

#[test]
fn test_triplet_names_pair_on_shared_positions() {
    let report = pair_up(&["A-1--3--1.jpg", "A-2--3--1.jpg"]);
    assert_eq!(report.complete.len(), 1);
    assert!(report.unpaired.is_empty());

    let pair = &report.complete[0];
    assert_eq!(pair.id.key, "A");
    assert_eq!(pair.left.file_name, "A-1--3--1.jpg");
    assert_eq!(pair.right.file_name, "A-2--3--1.jpg");
}

#[test]
fn test_bracketed_role_with_sub_index() {
    let report = pair_up(&["A(1)_1.jpg", "A(2)_1.jpg"]);
    assert_eq!(report.complete.len(), 1);
    let pair = &report.complete[0];
    assert_eq!(pair.id.key, "A");
    assert_eq!(pair.id.sub_index, 1);
    assert_eq!(pair.left.file_name, "A(1)_1.jpg");
    assert_eq!(pair.right.file_name, "A(2)_1.jpg");
}

#[test]
fn test_single_role_is_reported_unpaired() {
    let report = pair_up(&["Lone(1).jpg", "Pine-1.png", "Pine-2.png"]);
    assert_eq!(report.complete.len(), 1);
    assert_eq!(report.complete[0].id.key, "Pine");

    assert_eq!(report.unpaired.len(), 1);
    let lone = &report.unpaired[0];
    assert_eq!(lone.id.key, "Lone");
    assert_eq!(lone.roles.iter().copied().collect::<Vec<_>>(), vec![Role::Left]);
    assert_eq!(lone.reason, UnpairedReason::MissingRole);
    assert!(report
        .complete
        .iter()
        .all(|p| p.left.file_name != "Lone(1).jpg"));
}

#[test]
fn test_unrecognized_names_never_pair() {
    let report = pair_up(&["cover.jpg", "back.jpg"]);
    assert!(report.complete.is_empty());
    assert_eq!(report.unpaired_file_count(), 2);
    assert!(report
        .unpaired
        .iter()
        .all(|g| g.reason == UnpairedReason::NoRole));
}

#[test]
fn test_mixed_directory_is_order_independent() {
    let names = [
        "River(1).jpg",
        "River(2).jpg",
        "Hall(1)_5.jpg",
        "Hall_5.jpg",
        "Gate_1_2.png",
        "Gate_2_2.png",
        "B-1--7--2.jpg",
        "B-2--7--2.jpg",
        "Moon(2).jpg",
        "notes.jpg",
    ];
    let expected = pair_up(&names);
    assert_eq!(expected.complete.len(), 4);
    assert_eq!(expected.unpaired.len(), 2);

    let mut shuffled: Vec<&str> = names.to_vec();
    for step in 1..names.len() {
        shuffled.rotate_left(step);
        assert_eq!(pair_up(&shuffled), expected);
        shuffled.reverse();
        assert_eq!(pair_up(&shuffled), expected);
    }
}

#[test]
fn test_role_inference_policy_for_lone_sub_index_file() {
    let listing = files(&["Hall_5.jpg"]);
    let resolved = resolve_all(&listing);

    let complement = group(&resolved, RoleInference::Complement);
    assert_eq!(complement.unpaired[0].reason, UnpairedReason::NoRole);

    let left = group(&resolved, RoleInference::PreferLeft);
    assert_eq!(left.unpaired[0].reason, UnpairedReason::MissingRole);
    assert!(left.unpaired[0].roles.contains(&Role::Left));
}

#[test]
fn test_role_and_sub_index_without_separator_pair() {
    let report = pair_up(&["Poem-11.jpg", "Poem-21.jpg"]);
    assert_eq!(report.complete.len(), 1);
    assert!(report.unpaired.is_empty());

    let pair = &report.complete[0];
    assert_eq!(pair.id.key, "Poem");
    assert_eq!(pair.id.sub_index, 1);
    assert_eq!(pair.left.file_name, "Poem-11.jpg");
    assert_eq!(pair.right.file_name, "Poem-21.jpg");
}
