mod common;

use disksim_core::{Command, CreateRequest, DiskManager, PartitionTable};
use disksim_types::{ErrorReason, PartitionType, Side};

use common::{assert_invariants, default_manager, gb};

#[test]
fn default_layout_walkthrough() {
    let mut manager = default_manager();
    assert_eq!(
        manager.snapshot().layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | Free 180 GB"
    );

    let outcome = manager
        .create_partition(CreateRequest::new("E:", 51_200, PartitionType::Primary))
        .unwrap();
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | E: 50 GB | Free 130 GB"
    );
    assert_eq!(outcome.message, "Partition \"E:\" created successfully (50 GB)");

    let outcome = manager.shrink_partition("C:", 20_480, Side::Right).unwrap();
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 100 GB | Free 20 GB | Extended 200 GB {D: 200 GB} | E: 50 GB | Free 130 GB"
    );
    assert_eq!(outcome.applied_mb, Some(20_480));

    let outcome = manager.extend_partition("C:", 20_480).unwrap();
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | E: 50 GB | Free 130 GB"
    );

    let before = manager.table().clone();
    let error = manager.delete_partition("Extended").unwrap_err();
    assert_eq!(error.reason, ErrorReason::ExtendedPartitionOccupied);
    assert_eq!(manager.table(), &before);
    assert_invariants(manager.table());
}

#[test]
fn emptying_extended_allows_its_deletion() {
    let mut manager = default_manager();
    manager.delete_partition("D:").unwrap();
    assert_eq!(
        manager.snapshot().layout_line(),
        "C: 120 GB | Extended 200 GB {Free 200 GB} | Free 180 GB"
    );

    manager.delete_partition("Extended").unwrap();
    assert_eq!(manager.snapshot().layout_line(), "C: 120 GB | Free 380 GB");

    let summary = manager.summary();
    assert!(!summary.has_extended);
    assert_eq!(summary.unallocated_mb, gb(380));
}

#[test]
fn extend_clamps_to_neighbor_and_removes_it() {
    let mut manager = default_manager();
    let outcome = manager.extend_partition("Extended", gb(500)).unwrap();
    assert_eq!(outcome.applied_mb, Some(gb(180)));
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 120 GB | Extended 380 GB {D: 200 GB, Free 180 GB}"
    );

    // The new free space inside the extended partition takes a logical drive.
    manager
        .create_partition(CreateRequest::new("Media", gb(100), PartitionType::Logical))
        .unwrap();
    assert_eq!(
        manager.snapshot().layout_line(),
        "C: 120 GB | Extended 380 GB {D: 200 GB, Media 100 GB, Free 80 GB}"
    );
    assert_invariants(manager.table());
}

#[test]
fn left_edge_shrink_and_extend() {
    let mut manager = default_manager();
    manager.create_partition(CreateRequest::new("E:", gb(50), PartitionType::Primary)).unwrap();

    let outcome = manager.shrink_partition("E:", gb(10), Side::Left).unwrap();
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | Free 10 GB | E: 40 GB | Free 130 GB"
    );

    let outcome = manager.extend_partition_on("E:", gb(10), Side::Left).unwrap();
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | E: 50 GB | Free 130 GB"
    );
}

#[test]
fn extend_needs_structural_neighbor_even_with_free_space_elsewhere() {
    let mut manager = default_manager();
    manager.delete_partition("D:").unwrap();
    manager
        .create_partition(CreateRequest::new("D:", gb(200), PartitionType::Logical))
        .unwrap();

    let error = manager.extend_partition("D:", gb(1)).unwrap_err();
    assert_eq!(error.reason, ErrorReason::NoAdjacentUnallocated);
    let error = manager.extend_partition("C:", gb(1)).unwrap_err();
    assert_eq!(error.reason, ErrorReason::NoAdjacentUnallocated);
}

#[test]
fn scripted_commands_run_through_execute() {
    let mut manager = default_manager();
    let script = r#"[
        {"command":"create","name":"E:","size_mb":51200},
        {"command":"format","target":"E:","file_system":"exFAT"},
        {"command":"rename","target":"E:","name":"Games"},
        {"command":"shrink","target":"Games","amount_mb":1024,"side":"left"}
    ]"#;
    let commands: Vec<Command> = serde_json::from_str(script).unwrap();
    for command in commands {
        manager.execute(command).unwrap();
    }
    assert_eq!(
        manager.snapshot().layout_line(),
        "C: 120 GB | Extended 200 GB {D: 200 GB} | Free 1 GB | Games 49 GB | Free 130 GB"
    );

    manager.execute(Command::Reset).unwrap();
    assert_eq!(manager.table(), &PartitionTable::default_layout());
}

#[test]
fn full_primary_table_points_to_logical_drives() {
    let mut manager = DiskManager::default();
    manager.create_partition(CreateRequest::new("E:", gb(10), PartitionType::Primary)).unwrap();
    manager.create_partition(CreateRequest::new("F:", gb(10), PartitionType::Primary)).unwrap();

    let error = manager
        .create_partition(CreateRequest::new("G:", gb(10), PartitionType::Primary))
        .unwrap_err();
    assert_eq!(error.reason, ErrorReason::PrimaryLimitReached);

    let error = manager.create_partition(CreateRequest::extended(gb(10))).unwrap_err();
    assert_eq!(error.reason, ErrorReason::ExtendedAlreadyExists);
}

#[test]
fn drag_end_applies_single_shrink() {
    let mut manager = default_manager();
    manager.begin_drag("C:", Side::Right, 500.0).unwrap();
    // 20 px of a 1000 px bar is 2 % of 500 GB.
    manager.drag_to(490.0);
    let outcome = manager.end_drag(480.0).unwrap().unwrap();
    assert_eq!(outcome.applied_mb, Some(10_240));
    assert_eq!(
        outcome.snapshot.layout_line(),
        "C: 110 GB | Free 10 GB | Extended 200 GB {D: 200 GB} | Free 180 GB"
    );
}
