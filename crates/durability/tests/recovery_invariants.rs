//! Invariants across the snapshot → merge → backup pipeline.

use celltable_core::{Family, Row, TimestampedValue};
use celltable_durability::{
    merge_snapshots, BackupStore, IncrementalSnapshot, SnapshotData, SnapshotStore,
};
use std::collections::HashMap;
use tempfile::TempDir;

fn snapshot_with(row: &str, qualifier: &str, ts: i64) -> IncrementalSnapshot {
    let mut fam = Family::new();
    fam.insert(
        qualifier.to_string(),
        vec![TimestampedValue::new(b"v".to_vec(), ts)],
    );
    let mut families = HashMap::new();
    families.insert("f".to_string(), Some(fam));
    let mut data = SnapshotData::new();
    data.insert(row.to_string(), Some(families));
    IncrementalSnapshot::new(ts, data)
}

#[test]
fn merge_leaves_no_incrementals_older_than_the_backup() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("snaps")).unwrap();
    let backups = BackupStore::new(dir.path().join("backups")).unwrap();

    for ts in 1..=4 {
        snapshots.write(&snapshot_with(&format!("r{ts}"), "q", ts)).unwrap();
    }

    let backup = merge_snapshots(&snapshots, &backups, 1_000).unwrap().unwrap();
    assert!(backup.exists());
    assert!(snapshots.list().unwrap().is_empty());
}

#[test]
fn repeated_merge_prune_cycles_stay_bounded() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("snaps")).unwrap();
    let backups = BackupStore::new(dir.path().join("backups")).unwrap();

    let max = 3;
    for round in 1..=7i64 {
        snapshots.write(&snapshot_with(&format!("r{round}"), "q", round)).unwrap();
        merge_snapshots(&snapshots, &backups, round * 1_000).unwrap();
        backups.prune(max).unwrap();
        assert!(backups.list().unwrap().len() <= max);
    }

    // Surviving backups are the lexicographically greatest
    let names: Vec<String> = backups
        .list()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names.len(), max);
    assert!(names[0].contains(&format!("{:019}", 5_000)));
    assert!(names[2].contains(&format!("{:019}", 7_000)));
}

#[test]
fn state_accumulates_across_merge_generations() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("snaps")).unwrap();
    let backups = BackupStore::new(dir.path().join("backups")).unwrap();

    snapshots.write(&snapshot_with("first", "q", 1)).unwrap();
    merge_snapshots(&snapshots, &backups, 100).unwrap();

    snapshots.write(&snapshot_with("second", "q", 2)).unwrap();
    merge_snapshots(&snapshots, &backups, 200).unwrap();

    let data = backups.load_latest().unwrap().unwrap();
    assert!(data.contains_key("first"));
    assert!(data.contains_key("second"));
}

#[test]
fn null_markers_survive_a_merge_generation() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("snaps")).unwrap();
    let backups = BackupStore::new(dir.path().join("backups")).unwrap();

    snapshots.write(&snapshot_with("doomed", "q", 1)).unwrap();
    merge_snapshots(&snapshots, &backups, 100).unwrap();

    // Next generation deletes the row via a null marker
    let mut data = SnapshotData::new();
    data.insert("doomed".to_string(), None);
    snapshots.write(&IncrementalSnapshot::new(200, data)).unwrap();
    merge_snapshots(&snapshots, &backups, 300).unwrap();

    let merged = backups.load_latest().unwrap().unwrap();
    assert!(merged.is_empty());
}

#[test]
fn backup_round_trip_preserves_full_history_shape() {
    let dir = TempDir::new().unwrap();
    let backups = BackupStore::new(dir.path().join("backups")).unwrap();

    let mut fam = Family::new();
    fam.insert(
        "q".to_string(),
        vec![
            TimestampedValue::new(b"new".to_vec(), 3),
            TimestampedValue::tombstone(2, 9_999_999_999_999_999),
            TimestampedValue::new(b"old".to_vec(), 1),
        ],
    );
    let mut row = Row::new();
    row.insert("f".to_string(), fam);
    let mut data = celltable_core::Data::new();
    data.insert("r".to_string(), row);

    let path = backups.save(&data, 500).unwrap();
    let loaded = backups.load(&path).unwrap();
    assert_eq!(loaded, data);
    // Tombstone flag and expiry survive the JSON round trip
    assert!(loaded["r"]["f"]["q"][1].is_tombstone);
}
