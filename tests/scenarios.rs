//! End-to-end scenarios against the assembled database.
//!
//! Background timers are set far out so every snapshot/merge/sweep in
//! these tests is triggered explicitly and the assertions stay
//! deterministic.

use celltable::{Database, Output, StoreConfig};
use std::time::Duration;
use tempfile::TempDir;

fn test_config(root: &std::path::Path) -> StoreConfig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    StoreConfig {
        root_dir: root.to_path_buf(),
        shard_count: 4,
        snapshot_timer_s: 3600,
        backup_timer_s: 3600,
        gc_interval_s: 3600,
        ..StoreConfig::default()
    }
}

fn open(root: &std::path::Path) -> Database {
    Database::open_with(test_config(root)).unwrap()
}

#[test]
fn append_and_read_latest() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=champions").unwrap();
    for value in ["15", "16", "17"] {
        db.execute(&format!(
            "write key=champ:1 family=champions qualifier=titles value={value}"
        ))
        .unwrap();
    }

    let out = db
        .execute("read key=champ:1 family=champions latest=2")
        .unwrap();
    match out {
        Output::Row(row) => {
            let titles = &row["champions"]["titles"];
            assert_eq!(titles.len(), 2);
            assert_eq!(titles[0].value, b"17");
            assert_eq!(titles[1].value, b"16");
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn tombstone_masks_older_values() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=champions").unwrap();
    for value in ["15", "16", "17"] {
        db.execute(&format!(
            "write key=champ:1 family=champions qualifier=titles value={value}"
        ))
        .unwrap();
    }
    db.execute("delete key=champ:1 family=champions qualifier=titles ttl=3600")
        .unwrap();

    let out = db.execute("read key=champ:1 family=champions").unwrap();
    match out {
        Output::Row(row) => assert!(!row["champions"].contains_key("titles")),
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn prefix_scan() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=profile").unwrap();
    for key in ["user:12345", "user:12567", "user:56789"] {
        db.execute(&format!(
            "write key={key} family=profile qualifier=firstName value=x"
        ))
        .unwrap();
    }

    let out = db.execute("read prefix=user:12 family=profile").unwrap();
    match out {
        Output::Rows(rows) => {
            assert_eq!(rows.len(), 2);
            assert!(rows.contains_key("user:12345"));
            assert!(rows.contains_key("user:12567"));
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn reaper_reclaims_expired_tombstones() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=profile").unwrap();
    db.execute("write key=user:1 family=profile qualifier=name value=ada")
        .unwrap();
    db.execute("delete key=user:1 family=profile qualifier=name ttl=1")
        .unwrap();

    // Wait out the 1-second TTL, then run the sweep
    std::thread::sleep(Duration::from_millis(1500));
    let collected = db.sweep_reaper().unwrap();
    assert_eq!(collected, 1);

    // The qualifier is physically absent: the whole row cascaded away
    let err = db.execute("read key=user:1 family=profile").unwrap_err();
    assert!(err.is_not_found());

    // And the reaper log holds no entry for the row
    let log = std::fs::read_to_string(dir.path().join(".reaper.gc.log")).unwrap();
    assert!(!log.contains("user:1"));
}

#[test]
fn crash_recovery() {
    let dir = TempDir::new().unwrap();

    {
        let db = open(dir.path());
        db.execute("create family=f").unwrap();
        for i in 0..10 {
            let row = format!("row:{}", i % 3);
            db.execute(&format!(
                "write key={row} family=f qualifier=q{i} value=v{i}"
            ))
            .unwrap();
        }
        db.flush_snapshot().unwrap();
        db.run_merge().unwrap();
        // Kill: no shutdown sequence runs
        std::mem::forget(db);
    }

    let db = open(dir.path());
    for i in 0..10 {
        let row = format!("row:{}", i % 3);
        let out = db.execute(&format!("read key={row} family=f")).unwrap();
        match out {
            Output::Row(view) => {
                assert_eq!(view["f"][&format!("q{i}")][0].value, format!("v{i}").as_bytes());
            }
            other => panic!("unexpected output {other:?}"),
        }
    }
}

#[test]
fn bounded_backups() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.max_snapshot_limit = 3;
    let db = Database::open_with(config).unwrap();

    db.execute("create family=f").unwrap();
    for i in 0..5 {
        db.execute(&format!("write key=r{i} family=f qualifier=q value=v"))
            .unwrap();
        db.flush_snapshot().unwrap();
        db.run_merge().unwrap();
        // Nanosecond-stamped file names; keep them distinct
        std::thread::sleep(Duration::from_millis(2));
    }
    db.prune_backups().unwrap();

    let mut backups: Vec<String> = std::fs::read_dir(dir.path().join(".table_backup"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("backup-") && n.ends_with(".db"))
        .collect();
    backups.sort();
    assert_eq!(backups.len(), 3);

    // The survivors include the newest backup: reopening recovers every
    // row written across all five merge generations.
    drop(db);
    let db = open(dir.path());
    for i in 0..5 {
        db.execute(&format!("read key=r{i} family=f")).unwrap();
    }
}

#[test]
fn concurrent_writes_lose_nothing() {
    use std::sync::Arc;
    let dir = TempDir::new().unwrap();
    let db = Arc::new(open(dir.path()));
    db.execute("create family=f").unwrap();

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                for i in 0..25 {
                    db.execute(&format!(
                        "write key=shared family=f qualifier=q value=t{t}i{i}"
                    ))
                    .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let out = db.execute("read key=shared family=f").unwrap();
    match out {
        Output::Row(row) => assert_eq!(row["f"]["q"].len(), 200),
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn write_read_round_trip_with_percent_encoding() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=f").unwrap();
    db.execute("write key=greeting family=f qualifier=text value=hello%20world%21")
        .unwrap();

    let out = db.execute("read key=greeting family=f").unwrap();
    match out {
        Output::Row(row) => assert_eq!(row["f"]["text"][0].value, b"hello world!"),
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn unknown_family_rejected_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    let err = db
        .execute("write key=r family=nope qualifier=q value=v")
        .unwrap_err();
    assert_eq!(err.status(), "FAMILY_UNKNOWN");
    let err = db.execute("read key=r family=nope").unwrap_err();
    assert_eq!(err.status(), "FAMILY_UNKNOWN");
}

#[test]
fn malformed_registry_fails_startup() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("families.config.json"), "{not json").unwrap();
    assert!(Database::open_with(test_config(dir.path())).is_err());
}

#[test]
fn failed_recreate_leaves_registry_file_untouched() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());
    db.execute("create family=profile").unwrap();

    let registry_path = dir.path().join("families.config.json");
    let before = std::fs::metadata(&registry_path).unwrap().modified().unwrap();
    let raw_before = std::fs::read_to_string(&registry_path).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let err = db.execute("create family=profile").unwrap_err();
    assert_eq!(err.status(), "ALREADY_EXISTS");

    let after = std::fs::metadata(&registry_path).unwrap().modified().unwrap();
    assert_eq!(before, after);
    assert_eq!(std::fs::read_to_string(&registry_path).unwrap(), raw_before);
}

#[test]
fn regex_scan_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db = open(dir.path());

    db.execute("create family=f").unwrap();
    db.execute("write key=order:1 family=f qualifier=q value=v")
        .unwrap();
    db.execute("write key=user:1 family=f qualifier=q value=v")
        .unwrap();

    let out = db.execute("read regex=%5Euser%3A family=f").unwrap();
    match out {
        Output::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert!(rows.contains_key("user:1"));
        }
        other => panic!("unexpected output {other:?}"),
    }
}
