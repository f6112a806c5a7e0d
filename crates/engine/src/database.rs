//! The assembled database facade
//!
//! `Database::open` wires every component together: loads the family
//! registry (fatal if malformed), opens the write-ahead log, recovers the
//! shard store from the latest backup, and starts the background workers
//! (reaper sweep, incremental snapshot, merge + retention).
//!
//! Shutdown is deadline-bounded and ordered: stop the tickers, flush one
//! final incremental snapshot, run one final merge, then sync and close
//! the WAL. Steps that do not fit the deadline are abandoned and reported;
//! whatever reached the WAL is safe for replay.

use celltable_core::Result;
use celltable_durability::{layout, BackupStore, ReaperLog, SnapshotStore, Wal};
use celltable_storage::{FamilyRegistry, ShardedStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cdc::{CdcSink, NullSink};
use crate::config::StoreConfig;
use crate::ops::{Operations, Output};
use crate::reaper::Reaper;
use crate::snapshotter::Snapshotter;
use crate::worker::Worker;

/// Outcome of the shutdown sequence.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Steps that completed within the deadline.
    pub completed: Vec<&'static str>,
    /// Steps abandoned because the deadline passed or the step failed.
    pub abandoned: Vec<&'static str>,
}

impl ShutdownReport {
    /// True when every step completed.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }
}

/// Point-in-time diagnostics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Total rows in memory.
    pub rows: usize,
    /// Rows per shard, in shard order.
    pub rows_per_shard: Vec<usize>,
    /// Registered column families.
    pub families: Vec<String>,
}

/// The storage core: sharded in-memory data plane with WAL-gated
/// mutations, background reclamation, and snapshot-based durability.
pub struct Database {
    config: StoreConfig,
    store: Arc<ShardedStore>,
    registry: Arc<FamilyRegistry>,
    wal: Arc<Wal>,
    ops: Operations,
    snapshotter: Arc<Snapshotter>,
    reaper: Arc<Reaper>,
    shutdown_flag: Arc<AtomicBool>,
    workers: Vec<Worker>,
    stopped: bool,
}

impl Database {
    /// Open the database rooted at `root`, reading `celltable.toml` there
    /// when present.
    pub fn open<P: AsRef<std::path::Path>>(root: P) -> Result<Self> {
        Self::open_with(StoreConfig::load_or_default(root)?)
    }

    /// Open with an explicit configuration and no CDC consumer.
    pub fn open_with(config: StoreConfig) -> Result<Self> {
        Self::open_with_sink(config, Arc::new(NullSink))
    }

    /// Open with an explicit configuration and CDC sink.
    pub fn open_with_sink(mut config: StoreConfig, sink: Arc<dyn CdcSink>) -> Result<Self> {
        config.clamp();
        let root = config.root_dir.clone();
        std::fs::create_dir_all(&root)?;

        let registry = Arc::new(FamilyRegistry::load(layout::families_file(&root))?);
        let wal = Arc::new(Wal::open(layout::wal_file(&root))?);
        let reaper_log = Arc::new(ReaperLog::new(layout::reaper_log_file(&root)));
        let store = Arc::new(ShardedStore::new(config.shard_count));

        let snapshotter = Arc::new(Snapshotter::new(
            Arc::clone(&store),
            SnapshotStore::new(layout::snapshots_dir(&root))?,
            BackupStore::new(layout::backups_dir(&root))?,
            config.max_snapshot_limit,
        ));
        snapshotter.recover()?;

        let reaper = Arc::new(Reaper::new(Arc::clone(&store), Arc::clone(&reaper_log)));
        let ops = Operations::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&wal),
            Arc::clone(&reaper_log),
            sink,
            config.default_tombstone_ttl_s,
        );

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let workers = vec![
            {
                let reaper = Arc::clone(&reaper);
                Worker::spawn(
                    "celltable-gc",
                    Duration::from_secs(config.gc_interval_s),
                    Arc::clone(&shutdown_flag),
                    move || reaper.sweep().map(|_| ()),
                )
            },
            {
                let snapshotter = Arc::clone(&snapshotter);
                Worker::spawn(
                    "celltable-snapshot",
                    Duration::from_secs(config.snapshot_timer_s),
                    Arc::clone(&shutdown_flag),
                    move || snapshotter.flush_incremental().map(|_| ()),
                )
            },
            {
                let snapshotter = Arc::clone(&snapshotter);
                Worker::spawn(
                    "celltable-merge",
                    Duration::from_secs(config.merge_interval_s()),
                    Arc::clone(&shutdown_flag),
                    move || {
                        snapshotter.merge()?;
                        snapshotter.prune()?;
                        Ok(())
                    },
                )
            },
        ];

        info!(
            root = %root.display(),
            shards = config.shard_count,
            "database open"
        );
        Ok(Self {
            config,
            store,
            registry,
            wal,
            ops,
            snapshotter,
            reaper,
            shutdown_flag,
            workers,
            stopped: false,
        })
    }

    /// Execute one query. Mutations are durable in the WAL before this
    /// returns successfully.
    pub fn execute(&self, query: &str) -> Result<Output> {
        self.ops.execute(query)
    }

    /// Force one incremental snapshot flush now.
    pub fn flush_snapshot(&self) -> Result<bool> {
        self.snapshotter.flush_incremental()
    }

    /// Force one merge pass now.
    pub fn run_merge(&self) -> Result<bool> {
        self.snapshotter.merge()
    }

    /// Force one retention prune now.
    pub fn prune_backups(&self) -> Result<usize> {
        self.snapshotter.prune()
    }

    /// Force one reaper sweep now.
    pub fn sweep_reaper(&self) -> Result<usize> {
        self.reaper.sweep()
    }

    /// Point-in-time diagnostics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            rows: self.store.row_count(),
            rows_per_shard: self.store.rows_per_shard(),
            families: self.registry.families(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stop the database within `deadline`.
    ///
    /// Order: cancel tickers, final snapshot flush, final merge, WAL sync.
    pub fn shutdown(&mut self, deadline: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.stopped {
            return report;
        }
        let start = Instant::now();

        self.shutdown_flag.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            worker.join();
        }
        report.completed.push("workers");

        let run_step =
            |name: &'static str, step: &mut dyn FnMut() -> Result<()>, report: &mut ShutdownReport| {
                if start.elapsed() >= deadline {
                    warn!(step = name, "shutdown deadline passed; step abandoned");
                    report.abandoned.push(name);
                    return;
                }
                match step() {
                    Ok(()) => report.completed.push(name),
                    Err(e) => {
                        warn!(step = name, error = %e, "shutdown step failed");
                        report.abandoned.push(name);
                    }
                }
            };

        let snapshotter = Arc::clone(&self.snapshotter);
        run_step(
            "snapshot-flush",
            &mut || snapshotter.flush_incremental().map(|_| ()),
            &mut report,
        );
        let snapshotter = Arc::clone(&self.snapshotter);
        run_step("merge", &mut || snapshotter.merge().map(|_| ()), &mut report);
        let wal = Arc::clone(&self.wal);
        run_step("wal-sync", &mut || wal.sync(), &mut report);

        self.stopped = true;
        info!(
            completed = report.completed.len(),
            abandoned = report.abandoned.len(),
            "database stopped"
        );
        report
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.stopped {
            let deadline = Duration::from_secs(self.config.shutdown_timeout_s);
            let _ = self.shutdown(deadline);
        }
    }
}
