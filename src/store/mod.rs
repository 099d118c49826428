mod conflict;
mod error;
mod mutations;
mod queries;
mod table;

pub use error::StoreError;
pub use table::BookingTable;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{OnceCell, RwLock, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::limits::MIRROR_QUEUE_DEPTH;
use crate::mirror::Mirror;
use crate::model::*;
use crate::observability;

use conflict::check_no_conflict;

/// Where a store is in its one-way startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Loading,
    Ready,
}

/// Marks a load in progress for [`Store::lifecycle`]. Lowered on drop, so a
/// caller that gives up mid-load leaves the store `Uninitialized`.
struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ── Mirror writer thread ─────────────────────────────────

enum MirrorCommand {
    Load {
        response: oneshot::Sender<io::Result<Vec<Booking>>>,
    },
    Store {
        bookings: Vec<Booking>,
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Dedicated thread that owns the mirror. Every read and write of the file
/// goes through here, one command at a time.
fn mirror_writer_loop(mut mirror: Box<dyn Mirror>, mut rx: mpsc::Receiver<MirrorCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            MirrorCommand::Load { response } => {
                let _ = response.send(mirror.load());
            }
            MirrorCommand::Store { bookings, response } => {
                let write_start = std::time::Instant::now();
                let result = mirror.store(&bookings);
                metrics::histogram!(observability::MIRROR_WRITE_DURATION_SECONDS)
                    .record(write_start.elapsed().as_secs_f64());
                let _ = response.send(result);
            }
        }
    }
    debug!("mirror writer for {} stopped", mirror.path().display());
}

/// The interval store: one authoritative booking table per instance, mirrored
/// in full to disk after every mutation.
///
/// Mutations hold the table's write lock across conflict check, mirror write
/// and apply, so at most one runs at a time. Reads share the read lock.
pub struct Store {
    table: OnceCell<RwLock<BookingTable>>,
    loading: AtomicBool,
    mirror_tx: mpsc::Sender<MirrorCommand>,
    mirror_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Build a store over `mirror`. Nothing is read until the first operation.
    pub fn open(mirror: Box<dyn Mirror>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let mirror_path = mirror.path().to_path_buf();
        let (mirror_tx, mirror_rx) = mpsc::channel(MIRROR_QUEUE_DEPTH);
        std::thread::Builder::new()
            .name("boardroom-mirror".into())
            .spawn(move || mirror_writer_loop(mirror, mirror_rx))?;

        Ok(Self {
            table: OnceCell::new(),
            loading: AtomicBool::new(false),
            mirror_tx,
            mirror_path,
            clock,
        })
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.table.initialized() {
            Lifecycle::Ready
        } else if self.loading.load(Ordering::SeqCst) {
            Lifecycle::Loading
        } else {
            Lifecycle::Uninitialized
        }
    }

    /// Load on first use. Concurrent first callers wait on the same load; a
    /// failed load is reported to all of them and retried by the next call.
    pub(super) async fn ready(&self) -> Result<&RwLock<BookingTable>, StoreError> {
        self.table.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<RwLock<BookingTable>, StoreError> {
        let result = {
            let _loading = LoadingFlag::raise(&self.loading);
            self.load_table().await
        };
        match result {
            Ok(table) => {
                info!(
                    "loaded {} bookings from {}",
                    table.len(),
                    self.mirror_path.display()
                );
                metrics::gauge!(observability::BOOKINGS_ACTIVE).set(table.len() as f64);
                Ok(RwLock::new(table))
            }
            Err(e) => {
                error!("failed to load {}: {e}", self.mirror_path.display());
                Err(e)
            }
        }
    }

    async fn load_table(&self) -> Result<BookingTable, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.mirror_tx
            .send(MirrorCommand::Load { response: tx })
            .await
            .map_err(|_| StoreError::Persistence("mirror writer shut down".into()))?;
        let records = rx
            .await
            .map_err(|_| StoreError::Persistence("mirror writer dropped response".into()))?
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        build_table(records)
    }

    /// Write the whole collection via the mirror thread.
    async fn mirror_store(&self, bookings: Vec<Booking>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.mirror_tx
            .send(MirrorCommand::Store {
                bookings,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Persistence("mirror writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Persistence("mirror writer dropped response".into()))?
            .map_err(|e| {
                metrics::counter!(observability::MIRROR_FAILURES_TOTAL).increment(1);
                error!("mirror write to {} failed: {e}", self.mirror_path.display());
                StoreError::Persistence(e.to_string())
            })
    }

    /// Persist the table as it will be after `change`, then swap it in.
    /// If the write fails, `table` is left exactly as it was.
    pub(super) async fn persist_and_apply(
        &self,
        table: &mut BookingTable,
        change: &Change,
    ) -> Result<(), StoreError> {
        let next = table.with_change(change);
        self.mirror_store(next.snapshot()).await?;
        *table = next;
        metrics::gauge!(observability::BOOKINGS_ACTIVE).set(table.len() as f64);
        Ok(())
    }
}

/// Rebuild the table from persisted records. Records that could never have
/// been written by a store are rejected; overlaps are kept but reported.
fn build_table(records: Vec<Booking>) -> Result<BookingTable, StoreError> {
    let mut table = BookingTable::new();
    let mut seen = HashSet::with_capacity(records.len());
    for booking in records {
        if booking.start_time >= booking.end_time {
            return Err(StoreError::Persistence(format!(
                "corrupt mirror: booking {} ends before it starts",
                booking.id
            )));
        }
        if !seen.insert(booking.id.clone()) {
            return Err(StoreError::Persistence(format!(
                "corrupt mirror: duplicate booking id {}",
                booking.id
            )));
        }
        if let Err(StoreError::Conflict(other)) =
            check_no_conflict(&table, &booking.room, &booking.span(), None)
        {
            warn!(
                "persisted booking {} overlaps {} in room {}",
                booking.id, other, booking.room
            );
        }
        table.apply(&Change::Created(booking));
    }
    Ok(table)
}
