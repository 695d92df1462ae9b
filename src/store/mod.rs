//! Durable record store.
//!
//! Four independent collections (users, machines, bookings, reports), each
//! held in memory and re-written in full to its own snapshot file on every
//! mutation. A mutation becomes visible only after its snapshot is durable.

mod error;
mod seed;
mod snapshot;

pub use error::{StoreError, StoreResult};
pub use seed::Seed;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::model::{Booking, Machine, Report, User};

use snapshot::SnapshotCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Users,
    Machines,
    Bookings,
    Reports,
}

impl CollectionKind {
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Machines => "machines",
            CollectionKind::Bookings => "bookings",
            CollectionKind::Reports => "reports",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.snap", self.name())
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An entity that lives in exactly one collection, keyed by its id.
pub trait Record: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: CollectionKind;
    fn id(&self) -> Ulid;
}

impl Record for User {
    const KIND: CollectionKind = CollectionKind::Users;
    fn id(&self) -> Ulid {
        self.id
    }
}

impl Record for Machine {
    const KIND: CollectionKind = CollectionKind::Machines;
    fn id(&self) -> Ulid {
        self.id
    }
}

impl Record for Booking {
    const KIND: CollectionKind = CollectionKind::Bookings;
    fn id(&self) -> Ulid {
        self.id
    }
}

impl Record for Report {
    const KIND: CollectionKind = CollectionKind::Reports;
    fn id(&self) -> Ulid {
        self.id
    }
}

/// Something the caller should know about how the store came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupNotice {
    /// No snapshot existed; the collection was initialised from the seed.
    Seeded { collection: CollectionKind },
    /// A snapshot failed validation; every collection was reset to the seed.
    DegradedStart { collection: CollectionKind, reason: String },
}

pub struct Collection<T: Record> {
    records: RwLock<BTreeMap<Ulid, T>>,
    writer: mpsc::Sender<SnapshotCommand>,
}

impl<T: Record> Collection<T> {
    fn new(records: Vec<T>, writer: mpsc::Sender<SnapshotCommand>) -> Self {
        let records = records.into_iter().map(|r| (r.id(), r)).collect();
        Self {
            records: RwLock::new(records),
            writer,
        }
    }

    pub async fn get(&self, id: &Ulid) -> Option<T> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn list(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.records.read().await.values().find(|r| predicate(r)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: T) -> StoreResult<()> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        next.insert(record.id(), record);
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    pub async fn delete(&self, id: &Ulid) -> StoreResult<T> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        let removed = next.remove(id).ok_or(StoreError::NotFound {
            collection: T::KIND,
            id: *id,
        })?;
        self.persist(&next).await?;
        *guard = next;
        Ok(removed)
    }

    /// Atomic read-modify-write of one record. `f` sees the current stored
    /// value and may veto the change by returning an error. Nothing is
    /// written if `f` leaves the record unchanged.
    pub async fn update<E>(&self, id: &Ulid, f: impl FnOnce(&mut T) -> Result<(), E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.records.write().await;
        let current = guard.get(id).cloned().ok_or(StoreError::NotFound {
            collection: T::KIND,
            id: *id,
        })?;
        let mut updated = current.clone();
        f(&mut updated)?;
        if updated == current {
            return Ok(updated);
        }

        let mut next = guard.clone();
        next.insert(*id, updated.clone());
        self.persist(&next).await?;
        *guard = next;
        Ok(updated)
    }

    /// Hand the full collection to the snapshot writer and wait until it is durable.
    async fn persist(&self, records: &BTreeMap<Ulid, T>) -> StoreResult<()> {
        let values: Vec<&T> = records.values().collect();
        let payload = snapshot::encode_records(&values)?;
        let (tx, rx) = oneshot::channel();
        self.writer
            .send(SnapshotCommand::Write {
                collection: T::KIND,
                payload,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        rx.await.map_err(|_| StoreError::WriterClosed)??;
        Ok(())
    }
}

pub struct Store {
    pub users: Collection<User>,
    pub machines: Collection<Machine>,
    pub bookings: Collection<Booking>,
    pub reports: Collection<Report>,
    writer: mpsc::Sender<SnapshotCommand>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open the store in `dir`, seeding from the bundled dataset as needed.
    /// Must be called from within a Tokio runtime.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<(Self, Vec<StartupNotice>)> {
        Self::open_with_seed(dir, Seed::bundled()?)
    }

    pub fn open_with_seed(dir: impl Into<PathBuf>, seed: Seed) -> StoreResult<(Self, Vec<StartupNotice>)> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        // An unreadable file stops startup; only corrupt contents are reseeded.
        let users = recoverable(load::<User>(&dir))?;
        let machines = recoverable(load::<Machine>(&dir))?;
        let bookings = recoverable(load::<Booking>(&dir))?;
        let reports = recoverable(load::<Report>(&dir))?;

        let mut notices = Vec::new();
        for (collection, result) in [
            (CollectionKind::Users, users.as_ref().err()),
            (CollectionKind::Machines, machines.as_ref().err()),
            (CollectionKind::Bookings, bookings.as_ref().err()),
            (CollectionKind::Reports, reports.as_ref().err()),
        ] {
            if let Some(reason) = result {
                warn!("degraded start: {collection} snapshot corrupt ({reason}), resetting to seed data");
                notices.push(StartupNotice::DegradedStart {
                    collection,
                    reason: reason.clone(),
                });
            }
        }
        // Collections reference each other, so one bad file resets them all.
        let reset = !notices.is_empty();

        let users = settle(&dir, users, seed.users, reset, &mut notices)?;
        let machines = settle(&dir, machines, seed.machines, reset, &mut notices)?;
        let bookings = settle(&dir, bookings, seed.bookings, reset, &mut notices)?;
        let reports = settle(&dir, reports, seed.reports, reset, &mut notices)?;

        let (writer, rx) = mpsc::channel(1024);
        let writer_task = tokio::spawn(snapshot::snapshot_writer_loop(dir.clone(), rx));

        info!(
            "store open at {}: {} users, {} machines, {} bookings, {} reports",
            dir.display(),
            users.len(),
            machines.len(),
            bookings.len(),
            reports.len()
        );

        let store = Self {
            users: Collection::new(users, writer.clone()),
            machines: Collection::new(machines, writer.clone()),
            bookings: Collection::new(bookings, writer.clone()),
            reports: Collection::new(reports, writer.clone()),
            writer,
            writer_task: Mutex::new(Some(writer_task)),
        };
        Ok((store, notices))
    }

    /// Stop the snapshot writer after it finishes queued writes. Later
    /// mutations fail with `WriterClosed`. Safe to call more than once.
    pub async fn close(&self) {
        let Some(task) = self.writer_task.lock().await.take() else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if self
            .writer
            .send(SnapshotCommand::Shutdown { response: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
        let _ = task.await;
        info!("store closed");
    }
}

/// `Ok(None)` when the file does not exist, `Corrupt` when its contents do
/// not decode, `Io` when it cannot be read at all.
fn load<T: Record>(dir: &Path) -> StoreResult<Option<Vec<T>>> {
    let path = dir.join(T::KIND.file_name());
    match snapshot::read_snapshot_file(&path) {
        Ok(Some(bytes)) => snapshot::decode_records(&bytes)
            .map(Some)
            .map_err(|reason| StoreError::Corrupt {
                collection: T::KIND,
                reason,
            }),
        Ok(None) => Ok(None),
        Err(e) => {
            error!("cannot read {}: {e}", path.display());
            Err(StoreError::Io(e))
        }
    }
}

/// Corruption becomes the inner `Err` and is recovered by reseeding; any
/// other failure is returned as is.
fn recoverable<T>(loaded: StoreResult<Option<Vec<T>>>) -> StoreResult<Result<Option<Vec<T>>, String>> {
    match loaded {
        Ok(records) => Ok(Ok(records)),
        Err(StoreError::Corrupt { reason, .. }) => Ok(Err(reason)),
        Err(e) => Err(e),
    }
}

/// Pick the loaded records or fall back to the seed, writing the seed out
/// so the next start finds a valid snapshot.
fn settle<T: Record>(
    dir: &Path,
    loaded: Result<Option<Vec<T>>, String>,
    seed: Vec<T>,
    reset: bool,
    notices: &mut Vec<StartupNotice>,
) -> StoreResult<Vec<T>> {
    match loaded {
        Ok(Some(records)) if !reset => Ok(records),
        Ok(None) if !reset => {
            notices.push(StartupNotice::Seeded { collection: T::KIND });
            write_initial(dir, &seed)?;
            Ok(seed)
        }
        _ => {
            write_initial(dir, &seed)?;
            Ok(seed)
        }
    }
}

fn write_initial<T: Record>(dir: &Path, records: &[T]) -> StoreResult<()> {
    let refs: Vec<&T> = records.iter().collect();
    let payload = snapshot::encode_records(&refs)?;
    snapshot::write_snapshot_file(&dir.join(T::KIND.file_name()), &payload)?;
    Ok(())
}
