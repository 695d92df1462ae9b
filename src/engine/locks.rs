use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

/// Keys that check-then-act operations serialize on. Variant order is the
/// global acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// One booking's record, held across modify's read, check and write.
    Booking(Ulid),
    /// One machine slot: availability.
    Slot(Ulid, NaiveDate, NaiveTime),
    /// One user's calendar week: daily and weekly quota.
    UserWeek(Ulid, NaiveDate),
}

#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in sorted order to prevent deadlocks.
    pub async fn acquire(&self, mut keys: Vec<LockKey>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self.locks.entry(key).or_default().value().clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
