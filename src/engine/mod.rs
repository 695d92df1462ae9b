mod availability;
mod error;
mod locks;
mod mutations;
mod queries;
mod quota;
mod status;

pub use availability::{day_grid, slot_holder};
pub use error::{BookingError, ErrorKind};
pub use locks::{KeyLocks, LockKey};
pub use queries::SweepReport;
pub use quota::{check_quota, daily_usage, week_bounds, weekly_usage, QuotaDecision};
pub use status::evaluate;

use std::sync::Arc;

use crate::catalog::ProgramCatalog;
use crate::clock::Clock;
use crate::store::Store;

/// The booking lifecycle manager: the only writer of bookings.
///
/// Create, modify and cancel serialize on the keys they check (see
/// [`LockKey`]); status write-back is an atomic read-modify-write on the
/// store, so it never needs those locks.
pub struct BookingEngine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    catalog: Arc<ProgramCatalog>,
    locks: KeyLocks,
}

impl BookingEngine {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, catalog: Arc<ProgramCatalog>) -> Self {
        Self {
            store,
            clock,
            catalog,
            locks: KeyLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    /// Release lock-table entries for keys nobody is using.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}
