use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;

use super::quota::{self, QuotaDecision};
use super::status::evaluate;
use super::{BookingEngine, BookingError};

/// Outcome of one pass over every booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub transitioned: usize,
    /// Bookings whose new status could not be persisted.
    pub failed: Vec<Ulid>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl BookingEngine {
    pub async fn daily_usage(&self, user_id: Ulid, date: NaiveDate) -> u32 {
        let bookings = self.store.bookings.list(|b| b.user_id == user_id).await;
        quota::daily_usage(&bookings, user_id, date)
    }

    pub async fn weekly_usage(&self, user_id: Ulid, date: NaiveDate) -> u32 {
        let bookings = self.store.bookings.list(|b| b.user_id == user_id).await;
        quota::weekly_usage(&bookings, user_id, date)
    }

    /// Would a new booking on `date` fit within the user's limits right now?
    pub async fn check_quota(&self, user_id: Ulid, date: NaiveDate) -> Result<QuotaDecision, BookingError> {
        let user = self
            .store
            .users
            .get(&user_id)
            .await
            .ok_or(BookingError::UserNotFound(user_id))?;
        let bookings = self.store.bookings.list(|b| b.user_id == user_id).await;
        Ok(quota::check_quota(&bookings, user_id, &user.booking_quota, date))
    }

    pub async fn quota_summary(&self, user_id: Ulid, date: NaiveDate) -> Result<QuotaSummary, BookingError> {
        let user = self
            .store
            .users
            .get(&user_id)
            .await
            .ok_or(BookingError::UserNotFound(user_id))?;
        let bookings = self.store.bookings.list(|b| b.user_id == user_id).await;
        Ok(quota::summarize(&bookings, user_id, &user.booking_quota, date))
    }

    /// All of a user's bookings, oldest slot first, with statuses brought
    /// up to date. A status that fails to persist is still reported as
    /// derived; the next sweep retries the write.
    pub async fn list_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        let now = self.clock.now();
        let mut bookings = self.store.bookings.list(|b| b.user_id == user_id).await;

        for booking in &mut bookings {
            let target = evaluate(booking, now);
            if target == booking.status {
                continue;
            }
            match self.write_back(booking.id, now).await {
                Ok((stored, _)) => *booking = stored,
                Err(e) => {
                    warn!("status write-back for booking {} failed: {e}", booking.id);
                    booking.status = target;
                }
            }
        }

        bookings.sort_by_key(|b| (b.date, b.start_time, b.id));
        bookings
    }

    /// Reconcile every booking against the clock. Safe to run concurrently
    /// with itself and with cancel: each write re-derives from the record as
    /// stored at that moment, and only the call that actually changed a
    /// record counts it as a transition.
    pub async fn sweep_all(&self) -> SweepReport {
        let now = self.clock.now();
        let candidates = self.store.bookings.list(|_| true).await;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..Default::default()
        };

        for booking in candidates {
            if evaluate(&booking, now) == booking.status {
                continue;
            }
            match self.write_back(booking.id, now).await {
                Ok((stored, true)) => {
                    debug!("booking {}: {} -> {}", stored.id, booking.status, stored.status);
                    report.transitioned += 1;
                }
                Ok(_) => {}
                // Deleted between listing and writing; nothing to reconcile.
                Err(BookingError::NotFound(_)) => {}
                Err(e) => {
                    warn!("sweep: booking {} not reconciled: {e}", booking.id);
                    report.failed.push(booking.id);
                }
            }
        }

        metrics::counter!(crate::observability::SWEEP_TRANSITIONS_TOTAL).increment(report.transitioned as u64);
        metrics::counter!(crate::observability::SWEEP_FAILURES_TOTAL).increment(report.failed.len() as u64);
        if report.transitioned > 0 || !report.is_clean() {
            info!(
                "sweep: {} examined, {} transitioned, {} failed",
                report.examined,
                report.transitioned,
                report.failed.len()
            );
        }
        report
    }

    /// Totals and per-booking averages over a user's active bookings in one
    /// calendar month.
    pub async fn impact_summary(&self, user_id: Ulid, year: i32, month: u32) -> Result<ImpactSummary, BookingError> {
        if !(1..=12).contains(&month) {
            return Err(BookingError::InvalidInput("month must be between 1 and 12"));
        }
        if self.store.users.get(&user_id).await.is_none() {
            return Err(BookingError::UserNotFound(user_id));
        }
        let bookings = self
            .store
            .bookings
            .list(|b| b.user_id == user_id && b.is_active() && b.in_month(year, month))
            .await;

        let mut summary = ImpactSummary::default();
        for b in &bookings {
            summary.bookings += 1;
            summary.water_usage += b.water_usage;
            summary.energy_usage += b.energy_usage;
            summary.co2_impact += b.co2_impact;
        }
        if summary.bookings > 0 {
            let n = f64::from(summary.bookings);
            summary.avg_water_usage = summary.water_usage / n;
            summary.avg_energy_usage = summary.energy_usage / n;
            summary.avg_co2_impact = summary.co2_impact / n;
        }
        Ok(summary)
    }

    /// Persist the derived status of one booking, computed from the stored
    /// record under the collection write lock. The flag is true only when
    /// this call changed the stored status.
    async fn write_back(&self, id: Ulid, now: NaiveDateTime) -> Result<(Booking, bool), BookingError> {
        let mut changed = false;
        let stored = self
            .store
            .bookings
            .update(&id, |b| -> Result<(), BookingError> {
                let next = evaluate(b, now);
                changed = next != b.status;
                b.status = next;
                Ok(())
            })
            .await?;
        Ok((stored, changed))
    }
}
