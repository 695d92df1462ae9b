use chrono::NaiveDateTime;
use rand::Rng;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::availability::slot_holder;
use super::locks::LockKey;
use super::quota::{check_quota, week_bounds, QuotaDecision};
use super::status::evaluate;
use super::{BookingEngine, BookingError};

/// Six digits, never a leading zero.
pub(crate) fn generate_verification_code() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}

/// Only upcoming and in-progress bookings may be modified. The check uses
/// the clock-derived status, not just what was last persisted.
fn ensure_modifiable(booking: &Booking, now: NaiveDateTime) -> Result<(), BookingError> {
    match evaluate(booking, now) {
        BookingStatus::Upcoming | BookingStatus::InProgress => Ok(()),
        other => Err(BookingError::InvalidState(other)),
    }
}

impl BookingEngine {
    pub async fn create_booking(&self, request: NewBooking) -> Result<Booking, BookingError> {
        let result = self.try_create(request).await;
        match &result {
            Ok(booking) => {
                metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
                info!(
                    "booking {} created: machine {} {} {} for user {}",
                    booking.id,
                    booking.machine_id,
                    booking.date,
                    booking.start_time.format("%H:%M"),
                    booking.user_id
                );
            }
            Err(e) => {
                metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL, "reason" => e.label())
                    .increment(1);
                debug!("create rejected: {e}");
            }
        }
        result
    }

    async fn try_create(&self, request: NewBooking) -> Result<Booking, BookingError> {
        if self.store.machines.get(&request.machine_id).await.is_none() {
            return Err(BookingError::MachineNotFound(request.machine_id));
        }
        let user = self
            .store
            .users
            .get(&request.user_id)
            .await
            .ok_or(BookingError::UserNotFound(request.user_id))?;
        let program = self
            .catalog
            .lookup(&request.program)
            .ok_or_else(|| BookingError::InvalidProgram(request.program.clone()))?
            .clone();

        let (week_start, _) = week_bounds(request.date);
        let _guards = self
            .locks
            .acquire(vec![
                LockKey::Slot(request.machine_id, request.date, request.start_time),
                LockKey::UserWeek(user.id, week_start),
            ])
            .await;

        // Everything below runs with both keys held, so the checks still
        // hold when the write lands.
        let relevant = self
            .store
            .bookings
            .list(|b| b.user_id == user.id || b.machine_id == request.machine_id)
            .await;

        match check_quota(&relevant, user.id, &user.booking_quota, request.date) {
            QuotaDecision::Allowed => {}
            QuotaDecision::DailyExceeded(u) => {
                return Err(BookingError::DailyQuotaExceeded { used: u.used, limit: u.limit });
            }
            QuotaDecision::WeeklyExceeded(u) => {
                return Err(BookingError::WeeklyQuotaExceeded { used: u.used, limit: u.limit });
            }
        }

        if let Some(holder) = slot_holder(&relevant, request.machine_id, request.date, request.start_time, None) {
            return Err(BookingError::SlotUnavailable(holder));
        }

        let booking = Booking {
            id: Ulid::new(),
            user_id: user.id,
            machine_id: request.machine_id,
            date: request.date,
            start_time: request.start_time,
            duration: program.duration,
            program: program.name,
            status: BookingStatus::Upcoming,
            is_fixed_slot: request.is_fixed_slot,
            verification_code: generate_verification_code(),
            water_usage: program.water_usage,
            energy_usage: program.energy_usage,
            co2_impact: program.co2_impact,
        };
        self.store.bookings.upsert(booking.clone()).await?;
        Ok(booking)
    }

    /// Apply a partial update. The verification code is never touched and
    /// status is re-derived from the resulting window, whatever the caller
    /// sends. Quota is not re-checked, and impact metrics stay pinned to the
    /// program chosen at creation.
    pub async fn modify_booking(&self, id: Ulid, update: BookingUpdate) -> Result<Booking, BookingError> {
        let _booking_guard = self.locks.acquire(vec![LockKey::Booking(id)]).await;

        let current = self
            .store
            .bookings
            .get(&id)
            .await
            .ok_or(BookingError::NotFound(id))?;
        ensure_modifiable(&current, self.clock.now())?;

        let program = match &update.program {
            Some(key) => Some(
                self.catalog
                    .lookup(key)
                    .ok_or_else(|| BookingError::InvalidProgram(key.clone()))?
                    .clone(),
            ),
            None => None,
        };

        let date = update.date.unwrap_or(current.date);
        let start_time = update.start_time.unwrap_or(current.start_time);
        let moves = date != current.date || start_time != current.start_time;

        let _slot_guard = if moves {
            let guard = self
                .locks
                .acquire(vec![LockKey::Slot(current.machine_id, date, start_time)])
                .await;
            let holder = self
                .store
                .bookings
                .find(|b| b.is_active() && b.id != id && b.occupies(current.machine_id, date, start_time))
                .await;
            if let Some(holder) = holder {
                debug!("modify of {id} rejected: slot held by {}", holder.id);
                return Err(BookingError::SlotUnavailable(holder.id));
            }
            Some(guard)
        } else {
            None
        };

        let now = self.clock.now();
        let updated = self
            .store
            .bookings
            .update(&id, |b| -> Result<(), BookingError> {
                // A concurrent cancel may have landed since the first check.
                ensure_modifiable(b, now)?;
                b.date = date;
                b.start_time = start_time;
                if let Some(program) = &program {
                    b.program = program.name.clone();
                    b.duration = program.duration;
                }
                if let Some(fixed) = update.is_fixed_slot {
                    b.is_fixed_slot = fixed;
                }
                // Status follows the (possibly moved) window, never the caller.
                b.status = evaluate(b, now);
                Ok(())
            })
            .await?;

        info!("booking {id} modified");
        Ok(updated)
    }

    /// Cancel an upcoming booking. Cancellation is terminal; the slot and
    /// the quota it consumed are freed because both derive from status.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let now = self.clock.now();
        let cancelled = self
            .store
            .bookings
            .update(&id, |b| match evaluate(b, now) {
                BookingStatus::Upcoming => {
                    b.status = BookingStatus::Cancelled;
                    Ok(())
                }
                other => Err(BookingError::InvalidState(other)),
            })
            .await?;

        info!("booking {id} cancelled");
        Ok(cancelled)
    }
}
