use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ulid::Ulid;

use crate::limits::{FIRST_SLOT_HOUR, LAST_SLOT_HOUR};
use crate::model::*;

use super::{BookingEngine, BookingError};

/// The active booking occupying `(machine_id, date, start_time)`, if any.
/// Slots are matched exactly on their start; durations are not compared.
pub fn slot_holder<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    machine_id: Ulid,
    date: NaiveDate,
    start_time: NaiveTime,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    bookings
        .into_iter()
        .find(|b| b.is_active() && Some(b.id) != exclude && b.occupies(machine_id, date, start_time))
        .map(|b| b.id)
}

/// Hourly slot grid for one machine-day. Past slots are never available.
pub fn day_grid(
    bookings: &[Booking],
    machine_id: Ulid,
    date: NaiveDate,
    now: NaiveDateTime,
    exclude: Option<Ulid>,
) -> Vec<SlotAvailability> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(|start_time| {
            let past = date.and_time(start_time) < now;
            let taken = slot_holder(bookings, machine_id, date, start_time, exclude).is_some();
            SlotAvailability {
                start_time,
                available: !past && !taken,
            }
        })
        .collect()
}

impl BookingEngine {
    pub async fn is_available(
        &self,
        machine_id: Ulid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude: Option<Ulid>,
    ) -> bool {
        self.store
            .bookings
            .find(|b| b.is_active() && Some(b.id) != exclude && b.occupies(machine_id, date, start_time))
            .await
            .is_none()
    }

    pub async fn day_slots(
        &self,
        machine_id: Ulid,
        date: NaiveDate,
        exclude: Option<Ulid>,
    ) -> Result<Vec<SlotAvailability>, BookingError> {
        if self.store.machines.get(&machine_id).await.is_none() {
            return Err(BookingError::MachineNotFound(machine_id));
        }
        let bookings = self
            .store
            .bookings
            .list(|b| b.machine_id == machine_id && b.date == date)
            .await;
        Ok(day_grid(&bookings, machine_id, date, self.clock.now(), exclude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hhmm;

    fn t(raw: &str) -> NaiveTime {
        hhmm::parse(raw).unwrap()
    }

    fn booking(machine_id: Ulid, time: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            user_id: Ulid::new(),
            machine_id,
            date: "2024-06-10".parse().unwrap(),
            start_time: t(time),
            duration: 60,
            program: "Heavy Duty".into(),
            status,
            is_fixed_slot: false,
            verification_code: "222222".into(),
            water_usage: 60.0,
            energy_usage: 1.2,
            co2_impact: 0.6,
        }
    }

    #[test]
    fn exact_slot_match_only() {
        let m = Ulid::new();
        let date = "2024-06-10".parse().unwrap();
        let held = booking(m, "09:00", BookingStatus::Upcoming);
        let bookings = vec![held.clone()];

        assert_eq!(slot_holder(&bookings, m, date, t("09:00"), None), Some(held.id));
        // Overlapping but different start: independent slot.
        assert_eq!(slot_holder(&bookings, m, date, t("09:30"), None), None);
        // Other machine.
        assert_eq!(slot_holder(&bookings, Ulid::new(), date, t("09:00"), None), None);
    }

    #[test]
    fn cancelled_bookings_free_the_slot() {
        let m = Ulid::new();
        let date = "2024-06-10".parse().unwrap();
        let bookings = vec![booking(m, "09:00", BookingStatus::Cancelled)];
        assert_eq!(slot_holder(&bookings, m, date, t("09:00"), None), None);
    }

    #[test]
    fn excluded_booking_does_not_conflict_with_itself() {
        let m = Ulid::new();
        let date = "2024-06-10".parse().unwrap();
        let own = booking(m, "09:00", BookingStatus::Upcoming);
        let bookings = vec![own.clone()];
        assert_eq!(slot_holder(&bookings, m, date, t("09:00"), Some(own.id)), None);
        assert_eq!(slot_holder(&bookings, m, date, t("09:00"), Some(Ulid::new())), Some(own.id));
    }

    #[test]
    fn grid_marks_past_and_taken() {
        let m = Ulid::new();
        let date: NaiveDate = "2024-06-10".parse().unwrap();
        let bookings = vec![booking(m, "12:00", BookingStatus::InProgress)];
        let now = date.and_time(t("08:30"));

        let grid = day_grid(&bookings, m, date, now, None);
        assert_eq!(grid.len(), 17);
        assert_eq!(grid[0].start_time, t("06:00"));
        assert_eq!(grid[16].start_time, t("22:00"));

        let by_time = |raw: &str| grid.iter().find(|s| s.start_time == t(raw)).unwrap().available;
        assert!(!by_time("06:00"));
        assert!(!by_time("08:00"));
        assert!(by_time("09:00"));
        assert!(!by_time("12:00"));
        assert!(by_time("13:00"));
    }

    #[test]
    fn grid_for_future_day_is_open() {
        let m = Ulid::new();
        let date: NaiveDate = "2024-06-10".parse().unwrap();
        let now: NaiveDateTime = "2024-06-01T12:00:00".parse().unwrap();
        assert!(day_grid(&[], m, date, now, None).iter().all(|s| s.available));
    }
}
