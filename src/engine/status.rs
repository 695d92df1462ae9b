use chrono::NaiveDateTime;

use crate::model::{Booking, BookingStatus};

/// Derive a booking's lifecycle status from its own window and `now`.
/// Cancelled is terminal and never re-derived.
pub fn evaluate(booking: &Booking, now: NaiveDateTime) -> BookingStatus {
    if booking.status == BookingStatus::Cancelled {
        return BookingStatus::Cancelled;
    }
    if now < booking.starts_at() {
        BookingStatus::Upcoming
    } else if now < booking.ends_at() {
        BookingStatus::InProgress
    } else {
        BookingStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hhmm;
    use ulid::Ulid;

    fn booking(date: &str, time: &str, duration: u32, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            user_id: Ulid::new(),
            machine_id: Ulid::new(),
            date: date.parse().unwrap(),
            start_time: hhmm::parse(time).unwrap(),
            duration,
            program: "Normal Wash".into(),
            status,
            is_fixed_slot: true,
            verification_code: "654321".into(),
            water_usage: 45.0,
            energy_usage: 0.9,
            co2_impact: 0.4,
        }
    }

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn window_boundaries() {
        let b = booking("2024-06-10", "10:00", 45, BookingStatus::Upcoming);
        assert_eq!(evaluate(&b, at("2024-06-10 09:59")), BookingStatus::Upcoming);
        assert_eq!(evaluate(&b, at("2024-06-10 10:00")), BookingStatus::InProgress);
        assert_eq!(evaluate(&b, at("2024-06-10 10:20")), BookingStatus::InProgress);
        assert_eq!(evaluate(&b, at("2024-06-10 10:44")), BookingStatus::InProgress);
        assert_eq!(evaluate(&b, at("2024-06-10 10:45")), BookingStatus::Completed);
        assert_eq!(evaluate(&b, at("2024-06-10 10:46")), BookingStatus::Completed);
    }

    #[test]
    fn cancelled_never_changes() {
        let b = booking("2024-06-10", "10:00", 45, BookingStatus::Cancelled);
        for now in ["2024-06-09 00:00", "2024-06-10 10:10", "2025-01-01 00:00"] {
            assert_eq!(evaluate(&b, at(now)), BookingStatus::Cancelled);
        }
    }

    #[test]
    fn evaluation_ignores_stored_progress() {
        let b = booking("2024-06-10", "10:00", 45, BookingStatus::Completed);
        assert_eq!(evaluate(&b, at("2024-06-10 09:00")), BookingStatus::Upcoming);
    }

    #[test]
    fn evaluation_is_repeatable_and_monotone() {
        let path = [BookingStatus::Upcoming, BookingStatus::InProgress, BookingStatus::Completed];
        let position = |s: BookingStatus| path.iter().position(|p| *p == s).unwrap();
        let b = booking("2024-06-10", "22:00", 60, BookingStatus::Upcoming);
        let mut last = 0;
        let mut now = at("2024-06-10 21:00");
        for _ in 0..30 {
            let first = evaluate(&b, now);
            assert_eq!(first, evaluate(&b, now));
            let pos = position(first);
            assert!(pos >= last);
            last = pos;
            now += chrono::Duration::minutes(7);
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn moved_booking_derives_from_new_window() {
        let mut b = booking("2024-06-10", "09:00", 45, BookingStatus::InProgress);
        b.start_time = hhmm::parse("15:00").unwrap();
        assert_eq!(evaluate(&b, at("2024-06-10 09:10")), BookingStatus::Upcoming);
    }
}
