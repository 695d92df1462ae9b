use chrono::{Datelike, Duration, NaiveDate};
use ulid::Ulid;

use crate::model::*;

/// Calendar week containing `date`: `[Sunday, next Sunday)`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = i64::from(date.weekday().num_days_from_sunday());
    let start = date - Duration::days(offset);
    (start, start + Duration::days(7))
}

/// Active bookings held by `user_id` on `date`.
pub fn daily_usage<'a>(bookings: impl IntoIterator<Item = &'a Booking>, user_id: Ulid, date: NaiveDate) -> u32 {
    count(bookings, |b| b.user_id == user_id && b.date == date)
}

/// Active bookings held by `user_id` in the week containing `reference`.
pub fn weekly_usage<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    user_id: Ulid,
    reference: NaiveDate,
) -> u32 {
    let (start, end) = week_bounds(reference);
    count(bookings, |b| b.user_id == user_id && b.date >= start && b.date < end)
}

fn count<'a>(bookings: impl IntoIterator<Item = &'a Booking>, pred: impl Fn(&Booking) -> bool) -> u32 {
    let n = bookings
        .into_iter()
        .filter(|b| b.is_active() && pred(*b))
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    DailyExceeded(QuotaUsage),
    WeeklyExceeded(QuotaUsage),
}

pub fn summarize(bookings: &[Booking], user_id: Ulid, limits: &QuotaLimits, date: NaiveDate) -> QuotaSummary {
    QuotaSummary {
        daily: QuotaUsage {
            used: daily_usage(bookings, user_id, date),
            limit: limits.daily.limit,
        },
        weekly: QuotaUsage {
            used: weekly_usage(bookings, user_id, date),
            limit: limits.weekly.limit,
        },
    }
}

/// Fails closed: a new booking is refused once usage has reached the limit.
/// Daily is checked before weekly.
pub fn check_quota(bookings: &[Booking], user_id: Ulid, limits: &QuotaLimits, date: NaiveDate) -> QuotaDecision {
    let summary = summarize(bookings, user_id, limits, date);
    if summary.daily.exhausted() {
        QuotaDecision::DailyExceeded(summary.daily)
    } else if summary.weekly.exhausted() {
        QuotaDecision::WeeklyExceeded(summary.weekly)
    } else {
        QuotaDecision::Allowed
    }
}
