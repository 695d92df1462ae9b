use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Time-of-day values travel as `HH:MM`. `HH:MM:SS` is accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }

    /// Same as the parent module, for `Option<NaiveTime>` fields.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => s.collect_str(&t.format(super::FORMAT)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::parse(&raw).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

// ── Users ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimit {
    pub limit: u32,
}

/// Configured booking limits. Usage is never stored; it is always
/// recomputed from active bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub daily: QuotaLimit,
    pub weekly: QuotaLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub machine_available: bool,
    pub booking_reminder: bool,
    pub washing_complete: bool,
    pub machine_error: bool,
}

/// Opaque to the booking engine; stored and returned as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub notifications: NotificationPreferences,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Ulid,
    pub username: String,
    pub secret: String,
    pub booking_quota: QuotaLimits,
    pub preferences: Preferences,
}

/// What callers get back for a user: everything except the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Ulid,
    pub username: String,
    pub booking_quota: QuotaLimits,
    pub preferences: Preferences,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            booking_quota: user.booking_quota,
            preferences: user.preferences.clone(),
        }
    }
}

// ── Machines ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineStatus {
    Available,
    InUse,
    Maintenance,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Ulid,
    pub name: String,
    pub status: MachineStatus,
    pub last_used: Option<NaiveDateTime>,
    pub next_booking: Option<NaiveDateTime>,
    pub error: Option<String>,
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Upcoming => "upcoming",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub user_id: Ulid,
    pub machine_id: Ulid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Minutes.
    pub duration: u32,
    /// Program name as listed in the catalog.
    pub program: String,
    pub status: BookingStatus,
    pub is_fixed_slot: bool,
    pub verification_code: String,
    /// Liters.
    pub water_usage: f64,
    /// kWh.
    pub energy_usage: f64,
    /// kg CO₂.
    pub co2_impact: f64,
}

impl Booking {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration))
    }

    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn occupies(&self, machine_id: Ulid, date: NaiveDate, start_time: NaiveTime) -> bool {
        self.machine_id == machine_id && self.date == date && self.start_time == start_time
    }

    pub fn in_month(&self, year: i32, month: u32) -> bool {
        self.date.year() == year && self.date.month() == month
    }
}

/// A request to reserve a slot. Id, status, verification code and impact
/// metrics are assigned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub user_id: Ulid,
    pub machine_id: Ulid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub program: String,
    #[serde(default)]
    pub is_fixed_slot: bool,
}

/// Partial update for an existing booking. Fields that are not listed here
/// (status, verification code, owner, machine) cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub is_fixed_slot: Option<bool>,
}

// ── Reports ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Machine,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Ulid,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub reporter_id: Ulid,
    pub machine_id: Option<Ulid>,
    pub reported_user_id: Option<Ulid>,
    pub issue_type: String,
    pub description: String,
    pub urgency: Urgency,
    pub status: ReportStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub reporter_id: Ulid,
    #[serde(default)]
    pub machine_id: Option<Ulid>,
    #[serde(default)]
    pub reported_user_id: Option<Ulid>,
    pub issue_type: String,
    pub description: String,
    pub urgency: Urgency,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub used: u32,
    pub limit: u32,
}

impl QuotaUsage {
    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSummary {
    pub daily: QuotaUsage,
    pub weekly: QuotaUsage,
}

/// Resource consumption of a user's active bookings over one month.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub bookings: u32,
    pub water_usage: f64,
    pub energy_usage: f64,
    pub co2_impact: f64,
    pub avg_water_usage: f64,
    pub avg_energy_usage: f64,
    pub avg_co2_impact: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(date: &str, time: &str, duration: u32) -> Booking {
        Booking {
            id: Ulid::new(),
            user_id: Ulid::new(),
            machine_id: Ulid::new(),
            date: date.parse().unwrap(),
            start_time: hhmm::parse(time).unwrap(),
            duration,
            program: "Normal Wash".into(),
            status: BookingStatus::Upcoming,
            is_fixed_slot: true,
            verification_code: "123456".into(),
            water_usage: 45.0,
            energy_usage: 0.9,
            co2_impact: 0.4,
        }
    }

    #[test]
    fn booking_window() {
        let b = booking("2024-06-10", "10:00", 45);
        assert_eq!(b.starts_at().to_string(), "2024-06-10 10:00:00");
        assert_eq!(b.ends_at().to_string(), "2024-06-10 10:45:00");
    }

    #[test]
    fn booking_window_crosses_midnight() {
        let b = booking("2024-06-10", "23:30", 60);
        assert_eq!(b.ends_at().to_string(), "2024-06-11 00:30:00");
    }

    #[test]
    fn booking_json_shape() {
        let b = booking("2024-06-10", "09:00", 30);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["startTime"], "09:00");
        assert_eq!(json["date"], "2024-06-10");
        assert_eq!(json["status"], "upcoming");
        assert_eq!(json["isFixedSlot"], true);
        assert_eq!(json["verificationCode"], "123456");
    }

    #[test]
    fn status_names_are_kebab_case() {
        let s: BookingStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(s, BookingStatus::InProgress);
        assert_eq!(BookingStatus::InProgress.to_string(), "in-progress");
        assert!(serde_json::from_str::<BookingStatus>("\"running\"").is_err());
    }

    #[test]
    fn unknown_machine_status_rejected() {
        assert!(serde_json::from_str::<MachineStatus>("\"broken\"").is_err());
        let s: MachineStatus = serde_json::from_str("\"in-use\"").unwrap();
        assert_eq!(s, MachineStatus::InUse);
    }

    #[test]
    fn time_accepts_seconds_on_input() {
        assert_eq!(hhmm::parse("09:00:00").unwrap(), hhmm::parse("09:00").unwrap());
        assert!(hhmm::parse("9am").is_err());
    }

    #[test]
    fn update_ignores_protected_fields() {
        let raw = r#"{"program":"Quick Wash","status":"cancelled","verificationCode":"000000"}"#;
        let update: BookingUpdate = serde_json::from_str(raw).unwrap();
        assert_eq!(update.program.as_deref(), Some("Quick Wash"));
        assert_eq!(update.date, None);
        assert_eq!(update.start_time, None);
    }

    #[test]
    fn report_kind_uses_type_key() {
        let raw = r#"{
            "type": "machine",
            "reporterId": "01J00000000000000000000001",
            "machineId": "01J00000000000000000000101",
            "issueType": "leak",
            "description": "water on the floor",
            "urgency": "high"
        }"#;
        let report: NewReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.kind, ReportKind::Machine);
        assert_eq!(report.reported_user_id, None);
    }

    #[test]
    fn booking_bincode_roundtrip() {
        let b = booking("2024-06-10", "09:00", 30);
        let bytes = bincode::serialize(&b).unwrap();
        let decoded: Booking = bincode::deserialize(&bytes).unwrap();
        assert_eq!(b, decoded);
    }
}
