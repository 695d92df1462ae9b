//! Request/response surface over the booking engine.
//!
//! Every operation returns a [`ServiceResponse`]; failures travel as values
//! with an [`ErrorKind`] and, for engine failures, the specific `reason`
//! (`user_not_found`, `weekly_quota_exceeded`, ...). Never as panics.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ulid::Ulid;

use crate::catalog::Program;
use crate::engine::{BookingEngine, BookingError, ErrorKind, SweepReport};
use crate::limits::{MAX_DESCRIPTION_LEN, MAX_ERROR_DETAIL_LEN, MAX_ISSUE_TYPE_LEN, MAX_LANGUAGE_LEN};
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            reason: None,
        }
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: Some(kind),
            reason: None,
        }
    }
}

impl<T> From<Result<T, BookingError>> for ServiceResponse<T> {
    fn from(result: Result<T, BookingError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self {
                reason: Some(e.label().to_string()),
                ..Self::fail(e.kind(), e.to_string())
            },
        }
    }
}

pub struct Service {
    engine: Arc<BookingEngine>,
}

impl Service {
    pub fn new(engine: Arc<BookingEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<BookingEngine> {
        &self.engine
    }

    // ── Users ───────────────────────────────────────────

    pub async fn login(&self, username: &str, secret: &str) -> ServiceResponse<UserProfile> {
        let user = self
            .engine
            .store()
            .users
            .find(|u| u.username == username)
            .await;
        match user {
            Some(user) if user.secret == secret => {
                info!("login: {}", user.username);
                ServiceResponse::ok(UserProfile::from(&user))
            }
            _ => {
                debug!("login rejected for {username:?}");
                ServiceResponse::fail(ErrorKind::InvalidCredentials, "invalid username or secret")
            }
        }
    }

    pub async fn update_preferences(&self, user_id: Ulid, preferences: Preferences) -> ServiceResponse<UserProfile> {
        self.try_update_preferences(user_id, preferences).await.into()
    }

    async fn try_update_preferences(&self, user_id: Ulid, preferences: Preferences) -> Result<UserProfile, BookingError> {
        if preferences.language.is_empty() || preferences.language.len() > MAX_LANGUAGE_LEN {
            return Err(BookingError::InvalidInput("language must be 1 to 16 characters"));
        }
        let updated = self
            .engine
            .store()
            .users
            .update(&user_id, |u| -> Result<(), BookingError> {
                u.preferences = preferences;
                Ok(())
            })
            .await
            .map_err(|e| match e {
                BookingError::NotFound(id) => BookingError::UserNotFound(id),
                other => other,
            })?;
        Ok(UserProfile::from(&updated))
    }

    // ── Bookings ────────────────────────────────────────

    pub async fn check_availability(&self, machine_id: Ulid, date: NaiveDate, start_time: NaiveTime) -> ServiceResponse<bool> {
        ServiceResponse::ok(self.engine.is_available(machine_id, date, start_time, None).await)
    }

    pub async fn day_slots(
        &self,
        machine_id: Ulid,
        date: NaiveDate,
        exclude_booking_id: Option<Ulid>,
    ) -> ServiceResponse<Vec<SlotAvailability>> {
        self.engine.day_slots(machine_id, date, exclude_booking_id).await.into()
    }

    pub async fn create_booking(&self, request: NewBooking) -> ServiceResponse<Booking> {
        self.engine.create_booking(request).await.into()
    }

    pub async fn modify_booking(&self, booking_id: Ulid, updates: BookingUpdate) -> ServiceResponse<Booking> {
        self.engine.modify_booking(booking_id, updates).await.into()
    }

    pub async fn cancel_booking(&self, booking_id: Ulid) -> ServiceResponse<Booking> {
        self.engine.cancel_booking(booking_id).await.into()
    }

    pub async fn get_user_bookings(&self, user_id: Ulid) -> ServiceResponse<Vec<Booking>> {
        ServiceResponse::ok(self.engine.list_for_user(user_id).await)
    }

    /// A sweep with failures still carries its report.
    pub async fn sweep(&self) -> ServiceResponse<SweepReport> {
        let report = self.engine.sweep_all().await;
        if report.is_clean() {
            return ServiceResponse::ok(report);
        }
        let message = format!("{} booking(s) could not be reconciled", report.failed.len());
        ServiceResponse {
            data: Some(report),
            ..ServiceResponse::fail(ErrorKind::StorageFailure, message)
        }
    }

    /// Usage against limits for `date`, or for today when omitted.
    pub async fn quota_summary(&self, user_id: Ulid, date: Option<NaiveDate>) -> ServiceResponse<QuotaSummary> {
        let date = date.unwrap_or_else(|| self.engine.clock().today());
        self.engine.quota_summary(user_id, date).await.into()
    }

    pub async fn impact_summary(&self, user_id: Ulid, year: i32, month: u32) -> ServiceResponse<ImpactSummary> {
        self.engine.impact_summary(user_id, year, month).await.into()
    }

    pub fn list_programs(&self) -> ServiceResponse<Vec<Program>> {
        ServiceResponse::ok(self.engine.catalog().programs().to_vec())
    }

    // ── Machines ────────────────────────────────────────

    pub async fn get_all_machines(&self) -> ServiceResponse<Vec<Machine>> {
        ServiceResponse::ok(self.engine.store().machines.list(|_| true).await)
    }

    pub async fn get_machine_status(&self, machine_id: Ulid) -> ServiceResponse<Machine> {
        self.engine
            .store()
            .machines
            .get(&machine_id)
            .await
            .ok_or(BookingError::MachineNotFound(machine_id))
            .into()
    }

    pub async fn update_machine_status(
        &self,
        machine_id: Ulid,
        status: MachineStatus,
        error: Option<String>,
    ) -> ServiceResponse<Machine> {
        self.try_update_machine_status(machine_id, status, error).await.into()
    }

    async fn try_update_machine_status(
        &self,
        machine_id: Ulid,
        status: MachineStatus,
        error: Option<String>,
    ) -> Result<Machine, BookingError> {
        if error.as_ref().is_some_and(|e| e.len() > MAX_ERROR_DETAIL_LEN) {
            return Err(BookingError::InvalidInput("error detail too long"));
        }
        let machine = self
            .engine
            .store()
            .machines
            .update(&machine_id, |m| -> Result<(), BookingError> {
                m.status = status;
                m.error = error;
                Ok(())
            })
            .await
            .map_err(|e| match e {
                BookingError::NotFound(id) => BookingError::MachineNotFound(id),
                other => other,
            })?;
        info!("machine {} ({}) now {:?}", machine.id, machine.name, machine.status);
        Ok(machine)
    }

    // ── Reports ─────────────────────────────────────────

    pub async fn create_report(&self, request: NewReport) -> ServiceResponse<Report> {
        self.try_create_report(request).await.into()
    }

    async fn try_create_report(&self, request: NewReport) -> Result<Report, BookingError> {
        validate_report(&request)?;
        let store = self.engine.store();
        if store.users.get(&request.reporter_id).await.is_none() {
            return Err(BookingError::UserNotFound(request.reporter_id));
        }
        match request.kind {
            ReportKind::Machine => {
                let id = request.machine_id.ok_or(BookingError::InvalidInput("machine report needs machineId"))?;
                if store.machines.get(&id).await.is_none() {
                    return Err(BookingError::MachineNotFound(id));
                }
            }
            ReportKind::User => {
                let id = request
                    .reported_user_id
                    .ok_or(BookingError::InvalidInput("user report needs reportedUserId"))?;
                if store.users.get(&id).await.is_none() {
                    return Err(BookingError::UserNotFound(id));
                }
            }
        }

        let report = Report {
            id: Ulid::new(),
            kind: request.kind,
            reporter_id: request.reporter_id,
            machine_id: request.machine_id,
            reported_user_id: request.reported_user_id,
            issue_type: request.issue_type,
            description: request.description,
            urgency: request.urgency,
            status: ReportStatus::Pending,
            created_at: self.engine.clock().now(),
            resolved_at: None,
        };
        store.reports.upsert(report.clone()).await?;
        info!("report {} filed by {}", report.id, report.reporter_id);
        Ok(report)
    }

    pub async fn get_user_reports(&self, user_id: Ulid) -> ServiceResponse<Vec<Report>> {
        let mut reports = self.engine.store().reports.list(|r| r.reporter_id == user_id).await;
        reports.sort_by_key(|r| r.created_at);
        ServiceResponse::ok(reports)
    }

    pub async fn get_machine_reports(&self, machine_id: Ulid) -> ServiceResponse<Vec<Report>> {
        let mut reports = self
            .engine
            .store()
            .reports
            .list(|r| r.machine_id == Some(machine_id))
            .await;
        reports.sort_by_key(|r| r.created_at);
        ServiceResponse::ok(reports)
    }
}

fn validate_report(request: &NewReport) -> Result<(), BookingError> {
    let issue = request.issue_type.trim();
    if issue.is_empty() {
        return Err(BookingError::InvalidInput("issue type is required"));
    }
    if issue.len() > MAX_ISSUE_TYPE_LEN {
        return Err(BookingError::InvalidInput("issue type too long"));
    }
    if request.description.len() > MAX_DESCRIPTION_LEN {
        return Err(BookingError::InvalidInput("description too long"));
    }
    Ok(())
}
