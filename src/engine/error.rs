use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;

/// Failure classes visible across the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    QuotaExceeded,
    SlotUnavailable,
    InvalidInput,
    InvalidCredentials,
    StorageFailure,
}

#[derive(Debug)]
pub enum BookingError {
    NotFound(Ulid),
    MachineNotFound(Ulid),
    UserNotFound(Ulid),
    InvalidProgram(String),
    InvalidInput(&'static str),
    DailyQuotaExceeded { used: u32, limit: u32 },
    WeeklyQuotaExceeded { used: u32, limit: u32 },
    SlotUnavailable(Ulid),
    InvalidState(BookingStatus),
    StorageFailure(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::NotFound(_)
            | BookingError::MachineNotFound(_)
            | BookingError::UserNotFound(_) => ErrorKind::NotFound,
            BookingError::InvalidProgram(_) | BookingError::InvalidInput(_) => ErrorKind::InvalidInput,
            BookingError::DailyQuotaExceeded { .. } | BookingError::WeeklyQuotaExceeded { .. } => {
                ErrorKind::QuotaExceeded
            }
            BookingError::SlotUnavailable(_) => ErrorKind::SlotUnavailable,
            BookingError::InvalidState(_) => ErrorKind::InvalidState,
            BookingError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Short reason label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "not_found",
            BookingError::MachineNotFound(_) => "machine_not_found",
            BookingError::UserNotFound(_) => "user_not_found",
            BookingError::InvalidProgram(_) => "invalid_program",
            BookingError::InvalidInput(_) => "invalid_input",
            BookingError::DailyQuotaExceeded { .. } => "daily_quota_exceeded",
            BookingError::WeeklyQuotaExceeded { .. } => "weekly_quota_exceeded",
            BookingError::SlotUnavailable(_) => "slot_unavailable",
            BookingError::InvalidState(_) => "invalid_state",
            BookingError::StorageFailure(_) => "storage_failure",
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::NotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::MachineNotFound(id) => write!(f, "machine not found: {id}"),
            BookingError::UserNotFound(id) => write!(f, "user not found: {id}"),
            BookingError::InvalidProgram(name) => write!(f, "invalid program: {name}"),
            BookingError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            BookingError::DailyQuotaExceeded { used, limit } => {
                write!(f, "daily booking quota exceeded: {used} of {limit} used")
            }
            BookingError::WeeklyQuotaExceeded { used, limit } => {
                write!(f, "weekly booking quota exceeded: {used} of {limit} used")
            }
            BookingError::SlotUnavailable(id) => {
                write!(f, "time slot not available: held by booking {id}")
            }
            BookingError::InvalidState(status) => {
                write!(f, "operation not permitted on a {status} booking")
            }
            BookingError::StorageFailure(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id, .. } => BookingError::NotFound(id),
            other => BookingError::StorageFailure(other.to_string()),
        }
    }
}
