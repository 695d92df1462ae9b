//! Line-delimited JSON protocol.
//!
//! Each request is one JSON object on one line, selected by its `op` field.
//! Each reply is one [`ServiceResponse`] on one line, in request order.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;
use ulid::Ulid;

use crate::engine::ErrorKind;
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability::{self, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use crate::service::{Service, ServiceResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    Login {
        username: String,
        secret: String,
    },
    UpdatePreferences {
        user_id: Ulid,
        preferences: Preferences,
    },
    CheckAvailability {
        machine_id: Ulid,
        date: NaiveDate,
        #[serde(with = "hhmm")]
        start_time: NaiveTime,
    },
    DaySlots {
        machine_id: Ulid,
        date: NaiveDate,
        #[serde(default)]
        exclude_booking_id: Option<Ulid>,
    },
    CreateBooking(NewBooking),
    ModifyBooking {
        booking_id: Ulid,
        updates: BookingUpdate,
    },
    CancelBooking {
        booking_id: Ulid,
    },
    GetUserBookings {
        user_id: Ulid,
    },
    Sweep,
    QuotaSummary {
        user_id: Ulid,
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    ImpactSummary {
        user_id: Ulid,
        year: i32,
        month: u32,
    },
    GetAllMachines,
    GetMachineStatus {
        machine_id: Ulid,
    },
    UpdateMachineStatus {
        machine_id: Ulid,
        status: MachineStatus,
        #[serde(default)]
        error: Option<String>,
    },
    CreateReport(NewReport),
    GetUserReports {
        user_id: Ulid,
    },
    GetMachineReports {
        machine_id: Ulid,
    },
    ListPrograms,
}

/// Serve one client until it disconnects. A malformed line gets an error
/// reply and the connection stays open; an over-long line is answered and
/// then ends the connection, since the framing cannot resynchronise.
pub async fn process_connection(socket: TcpStream, service: Arc<Service>) -> Result<(), LinesCodecError> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    while let Some(frame) = framed.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let reply = ServiceResponse::<()>::fail(ErrorKind::InvalidInput, "request line too long");
                framed.send(encode(&reply).1).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&service, &line).await;
        framed.send(reply).await?;
    }
    Ok(())
}

/// Decode, execute and encode a single request line.
pub async fn handle_line(service: &Service, line: &str) -> String {
    let start = Instant::now();
    let (label, success, reply) = match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            let label = observability::request_label(&request);
            let (success, reply) = dispatch(service, request).await;
            (label, success, reply)
        }
        Err(e) => {
            debug!("malformed request: {e}");
            let reply = ServiceResponse::<()>::fail(ErrorKind::InvalidInput, format!("malformed request: {e}"));
            let (_, reply) = encode(&reply);
            ("invalid", false, reply)
        }
    };

    let status = if success { "ok" } else { "error" };
    metrics::counter!(REQUESTS_TOTAL, "command" => label, "status" => status).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "command" => label).record(start.elapsed().as_secs_f64());
    reply
}

async fn dispatch(service: &Service, request: Request) -> (bool, String) {
    match request {
        Request::Login { username, secret } => encode(&service.login(&username, &secret).await),
        Request::UpdatePreferences { user_id, preferences } => {
            encode(&service.update_preferences(user_id, preferences).await)
        }
        Request::CheckAvailability {
            machine_id,
            date,
            start_time,
        } => encode(&service.check_availability(machine_id, date, start_time).await),
        Request::DaySlots {
            machine_id,
            date,
            exclude_booking_id,
        } => encode(&service.day_slots(machine_id, date, exclude_booking_id).await),
        Request::CreateBooking(request) => encode(&service.create_booking(request).await),
        Request::ModifyBooking { booking_id, updates } => encode(&service.modify_booking(booking_id, updates).await),
        Request::CancelBooking { booking_id } => encode(&service.cancel_booking(booking_id).await),
        Request::GetUserBookings { user_id } => encode(&service.get_user_bookings(user_id).await),
        Request::Sweep => encode(&service.sweep().await),
        Request::QuotaSummary { user_id, date } => encode(&service.quota_summary(user_id, date).await),
        Request::ImpactSummary { user_id, year, month } => {
            encode(&service.impact_summary(user_id, year, month).await)
        }
        Request::GetAllMachines => encode(&service.get_all_machines().await),
        Request::GetMachineStatus { machine_id } => encode(&service.get_machine_status(machine_id).await),
        Request::UpdateMachineStatus {
            machine_id,
            status,
            error,
        } => encode(&service.update_machine_status(machine_id, status, error).await),
        Request::CreateReport(request) => encode(&service.create_report(request).await),
        Request::GetUserReports { user_id } => encode(&service.get_user_reports(user_id).await),
        Request::GetMachineReports { machine_id } => encode(&service.get_machine_reports(machine_id).await),
        Request::ListPrograms => encode(&service.list_programs()),
    }
}

fn encode<T: Serialize>(response: &ServiceResponse<T>) -> (bool, String) {
    match serde_json::to_string(response) {
        Ok(line) => (response.success, line),
        Err(e) => {
            tracing::error!("failed to encode response: {e}");
            (
                false,
                r#"{"success":false,"data":null,"error":"internal encoding failure","errorKind":"StorageFailure","reason":null}"#.into(),
            )
        }
    }
}
