use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: command, status.
pub const REQUESTS_TOTAL: &str = "washslot_requests_total";

/// Histogram: request latency in seconds. Labels: command.
pub const REQUEST_DURATION_SECONDS: &str = "washslot_request_duration_seconds";

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "washslot_bookings_created_total";

/// Counter: create requests refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "washslot_bookings_rejected_total";

/// Counter: status transitions written by the sweep.
pub const SWEEP_TRANSITIONS_TOTAL: &str = "washslot_sweep_transitions_total";

/// Counter: bookings the sweep could not persist.
pub const SWEEP_FAILURES_TOTAL: &str = "washslot_sweep_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "washslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "washslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "washslot_connections_rejected_total";

/// Histogram: snapshot group-commit flush duration in seconds.
pub const SNAPSHOT_FLUSH_DURATION_SECONDS: &str = "washslot_snapshot_flush_duration_seconds";

/// Histogram: snapshot group-commit batch size (writes per flush).
pub const SNAPSHOT_FLUSH_BATCH_SIZE: &str = "washslot_snapshot_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a request to a short label for metrics.
pub fn request_label(req: &Request) -> &'static str {
    match req {
        Request::Login { .. } => "login",
        Request::UpdatePreferences { .. } => "update_preferences",
        Request::CheckAvailability { .. } => "check_availability",
        Request::DaySlots { .. } => "day_slots",
        Request::CreateBooking(_) => "create_booking",
        Request::ModifyBooking { .. } => "modify_booking",
        Request::CancelBooking { .. } => "cancel_booking",
        Request::GetUserBookings { .. } => "get_user_bookings",
        Request::Sweep => "sweep",
        Request::QuotaSummary { .. } => "quota_summary",
        Request::ImpactSummary { .. } => "impact_summary",
        Request::GetAllMachines => "get_all_machines",
        Request::GetMachineStatus { .. } => "get_machine_status",
        Request::UpdateMachineStatus { .. } => "update_machine_status",
        Request::CreateReport(_) => "create_report",
        Request::GetUserReports { .. } => "get_user_reports",
        Request::GetMachineReports { .. } => "get_machine_reports",
        Request::ListPrograms => "list_programs",
    }
}
