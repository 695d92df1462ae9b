use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use washslot::catalog::ProgramCatalog;
use washslot::clock::SystemClock;
use washslot::config::Config;
use washslot::engine::BookingEngine;
use washslot::service::Service;
use washslot::store::{StartupNotice, Store};
use washslot::{sweeper, wire};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    washslot::observability::init(config.metrics_port)?;

    let (store, notices) = Store::open(&config.data_dir)?;
    for notice in &notices {
        match notice {
            StartupNotice::Seeded { collection } => info!("seeded {collection} from bundled data"),
            StartupNotice::DegradedStart { collection, reason } => {
                tracing::warn!("degraded start: {collection} reset to seed ({reason})");
            }
        }
    }
    let store = Arc::new(store);
    let engine = Arc::new(BookingEngine::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(ProgramCatalog::builtin()),
    ));
    let service = Arc::new(Service::new(engine.clone()));

    let stop_sweep = CancellationToken::new();
    let sweep_task = tokio::spawn(sweeper::run_sweeper(
        engine.clone(),
        config.sweep_interval,
        stop_sweep.clone(),
    ));

    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("washslot listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  max_connections: {max_connections}");
    info!("  sweep_interval: {}s", config.sweep_interval.as_secs());
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable ({e}), ctrl-c only");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(washslot::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(washslot::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(washslot::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let service = service.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, service).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(washslot::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    stop_sweep.cancel();

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    if let Err(e) = sweep_task.await {
        tracing::error!("sweep task ended abnormally: {e}");
    }
    store.close().await;

    info!("washslot stopped");
    Ok(())
}
