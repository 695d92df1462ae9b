use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ulid::Ulid;

use washslot::catalog::ProgramCatalog;
use washslot::clock::ManualClock;
use washslot::engine::{BookingEngine, BookingError};
use washslot::model::*;
use washslot::store::{Seed, Store};

const USERS: usize = 200;
const MACHINES: usize = 20;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn setup() -> (Arc<BookingEngine>, Arc<ManualClock>, Vec<Ulid>, Vec<Ulid>) {
    let users: Vec<User> = (0..USERS)
        .map(|i| User {
            id: Ulid::new(),
            username: format!("user{i}"),
            secret: "bench".into(),
            booking_quota: QuotaLimits {
                daily: QuotaLimit { limit: 50 },
                weekly: QuotaLimit { limit: 500 },
            },
            preferences: Preferences {
                notifications: NotificationPreferences {
                    email: false,
                    push: false,
                    sms: false,
                    machine_available: false,
                    booking_reminder: false,
                    washing_complete: false,
                    machine_error: false,
                },
                language: "en".into(),
            },
        })
        .collect();
    let machines: Vec<Machine> = (0..MACHINES)
        .map(|i| Machine {
            id: Ulid::new(),
            name: format!("Washer {i}"),
            status: MachineStatus::Available,
            last_used: None,
            next_booking: None,
            error: None,
        })
        .collect();
    let user_ids = users.iter().map(|u| u.id).collect();
    let machine_ids = machines.iter().map(|m| m.id).collect();

    let dir = std::env::temp_dir().join(format!("washslot_bench_{}", Ulid::new()));
    let seed = Seed {
        users,
        machines,
        ..Default::default()
    };
    let (store, _) = Store::open_with_seed(dir, seed).expect("open store");
    let start: NaiveDateTime = "2024-06-01T00:00:00".parse().expect("start time");
    let clock = Arc::new(ManualClock::new(start));
    let engine = BookingEngine::new(Arc::new(store), clock.clone(), Arc::new(ProgramCatalog::builtin()));
    (Arc::new(engine), clock, user_ids, machine_ids)
}

fn slot(day: u32, hour: u32) -> (NaiveDate, NaiveTime) {
    (
        NaiveDate::from_ymd_opt(2024, 6, 2 + day).expect("date"),
        NaiveTime::from_hms_opt(6 + hour, 0, 0).expect("time"),
    )
}

async fn phase1_sequential(engine: &BookingEngine, users: &[Ulid], machines: &[Ulid]) {
    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let (date, start_time) = slot((i / (MACHINES * 17)) as u32, ((i / MACHINES) % 17) as u32);
        let request = NewBooking {
            user_id: users[i % users.len()],
            machine_id: machines[i % machines.len()],
            date,
            start_time,
            program: "Quick Wash".into(),
            is_fixed_slot: false,
        };
        let t = Instant::now();
        engine.create_booking(request).await.expect("sequential create");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

/// Every user races for the same few slots; exactly one may win each.
async fn phase2_contended(engine: Arc<BookingEngine>, users: &[Ulid], machines: &[Ulid]) {
    let contested: Vec<(Ulid, NaiveDate, NaiveTime)> = (0..10)
        .map(|h| {
            let (date, time) = slot(10, h);
            (machines[0], date, time)
        })
        .collect();

    let start = Instant::now();
    let mut handles = Vec::new();
    for (i, user_id) in users.iter().enumerate() {
        let engine = engine.clone();
        let (machine_id, date, start_time) = contested[i % contested.len()];
        let user_id = *user_id;
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(NewBooking {
                    user_id,
                    machine_id,
                    date,
                    start_time,
                    program: "normal".into(),
                    is_fixed_slot: false,
                })
                .await
        }));
    }

    let mut won = 0;
    let mut refused = 0;
    for h in handles {
        match h.await.expect("task") {
            Ok(_) => won += 1,
            Err(BookingError::SlotUnavailable(_)) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    println!(
        "  {} racers over {} slots in {:.2}s: {won} won, {refused} refused",
        users.len(),
        contested.len(),
        start.elapsed().as_secs_f64()
    );

    for (machine_id, date, start_time) in contested {
        let holders = engine
            .store()
            .bookings
            .list(|b| b.is_active() && b.occupies(machine_id, date, start_time))
            .await;
        assert_eq!(holders.len(), 1, "slot {date} {start_time} double-booked");
    }
    assert_eq!(won, 10);
    println!("  no double-booking");
}

async fn phase3_sweep(engine: &BookingEngine, clock: &ManualClock) {
    clock.advance(chrono::TimeDelta::days(30));
    let start = Instant::now();
    let report = engine.sweep_all().await;
    println!(
        "  swept {} bookings ({} transitioned) in {:.2}ms",
        report.examined,
        report.transitioned,
        start.elapsed().as_secs_f64() * 1000.0
    );
    assert!(report.is_clean());

    let start = Instant::now();
    let again = engine.sweep_all().await;
    println!(
        "  idle re-sweep in {:.2}ms ({} transitioned)",
        start.elapsed().as_secs_f64() * 1000.0,
        again.transitioned
    );
    assert_eq!(again.transitioned, 0);
}

#[tokio::main]
async fn main() {
    println!("=== washslot stress benchmark ===");

    println!("[setup]");
    let (engine, clock, users, machines) = setup();
    println!("  {} users, {} machines", users.len(), machines.len());

    println!("\n[phase 1] sequential create throughput");
    phase1_sequential(&engine, &users, &machines).await;

    println!("\n[phase 2] contended creates on the same slots");
    phase2_contended(engine.clone(), &users, &machines).await;

    println!("\n[phase 3] status sweep");
    phase3_sweep(&engine, &clock).await;

    engine.store().close().await;
    println!("\n=== benchmark complete ===");
}
