//! Feeder console example
//!
//! Finds a FeedFlow feeder over Bluetooth, streams its readings and events,
//! and runs its schedules. Type a command and press Enter:
//!
//! - `t`: toggle the servo
//! - `a <abw_kg> <count>`: auto feed for the given stock
//! - `s <HH:MM> <kg>`: add a daily schedule
//! - `l`: list schedules and feed history
//! - `q`: quit
//!
//! Run with: cargo run --example feeder_console

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use feedflow::ble::is_feeder_name;
use feedflow::{
    total_dispensed, BleTransport, Biomass, Error, FeedStore, Feeder, FeederConfig, FeederEvent,
    MemoryStore, Result,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

async fn find_feeder(adapter: &Adapter) -> Result<Peripheral> {
    adapter.start_scan(ScanFilter::default()).await?;

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(500)).await;

        for peripheral in adapter.peripherals().await? {
            let name = peripheral
                .properties()
                .await?
                .and_then(|p| p.local_name)
                .unwrap_or_default();
            if is_feeder_name(&name) {
                adapter.stop_scan().await?;
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err(Error::ConnectionFailed {
        reason: "no FeedFlow feeder found".to_string(),
    })
}

async fn handle_command(feeder: &Feeder, line: &str) -> Result<bool> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["q"] => return Ok(false),
        ["t"] => {
            let action = feeder.toggle_servo().await?;
            println!("{:?}", action);
        }
        ["a", abw, count] => {
            let abw: f64 = abw.parse().map_err(|_| Error::InvalidParameter {
                name: "abw".to_string(),
                value: abw.to_string(),
            })?;
            let count: u32 = count.parse().map_err(|_| Error::InvalidParameter {
                name: "count".to_string(),
                value: count.to_string(),
            })?;
            let biomass = Biomass::new(abw, count)?;
            println!(
                "Dispensing {:.2} kg for {:.1} kg of fish...",
                feeder.recommended_feed(&biomass),
                biomass.total_kg()
            );
            let outcome = feeder.auto_feed(&biomass).await?;
            println!("{:?}", outcome);
        }
        ["s", time, kg] => {
            let kg: f64 = kg.parse().map_err(|_| Error::InvalidParameter {
                name: "kg".to_string(),
                value: kg.to_string(),
            })?;
            let schedule = feeder.store().create_schedule(kg, time.parse()?).await?;
            println!("Scheduled {} kg at {} (id {})", schedule.kg, schedule.time, schedule.id);
        }
        ["l"] => {
            for schedule in feeder.store().list_schedules().await? {
                println!("  [{}] {} - {} kg", schedule.id, schedule.time, schedule.kg);
            }
            let logs = feeder.store().list_feed_logs().await?;
            for log in &logs {
                println!("  {}: {:.2} kg at {:.1}°C", log.title, log.level, log.temp);
            }
            println!("  Total dispensed: {:.2} kg", total_dispensed(&logs));
        }
        [] => {}
        _ => println!("Unknown command: {}", line),
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,feedflow=info")
        .init();

    println!("FeedFlow Console");
    println!("================\n");

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::ConnectionFailed {
            reason: "no Bluetooth adapter".to_string(),
        })?;

    println!("Scanning for a feeder...");
    let peripheral = find_feeder(&adapter).await?;
    let peripheral_id = peripheral.id();

    let transport = Arc::new(BleTransport::new(peripheral));
    transport.connect().await?;
    println!("Connected.\n");

    let feeder = Feeder::new(
        transport.clone(),
        Arc::new(MemoryStore::new()),
        FeederConfig::default(),
    )?;
    feeder.start();
    transport.request_status().await?;

    // Report link loss so in-flight feeds fail fast.
    let mut central_events = adapter.events().await?;
    let link = transport.clone();
    tokio::spawn(async move {
        while let Some(event) = central_events.next().await {
            if let CentralEvent::DeviceDisconnected(id) = event {
                if id == peripheral_id {
                    link.handle_link_lost().await;
                }
            }
        }
    });

    let mut events = feeder.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                FeederEvent::InsufficientFeed {
                    requested,
                    available,
                    ..
                } => println!(
                    "! Not enough feed: need {:.2} kg, have {:.2} kg",
                    requested, available
                ),
                FeederEvent::HighTemperature { temperature } => {
                    println!("! Water is {:.1}°C", temperature)
                }
                other => println!("> {:?}", other),
            }
        }
    });

    let mut readings = feeder.subscribe_readings();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        let mut latest = None;
        loop {
            tokio::select! {
                reading = readings.recv() => match reading {
                    Ok(reading) => latest = Some(reading),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(_) => break,
                },
                _ = ticker.tick() => {
                    if let Some(reading) = latest {
                        println!(
                            "  {:>6} °C  {:>7} kg  servo {}",
                            reading.temperature.map(|t| format!("{:.2}", t)).unwrap_or_else(|| "--".into()),
                            reading.weight.map(|w| format!("{:.3}", w)).unwrap_or_else(|| "--".into()),
                            if reading.servo_running { "open" } else { "closed" },
                        );
                    }
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match handle_command(&feeder, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("Error: {}", e),
                }
            }
        }
    }

    println!("\nShutting down...");
    feeder.shutdown().await;
    transport.disconnect().await?;

    Ok(())
}
