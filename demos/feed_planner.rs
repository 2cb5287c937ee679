//! Feed planner example
//!
//! Prints the daily ration for a stock across water temperatures, then runs
//! one scheduled feed against a simulated feeder so the whole cycle can be
//! seen without hardware.
//!
//! Run with: cargo run --example feed_planner -- <average_weight_kg> <fish_count>

use chrono::{Local, Timelike};
use feedflow::{
    calculate_feed_amount, Biomass, ConnectionState, FeedRateBand, FeedStore, Feeder,
    FeederConfig, FeederEvent, ManualClock, MemoryStore, RecordingTransport, Result, ScheduleTime,
};
use std::sync::Arc;
use std::time::Duration;

fn parse_args() -> Result<Biomass> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let abw = args.first().and_then(|a| a.parse().ok()).unwrap_or(0.25);
    let count = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(400);
    Biomass::new(abw, count)
}

fn print_table(biomass: &Biomass) {
    println!(
        "Stock: {} fish at {:.3} kg = {:.1} kg biomass\n",
        biomass.fish_count,
        biomass.average_weight_kg,
        biomass.total_kg()
    );
    println!("  Water °C   Band            Feed (kg)");
    println!("  --------   -------------   ---------");

    for temperature in [24.0, 26.0, 27.5, 28.0, 30.0, 31.0, 32.0] {
        println!(
            "  {:>8.1}   {:<13}   {:>9.2}",
            temperature,
            FeedRateBand::from_temperature(temperature).to_string(),
            calculate_feed_amount(biomass.total_kg(), temperature)
        );
    }
    println!();
}

async fn simulate(biomass: &Biomass) -> Result<()> {
    let ration = calculate_feed_amount(biomass.total_kg(), 28.5);
    let now = Local::now().naive_local();

    let transport = RecordingTransport::disconnected();
    let store = MemoryStore::new();
    let clock = ManualClock::new(now);
    let config = FeederConfig::default().with_settle_delay(Duration::from_millis(100));

    println!(
        "Simulating a {:.2} kg feed ({:?} of servo time)...",
        ration,
        config.dispense_duration(ration)
    );

    let feeder = Feeder::with_clock(
        Arc::new(transport.clone()),
        Arc::new(store.clone()),
        config,
        Arc::new(clock),
    )?;
    let mut events = feeder.subscribe_events();
    feeder.start();

    let at = ScheduleTime::new(now.hour() as u8, now.minute() as u8)?;
    store.create_schedule(ration, at).await?;

    // Plenty of feed in the container, servo closed.
    transport.push_message(format!("28.50,{:.3},0", ration + 5.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    transport.set_connection(ConnectionState::Connected);

    while let Ok(event) = events.recv().await {
        match event {
            FeederEvent::ScheduledFeedStarted { duration, .. } => {
                println!("  servo open for {:?}", duration);
                // The load cell reports the drop while the servo runs.
                tokio::time::sleep(duration / 2).await;
                transport.push_message("28.70,5.000,1");
            }
            FeederEvent::ScheduleCompleted { outcome, .. } => {
                match outcome.feed_log() {
                    Some(log) => println!(
                        "  logged {:.2} kg at an average of {:.2}°C",
                        log.level, log.temp
                    ),
                    None => println!("  nothing logged: {:?}", outcome),
                }
                break;
            }
            other => {
                println!("  {:?}", other);
                break;
            }
        }
    }

    println!("  commands sent: {:?}", transport.sent());
    println!("  schedules left: {}", store.list_schedules().await?.len());

    feeder.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,feedflow=info")
        .init();

    println!("FeedFlow Feed Planner");
    println!("=====================\n");

    let biomass = parse_args()?;
    print_table(&biomass);
    simulate(&biomass).await
}
