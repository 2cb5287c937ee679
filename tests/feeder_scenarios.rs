//! End-to-end feeder scenarios against a recording transport and the
//! in-memory store. Time is paused, so dispense waits run instantly.

use chrono::{NaiveDate, NaiveDateTime};
use feedflow::{
    total_dispensed, Command, ConnectionState, FeedStore, Feeder, FeederConfig, FeederEvent,
    ManualClock, MemoryStore, RecordingTransport, ServoAction, SessionOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

struct Rig {
    transport: RecordingTransport,
    store: MemoryStore,
    clock: ManualClock,
    feeder: Feeder,
    events: broadcast::Receiver<FeederEvent>,
}

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Build a started feeder that is not yet connected.
fn rig(now: NaiveDateTime) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let transport = RecordingTransport::disconnected();
    let store = MemoryStore::new();
    let clock = ManualClock::new(now);

    let feeder = Feeder::with_clock(
        Arc::new(transport.clone()),
        Arc::new(store.clone()),
        FeederConfig::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    let events = feeder.subscribe_events();
    feeder.start();

    Rig {
        transport,
        store,
        clock,
        feeder,
        events,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn drain(events: &mut broadcast::Receiver<FeederEvent>) -> Vec<FeederEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn scheduled_feed_runs_once_and_removes_schedule() {
    let mut rig = rig(at(1, 7, 0));
    let schedule = rig
        .store
        .create_schedule(2.0, "07:00".parse().unwrap())
        .await
        .unwrap();

    rig.transport.push_message("28.00,5.000,0");
    settle().await;
    rig.transport.set_connection(ConnectionState::Connected);
    settle().await;
    assert!(rig.feeder.is_feeding());

    tokio::time::sleep(Duration::from_secs(10)).await;
    rig.transport.push_message("28.40,3.000,1");
    rig.feeder.engine().wait_idle().await;

    assert!(!rig.feeder.is_feeding());
    assert_eq!(rig.transport.sent(), vec![Command::Run, Command::Stop]);

    let logs = rig.store.list_feed_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!((logs[0].level - 2.0).abs() < 1e-9);
    assert_eq!(logs[0].temp, 28.2);
    assert!(rig.store.list_schedules().await.unwrap().is_empty());

    let events = drain(&mut rig.events);
    assert_eq!(
        events[0],
        FeederEvent::ScheduledFeedStarted {
            schedule_id: schedule.id,
            kg: 2.0,
            duration: Duration::from_secs(20),
        }
    );
    assert!(matches!(
        events[1],
        FeederEvent::ScheduleCompleted {
            outcome: SessionOutcome::Logged(_),
            ..
        }
    ));

    // Another poll in the same minute finds nothing to do.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(rig.transport.count(Command::Run), 1);

    rig.feeder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn insufficient_feed_is_reported_once_per_day() {
    let mut rig = rig(at(1, 7, 0));
    let schedule = rig
        .store
        .create_schedule(10.0, "07:00".parse().unwrap())
        .await
        .unwrap();

    rig.transport.push_message("28.00,3.000,0");
    settle().await;
    rig.transport.set_connection(ConnectionState::Connected);

    // Two polls land inside 07:00.
    tokio::time::sleep(Duration::from_secs(40)).await;

    assert!(rig.transport.sent().is_empty());
    assert_eq!(rig.store.list_schedules().await.unwrap(), vec![schedule.clone()]);
    assert!(rig.feeder.engine().has_fired(at(1, 7, 0).date(), schedule.id));

    let insufficient: Vec<_> = drain(&mut rig.events)
        .into_iter()
        .filter(|e| matches!(e, FeederEvent::InsufficientFeed { .. }))
        .collect();
    assert_eq!(
        insufficient,
        vec![FeederEvent::InsufficientFeed {
            schedule_id: schedule.id,
            requested: 10.0,
            available: 3.0,
        }]
    );

    rig.feeder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn next_day_is_not_blocked_by_yesterdays_key() {
    let mut rig = rig(at(1, 7, 0));
    let schedule = rig
        .store
        .create_schedule(10.0, "07:00".parse().unwrap())
        .await
        .unwrap();

    rig.transport.push_message("28.00,3.000,0");
    settle().await;
    rig.transport.set_connection(ConnectionState::Connected);
    settle().await;
    assert_eq!(drain(&mut rig.events).len(), 1);

    rig.clock.set(at(2, 7, 0));
    tokio::time::sleep(Duration::from_secs(30)).await;

    let events = drain(&mut rig.events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].schedule_id(), Some(schedule.id));
    assert!(rig.feeder.engine().has_fired(at(2, 7, 0).date(), schedule.id));

    rig.feeder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_cycles_add_up_in_feed_history() {
    let rig = rig(at(1, 12, 0));
    rig.transport.set_connection(ConnectionState::Connected);

    for (before, after) in [("6.000", "4.500"), ("4.500", "2.500")] {
        rig.transport.push_message(format!("28.00,{},0", before));
        settle().await;
        assert_eq!(
            assert_ok!(rig.feeder.toggle_servo().await),
            ServoAction::Opened
        );

        rig.transport.push_message(format!("28.00,{},1", after));
        settle().await;
        assert_ok!(rig.feeder.toggle_servo().await);
    }

    let logs = rig.store.list_feed_logs().await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!((total_dispensed(&logs) - 3.5).abs() < 1e-9);

    rig.feeder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_toggle_fails_while_disconnected() {
    let rig = rig(at(1, 12, 0));
    rig.transport.push_message("28.00,6.000,0");
    settle().await;

    assert_err!(rig.feeder.toggle_servo().await);
    assert!(rig.transport.sent().is_empty());

    rig.feeder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hot_water_raises_one_alert_per_cooldown() {
    let mut rig = rig(at(1, 12, 0));
    rig.transport.push_message("33.00,6.000,0");
    settle().await;
    rig.transport.set_connection(ConnectionState::Connected);

    tokio::time::sleep(Duration::from_secs(55)).await;

    let alerts = rig.store.list_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(rig.store.list_temp_logs().await.unwrap().len(), 5);

    let hot = drain(&mut rig.events)
        .into_iter()
        .filter(|e| matches!(e, FeederEvent::HighTemperature { .. }))
        .count();
    assert_eq!(hot, 1);

    rig.feeder.shutdown().await;
}
