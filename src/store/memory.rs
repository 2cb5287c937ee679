//! In-process [`FeedStore`].

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::FeedStore;
use crate::data::schedule::validate_kg;
use crate::data::{
    AlertLog, Biomass, FeedLog, FeedSchedule, NewNote, Note, NoteUpdate, ScheduleTime,
    ScheduleUpdate, TempLog,
};
use crate::error::{Error, Result};

#[derive(Default)]
struct Tables {
    temp_logs: Vec<TempLog>,
    feed_logs: Vec<FeedLog>,
    alerts: Vec<AlertLog>,
    notes: Vec<Note>,
    schedules: Vec<FeedSchedule>,
    biomass: Vec<Biomass>,
}

/// Store that keeps every record in memory.
///
/// Ids are assigned from a single counter, so they are unique across tables.
/// `sync` only counts how often it was called. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicI64>,
    sync_count: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `sync` has been called.
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn newest_first<T: Clone>(records: &[T]) -> Vec<T> {
    records.iter().rev().cloned().collect()
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn create_temp_log(&self, temperature: f64) -> Result<TempLog> {
        let log = TempLog {
            id: self.allocate_id(),
            temperature,
            date_created: Utc::now(),
        };
        self.tables.write().temp_logs.push(log.clone());
        debug!("Temperature log inserted: {:.2}°C", temperature);
        Ok(log)
    }

    async fn list_temp_logs(&self) -> Result<Vec<TempLog>> {
        Ok(newest_first(&self.tables.read().temp_logs))
    }

    async fn create_feed_log(&self, weight_used: f64, avg_temp: f64) -> Result<FeedLog> {
        if !weight_used.is_finite() || weight_used < 0.0 {
            return Err(Error::invalid_parameter("weight_used", weight_used));
        }

        let now = Utc::now();
        let log = FeedLog {
            id: self.allocate_id(),
            title: FeedLog::title_for(now),
            level: weight_used,
            temp: avg_temp,
            date_created: now,
        };
        self.tables.write().feed_logs.push(log.clone());
        info!("Feed log created: {:.3} kg at {:.2}°C", weight_used, avg_temp);
        Ok(log)
    }

    async fn list_feed_logs(&self) -> Result<Vec<FeedLog>> {
        Ok(newest_first(&self.tables.read().feed_logs))
    }

    async fn create_alert(&self, subject: &str, body: &str) -> Result<AlertLog> {
        let alert = AlertLog {
            id: self.allocate_id(),
            subject: subject.to_string(),
            body: body.to_string(),
            date_created: Utc::now(),
        };
        self.tables.write().alerts.push(alert.clone());
        Ok(alert)
    }

    async fn list_alerts(&self) -> Result<Vec<AlertLog>> {
        Ok(newest_first(&self.tables.read().alerts))
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let note = Note {
            id: self.allocate_id(),
            title: note.title,
            fish_count: note.fish_count,
            temperature: note.temperature,
            observation: note.observation,
            date_created: Utc::now(),
        };
        self.tables.write().notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: i64, update: NoteUpdate) -> Result<Note> {
        let mut tables = self.tables.write();
        let note = tables
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::RecordNotFound { kind: "note", id })?;
        note.apply(update);
        Ok(note.clone())
    }

    async fn delete_note(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write();
        let before = tables.notes.len();
        tables.notes.retain(|n| n.id != id);
        if tables.notes.len() == before {
            return Err(Error::RecordNotFound { kind: "note", id });
        }
        Ok(())
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(newest_first(&self.tables.read().notes))
    }

    async fn create_schedule(&self, kg: f64, time: ScheduleTime) -> Result<FeedSchedule> {
        let schedule = FeedSchedule::new(self.allocate_id(), kg, time)?;
        self.tables.write().schedules.push(schedule.clone());
        info!(
            "Schedule {} created: {} kg at {}",
            schedule.id, schedule.kg, schedule.time
        );
        Ok(schedule)
    }

    async fn update_schedule(&self, id: i64, update: ScheduleUpdate) -> Result<FeedSchedule> {
        if let Some(kg) = update.kg {
            validate_kg(kg)?;
        }

        let mut tables = self.tables.write();
        let schedule = tables
            .schedules
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::RecordNotFound {
                kind: "schedule",
                id,
            })?;

        if let Some(kg) = update.kg {
            schedule.kg = kg;
        }
        if let Some(time) = update.time {
            schedule.time = time;
        }
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write();
        let before = tables.schedules.len();
        tables.schedules.retain(|s| s.id != id);
        if tables.schedules.len() == before {
            return Err(Error::RecordNotFound {
                kind: "schedule",
                id,
            });
        }
        info!("Schedule {} deleted", id);
        Ok(())
    }

    async fn list_schedules(&self) -> Result<Vec<FeedSchedule>> {
        let mut schedules = self.tables.read().schedules.clone();
        schedules.sort_by_key(|s| s.time);
        Ok(schedules)
    }

    async fn record_biomass(&self, biomass: Biomass) -> Result<()> {
        self.tables.write().biomass.push(biomass);
        Ok(())
    }

    async fn latest_biomass(&self) -> Result<Option<Biomass>> {
        Ok(self.tables.read().biomass.last().copied())
    }

    async fn sync(&self) -> Result<()> {
        let count = self.sync_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("In-memory sync #{}", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::total_dispensed;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_schedules_sorted_by_time() {
        let store = MemoryStore::new();
        store
            .create_schedule(1.0, "18:00".parse().unwrap())
            .await
            .unwrap();
        store
            .create_schedule(2.0, "07:00".parse().unwrap())
            .await
            .unwrap();

        let times: Vec<String> = store
            .list_schedules()
            .await
            .unwrap()
            .iter()
            .map(|s| s.time.to_string())
            .collect();
        assert_eq!(times, vec!["07:00".to_string(), "18:00".to_string()]);
    }

    #[tokio::test]
    async fn test_schedule_update_and_delete() {
        let store = MemoryStore::new();
        let schedule = store
            .create_schedule(1.0, "07:00".parse().unwrap())
            .await
            .unwrap();

        let updated = store
            .update_schedule(
                schedule.id,
                ScheduleUpdate {
                    kg: Some(2.5),
                    time: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.kg, 2.5);
        assert_eq!(updated.time.to_string(), "07:00");

        assert!(store
            .update_schedule(
                schedule.id,
                ScheduleUpdate {
                    kg: Some(0.0),
                    time: None
                }
            )
            .await
            .is_err());

        store.delete_schedule(schedule.id).await.unwrap();
        assert!(store.list_schedules().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_schedule(schedule.id).await,
            Err(Error::RecordNotFound { kind: "schedule", .. })
        ));
    }

    #[tokio::test]
    async fn test_feed_logs_total() {
        let store = MemoryStore::new();
        store.create_feed_log(1.5, 28.0).await.unwrap();
        store.create_feed_log(2.0, 29.0).await.unwrap();

        let logs = store.list_feed_logs().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].level, 2.0);
        assert_eq!(total_dispensed(&logs), 3.5);
    }

    #[tokio::test]
    async fn test_feed_log_rejects_negative() {
        let store = MemoryStore::new();
        assert!(store.create_feed_log(-0.1, 28.0).await.is_err());
    }

    #[tokio::test]
    async fn test_notes_crud() {
        let store = MemoryStore::new();
        let note = store
            .create_note(NewNote {
                title: "Pond A".to_string(),
                fish_count: 120,
                temperature: 28.5,
                observation: "Feeding well".to_string(),
            })
            .await
            .unwrap();

        let updated = store
            .update_note(
                note.id,
                NoteUpdate {
                    fish_count: Some(118),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.fish_count, 118);
        assert_eq!(updated.title, "Pond A");

        store.delete_note(note.id).await.unwrap();
        assert!(store.list_notes().await.unwrap().is_empty());
        assert!(store.update_note(note.id, NoteUpdate::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_biomass_and_sync() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_biomass().await.unwrap(), None);

        store
            .record_biomass(Biomass::new(0.2, 500).unwrap())
            .await
            .unwrap();
        store
            .record_biomass(Biomass::new(0.25, 480).unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.latest_biomass().await.unwrap().map(|b| b.fish_count),
            Some(480)
        );

        store.sync().await.unwrap();
        store.sync().await.unwrap();
        assert_eq!(store.sync_count(), 2);
    }
}
