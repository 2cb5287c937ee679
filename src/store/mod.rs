//! Persistence capability.
//!
//! The controller writes feed, temperature and alert history and reads the
//! feed schedules through [`FeedStore`]. How the records are kept, and how
//! they reach the cloud replica on [`FeedStore::sync`], is up to the
//! implementation. [`MemoryStore`] keeps everything in process.

use async_trait::async_trait;

use crate::data::{
    AlertLog, Biomass, FeedLog, FeedSchedule, NewNote, Note, NoteUpdate, ScheduleTime,
    ScheduleUpdate, TempLog,
};
use crate::error::Result;

pub mod memory;

pub use memory::MemoryStore;

/// Storage for feeder history and schedules.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedStore: Send + Sync {
    // === Temperature ===

    /// Record a water temperature sample.
    async fn create_temp_log(&self, temperature: f64) -> Result<TempLog>;

    /// All temperature samples, newest first.
    async fn list_temp_logs(&self) -> Result<Vec<TempLog>>;

    // === Feeds ===

    /// Record a completed feed.
    async fn create_feed_log(&self, weight_used: f64, avg_temp: f64) -> Result<FeedLog>;

    /// All feed logs, newest first.
    async fn list_feed_logs(&self) -> Result<Vec<FeedLog>>;

    // === Alerts ===

    /// Record an alert.
    async fn create_alert(&self, subject: &str, body: &str) -> Result<AlertLog>;

    /// All alerts, newest first.
    async fn list_alerts(&self) -> Result<Vec<AlertLog>>;

    // === Notes ===

    /// Record a note.
    async fn create_note(&self, note: NewNote) -> Result<Note>;

    /// Update a note, returning the stored result.
    async fn update_note(&self, id: i64, update: NoteUpdate) -> Result<Note>;

    /// Delete a note.
    async fn delete_note(&self, id: i64) -> Result<()>;

    /// All notes, newest first.
    async fn list_notes(&self) -> Result<Vec<Note>>;

    // === Schedules ===

    /// Create a schedule. Storage assigns the id.
    async fn create_schedule(&self, kg: f64, time: ScheduleTime) -> Result<FeedSchedule>;

    /// Update a schedule, returning the stored result.
    async fn update_schedule(&self, id: i64, update: ScheduleUpdate) -> Result<FeedSchedule>;

    /// Delete a schedule.
    async fn delete_schedule(&self, id: i64) -> Result<()>;

    /// All schedules, earliest time of day first.
    async fn list_schedules(&self) -> Result<Vec<FeedSchedule>>;

    // === Stock ===

    /// Record the latest average body weight and fish count.
    async fn record_biomass(&self, biomass: Biomass) -> Result<()>;

    /// Most recently recorded biomass, if any.
    async fn latest_biomass(&self) -> Result<Option<Biomass>>;

    // === Replication ===

    /// Push local changes to the cloud replica and pull remote ones.
    async fn sync(&self) -> Result<()>;
}
