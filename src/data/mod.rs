//! Data structures for feeder data.
//!
//! This module contains the core data types used to represent schedules,
//! feeding sessions, feed-rate bands and the historical records kept by
//! storage.

pub mod biomass;
pub mod feed_rate;
pub mod records;
pub mod schedule;
pub mod session;

pub use biomass::Biomass;
pub use feed_rate::{calculate_feed_amount, FeedRateBand};
pub use records::{total_dispensed, AlertLog, FeedLog, NewNote, Note, NoteUpdate, TempLog};
pub use schedule::{FeedSchedule, ScheduleTime, ScheduleUpdate};
pub use session::{SessionReading, SessionSummary};
