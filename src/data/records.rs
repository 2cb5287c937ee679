//! Historical records kept by the storage layer.
//!
//! Contains types for feed, temperature, alert and note history.

use chrono::{DateTime, Local, Utc};

/// A completed feed: how much left the container and the water temperature during it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedLog {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Human-readable title, the local creation time.
    pub title: String,
    /// Weight of feed dispensed, in kilograms. Never negative.
    pub level: f64,
    /// Average water temperature during the feed, in Celsius.
    pub temp: f64,
    /// Creation time.
    pub date_created: DateTime<Utc>,
}

impl FeedLog {
    /// Title for a feed log created at `at`, e.g. `Jun 1, 2024, 08:00 AM`.
    pub fn title_for(at: DateTime<Utc>) -> String {
        at.with_timezone(&Local)
            .format("%b %-d, %Y, %I:%M %p")
            .to_string()
    }
}

/// Sum of feed dispensed across `logs`, in kilograms.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use feedflow::{total_dispensed, FeedLog};
///
/// let log = |level| FeedLog {
///     id: 0,
///     title: String::new(),
///     level,
///     temp: 28.0,
///     date_created: Utc::now(),
/// };
/// assert_eq!(total_dispensed(&[log(1.5), log(2.0)]), 3.5);
/// ```
pub fn total_dispensed(logs: &[FeedLog]) -> f64 {
    logs.iter().map(|log| log.level).sum()
}

/// A periodic water temperature sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempLog {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Water temperature in Celsius.
    pub temperature: f64,
    /// Sample time.
    pub date_created: DateTime<Utc>,
}

/// A user-facing alert.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertLog {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Short subject line.
    pub subject: String,
    /// Alert body.
    pub body: String,
    /// Creation time.
    pub date_created: DateTime<Utc>,
}

/// A pond observation written by the user.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Note title.
    pub title: String,
    /// Fish counted at the time of the note.
    pub fish_count: u32,
    /// Water temperature at the time of the note.
    pub temperature: f64,
    /// Free-form observation.
    pub observation: String,
    /// Creation time.
    pub date_created: DateTime<Utc>,
}

/// Fields for a new note.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    /// Note title.
    pub title: String,
    /// Fish counted.
    pub fish_count: u32,
    /// Water temperature.
    pub temperature: f64,
    /// Free-form observation.
    pub observation: String,
}

/// Partial update for a note. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoteUpdate {
    /// New title.
    pub title: Option<String>,
    /// New fish count.
    pub fish_count: Option<u32>,
    /// New temperature.
    pub temperature: Option<f64>,
    /// New observation.
    pub observation: Option<String>,
}

impl Note {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: NoteUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(fish_count) = update.fish_count {
            self.fish_count = fish_count;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(observation) = update.observation {
            self.observation = observation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_log(level: f64) -> FeedLog {
        FeedLog {
            id: 0,
            title: String::new(),
            level,
            temp: 28.0,
            date_created: Utc::now(),
        }
    }

    #[test]
    fn test_total_dispensed() {
        assert_eq!(total_dispensed(&[feed_log(1.5), feed_log(2.0)]), 3.5);
        assert_eq!(total_dispensed(&[]), 0.0);
    }

    #[test]
    fn test_title_has_year() {
        let title = FeedLog::title_for(Utc::now());
        assert!(title.contains(&Local::now().format("%Y").to_string()));
        assert!(title.ends_with("AM") || title.ends_with("PM"));
    }

    #[test]
    fn test_note_update() {
        let mut note = Note {
            id: 1,
            title: "Morning".to_string(),
            fish_count: 100,
            temperature: 27.0,
            observation: "Active".to_string(),
            date_created: Utc::now(),
        };

        note.apply(NoteUpdate {
            fish_count: Some(98),
            observation: Some("Two losses".to_string()),
            ..Default::default()
        });

        assert_eq!(note.title, "Morning");
        assert_eq!(note.fish_count, 98);
        assert_eq!(note.observation, "Two losses");
    }
}
