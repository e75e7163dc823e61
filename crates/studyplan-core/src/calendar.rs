//! Calendar events as seen by the planner.
//!
//! Events are owned by an external calendar; the core only reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Test,
    Assignment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    /// Calendar day, ISO formatted on the wire.
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Free text, matched loosely against catalog names.
    #[serde(default)]
    pub subject: Option<String>,
}

impl CalendarEvent {
    pub fn new(id: impl Into<String>, title: impl Into<String>, date: NaiveDate, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date,
            kind,
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Whole days from `today` to the event (negative when past).
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        (self.date - today).num_days()
    }

    /// True when the event falls on `today` or within the next `days` days.
    pub fn is_within(&self, today: NaiveDate, days: i64) -> bool {
        (0..=days).contains(&self.days_until(today))
    }

    /// Subject text, or `None` when missing or blank.
    pub fn subject_text(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Label attached to plan entries prepared for this event.
    pub fn prep_reason(&self) -> String {
        match self.kind {
            EventKind::Test => "test prep".to_string(),
            EventKind::Assignment => "assignment prep".to_string(),
            EventKind::Other => format!("{} prep", self.title),
        }
    }
}
