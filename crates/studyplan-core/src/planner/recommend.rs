//! Suggests subjects the user has not picked but should study soon.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;

/// Days ahead (inclusive) an event triggers a recommendation.
pub const RECOMMENDATION_WINDOW_DAYS: i64 = 3;

/// Subjects of events in the next three days that are not already preferred.
///
/// Event subject text is returned as written, first occurrence wins.
pub fn recommended_subjects(
    events: &[CalendarEvent],
    preferred: &[String],
    today: NaiveDate,
) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for text in events
        .iter()
        .filter(|e| e.is_within(today, RECOMMENDATION_WINDOW_DAYS))
        .filter_map(CalendarEvent::subject_text)
    {
        if !preferred.iter().any(|p| p == text) && !subjects.iter().any(|s| s == text) {
            subjects.push(text.to_string());
        }
    }
    subjects
}

/// Pending recommendation shown before a plan is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub subjects: Vec<String>,
}

impl Recommendation {
    /// `None` when there is nothing to recommend.
    pub fn for_events(events: &[CalendarEvent], preferred: &[String], today: NaiveDate) -> Option<Self> {
        let subjects = recommended_subjects(events, preferred, today);
        (!subjects.is_empty()).then_some(Self { subjects })
    }

    /// Merge into the preferred list and widen the subject count to fit it.
    pub fn accept(&self, preferred: &[String], subject_count: Option<usize>) -> (Vec<String>, usize) {
        let mut merged = preferred.to_vec();
        merged.extend(self.subjects.iter().cloned());
        let count = subject_count.unwrap_or(0).max(merged.len());
        (merged, count)
    }
}
