//! Loose matching of free-text event subjects against catalog names, and the
//! relevance filter built on it.

use chrono::NaiveDate;

use crate::calendar::CalendarEvent;
use crate::catalog::{Catalog, Subject, ARTS_TOKEN};

/// Days ahead (inclusive) an event keeps an optional subject in scope.
pub const RELEVANCE_WINDOW_DAYS: i64 = 30;

const MATH_TOKEN: &str = "math";

/// Bidirectional case-insensitive containment plus the arts umbrella rule.
pub fn subject_matches(event_subject: &str, subject: &Subject) -> bool {
    let wanted = event_subject.to_lowercase();
    let name = subject.name.to_lowercase();
    name.contains(&wanted) || wanted.contains(&name) || (wanted.contains(ARTS_TOKEN) && subject.is_arts())
}

/// [`subject_matches`] extended so any "math" event hits every math subject.
pub fn test_subject_matches(event_subject: &str, subject: &Subject) -> bool {
    subject_matches(event_subject, subject)
        || (event_subject.to_lowercase().contains(MATH_TOKEN)
            && subject.name.to_lowercase().contains(MATH_TOKEN))
}

/// Optional subjects referenced by any event in the next 30 days.
///
/// Result follows catalog order and holds each subject at most once.
pub fn relevant_optional_subjects<'a>(
    catalog: &'a Catalog,
    events: &[CalendarEvent],
    today: NaiveDate,
) -> Vec<&'a Subject> {
    let wanted: Vec<&str> = events
        .iter()
        .filter(|e| e.is_within(today, RELEVANCE_WINDOW_DAYS))
        .filter_map(CalendarEvent::subject_text)
        .collect();

    catalog
        .optional()
        .filter(|subject| wanted.iter().any(|text| subject_matches(text, subject)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventKind;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn event(subject: &str, in_days: i64) -> CalendarEvent {
        CalendarEvent::new("e", "event", today() + Duration::days(in_days), EventKind::Other)
            .with_subject(subject)
    }

    fn names(subjects: Vec<&Subject>) -> Vec<&str> {
        subjects.into_iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn matches_in_either_direction_ignoring_case() {
        let catalog = Catalog::builtin();
        let music = catalog.get("Music").unwrap();
        assert!(subject_matches("music", music));
        assert!(subject_matches("MUSIC theory exam", music));
        assert!(subject_matches("mus", music));
        assert!(!subject_matches("history", music));
    }

    #[test]
    fn arts_token_covers_all_arts_subjects() {
        let relevant = relevant_optional_subjects(Catalog::builtin(), &[event("Arts", 3)], today());
        assert_eq!(names(relevant), vec!["Music", "Calligraphy", "Fine Art"]);
    }

    #[test]
    fn math_rule_applies_only_to_tests() {
        let catalog = Catalog::builtin();
        let math_a = catalog.get("Math A").unwrap();
        assert!(!subject_matches("math quiz", math_a));
        assert!(test_subject_matches("math quiz", math_a));
    }

    #[test]
    fn respects_thirty_day_window() {
        let events = [event("Health", 30), event("Music", 31), event("Calligraphy", -1)];
        let relevant = relevant_optional_subjects(Catalog::builtin(), &events, today());
        assert_eq!(names(relevant), vec!["Health"]);
    }

    #[test]
    fn deduplicates_subjects() {
        let events = [event("Health", 1), event("health", 2), event("Health", 3)];
        let relevant = relevant_optional_subjects(Catalog::builtin(), &events, today());
        assert_eq!(names(relevant), vec!["Health"]);
    }

    #[test]
    fn core_subjects_never_returned() {
        let relevant = relevant_optional_subjects(Catalog::builtin(), &[event("Basic Physics", 1)], today());
        assert!(relevant.is_empty());
    }
}
