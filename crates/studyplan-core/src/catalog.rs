//! Subject catalog.
//!
//! The built-in table is a process-wide constant; custom tables (from the
//! config file) go through [`Catalog::new`] so the same invariants hold.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Name of the pseudo-subject that bypasses allocation entirely.
pub const FREE_STUDY: &str = "free study";

/// Umbrella token in event subjects that stands for every arts subject.
pub const ARTS_TOKEN: &str = "arts";

/// Subjects covered by [`ARTS_TOKEN`].
pub const ARTS_SUBJECTS: [&str; 3] = ["Music", "Calligraphy", "Fine Art"];

/// Presentation color for the free-study entry.
pub const FREE_STUDY_COLOR: &str = "purple";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    /// Lower is more important.
    pub priority: i32,
    /// Presentation tag only.
    #[serde(default)]
    pub color: String,
    /// Floor guarantee in minutes.
    pub min_minutes: u32,
    /// Upper bound on the share of the whole session, in `(0, 1]`.
    pub max_ratio: f64,
    /// Optional subjects only join a plan when an event references them.
    #[serde(default)]
    pub optional: bool,
}

impl Subject {
    fn core(name: &str, priority: i32, color: &str, min_minutes: u32, max_ratio: f64) -> Self {
        Self {
            name: name.into(),
            priority,
            color: color.into(),
            min_minutes,
            max_ratio,
            optional: false,
        }
    }

    fn optional(name: &str, priority: i32, color: &str, min_minutes: u32, max_ratio: f64) -> Self {
        Self {
            optional: true,
            ..Self::core(name, priority, color, min_minutes, max_ratio)
        }
    }

    pub fn is_arts(&self) -> bool {
        ARTS_SUBJECTS.contains(&self.name.as_str())
    }
}

static BUILTIN: LazyLock<Catalog> = LazyLock::new(|| Catalog {
    subjects: vec![
        Subject::core("Modern Japanese", 1, "blue", 10, 0.25),
        Subject::core("Language and Culture", 2, "indigo", 10, 0.25),
        Subject::core("Math I-alpha", 3, "purple", 15, 0.3),
        Subject::core("Math I-beta", 4, "violet", 15, 0.3),
        Subject::core("Math A", 5, "pink", 15, 0.25),
        Subject::core("English Communication I", 6, "green", 10, 0.25),
        Subject::core("Logic and Expression I", 7, "emerald", 10, 0.2),
        Subject::core("Basic Chemistry", 8, "orange", 10, 0.25),
        Subject::core("Basic Physics", 9, "amber", 10, 0.25),
        Subject::core("Basic Biology", 10, "lime", 10, 0.25),
        Subject::core("Modern and Contemporary History", 11, "red", 10, 0.2),
        Subject::optional("Music", 12, "cyan", 5, 0.15),
        Subject::optional("Calligraphy", 12, "slate", 5, 0.15),
        Subject::optional("Fine Art", 12, "rose", 5, 0.15),
        Subject::optional("Health", 13, "teal", 5, 0.1),
        Subject::optional("Science and Information", 14, "sky", 5, 0.15),
    ],
});

/// Ordered subject table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    subjects: Vec<Subject>,
}

impl Catalog {
    /// The built-in high-school catalog.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// Build a custom catalog.
    ///
    /// Requires at least one core subject, unique names, and every
    /// `max_ratio` in `(0, 1]`.
    pub fn new(subjects: Vec<Subject>) -> Result<Self, ValidationError> {
        if subjects.is_empty() {
            return Err(ValidationError::EmptyCollection("catalog".into()));
        }
        let mut seen = HashSet::new();
        for subject in &subjects {
            if !seen.insert(subject.name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    collection: "catalog".into(),
                    name: subject.name.clone(),
                });
            }
            if !(subject.max_ratio > 0.0 && subject.max_ratio <= 1.0) {
                return Err(ValidationError::invalid(
                    "max_ratio",
                    format!("{} has ratio {} outside (0, 1]", subject.name, subject.max_ratio),
                ));
            }
        }
        if subjects.iter().all(|s| s.optional) {
            return Err(ValidationError::EmptyCollection("core subjects".into()));
        }
        Ok(Self { subjects })
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn core(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.iter().filter(|s| !s.optional)
    }

    pub fn optional(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.iter().filter(|s| s.optional)
    }

    /// First core subject in table order; the fallback for very short sessions.
    pub fn first_core(&self) -> Option<&Subject> {
        self.core().next()
    }

    pub fn get(&self, name: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_core_and_optional_subjects() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.core().count(), 11);
        assert_eq!(catalog.optional().count(), 5);
        assert_eq!(catalog.first_core().unwrap().name, "Modern Japanese");
    }

    #[test]
    fn builtin_respects_invariants() {
        let catalog = Catalog::builtin();
        assert!(Catalog::new(catalog.subjects().to_vec()).is_ok());
    }

    #[test]
    fn arts_subjects_are_optional() {
        let catalog = Catalog::builtin();
        for name in ARTS_SUBJECTS {
            let subject = catalog.get(name).unwrap();
            assert!(subject.optional);
            assert!(subject.is_arts());
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let s = Subject::core("Math", 1, "", 10, 0.5);
        let err = Catalog::new(vec![s.clone(), s]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateName { .. }));
    }

    #[test]
    fn rejects_ratio_out_of_range() {
        let err = Catalog::new(vec![Subject::core("Math", 1, "", 10, 1.5)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
        let err = Catalog::new(vec![Subject::core("Math", 1, "", 10, 0.0)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_catalog_without_core_subject() {
        let err = Catalog::new(vec![Subject::optional("Music", 1, "", 5, 0.2)]).unwrap_err();
        assert_eq!(err, ValidationError::EmptyCollection("core subjects".into()));
    }
}
