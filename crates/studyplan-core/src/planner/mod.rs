//! Study plan generation.
//!
//! Calendar events and the catalog feed the relevance filter, the allocator
//! turns the surviving candidates into a [`Plan`], and the tip generator
//! reads the finished plan.

mod allocator;
pub mod matching;
mod recommend;
mod tips;

pub use allocator::{default_subject_count, Candidate, PlanAllocator, PlanRequest};
pub use matching::{relevant_optional_subjects, RELEVANCE_WINDOW_DAYS};
pub use recommend::{recommended_subjects, Recommendation, RECOMMENDATION_WINDOW_DAYS};
pub use tips::study_tips;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One subject's share of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub subject: String,
    pub minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub color: String,
}

/// Ordered, immutable allocation of minutes to subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    entries: Vec<PlanEntry>,
}

impl Plan {
    /// Wrap entries produced elsewhere (a saved plan, a hand-written one).
    ///
    /// Rejects empty plans, zero-minute entries and repeated subjects.
    pub fn from_entries(entries: Vec<PlanEntry>) -> Result<Self, ValidationError> {
        let plan = Self { entries };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the shape guarantees; plans read back from storage skip the
    /// constructor, so consumers call this before trusting one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::EmptyCollection("plan".into()));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.minutes == 0 {
                return Err(ValidationError::invalid(
                    "minutes",
                    format!("{} has no time allocated", entry.subject),
                ));
            }
            if self.entries[..i].iter().any(|e| e.subject == entry.subject) {
                return Err(ValidationError::DuplicateName {
                    collection: "plan".into(),
                    name: entry.subject.clone(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn single(entry: PlanEntry) -> Self {
        Self { entries: vec![entry] }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlanEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_minutes(&self) -> u32 {
        self.entries.iter().map(|e| e.minutes).sum()
    }

    /// Minutes of all entries before `index`.
    pub fn cumulative_minutes(&self, index: usize) -> u32 {
        self.entries.iter().take(index).map(|e| e.minutes).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanEntry;
    type IntoIter = std::slice::Iter<'a, PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject: &str, minutes: u32) -> PlanEntry {
        PlanEntry {
            subject: subject.into(),
            minutes,
            reason: None,
            color: String::new(),
        }
    }

    #[test]
    fn totals_and_cumulative_minutes() {
        let plan = Plan::from_entries(vec![entry("A", 10), entry("B", 15), entry("C", 5)]).unwrap();
        assert_eq!(plan.total_minutes(), 30);
        assert_eq!(plan.cumulative_minutes(0), 0);
        assert_eq!(plan.cumulative_minutes(2), 25);
    }

    #[test]
    fn rejects_degenerate_entries() {
        assert!(Plan::from_entries(vec![]).is_err());
        assert!(Plan::from_entries(vec![entry("A", 0)]).is_err());
        assert!(Plan::from_entries(vec![entry("A", 5), entry("A", 5)]).is_err());
    }

    #[test]
    fn serializes_as_plain_list() {
        let plan = Plan::from_entries(vec![entry("A", 10)]).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, r#"[{"subject":"A","minutes":10,"color":""}]"#);
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
