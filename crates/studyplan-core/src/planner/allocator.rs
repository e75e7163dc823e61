//! Plan allocator.
//!
//! Distributes a study session across subjects:
//!
//! 1. Candidates are the core subjects plus optional subjects that an
//!    upcoming event makes relevant.
//! 2. Preferred subjects and subjects with a test in the next week get their
//!    working priority lowered (lower = sooner); tests also widen the
//!    subject's share cap.
//! 3. Candidates are sorted by priority with seeded jitter, so near-equal
//!    priorities shuffle between seeds while identical seeds reproduce the
//!    same plan.
//! 4. Each selected subject receives its minimum, then the rest is handed
//!    out in rounds, most urgent subject first, in 5 or 10 minute steps up
//!    to each subject's cap. Whatever cannot be placed lands on the first
//!    entry so the plan always sums to the requested total.
//!
//! A subject's step size is drawn with its jitter, never from its position,
//! so moving a subject up the ranking can only give it more time.

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::matching::{relevant_optional_subjects, test_subject_matches};
use super::{Plan, PlanEntry};
use crate::calendar::{CalendarEvent, EventKind};
use crate::catalog::{Catalog, Subject, FREE_STUDY, FREE_STUDY_COLOR};
use crate::error::ValidationError;

/// Sessions shorter than this are not split.
const SHORT_SESSION_MINUTES: u32 = 10;
/// Days ahead (inclusive) a test boosts its subject.
const TEST_WINDOW_DAYS: i64 = 7;
const PREFERENCE_BOOST: i32 = 10;
const URGENCY_HORIZON_DAYS: i64 = 8;
const URGENCY_STEP: i32 = 5;
const TEST_RATIO_BONUS: f64 = 0.3;
const TEST_RATIO_CAP: f64 = 0.7;
/// Priorities closer than this may swap places between seeds.
const TIE_WINDOW: f64 = 3.0;
const STEP_MINUTES: u32 = 5;

/// Inputs chosen by the user for one allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub total_minutes: u32,
    #[serde(default)]
    pub preferred: Vec<String>,
    #[serde(default)]
    pub subject_count: Option<usize>,
    #[serde(default)]
    pub seed: u64,
}

impl PlanRequest {
    pub fn new(total_minutes: u32) -> Self {
        Self {
            total_minutes,
            preferred: Vec::new(),
            subject_count: None,
            seed: 0,
        }
    }

    pub fn with_preferred<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subject_count(mut self, count: usize) -> Self {
        self.subject_count = Some(count);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn prefers(&self, name: &str) -> bool {
        self.preferred.iter().any(|p| p == name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.total_minutes == 0 {
            return Err(ValidationError::invalid("total_minutes", "must be positive"));
        }
        if self.subject_count == Some(0) {
            return Err(ValidationError::invalid("subject_count", "must be at least 1"));
        }
        Ok(())
    }
}

/// Number of subjects picked when the user does not choose one.
pub fn default_subject_count(total_minutes: u32) -> usize {
    match total_minutes {
        0..=29 => 2,
        30..=59 => 4,
        60..=89 => 6,
        90..=119 => 8,
        _ => 10,
    }
}

/// Working copy of a catalog subject with adjusted priority and cap.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    subject: &'a Subject,
    priority: i32,
    max_ratio: f64,
    jitter: f64,
    step: u32,
}

impl<'a> Candidate<'a> {
    pub fn new(subject: &'a Subject) -> Self {
        Self {
            subject,
            priority: subject.priority,
            max_ratio: subject.max_ratio,
            jitter: 0.0,
            step: STEP_MINUTES,
        }
    }

    pub fn with_priority(self, priority: i32) -> Self {
        Self { priority, ..self }
    }

    pub fn with_max_ratio(self, max_ratio: f64) -> Self {
        Self { max_ratio, ..self }
    }

    fn with_draw(self, jitter: f64, step: u32) -> Self {
        Self { jitter, step, ..self }
    }

    pub fn subject(&self) -> &'a Subject {
        self.subject
    }

    pub fn name(&self) -> &'a str {
        &self.subject.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn max_ratio(&self) -> f64 {
        self.max_ratio
    }

    fn sort_key(&self) -> f64 {
        f64::from(self.priority) + self.jitter
    }

    /// Most minutes this candidate may hold in a session of `total` minutes.
    fn cap(&self, total: u32) -> u32 {
        (f64::from(total) * self.max_ratio).floor() as u32
    }
}

/// Splits a session into per-subject allocations.
pub struct PlanAllocator<'a> {
    catalog: &'a Catalog,
    today: NaiveDate,
}

impl<'a> PlanAllocator<'a> {
    pub fn new(catalog: &'a Catalog, today: NaiveDate) -> Self {
        Self { catalog, today }
    }

    /// Produce a plan whose minutes sum exactly to `request.total_minutes`.
    ///
    /// # Errors
    /// Returns a validation error for a zero total or a zero subject count.
    pub fn allocate(
        &self,
        request: &PlanRequest,
        events: &[CalendarEvent],
    ) -> Result<Plan, ValidationError> {
        request.validate()?;
        let total = request.total_minutes;

        if request.prefers(FREE_STUDY) {
            return Ok(Plan::single(PlanEntry {
                subject: FREE_STUDY.to_string(),
                minutes: total,
                reason: None,
                color: FREE_STUDY_COLOR.to_string(),
            }));
        }

        if total < SHORT_SESSION_MINUTES {
            let first = self
                .catalog
                .first_core()
                .ok_or_else(|| ValidationError::EmptyCollection("core subjects".into()))?;
            return Ok(Plan::single(PlanEntry {
                subject: first.name.clone(),
                minutes: total,
                reason: None,
                color: first.color.clone(),
            }));
        }

        let mut rng = Pcg64::seed_from_u64(request.seed);
        let tracked: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| e.is_within(self.today, TEST_WINDOW_DAYS) && e.subject_text().is_some())
            .collect();

        let candidates = self.rank_candidates(request, events, &tracked, &mut rng);
        let selected = select(candidates, request);
        let entries = distribute(total, &selected, &tracked);

        debug!(
            total,
            seed = request.seed,
            subjects = entries.len(),
            "allocated study plan"
        );
        Ok(Plan { entries })
    }

    /// Adjusted and sorted candidate list, most urgent first.
    fn rank_candidates(
        &self,
        request: &PlanRequest,
        events: &[CalendarEvent],
        tracked: &[&CalendarEvent],
        rng: &mut Pcg64,
    ) -> Vec<Candidate<'a>> {
        let mut candidates: Vec<Candidate<'a>> = self
            .catalog
            .core()
            .chain(relevant_optional_subjects(self.catalog, events, self.today))
            .map(Candidate::new)
            .map(|c| {
                if request.prefers(c.name()) {
                    let priority = c.priority() - PREFERENCE_BOOST;
                    c.with_priority(priority)
                } else {
                    c
                }
            })
            .collect();

        for test in tracked.iter().filter(|e| e.kind == EventKind::Test) {
            let Some(text) = test.subject_text() else {
                continue;
            };
            let Some(slot) = candidates
                .iter_mut()
                .find(|c| test_subject_matches(text, c.subject()))
            else {
                continue;
            };
            let days = test.days_until(self.today);
            let boost = (URGENCY_HORIZON_DAYS - days).max(1) as i32;
            // The floor never lifts an already preferred subject.
            let priority = (slot.priority() - boost * URGENCY_STEP)
                .max(1)
                .min(slot.priority());
            let boosted = slot
                .clone()
                .with_priority(priority)
                .with_max_ratio((slot.max_ratio() + TEST_RATIO_BONUS).min(TEST_RATIO_CAP));
            debug!(subject = slot.name(), days, boost, "test urgency boost");
            *slot = boosted;
        }

        let mut candidates: Vec<Candidate<'a>> = candidates
            .into_iter()
            .map(|c| {
                let jitter = rng.gen::<f64>() * TIE_WINDOW;
                let step = if rng.gen_bool(0.5) { 10 } else { STEP_MINUTES };
                c.with_draw(jitter, step)
            })
            .collect();
        candidates.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
        candidates
    }
}

/// Preferred subjects first (keeping sorted order), then the rest, truncated.
fn select<'a>(candidates: Vec<Candidate<'a>>, request: &PlanRequest) -> Vec<Candidate<'a>> {
    let count = request
        .subject_count
        .unwrap_or_else(|| default_subject_count(request.total_minutes));
    let (mut selected, rest): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| request.prefers(c.name()));
    selected.extend(rest);
    selected.truncate(count);
    selected
}

fn distribute(total: u32, selected: &[Candidate<'_>], tracked: &[&CalendarEvent]) -> Vec<PlanEntry> {
    if selected.is_empty() {
        return Vec::new();
    }
    let share = total / selected.len() as u32;
    let mut remaining = total;

    // Minimum pass.
    let mut entries: Vec<PlanEntry> = Vec::with_capacity(selected.len());
    for candidate in selected {
        let base = candidate.subject().min_minutes.min(share);
        let minutes = round_up_to_step(base).min(remaining);
        let reason = tracked
            .iter()
            .find(|e| {
                e.subject_text()
                    .is_some_and(|text| test_subject_matches(text, candidate.subject()))
            })
            .map(|e| e.prep_reason());
        entries.push(PlanEntry {
            subject: candidate.name().to_string(),
            minutes,
            reason,
            color: candidate.subject().color.clone(),
        });
        remaining -= minutes;
    }

    // Distribution pass, in selection order each round.
    while remaining > 0 {
        let mut allocated = false;
        for (candidate, entry) in selected.iter().zip(entries.iter_mut()) {
            let cap = candidate.cap(total);
            let current = entry.minutes;
            if current >= cap || remaining == 0 {
                continue;
            }
            let step = candidate
                .step
                .min(remaining / STEP_MINUTES * STEP_MINUTES)
                .min(cap - current);
            if step >= STEP_MINUTES {
                entry.minutes += step;
                remaining -= step;
                allocated = true;
            }
        }
        if !allocated {
            break;
        }
    }

    // Remainder pass.
    if remaining > 0 {
        debug!(remaining, subject = %entries[0].subject, "remainder added to first entry");
        entries[0].minutes += remaining;
    }

    entries.retain(|e| e.minutes > 0);
    entries.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    entries
}

fn round_up_to_step(minutes: u32) -> u32 {
    minutes.div_ceil(STEP_MINUTES) * STEP_MINUTES
}
