use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Study,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroPhase {
    pub kind: PhaseKind,
    /// 1-based study/break pair this phase belongs to.
    pub session: u8,
    pub duration_min: u32,
}

impl PomodoroPhase {
    pub fn duration_secs(&self) -> u32 {
        self.duration_min.saturating_mul(60)
    }
}

/// Fixed study/break sequence run by the pomodoro free-study mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSchedule {
    pub phases: Vec<PomodoroPhase>,
}

impl PomodoroSchedule {
    /// `cycles` repetitions of study followed by break.
    pub fn new(study_min: u32, break_min: u32, cycles: u8) -> Self {
        let phases = (1..=cycles)
            .flat_map(|session| {
                [
                    PomodoroPhase {
                        kind: PhaseKind::Study,
                        session,
                        duration_min: study_min,
                    },
                    PomodoroPhase {
                        kind: PhaseKind::Break,
                        session,
                        duration_min: break_min,
                    },
                ]
            })
            .collect();
        Self { phases }
    }

    /// 25 minutes study, 5 minutes break, twice.
    pub fn standard() -> Self {
        Self::new(25, 5, 2)
    }

    pub fn get(&self, index: usize) -> Option<&PomodoroPhase> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn study_minutes(&self) -> u32 {
        self.phases
            .iter()
            .filter(|p| p.kind == PhaseKind::Study)
            .map(|p| p.duration_min)
            .sum()
    }

    pub fn total_minutes(&self) -> u32 {
        self.phases.iter().map(|p| p.duration_min).sum()
    }

    /// Minutes of all phases before `index`.
    pub fn cumulative_minutes(&self, index: usize) -> u32 {
        self.phases.iter().take(index).map(|p| p.duration_min).sum()
    }
}

impl Default for PomodoroSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schedule_has_four_phases() {
        let s = PomodoroSchedule::standard();
        let shape: Vec<(PhaseKind, u8, u32)> = s
            .phases
            .iter()
            .map(|p| (p.kind, p.session, p.duration_min))
            .collect();
        assert_eq!(
            shape,
            vec![
                (PhaseKind::Study, 1, 25),
                (PhaseKind::Break, 1, 5),
                (PhaseKind::Study, 2, 25),
                (PhaseKind::Break, 2, 5),
            ]
        );
    }

    #[test]
    fn totals() {
        let s = PomodoroSchedule::standard();
        assert_eq!(s.study_minutes(), 50);
        assert_eq!(s.total_minutes(), 60);
        assert_eq!(s.cumulative_minutes(2), 30);
    }
}
