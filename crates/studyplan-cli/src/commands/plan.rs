use std::path::PathBuf;

use chrono::{Local, NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use studyplan_core::storage::Database;
use studyplan_core::{
    study_tips, CalendarEvent, Config, Plan, PlanAllocator, PlanRequest, Recommendation,
};

use super::{CliResult, LAST_PLAN_KEY};

#[derive(Args)]
pub struct PlanArgs {
    /// Minutes available for this session
    #[arg(long, short)]
    minutes: u32,
    /// Subject to study first (repeatable; "free study" skips planning)
    #[arg(long = "prefer", short)]
    preferred: Vec<String>,
    /// Number of subjects (defaults to a duration-based count)
    #[arg(long)]
    subjects: Option<usize>,
    /// Seed for tie-breaking; the same seed gives the same plan
    #[arg(long)]
    seed: Option<u64>,
    /// JSON file with calendar events
    #[arg(long)]
    events: Option<PathBuf>,
    /// Add recommended subjects for events in the next three days
    #[arg(long)]
    accept_recommended: bool,
    /// Plan as of this day (YYYY-MM-DD) instead of today
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    seed: u64,
    plan: &'a Plan,
    tips: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<&'a Recommendation>,
}

fn load_events(path: Option<&PathBuf>) -> Result<Vec<CalendarEvent>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read events file {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

pub fn run(args: PlanArgs) -> CliResult {
    let config = Config::load()?;
    let catalog = config.catalog()?;
    let events = load_events(args.events.as_ref())?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let mut preferred = args.preferred;
    let mut subject_count = args.subjects.or(config.planner.default_subject_count);

    let recommendation = Recommendation::for_events(&events, &preferred, today);
    if args.accept_recommended {
        if let Some(rec) = &recommendation {
            let (merged, count) = rec.accept(&preferred, subject_count);
            preferred = merged;
            subject_count = Some(count);
        }
    }

    let seed = args
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis().unsigned_abs());
    let mut request = PlanRequest::new(args.minutes)
        .with_preferred(preferred)
        .with_seed(seed);
    if let Some(count) = subject_count {
        request = request.with_subject_count(count);
    }

    let plan = PlanAllocator::new(&catalog, today).allocate(&request, &events)?;
    let tips = study_tips(args.minutes, &plan);

    let db = Database::open()?;
    db.kv_set(LAST_PLAN_KEY, &serde_json::to_string(&plan)?)?;

    let pending = recommendation.as_ref().filter(|_| !args.accept_recommended);
    if args.json {
        let output = PlanOutput {
            seed,
            plan: &plan,
            tips,
            recommendation: pending,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(rec) = pending {
        println!(
            "Upcoming in the next few days: {} (rerun with --accept-recommended to include)",
            rec.subjects.join(", ")
        );
    }
    println!("Plan for {} minutes (seed {seed}):", plan.total_minutes());
    for entry in &plan {
        match &entry.reason {
            Some(reason) => println!("  {:>4} min  {}  [{reason}]", entry.minutes, entry.subject),
            None => println!("  {:>4} min  {}", entry.minutes, entry.subject),
        }
    }
    println!();
    for tip in tips {
        println!("- {tip}");
    }
    Ok(())
}
