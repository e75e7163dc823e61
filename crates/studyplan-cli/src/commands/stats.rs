use chrono::{Local, NaiveDate};
use clap::Subcommand;
use studyplan_core::storage::Database;
use studyplan_core::StudyStats;

use super::CliResult;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today, this week and all-time totals with top subjects
    Summary {
        /// Summarize as of this day (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recorded sessions, newest first
    History {
        /// Show at most this many sessions
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recorded session
    Remove {
        /// Session id as shown by `stats history`
        id: i64,
    },
}

pub fn run(action: StatsAction) -> CliResult {
    let db = Database::open()?;

    match action {
        StatsAction::Summary { today, json } => {
            let stats = db.stats(today.unwrap_or_else(|| Local::now().date_naive()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_summary(&stats);
            }
        }
        StatsAction::History { limit, json } => {
            let sessions = db.list_sessions(Some(limit))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                for s in sessions {
                    println!(
                        "{:>5}  {}  {:>4} min  {:<8}  {}",
                        s.id,
                        s.record.date,
                        s.record.duration_minutes,
                        s.record.kind.as_str(),
                        s.record.subject
                    );
                }
            }
        }
        StatsAction::Remove { id } => {
            if !db.remove_session(id)? {
                return Err(format!("no session with id {id}").into());
            }
            println!("removed session {id}");
        }
    }
    Ok(())
}

fn print_summary(stats: &StudyStats) {
    println!("today:     {} min in {} sessions", stats.today_minutes, stats.today_sessions);
    println!("this week: {} min in {} sessions", stats.week_minutes, stats.week_sessions);
    println!("all time:  {} min in {} sessions", stats.total_minutes, stats.total_sessions);
    if !stats.top_subjects.is_empty() {
        println!();
        println!("top subjects:");
        for (rank, total) in stats.top_subjects.iter().enumerate() {
            println!("  {}. {} ({} min)", rank + 1, total.subject, total.minutes);
        }
    }
}
