use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use clap::Subcommand;
use studyplan_core::storage::Database;
use studyplan_core::{
    format_clock, Config, Plan, SessionEvent, SessionMachine, SessionState, TickScheduler,
    TimerKind,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::{CliResult, LAST_PLAN_KEY};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the last plan (or a free-study block) in the foreground
    Run {
        /// Study freely for this many minutes instead of following the plan
        #[arg(long)]
        free: Option<u32>,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
        /// Milliseconds per timer second
        #[arg(long, default_value_t = 1000, hide = true)]
        tick_ms: u64,
    },
    /// Print the last generated plan
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

const HELP: &str = "commands: s start | p pause | n next subject | b break | x skip break | \
d end break | e [MIN] extend | c cancel extension | r reset | ? status | q quit";

/// Tick source backed by a tokio interval.
///
/// The machine only flips `armed`; the run loop notices the generation
/// change and rebuilds (or drops) its interval, so a cancelled timer never
/// delivers a stale tick.
struct IntervalScheduler {
    armed: Option<TimerKind>,
    period: Duration,
    generation: u64,
    /// Replaces the requested period when set.
    period_override: Option<Duration>,
}

impl IntervalScheduler {
    fn new(period_override: Option<Duration>) -> Self {
        Self {
            armed: None,
            period: Duration::from_secs(1),
            generation: 0,
            period_override,
        }
    }

    fn build_interval(&self) -> Option<Interval> {
        self.armed.map(|_| {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        })
    }
}

impl TickScheduler for IntervalScheduler {
    fn schedule(&mut self, kind: TimerKind, period: Duration) {
        self.armed = Some(kind);
        self.period = self.period_override.unwrap_or(period);
        self.generation += 1;
        debug!(?kind, generation = self.generation, "timer armed");
    }

    fn cancel(&mut self) {
        self.armed = None;
        self.generation += 1;
        debug!(generation = self.generation, "timer cancelled");
    }
}

fn load_last_plan(db: &Database) -> Result<Plan, Box<dyn std::error::Error>> {
    let json = db
        .kv_get(LAST_PLAN_KEY)?
        .ok_or("no saved plan; run `studyplan plan` first")?;
    let plan: Plan = serde_json::from_str(&json)?;
    plan.validate()?;
    Ok(plan)
}

pub fn run(action: TimerAction) -> CliResult {
    match action {
        TimerAction::Show { json } => {
            let plan = load_last_plan(&Database::open()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for (i, entry) in plan.iter().enumerate() {
                    println!("{:>2}. {:>4} min  {}", i + 1, entry.minutes, entry.subject);
                }
            }
            Ok(())
        }
        TimerAction::Run {
            free,
            json,
            tick_ms,
        } => {
            let config = Config::load()?;
            let db = Database::open()?;
            let plan = match free {
                Some(_) => None,
                None => Some(load_last_plan(&db)?),
            };

            let period_override = (tick_ms != 1000).then(|| Duration::from_millis(tick_ms.max(1)));
            let done = Rc::new(Cell::new(false));
            let flag = Rc::clone(&done);
            let mut machine =
                SessionMachine::with_config(config.session_config(), IntervalScheduler::new(period_override))
                    .with_completion(move || flag.set(true))
                    .with_sink(db);

            let first = match (plan, free) {
                (Some(plan), _) => machine.load_plan(plan)?,
                (None, Some(minutes)) => machine.start_free_study(minutes)?,
                (None, None) => return Err("nothing to run".into()),
            };
            report(&machine, &first, json)?;
            if !json {
                println!("{HELP}");
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(drive(&mut machine, &done, json))
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn drive(
    machine: &mut SessionMachine<IntervalScheduler>,
    done: &Cell<bool>,
    json: bool,
) -> CliResult {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut seen_generation = None;
    let mut interval: Option<Interval> = None;

    loop {
        let scheduler = machine.scheduler();
        if seen_generation != Some(scheduler.generation) {
            seen_generation = Some(scheduler.generation);
            interval = scheduler.build_interval();
        }
        if done.get() || machine.state() == SessionState::Idle {
            break;
        }
        if !stdin_open && interval.is_none() {
            // Nothing can move the session forward any more.
            break;
        }

        tokio::select! {
            _ = next_tick(&mut interval) => {
                match machine.tick() {
                    Some(event) => report(machine, &event, json)?,
                    None => {
                        let remaining = machine.remaining_secs();
                        if !json && remaining > 0 && remaining % 60 == 0 {
                            println!("  {} left  {}", format_clock(remaining), machine.label());
                        }
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => handle_command(machine, line.trim(), json)?,
                    None => stdin_open = false,
                }
            }
        }
    }
    Ok(())
}

fn handle_command(
    machine: &mut SessionMachine<IntervalScheduler>,
    input: &str,
    json: bool,
) -> CliResult {
    let mut parts = input.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(());
    };
    let arg = parts.next();

    let event = match (cmd, arg) {
        ("s" | "start", _) => machine.start(),
        ("p" | "pause", _) => machine.pause(),
        ("n" | "next", _) => machine.skip_to_next(),
        ("b" | "break", _) => machine.take_break(),
        ("x" | "skip", _) => machine.skip_break(),
        ("d" | "done", _) => machine.end_break(),
        ("c" | "cancel", _) => machine.cancel_extension(),
        ("e" | "extend", None) => machine.request_extension(),
        ("e" | "extend", Some(minutes)) => match minutes.parse::<u32>() {
            Ok(minutes) => match machine.extend(minutes) {
                Ok(event) => Some(event),
                Err(e) => {
                    eprintln!("{e}");
                    return Ok(());
                }
            },
            Err(_) => {
                eprintln!("extension needs a whole number of minutes");
                return Ok(());
            }
        },
        ("r" | "reset", _) => machine.reset(),
        ("q" | "quit", _) => Some(machine.quit()),
        ("?" | "status", _) => Some(machine.snapshot()),
        ("h" | "help", _) => {
            println!("{HELP}");
            return Ok(());
        }
        _ => {
            eprintln!("unknown command '{input}' (h for help)");
            return Ok(());
        }
    };

    match event {
        Some(event) => report(machine, &event, json),
        None => {
            eprintln!("'{cmd}' does nothing while {}", machine.state().name());
            Ok(())
        }
    }
}

fn report<S: TickScheduler>(machine: &SessionMachine<S>, event: &SessionEvent, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    println!("{}", describe(machine, event));
    Ok(())
}

fn describe<S: TickScheduler>(machine: &SessionMachine<S>, event: &SessionEvent) -> String {
    let subject_at = |index: usize| {
        machine
            .plan()
            .and_then(|p| p.get(index))
            .map_or_else(String::new, |e| e.subject.clone())
    };
    match event {
        SessionEvent::PlanLoaded { subjects, total_minutes, .. } => {
            format!("Loaded plan: {subjects} subjects, {total_minutes} min. First up: {}", subject_at(0))
        }
        SessionEvent::FreeStudyStarted { minutes, pomodoro: true, .. } => {
            format!("Free study for {minutes} min as a pomodoro cycle")
        }
        SessionEvent::FreeStudyStarted { minutes, .. } => format!("Free study for {minutes} min"),
        SessionEvent::TimerStarted { label, remaining_secs, .. } => {
            format!("Started {label} ({})", format_clock(*remaining_secs))
        }
        SessionEvent::TimerPaused { remaining_secs, .. } => {
            format!("Paused with {} left", format_clock(*remaining_secs))
        }
        SessionEvent::SubjectCompleted { subject, next_index, .. } => format!(
            "Finished {subject}. Next: {}. Take a break (b), skip it (x) or extend (e MIN)?",
            subject_at(*next_index)
        ),
        SessionEvent::SubjectAdvanced { to, duration_secs, .. } => format!(
            "Up next: {} ({}). Press s to start",
            subject_at(*to),
            format_clock(*duration_secs)
        ),
        SessionEvent::ExtensionRequested { .. } => {
            format!("Extend by how many minutes? (e 1-{}, c to cancel)", machine.config().max_extension_minutes)
        }
        SessionEvent::ExtensionCancelled { .. } => "Extension cancelled".to_string(),
        SessionEvent::SubjectExtended { index, minutes, .. } => {
            format!("Extending {} by {minutes} min", subject_at(*index))
        }
        SessionEvent::BreakStarted { duration_secs, .. } => {
            format!("Break for {} (d to end early)", format_clock(*duration_secs))
        }
        SessionEvent::PomodoroPhaseChanged { phase, session, duration_secs, .. } => {
            format!("Pomodoro {phase:?} {session} ({})", format_clock(*duration_secs)).to_lowercase()
        }
        SessionEvent::FreeStudyCompleted { minutes, .. } => format!("Free study done: {minutes} min"),
        SessionEvent::PomodoroCompleted { study_minutes, .. } => {
            format!("Pomodoro cycle done: {study_minutes} min of study")
        }
        SessionEvent::AllCompleted { subjects, total_minutes, .. } => {
            format!("All {subjects} subjects done ({total_minutes} min). Nice work!")
        }
        SessionEvent::SessionReset { .. } => match machine.current_entry() {
            Some(entry) => format!("Reset to {}", entry.subject),
            None => "Reset".to_string(),
        },
        SessionEvent::SessionQuit { .. } => "Session ended".to_string(),
        SessionEvent::StateSnapshot {
            state,
            label,
            remaining_secs,
            progress_pct,
            ..
        } => format!(
            "{} {label} {} ({progress_pct:.0}% of session)",
            state.name(),
            format_clock(*remaining_secs)
        ),
    }
}
