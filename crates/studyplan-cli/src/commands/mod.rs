pub mod config;
pub mod plan;
pub mod stats;
pub mod subjects;
pub mod timer;

/// Key under which `plan` stores the last generated plan for `timer run`.
pub const LAST_PLAN_KEY: &str = "last_plan";

pub type CliResult = Result<(), Box<dyn std::error::Error>>;
