use studyplan_core::Config;

use super::CliResult;

pub fn run(json: bool) -> CliResult {
    let catalog = Config::load()?.catalog()?;

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.subjects())?);
        return Ok(());
    }

    println!("{:<34} {:>8} {:>8} {:>6}  kind", "subject", "priority", "min", "max");
    for s in catalog.subjects() {
        println!(
            "{:<34} {:>8} {:>8} {:>5.0}%  {}",
            s.name,
            s.priority,
            s.min_minutes,
            s.max_ratio * 100.0,
            if s.optional { "optional" } else { "core" }
        );
    }
    Ok(())
}
