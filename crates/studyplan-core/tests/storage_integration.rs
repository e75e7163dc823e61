//! Config and history files on disk.

use chrono::Local;
use studyplan_core::{
    Config, ConfigError, Database, ManualScheduler, Plan, PlanEntry, SessionKind, SessionMachine,
};
use tempfile::TempDir;

#[test]
fn config_file_created_on_first_load_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let cfg = Config::load_from(&path).unwrap();
    assert!(path.exists());
    assert_eq!(cfg, Config::default());

    let mut cfg = cfg;
    cfg.set("timer.break_minutes", "10").unwrap();
    cfg.set("planner.default_subject_count", "3").unwrap();
    cfg.save_to(&path).unwrap();

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded.timer.break_minutes, 10);
    assert_eq!(reloaded.planner.default_subject_count, Some(3));
    assert_eq!(reloaded.session_config().break_minutes, 10);
}

#[test]
fn config_with_custom_subjects_loads_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[timer]
max_extension_minutes = 30

[[subjects]]
name = "Latin"
priority = 1
min_minutes = 10
max_ratio = 0.5

[[subjects]]
name = "Choir"
priority = 2
min_minutes = 5
max_ratio = 0.2
optional = true
"#,
    )
    .unwrap();

    let cfg = Config::load_from(&path).unwrap();
    assert_eq!(cfg.timer.max_extension_minutes, 30);
    assert_eq!(cfg.timer.break_minutes, 5);
    let catalog = cfg.catalog().unwrap();
    assert_eq!(catalog.first_core().unwrap().name, "Latin");
    assert_eq!(catalog.optional().count(), 1);
}

#[test]
fn broken_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "timer = 5").unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));

    std::fs::write(&path, "[timer]\npomodoro_cycles = 0\n").unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn machine_writes_history_to_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("studyplan.db");
    let db = Database::open_at(&db_path).unwrap();

    let plan = Plan::from_entries(vec![PlanEntry {
        subject: "Math A".into(),
        minutes: 1,
        reason: Some("test prep".into()),
        color: "pink".into(),
    }])
    .unwrap();
    db.kv_set("last_plan", &serde_json::to_string(&plan).unwrap()).unwrap();

    let mut machine = SessionMachine::new(ManualScheduler::new()).with_sink(db);
    machine.load_plan(plan.clone()).unwrap();
    machine.start();
    for _ in 0..60 {
        machine.tick();
    }

    // A second connection sees what the machine's sink committed.
    let db = Database::open_at(&db_path).unwrap();
    let sessions = db.list_sessions(None).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].record.subject, "Math A");
    assert_eq!(sessions[0].record.kind, SessionKind::Planned);

    let stats = db.stats(Local::now().date_naive()).unwrap();
    assert_eq!(stats.today_minutes, 1);
    assert_eq!(stats.total_sessions, 1);

    let saved: Plan = serde_json::from_str(&db.kv_get("last_plan").unwrap().unwrap()).unwrap();
    assert_eq!(saved, plan);
}
