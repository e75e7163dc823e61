//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway data directory.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

struct Cli {
    data_dir: TempDir,
}

impl Cli {
    fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_studyplan"));
        cmd.args(args)
            .env("STUDYPLAN_DATA_DIR", self.data_dir.path())
            .env_remove("STUDYPLAN_LOG");
        cmd
    }

    /// Run and return (stdout, stderr, exit code).
    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .unwrap();
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        stdout
    }

    fn run_with_input(&self, args: &[&str], input: &str) -> String {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success(), "{args:?} failed");
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn plan_json_output() {
    let cli = Cli::new();
    let stdout = cli.run_ok(&["plan", "--minutes", "60", "--subjects", "2", "--seed", "42", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    let entries = parsed["plan"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let total: u64 = entries.iter().map(|e| e["minutes"].as_u64().unwrap()).sum();
    assert_eq!(total, 60);
    assert_eq!(parsed["seed"], 42);
    assert!(!parsed["tips"].as_array().unwrap().is_empty());
}

#[test]
fn plan_is_saved_for_the_timer() {
    let cli = Cli::new();
    let plan: serde_json::Value =
        serde_json::from_str(&cli.run_ok(&["plan", "-m", "45", "--seed", "7", "--json"])).unwrap();
    let shown: serde_json::Value =
        serde_json::from_str(&cli.run_ok(&["timer", "show", "--json"])).unwrap();
    assert_eq!(plan["plan"], shown);
}

#[test]
fn plan_uses_calendar_events() {
    let cli = Cli::new();
    let events = cli.data_dir.path().join("events.json");
    std::fs::write(
        &events,
        r#"[
            {"id": "1", "title": "Quiz", "date": "2025-09-02", "type": "test", "subject": "Basic Biology"},
            {"id": "2", "title": "Concert", "date": "2025-09-20", "type": "other", "subject": "Music"}
        ]"#,
    )
    .unwrap();
    let events = events.to_str().unwrap();

    let stdout = cli.run_ok(&[
        "plan", "-m", "120", "--seed", "11", "--today", "2025-09-01", "--events", events, "--json",
    ]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["recommendation"]["subjects"][0], "Basic Biology");
    let biology = parsed["plan"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["subject"] == "Basic Biology")
        .unwrap();
    assert_eq!(biology["reason"], "test prep");

    let stdout = cli.run_ok(&[
        "plan", "-m", "120", "--today", "2025-09-01", "--events", events, "--accept-recommended", "--json",
    ]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed.get("recommendation").is_none());
    assert_eq!(parsed["plan"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["plan"][0]["subject"], "Basic Biology");
}

#[test]
fn invalid_plan_request_fails() {
    let cli = Cli::new();
    let (_, stderr, code) = cli.run(&["plan", "--minutes", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("total_minutes"));

    let (_, stderr, code) = cli.run(&["timer", "show"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no saved plan"));
}

#[test]
fn subjects_lists_catalog() {
    let cli = Cli::new();
    let parsed: serde_json::Value =
        serde_json::from_str(&cli.run_ok(&["subjects", "--json"])).unwrap();
    let subjects = parsed.as_array().unwrap();
    assert_eq!(subjects.len(), 16);
    assert_eq!(subjects[0]["name"], "Modern Japanese");
}

#[test]
fn config_get_set() {
    let cli = Cli::new();
    assert_eq!(cli.run_ok(&["config", "get", "timer.break_minutes"]).trim(), "5");
    cli.run_ok(&["config", "set", "timer.break_minutes", "10"]);
    assert_eq!(cli.run_ok(&["config", "get", "timer.break_minutes"]).trim(), "10");

    let (_, _, code) = cli.run(&["config", "set", "timer.nope", "1"]);
    assert_ne!(code, 0);

    cli.run_ok(&["config", "reset"]);
    assert!(cli.run_ok(&["config", "list"]).contains("timer.break_minutes = 5"));
}

#[test]
fn free_study_runs_to_completion_and_is_recorded() {
    let cli = Cli::new();
    let stdout = cli.run_ok(&["timer", "run", "--free", "1", "--json", "--tick-ms", "1"]);
    let events = json_lines(&stdout);
    assert_eq!(events.first().unwrap()["type"], "FreeStudyStarted");
    assert_eq!(events.last().unwrap()["type"], "FreeStudyCompleted");

    let stats: serde_json::Value =
        serde_json::from_str(&cli.run_ok(&["stats", "summary", "--json"])).unwrap();
    assert_eq!(stats["total_minutes"], 1);
    assert_eq!(stats["recent"][0]["subject"], "free study");
    assert_eq!(stats["recent"][0]["type"], "free");

    let history: serde_json::Value =
        serde_json::from_str(&cli.run_ok(&["stats", "history", "--json"])).unwrap();
    let id = history[0]["id"].as_i64().unwrap().to_string();
    cli.run_ok(&["stats", "remove", &id]);
    let (_, _, code) = cli.run(&["stats", "remove", &id]);
    assert_ne!(code, 0);
}

#[test]
fn planned_session_can_be_quit() {
    let cli = Cli::new();
    cli.run_ok(&["plan", "-m", "30", "--seed", "1"]);
    let stdout = cli.run_with_input(&["timer", "run", "--json"], "s\nq\n");
    let types: Vec<String> = json_lines(&stdout)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, ["PlanLoaded", "TimerStarted", "SessionQuit"]);
}
