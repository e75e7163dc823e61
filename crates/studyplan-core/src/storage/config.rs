//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Break and extension lengths
//! - The pomodoro cycle used by free study
//! - Planner defaults
//! - An optional custom subject catalog
//!
//! Configuration is stored at `~/.config/studyplan/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::catalog::{Catalog, Subject};
use crate::error::ConfigError;
use crate::session::{PomodoroSchedule, SessionConfig};

/// Session timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_max_extension")]
    pub max_extension_minutes: u32,
    /// Free-study length that runs the pomodoro cycle instead.
    #[serde(default = "default_pomodoro_trigger")]
    pub pomodoro_trigger_minutes: u32,
    #[serde(default = "default_pomodoro_focus")]
    pub pomodoro_focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub pomodoro_break_minutes: u32,
    #[serde(default = "default_pomodoro_cycles")]
    pub pomodoro_cycles: u8,
}

/// Planner defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Overrides the duration-based subject count when set.
    #[serde(default)]
    pub default_subject_count: Option<usize>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyplan/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Replaces the built-in catalog when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Subject>>,
}

fn default_break_minutes() -> u32 {
    5
}
fn default_max_extension() -> u32 {
    60
}
fn default_pomodoro_trigger() -> u32 {
    60
}
fn default_pomodoro_focus() -> u32 {
    25
}
fn default_pomodoro_cycles() -> u8 {
    2
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            break_minutes: default_break_minutes(),
            max_extension_minutes: default_max_extension(),
            pomodoro_trigger_minutes: default_pomodoro_trigger(),
            pomodoro_focus_minutes: default_pomodoro_focus(),
            pomodoro_break_minutes: default_break_minutes(),
            pomodoro_cycles: default_pomodoro_cycles(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                // Clears an optional key; required keys fail to deserialize.
                _ if value == UNSET => serde_json::Value::Null,
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => parse_number(value).ok_or_else(|| {
                    invalid(format!("cannot parse '{value}' as number"))
                })?,
                // Unset optional scalar: take whatever the text looks like.
                serde_json::Value::Null => {
                    parse_number(value).unwrap_or_else(|| serde_json::Value::String(value.into()))
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                serde_json::Value::String(_) => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or does not
    /// describe a usable configuration.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(UNSET.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result is not a usable configuration. `self` is untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs of every scalar setting.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            flatten("", &json, &mut out);
        }
        out
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("timer.break_minutes", self.timer.break_minutes),
            ("timer.max_extension_minutes", self.timer.max_extension_minutes),
            ("timer.pomodoro_trigger_minutes", self.timer.pomodoro_trigger_minutes),
            ("timer.pomodoro_focus_minutes", self.timer.pomodoro_focus_minutes),
            ("timer.pomodoro_break_minutes", self.timer.pomodoro_break_minutes),
            ("timer.pomodoro_cycles", u32::from(self.timer.pomodoro_cycles)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        if self.planner.default_subject_count == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "planner.default_subject_count".into(),
                message: "must be greater than zero".into(),
            });
        }
        self.catalog().map(|_| ())
    }

    /// The configured catalog, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the custom table is invalid.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.subjects {
            Some(subjects) => Catalog::new(subjects.clone()).map_err(|e| ConfigError::InvalidValue {
                key: "subjects".into(),
                message: e.to_string(),
            }),
            None => Ok(Catalog::builtin().clone()),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let t = &self.timer;
        SessionConfig {
            break_minutes: t.break_minutes,
            max_extension_minutes: t.max_extension_minutes,
            pomodoro_trigger_minutes: t.pomodoro_trigger_minutes,
            pomodoro: PomodoroSchedule::new(
                t.pomodoro_focus_minutes,
                t.pomodoro_break_minutes,
                t.pomodoro_cycles,
            ),
        }
    }
}

/// How an unset optional value is shown and written.
const UNSET: &str = "none";

fn parse_number(value: &str) -> Option<serde_json::Value> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(serde_json::Value::Number(n.into()));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        serde_json::Value::Array(items) => {
            out.push((prefix.to_string(), format!("[{} entries]", items.len())));
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_json::Value::Null => out.push((prefix.to_string(), UNSET.into())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.break_minutes, 5);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let cfg: Config = toml::from_str("[timer]\nbreak_minutes = 10\n").unwrap();
        assert_eq!(cfg.timer.break_minutes, 10);
        assert_eq!(cfg.timer.max_extension_minutes, 60);
        assert_eq!(cfg.planner.default_subject_count, None);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.break_minutes").as_deref(), Some("5"));
        assert_eq!(cfg.get("planner.default_subject_count").as_deref(), Some("none"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_number() {
        let mut cfg = Config::default();
        cfg.set("timer.max_extension_minutes", "30").unwrap();
        assert_eq!(cfg.timer.max_extension_minutes, 30);
        assert_eq!(cfg.session_config().max_extension_minutes, 30);
    }

    #[test]
    fn set_fills_unset_option() {
        let mut cfg = Config::default();
        cfg.set("planner.default_subject_count", "4").unwrap();
        assert_eq!(cfg.planner.default_subject_count, Some(4));
        assert_eq!(cfg.get("planner.default_subject_count").as_deref(), Some("4"));
        cfg.set("planner.default_subject_count", "none").unwrap();
        assert_eq!(cfg.planner.default_subject_count, None);
        assert_eq!(cfg.get("planner.default_subject_count").as_deref(), Some("none"));
    }

    #[test]
    fn unset_spelling_matches_entries() {
        let cfg = Config::default();
        let listed = cfg
            .entries()
            .into_iter()
            .find(|(k, _)| k == "planner.default_subject_count")
            .map(|(_, v)| v);
        assert_eq!(listed, cfg.get("planner.default_subject_count"));
    }

    #[test]
    fn set_rejects_bad_input_and_keeps_state() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.nonexistent", "1").is_err());
        assert!(cfg.set("timer.break_minutes", "soon").is_err());
        assert!(cfg.set("timer.break_minutes", "0").is_err());
        assert!(cfg.set("planner.default_subject_count", "many").is_err());
        assert!(cfg.set("timer.break_minutes", "none").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn session_config_uses_pomodoro_settings() {
        let mut cfg = Config::default();
        cfg.timer.pomodoro_cycles = 3;
        let session = cfg.session_config();
        assert_eq!(session.pomodoro.len(), 6);
        assert_eq!(session.pomodoro.study_minutes(), 75);
        assert_eq!(Config::default().session_config(), SessionConfig::default());
    }

    #[test]
    fn custom_catalog_is_validated() {
        let mut cfg = Config::default();
        assert_eq!(cfg.catalog().unwrap(), *Catalog::builtin());

        cfg.subjects = Some(vec![Subject {
            name: "Music".into(),
            priority: 1,
            color: String::new(),
            min_minutes: 5,
            max_ratio: 0.5,
            optional: true,
        }]);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn entries_flatten_scalars() {
        let entries = Config::default().entries();
        assert!(entries.contains(&("timer.pomodoro_cycles".to_string(), "2".to_string())));
        assert!(entries.contains(&("planner.default_subject_count".to_string(), "none".to_string())));
    }
}
