//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default study parameters used when creating a plan
//! - Calendar export labels
//! - The local student id used for ratings and followed courses
//!
//! Configuration is stored at `~/.config/studyplan/config.toml`.

use std::path::PathBuf;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::scheduler::{DayEndPolicy, StudyDayPolicy, StudyParameters, TrailingPause};

/// Default study parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_study_minutes_per_day")]
    pub study_minutes_per_day: u32,
    #[serde(default = "default_study_days_per_week")]
    pub study_days_per_week: u8,
    #[serde(default = "default_block_minutes")]
    pub block_minutes: u32,
    #[serde(default = "default_day_start")]
    pub day_start: NaiveTime,
    #[serde(default = "default_day_end")]
    pub day_end: NaiveTime,
    #[serde(default = "default_pause_minutes")]
    pub pause_minutes: u32,
    #[serde(default)]
    pub study_days: StudyDayPolicy,
    #[serde(default)]
    pub trailing_pause: TrailingPause,
    #[serde(default)]
    pub day_end_policy: DayEndPolicy,
}

/// Calendar export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_pause_label")]
    pub pause_label: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyplan/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Student the local ratings and followed courses belong to.
    #[serde(default = "default_student_id")]
    pub student_id: String,
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_study_minutes_per_day() -> u32 {
    8 * 60
}
fn default_study_days_per_week() -> u8 {
    7
}
fn default_block_minutes() -> u32 {
    8 * 60
}
fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}
fn default_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default()
}
fn default_pause_minutes() -> u32 {
    30
}
fn default_pause_label() -> String {
    "Break".into()
}
fn default_student_id() -> String {
    "local".into()
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            study_minutes_per_day: default_study_minutes_per_day(),
            study_days_per_week: default_study_days_per_week(),
            block_minutes: default_block_minutes(),
            day_start: default_day_start(),
            day_end: default_day_end(),
            pause_minutes: default_pause_minutes(),
            study_days: StudyDayPolicy::default(),
            trailing_pause: TrailingPause::default(),
            day_end_policy: DayEndPolicy::default(),
        }
    }
}

impl StudyConfig {
    /// Study parameters for a scheduling run. Not validated here.
    pub fn parameters(&self) -> StudyParameters {
        StudyParameters {
            study_minutes_per_day: self.study_minutes_per_day,
            study_days_per_week: self.study_days_per_week,
            block_minutes: self.block_minutes,
            day_start: self.day_start,
            day_end: self.day_end,
            pause_minutes: self.pause_minutes,
            study_days: self.study_days,
            trailing_pause: self.trailing_pause,
            day_end_policy: self.day_end_policy,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pause_label: default_pause_label(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            student_id: default_student_id(),
            study: StudyConfig::default(),
            export: ExportConfig::default(),
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
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                }
                .into()
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. The new value must still
    /// deserialize into the config (times as `HH:MM:SS`, policies by name).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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
        assert_eq!(parsed.study.block_minutes, 480);
        assert_eq!(parsed.study.day_end, default_day_end());
        assert_eq!(parsed.export.pause_label, "Break");
    }

    #[test]
    fn partial_file_falls_back_to_field_defaults() {
        let parsed: Config = toml::from_str(
            "[study]\nblock_minutes = 50\nday_end_policy = \"clip\"\n",
        )
        .unwrap();
        assert_eq!(parsed.study.block_minutes, 50);
        assert_eq!(parsed.study.pause_minutes, 30);
        assert_eq!(parsed.study.day_end_policy, DayEndPolicy::Clip);
        assert_eq!(parsed.student_id, "local");
    }

    #[test]
    fn default_parameters_match_study_defaults() {
        assert_eq!(Config::default().study.parameters(), StudyParameters::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("study.pause_minutes").as_deref(), Some("30"));
        assert_eq!(cfg.get("study.day_start").as_deref(), Some("08:00:00"));
        assert_eq!(cfg.get("study.trailing_pause").as_deref(), Some("advance"));
        assert!(cfg.get("study.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("study.block_minutes", "45").unwrap();
        cfg.apply("study.day_start", "09:30:00").unwrap();
        cfg.apply("study.study_days", "first_days_of_week").unwrap();
        cfg.apply("export.pause_label", "Pause").unwrap();
        assert_eq!(cfg.study.block_minutes, 45);
        assert_eq!(cfg.study.day_start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(cfg.study.study_days, StudyDayPolicy::FirstDaysOfWeek);
        assert_eq!(cfg.export.pause_label, "Pause");
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(cfg.apply("study.nonexistent_key", "1").is_err());
        assert!(cfg.apply("", "1").is_err());
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.apply("study.block_minutes", "forty").is_err());
        assert!(cfg.apply("study.day_end_policy", "sometimes").is_err());
        assert!(cfg.apply("study.day_start", "late").is_err());
        assert_eq!(cfg.study.block_minutes, 480);
    }
}
