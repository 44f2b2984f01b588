//! MemoClaw configuration system.
//!
//! One TOML file describes both upstream services, the per-slot settings,
//! the user roster, and the message template sets. Everything is read-only
//! once loaded — the slot runner never writes config.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{MemoClawError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoClawConfig {
    pub immich: ImmichConfig,
    pub ntfy: NtfyConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub messages: MessageSets,
}

impl MemoClawConfig {
    /// Load and validate a config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemoClawError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MemoClawError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the slot runner cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.immich.url.trim().is_empty() {
            return Err(MemoClawError::Config("immich.url is empty".into()));
        }
        if self.ntfy.url.trim().is_empty() {
            return Err(MemoClawError::Config("ntfy.url is empty".into()));
        }
        if self.settings.retry.max_attempts == 0 {
            return Err(MemoClawError::Config(
                "settings.retry.max_attempts must be at least 1".into(),
            ));
        }
        for (i, window) in self.settings.windows.iter().enumerate() {
            let (start, end) = window.bounds()?;
            // Overnight windows are undefined. Reject instead of guessing.
            if end < start {
                return Err(MemoClawError::Config(format!(
                    "window {} ends before it starts ({} > {})",
                    i + 1,
                    window.start,
                    window.end
                )));
            }
        }
        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.name.as_str()) {
                return Err(MemoClawError::Config(format!(
                    "duplicate user name '{}'",
                    user.name
                )));
            }
        }
        Ok(())
    }
}

/// Immich photo server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmichConfig {
    pub url: String,
}

/// ntfy push server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NtfyConfig {
    pub url: String,
}

/// Slot and selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Slots 1..=memory_slots carry memory notifications (when memories exist).
    #[serde(default = "default_memory_slots")]
    pub memory_slots: u32,
    /// The next person_slots slots carry person notifications.
    #[serde(default = "default_person_slots")]
    pub person_slots: u32,
    /// On days without memories, slots 1..=fallback_slots all carry person photos.
    #[serde(default = "default_fallback_slots")]
    pub fallback_slots: u32,
    #[serde(default = "default_top_persons_limit")]
    pub top_persons_limit: usize,
    /// Person photos newer than this many days are never sent.
    #[serde(default = "default_exclude_recent_days")]
    pub exclude_recent_days: i64,
    #[serde(default = "default_person_page_size")]
    pub person_page_size: u32,
    #[serde(default = "bool_true")]
    pub include_location: bool,
    #[serde(default = "bool_true")]
    pub video_emoji: bool,
    #[serde(default = "bool_true")]
    pub prefer_group_photos: bool,
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    /// One delivery window per slot, indexed by slot number.
    #[serde(default)]
    pub windows: Vec<Window>,
}

fn default_state_file() -> String { "state.json".into() }
fn default_memory_slots() -> u32 { 3 }
fn default_person_slots() -> u32 { 2 }
fn default_fallback_slots() -> u32 { 3 }
fn default_top_persons_limit() -> usize { 5 }
fn default_exclude_recent_days() -> i64 { 30 }
fn default_person_page_size() -> u32 { 100 }
fn default_min_group_size() -> usize { 2 }
fn bool_true() -> bool { true }

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            retry: RetrySettings::default(),
            memory_slots: default_memory_slots(),
            person_slots: default_person_slots(),
            fallback_slots: default_fallback_slots(),
            top_persons_limit: default_top_persons_limit(),
            exclude_recent_days: default_exclude_recent_days(),
            person_page_size: default_person_page_size(),
            include_location: true,
            video_emoji: true,
            prefer_group_photos: true,
            min_group_size: default_min_group_size(),
            windows: Vec::new(),
        }
    }
}

/// Retry policy for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub delay_seconds: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 5 }

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_seconds: default_retry_delay(),
        }
    }
}

/// A same-day clock-time delivery window ("HH:MM" to "HH:MM").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub start: String,
    pub end: String,
}

impl Window {
    /// Parse both bounds. Format errors are config errors.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        let start = parse_clock(&self.start)?;
        let end = parse_clock(&self.end)?;
        Ok((start, end))
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| MemoClawError::Config(format!("bad clock time '{s}': {e}")))
}

/// One notification recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique key, used in logs and the state file.
    pub name: String,
    /// Immich API key.
    #[serde(default)]
    pub api_key: String,
    /// ntfy topic the user's notifications go to.
    pub topic: String,
    /// Optional ntfy basic auth.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// Message template sets. `{year}` / `{years_ago}` substitute in memory
/// templates, `{person_name}` in person templates. Video sets fall back to
/// the photo sets when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSets {
    #[serde(default)]
    pub memory: Vec<String>,
    #[serde(default)]
    pub person: Vec<String>,
    #[serde(default)]
    pub video_memory: Vec<String>,
    #[serde(default)]
    pub video_person: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> MemoClawConfig {
        toml::from_str(
            r#"
            [immich]
            url = "https://photos.example.com"
            [ntfy]
            url = "https://ntfy.example.com"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.settings.retry.max_attempts, 3);
        assert_eq!(config.settings.retry.delay_seconds, 5);
        assert_eq!(config.settings.memory_slots, 3);
        assert_eq!(config.settings.person_slots, 2);
        assert_eq!(config.settings.fallback_slots, 3);
        assert_eq!(config.settings.top_persons_limit, 5);
        assert_eq!(config.settings.exclude_recent_days, 30);
        assert_eq!(config.settings.state_file, "state.json");
        assert!(config.settings.windows.is_empty());
        assert!(config.users.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_parse() {
        let config: MemoClawConfig = toml::from_str(
            r#"
            [immich]
            url = "http://localhost:2283"
            [ntfy]
            url = "http://localhost:8080"

            [settings]
            memory_slots = 2
            exclude_recent_days = 14

            [[settings.windows]]
            start = "08:00"
            end = "09:30"

            [[users]]
            name = "alice"
            api_key = "secret"
            topic = "alice-memories"

            [messages]
            memory = ["From {year}, {years_ago} years back!"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.settings.memory_slots, 2);
        assert_eq!(config.settings.exclude_recent_days, 14);
        assert_eq!(config.users[0].name, "alice");
        assert!(config.users[0].enabled);
        assert!(config.users[0].username.is_none());
        assert_eq!(config.messages.memory.len(), 1);
        let (start, end) = config.settings.windows[0].bounds().unwrap();
        assert!(start < end);
    }

    #[test]
    fn test_rejects_overnight_window() {
        let mut config = minimal();
        config.settings.windows.push(Window {
            start: "22:00".into(),
            end: "06:00".into(),
        });
        assert!(matches!(
            config.validate(),
            Err(MemoClawError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_bad_clock_string() {
        let mut config = minimal();
        config.settings.windows.push(Window {
            start: "8am".into(),
            end: "09:00".into(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_retry_attempts() {
        let mut config = minimal();
        config.settings.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_user_names() {
        let mut config = minimal();
        for _ in 0..2 {
            config.users.push(User {
                name: "alice".into(),
                api_key: "k".into(),
                topic: "t".into(),
                username: None,
                password: None,
                enabled: true,
            });
        }
        assert!(config.validate().is_err());
    }
}
