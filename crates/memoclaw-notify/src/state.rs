//! Per-user, per-day slot state — which slots and assets already went out
//! today — plus the JSON file store behind it.
//!
//! The "today" fields of a record are only meaningful while `slots_date`
//! matches the run's target date; any other date means the record is stale
//! and reads as empty (day rollover). The stale record is reset lazily on
//! the next recorded send, never eagerly.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use memoclaw_core::error::{MemoClawError, Result};

/// One user's send history for a single day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSlotState {
    /// ISO date the record applies to.
    #[serde(default)]
    pub slots_date: Option<String>,
    #[serde(default)]
    pub slots_sent: Vec<u32>,
    #[serde(default)]
    pub assets_sent_today: Vec<String>,
    /// Timestamp of the last recorded send.
    #[serde(default)]
    pub last_slot_time: Option<String>,
}

/// The whole persisted state: user name → slot record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyState {
    #[serde(default)]
    pub users: HashMap<String, UserSlotState>,
}

impl NotifyState {
    /// `force` and test mode bypass the dedup gate entirely.
    pub fn is_slot_eligible(
        &self,
        user: &str,
        date: NaiveDate,
        slot: u32,
        force: bool,
        test_mode: bool,
    ) -> bool {
        if force || test_mode {
            return true;
        }
        let Some(record) = self.users.get(user) else {
            return true;
        };
        if record.slots_date.as_deref() != Some(date.to_string().as_str()) {
            return true;
        }
        !record.slots_sent.contains(&slot)
    }

    /// Asset ids already delivered to this user today. Empty under rollover.
    pub fn assets_sent_today(&self, user: &str, date: NaiveDate) -> HashSet<String> {
        let Some(record) = self.users.get(user) else {
            return HashSet::new();
        };
        if record.slots_date.as_deref() != Some(date.to_string().as_str()) {
            return HashSet::new();
        }
        record.assets_sent_today.iter().cloned().collect()
    }

    /// Record a delivered slot. The first write on a new date clears the
    /// previous day's lists.
    pub fn record_send(
        &mut self,
        user: &str,
        date: NaiveDate,
        slot: u32,
        asset_id: Option<&str>,
        now: DateTime<Local>,
    ) {
        let date_str = date.to_string();
        let record = self.users.entry(user.to_string()).or_default();
        if record.slots_date.as_deref() != Some(date_str.as_str()) {
            record.slots_sent.clear();
            record.assets_sent_today.clear();
            record.slots_date = Some(date_str);
        }
        if !record.slots_sent.contains(&slot) {
            record.slots_sent.push(slot);
        }
        if let Some(id) = asset_id {
            if !record.assets_sent_today.iter().any(|a| a == id) {
                record.assets_sent_today.push(id.to_string());
            }
        }
        record.last_slot_time = Some(now.to_rfc3339());
    }
}

/// File-backed store. Loaded once per run, saved once per run.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means a fresh state. An unreadable or corrupt file is
    /// logged and also treated as fresh rather than blocking the run.
    pub fn load(&self) -> NotifyState {
        if !self.path.exists() {
            return NotifyState::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {}: {e}", self.path.display());
                NotifyState::default()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {}: {e}", self.path.display());
                NotifyState::default()
            }
        }
    }

    /// Atomic save: write a sibling temp file, then rename over the target.
    pub fn save(&self, state: &NotifyState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MemoClawError::State(format!("create {}: {e}", parent.display())))?;
            }
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| MemoClawError::State(format!("serialize state: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| MemoClawError::State(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| MemoClawError::State(format!("rename {}: {e}", tmp.display())))?;
        tracing::debug!("💾 Saved state to {}", self.path.display());
        Ok(())
    }
}
