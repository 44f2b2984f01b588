//! Per-run orchestration: for every configured user, gate the slot, pick
//! the content, render it, deliver it, record it.
//!
//! Users run strictly in configuration order; one user's failure never
//! stops the next. State is mutated in memory and written back exactly
//! once at the end of the run (never in dry-run mode).

use chrono::{Datelike, Local, NaiveDate, Utc};

use memoclaw_core::config::{MemoClawConfig, User};
use memoclaw_core::error::{MemoClawError, Result};
use memoclaw_core::retry::with_retry;
use memoclaw_photos::immich::ImmichClient;
use memoclaw_photos::memories::{filter_for_date, parse_memories, RawMemory};
use memoclaw_photos::persons::rank_top_persons;
use memoclaw_push::{NtfyClient, PushAuth};

use crate::selector::{
    render_memory, render_person, select_memory_asset, select_person_photo, slot_role,
    year_for_slot, SelectorContext, SlotContent, SlotRole,
};
use crate::state::{NotifyState, StateStore};

/// Flags for one slot run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub slot: u32,
    pub date: NaiveDate,
    pub test_mode: bool,
    pub dry_run: bool,
    pub force: bool,
}

/// How a single user's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    /// Disabled in config.
    Disabled,
    /// This slot already went out today.
    AlreadySent,
    /// Eligible, but the day offers nothing for this slot.
    Nothing,
    /// Dry run: rendered and logged, not sent.
    Previewed,
    /// Delivered (and recorded, unless test mode).
    Sent,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub success_count: usize,
    pub total_users: usize,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.success_count == self.total_users
    }
}

/// Serve one slot for every configured user.
pub async fn run_slot(
    config: &MemoClawConfig,
    store: &StateStore,
    opts: &RunOptions,
) -> RunReport {
    let mut state = store.load();
    let ntfy = NtfyClient::new(&config.ntfy.url);

    let mut success_count = 0;
    for user in &config.users {
        match process_user(config, &ntfy, &mut state, user, opts).await {
            Ok(outcome) => {
                tracing::debug!("[{}] Outcome: {outcome:?}", user.name);
                success_count += 1;
            }
            Err(e) => {
                tracing::error!("❌ [{}] {e}", user.name);
            }
        }
    }

    if !opts.dry_run {
        if let Err(e) = store.save(&state) {
            tracing::error!("❌ {e}");
        }
    }

    tracing::info!(
        "Complete: {success_count}/{} users successful",
        config.users.len()
    );
    RunReport {
        success_count,
        total_users: config.users.len(),
    }
}

/// One user, one slot. Every network call is retry-wrapped; errors mark
/// this user failed without touching anyone else.
pub async fn process_user(
    config: &MemoClawConfig,
    ntfy: &NtfyClient,
    state: &mut NotifyState,
    user: &User,
    opts: &RunOptions,
) -> Result<UserOutcome> {
    if !user.enabled {
        tracing::info!("[{}] Skipped (disabled)", user.name);
        return Ok(UserOutcome::Disabled);
    }
    if user.api_key.trim().is_empty() {
        return Err(MemoClawError::CredentialMissing(user.name.clone()));
    }
    if !state.is_slot_eligible(&user.name, opts.date, opts.slot, opts.force, opts.test_mode) {
        tracing::info!(
            "[{}] Slot {} already sent today, skipping",
            user.name,
            opts.slot
        );
        return Ok(UserOutcome::AlreadySent);
    }

    let settings = &config.settings;
    let retry = &settings.retry;
    let client = ImmichClient::new(&config.immich.url, &user.api_key);
    tracing::info!("[{}] Processing slot {}...", user.name, opts.slot);

    let memories = with_retry("memories", retry.max_attempts, retry.delay_seconds, || {
        client.fetch_memories()
    })
    .await?;
    tracing::debug!("[{}] {} memories in library", user.name, memories.len());

    let mut target_date = opts.date;
    let mut todays = filter_for_date(&memories, target_date);
    if opts.test_mode && todays.is_empty() {
        if let Some(date) = probe_test_date(&memories) {
            tracing::info!("[{}] Test mode: using date {date}", user.name);
            target_date = date;
            todays = filter_for_date(&memories, date);
        }
    }

    let digest = if todays.is_empty() {
        tracing::info!("[{}] No memories for {target_date}", user.name);
        None
    } else {
        let digest = parse_memories(&todays);
        tracing::info!(
            "[{}] {} assets from years {:?}",
            user.name,
            digest.total_assets,
            digest.years
        );
        if digest.years.is_empty() { None } else { Some(digest) }
    };

    let role = slot_role(digest.is_some(), opts.slot, settings);
    if role == SlotRole::Nothing {
        tracing::info!("[{}] Nothing configured for slot {}", user.name, opts.slot);
        return Ok(UserOutcome::Nothing);
    }

    let top_persons = rank_top_persons(&client, retry, settings.top_persons_limit).await?;
    let sent_assets = state.assets_sent_today(&user.name, target_date);
    let ctx = SelectorContext {
        client: &client,
        settings,
        top_persons: &top_persons,
        sent_assets: &sent_assets,
    };

    let (content, mut detail) = if role == SlotRole::Memory {
        let Some(digest) = digest.as_ref() else {
            return Ok(UserOutcome::Nothing);
        };
        let Some(year) = year_for_slot(&digest.years, opts.slot) else {
            return Ok(UserOutcome::Nothing);
        };
        match select_memory_asset(&ctx, digest, year).await? {
            Some((asset, detail)) => (SlotContent::Memory { year, asset }, detail),
            None => {
                tracing::info!("[{}] No asset for year {year}", user.name);
                return Ok(UserOutcome::Nothing);
            }
        }
    } else {
        match select_person_photo(&ctx, Utc::now()).await? {
            Some((person, asset)) => (SlotContent::Person { person, asset }, None),
            None => {
                tracing::info!("[{}] No person photo available", user.name);
                return Ok(UserOutcome::Nothing);
            }
        }
    };

    // Location is garnish: fetch the detail if selection didn't already,
    // and shrug off failures.
    let mut city = None;
    if settings.include_location {
        if detail.is_none() {
            detail = with_retry("asset detail", retry.max_attempts, retry.delay_seconds, || {
                client.fetch_asset(&content.asset().id)
            })
            .await
            .ok();
        }
        city = detail
            .as_ref()
            .and_then(|d| d.exif.as_ref())
            .and_then(|e| e.city.clone());
    }

    let message = match &content {
        SlotContent::Memory { year, asset } => render_memory(
            *year,
            target_date.year(),
            asset.kind,
            &config.messages,
            settings,
            opts.test_mode,
            city.as_deref(),
        ),
        SlotContent::Person { person, asset } => render_person(
            &person.name,
            asset.kind,
            &config.messages,
            settings,
            opts.test_mode,
            city.as_deref(),
        ),
    };

    if opts.dry_run {
        tracing::info!(
            "[{}] [DRY RUN] Would send: {} - {}",
            user.name,
            message.title,
            message.body
        );
        return Ok(UserOutcome::Previewed);
    }

    let asset_id = content.asset().id.clone();
    let thumbnail = match with_retry("thumbnail", retry.max_attempts, retry.delay_seconds, || {
        client.fetch_thumbnail(&asset_id)
    })
    .await
    {
        Ok(bytes) => {
            tracing::debug!("[{}] Thumbnail: {} bytes", user.name, bytes.len());
            Some(bytes)
        }
        Err(e) => {
            tracing::warn!("⚠️ [{}] Could not fetch thumbnail: {e}", user.name);
            None
        }
    };

    let auth = push_auth(user);
    with_retry("publish", retry.max_attempts, retry.delay_seconds, || {
        ntfy.send(&user.topic, &message, thumbnail.as_deref(), auth.as_ref())
    })
    .await?;
    tracing::info!("✅ [{}] Notification sent: {}", user.name, message.title);

    if !opts.test_mode {
        state.record_send(
            &user.name,
            target_date,
            opts.slot,
            Some(&asset_id),
            Local::now(),
        );
    }
    Ok(UserOutcome::Sent)
}

fn push_auth(user: &User) -> Option<PushAuth> {
    match (&user.username, &user.password) {
        (Some(username), Some(password)) => Some(PushAuth {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    }
}

/// Test mode on a day without memories: borrow the date of the first
/// memory that actually has content so the run exercises the full path.
fn probe_test_date(memories: &[RawMemory]) -> Option<NaiveDate> {
    for memory in memories.iter().take(10) {
        let Some(prefix) = memory.show_at.get(..10) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") else {
            continue;
        };
        if !filter_for_date(memories, date).is_empty() {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use memoclaw_photos::memories::{MemoryData, RawAsset};

    fn test_config() -> MemoClawConfig {
        // Unroutable endpoints: any network attempt in these tests is a bug.
        toml::from_str(
            r#"
            [immich]
            url = "http://127.0.0.1:1"
            [ntfy]
            url = "http://127.0.0.1:1"

            [[users]]
            name = "alice"
            api_key = "key"
            topic = "alice-topic"
            "#,
        )
        .unwrap()
    }

    fn opts(slot: u32) -> RunOptions {
        RunOptions {
            slot,
            date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            test_mode: false,
            dry_run: false,
            force: false,
        }
    }

    #[tokio::test]
    async fn test_already_sent_slot_is_a_quiet_noop() {
        let config = test_config();
        let ntfy = NtfyClient::new(&config.ntfy.url);
        let mut state = NotifyState::default();
        state.record_send(
            "alice",
            NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            1,
            Some("a1"),
            Local::now(),
        );
        let before = state.clone();

        // Would hit the unroutable Immich URL if the gate let it through.
        let outcome = process_user(&config, &ntfy, &mut state, &config.users[0], &opts(1))
            .await
            .unwrap();
        assert_eq!(outcome, UserOutcome::AlreadySent);
        assert_eq!(
            state.users["alice"].slots_sent,
            before.users["alice"].slots_sent
        );
    }

    #[tokio::test]
    async fn test_disabled_user_succeeds_without_work() {
        let mut config = test_config();
        config.users[0].enabled = false;
        let ntfy = NtfyClient::new(&config.ntfy.url);
        let mut state = NotifyState::default();
        let outcome = process_user(&config, &ntfy, &mut state, &config.users[0], &opts(1))
            .await
            .unwrap();
        assert_eq!(outcome, UserOutcome::Disabled);
        assert!(state.users.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_user() {
        let mut config = test_config();
        config.users[0].api_key = String::new();
        let ntfy = NtfyClient::new(&config.ntfy.url);
        let mut state = NotifyState::default();
        let err = process_user(&config, &ntfy, &mut state, &config.users[0], &opts(1))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoClawError::CredentialMissing(_)));
    }

    #[tokio::test]
    async fn test_run_slot_with_no_users_reports_clean() {
        let mut config = test_config();
        config.users.clear();
        let dir = std::env::temp_dir().join("memoclaw-test-dispatch");
        std::fs::create_dir_all(&dir).unwrap();
        let store = StateStore::new(dir.join("state.json"));
        let report = run_slot(&config, &store, &opts(1)).await;
        assert_eq!(report.total_users, 0);
        assert!(report.all_succeeded());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_probe_test_date_finds_first_dated_memory() {
        let memories = vec![
            RawMemory {
                show_at: String::new(),
                data: MemoryData { year: Some(2020) },
                assets: vec![],
            },
            RawMemory {
                show_at: "2024-03-09T00:00:00Z".into(),
                data: MemoryData { year: Some(2019) },
                assets: vec![RawAsset {
                    id: Some("a1".into()),
                    kind: Default::default(),
                }],
            },
        ];
        assert_eq!(
            probe_test_date(&memories),
            Some(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        );
        assert_eq!(probe_test_date(&[]), None);
    }
}
