//! Content selection — what a slot actually sends.
//!
//! Slot numbers map onto memory slots, then person slots; on days without
//! memories every slot up to the fallback count sends a person photo
//! instead. Within a memory year, assets carrying recognized faces win
//! over faceless ones, and top-person faces win over everything.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use memoclaw_core::config::{MessageSets, Settings};
use memoclaw_core::error::Result;
use memoclaw_core::retry::with_retry;
use memoclaw_photos::immich::{AssetDetail, AssetFace, ImmichClient};
use memoclaw_photos::memories::{Asset, AssetKind, MemoryDigest};
use memoclaw_photos::persons::RankedPerson;
use memoclaw_push::PushMessage;

/// Click-through target for every notification.
const CLICK_URL: &str = "https://my.immich.app/";

/// Everything selection needs for one user.
pub struct SelectorContext<'a> {
    pub client: &'a ImmichClient,
    pub settings: &'a Settings,
    pub top_persons: &'a [RankedPerson],
    /// Asset ids already delivered to this user today.
    pub sent_assets: &'a HashSet<String>,
}

/// What kind of content a slot position calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Memory,
    Person,
    /// Eligible but nothing configured for this position.
    Nothing,
}

/// Map a slot number onto its role for the day.
pub fn slot_role(has_memories: bool, slot: u32, settings: &Settings) -> SlotRole {
    if has_memories {
        if slot <= settings.memory_slots {
            SlotRole::Memory
        } else if slot <= settings.memory_slots + settings.person_slots {
            SlotRole::Person
        } else {
            SlotRole::Nothing
        }
    } else if slot <= settings.fallback_slots {
        SlotRole::Person
    } else {
        SlotRole::Nothing
    }
}

/// Cyclic year pick: slot numbers beyond the distinct years wrap around.
pub fn year_for_slot(years: &[i32], slot: u32) -> Option<i32> {
    if years.is_empty() {
        return None;
    }
    Some(years[(slot as usize - 1) % years.len()])
}

/// The asset a slot resolved to, before rendering.
#[derive(Debug, Clone)]
pub enum SlotContent {
    Memory { year: i32, asset: Asset },
    Person { person: RankedPerson, asset: Asset },
}

impl SlotContent {
    pub fn asset(&self) -> &Asset {
        match self {
            SlotContent::Memory { asset, .. } => asset,
            SlotContent::Person { asset, .. } => asset,
        }
    }
}

/// Pick a memory slot's asset for one year using face preference.
///
/// Already-sent assets are excluded first; if that leaves nothing, any
/// asset from the original list may repeat (better a repeat than a silent
/// slot). Face lookups that keep failing file the asset as faceless.
pub async fn select_memory_asset(
    ctx: &SelectorContext<'_>,
    digest: &MemoryDigest,
    year: i32,
) -> Result<Option<(Asset, Option<AssetDetail>)>> {
    let Some(bucket) = digest.by_year.get(&year) else {
        return Ok(None);
    };

    let remaining: Vec<Asset> = bucket
        .assets
        .iter()
        .filter(|a| !ctx.sent_assets.contains(&a.id))
        .cloned()
        .collect();
    if remaining.is_empty() {
        let fallback = bucket.assets.choose(&mut rand::thread_rng()).cloned();
        return Ok(fallback.map(|a| (a, None)));
    }

    let top_ids: HashSet<&str> = ctx.top_persons.iter().map(|p| p.id.as_str()).collect();
    let retry = &ctx.settings.retry;
    let mut annotated = Vec::with_capacity(remaining.len());
    for asset in remaining {
        let label = format!("faces of {}", asset.id);
        let entry = match with_retry(&label, retry.max_attempts, retry.delay_seconds, || {
            ctx.client.fetch_asset(&asset.id)
        })
        .await
        {
            Ok(detail) => {
                let (tier, named_faces) = classify_faces(&detail.people, &top_ids);
                AnnotatedAsset {
                    asset,
                    tier,
                    named_faces,
                    detail: Some(detail),
                }
            }
            Err(e) => {
                tracing::debug!("Face lookup failed for {}: {e}", asset.id);
                AnnotatedAsset {
                    asset,
                    tier: FaceTier::Unnamed,
                    named_faces: 0,
                    detail: None,
                }
            }
        };
        annotated.push(entry);
    }

    Ok(pick_preferred(
        annotated,
        ctx.settings.prefer_group_photos,
        ctx.settings.min_group_size,
        &mut rand::thread_rng(),
    ))
}

/// Walk the top persons in random order; the first one with an asset that
/// is neither already sent nor too recent wins.
pub async fn select_person_photo(
    ctx: &SelectorContext<'_>,
    now: DateTime<Utc>,
) -> Result<Option<(RankedPerson, Asset)>> {
    let mut order: Vec<&RankedPerson> = ctx.top_persons.iter().collect();
    order.shuffle(&mut rand::thread_rng());

    let cutoff = now - chrono::Duration::days(ctx.settings.exclude_recent_days);
    let retry = &ctx.settings.retry;
    for person in order {
        let label = format!("assets of {}", person.name);
        let page = match with_retry(&label, retry.max_attempts, retry.delay_seconds, || {
            ctx.client
                .search_person_assets(&person.id, ctx.settings.person_page_size)
        })
        .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("⚠️ Skipping {}: {e}", person.name);
                continue;
            }
        };

        let candidates: Vec<Asset> = page
            .items
            .into_iter()
            .filter(|a| !ctx.sent_assets.contains(&a.id))
            .filter(|a| a.file_created_at.map_or(true, |t| t <= cutoff))
            .collect();
        if let Some(asset) = candidates.choose(&mut rand::thread_rng()) {
            return Ok(Some((person.clone(), asset.clone())));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaceTier {
    /// Contains one of the library's most-photographed people.
    TopPerson,
    /// Contains any named face.
    Named,
    /// No recognized named face (or the lookup failed).
    Unnamed,
}

struct AnnotatedAsset {
    asset: Asset,
    tier: FaceTier,
    named_faces: usize,
    detail: Option<AssetDetail>,
}

fn classify_faces(faces: &[AssetFace], top_ids: &HashSet<&str>) -> (FaceTier, usize) {
    let named: Vec<_> = faces.iter().filter(|f| !f.name.trim().is_empty()).collect();
    let tier = if named.iter().any(|f| top_ids.contains(f.id.as_str())) {
        FaceTier::TopPerson
    } else if !named.is_empty() {
        FaceTier::Named
    } else {
        FaceTier::Unnamed
    };
    (tier, named.len())
}

/// Uniform pick from the highest non-empty tier. Group shots (enough named
/// faces) shrink the pool when preferred and present.
fn pick_preferred(
    mut annotated: Vec<AnnotatedAsset>,
    prefer_group: bool,
    min_group_size: usize,
    rng: &mut impl Rng,
) -> Option<(Asset, Option<AssetDetail>)> {
    for tier in [FaceTier::TopPerson, FaceTier::Named, FaceTier::Unnamed] {
        let mut pool: Vec<usize> = annotated
            .iter()
            .enumerate()
            .filter(|(_, a)| a.tier == tier)
            .map(|(i, _)| i)
            .collect();
        if pool.is_empty() {
            continue;
        }
        if prefer_group && tier != FaceTier::Unnamed {
            let groups: Vec<usize> = pool
                .iter()
                .copied()
                .filter(|&i| annotated[i].named_faces >= min_group_size)
                .collect();
            if !groups.is_empty() {
                pool = groups;
            }
        }
        let &index = pool.choose(rng)?;
        let chosen = annotated.swap_remove(index);
        return Some((chosen.asset, chosen.detail));
    }
    None
}

/// Render a memory notification.
pub fn render_memory(
    year: i32,
    today_year: i32,
    kind: AssetKind,
    messages: &MessageSets,
    settings: &Settings,
    test_mode: bool,
    city: Option<&str>,
) -> PushMessage {
    let years_ago = today_year - year;
    let set = if kind == AssetKind::Video && !messages.video_memory.is_empty() {
        &messages.video_memory
    } else {
        &messages.memory
    };
    let body = match set.choose(&mut rand::thread_rng()) {
        Some(template) => template
            .replace("{year}", &year.to_string())
            .replace("{years_ago}", &years_ago.to_string()),
        None => format!("You have memories from {year}!"),
    };
    finish_message(
        format!("Memories from {year}"),
        body,
        "camera,calendar",
        kind,
        settings,
        test_mode,
        city,
    )
}

/// Render a person notification.
pub fn render_person(
    person_name: &str,
    kind: AssetKind,
    messages: &MessageSets,
    settings: &Settings,
    test_mode: bool,
    city: Option<&str>,
) -> PushMessage {
    let set = if kind == AssetKind::Video && !messages.video_person.is_empty() {
        &messages.video_person
    } else {
        &messages.person
    };
    let body = match set.choose(&mut rand::thread_rng()) {
        Some(template) => template.replace("{person_name}", person_name),
        None => format!("A photo of {person_name} from your library"),
    };
    finish_message(
        format!("Photos of {person_name}"),
        body,
        "camera,busts_in_silhouette",
        kind,
        settings,
        test_mode,
        city,
    )
}

fn finish_message(
    title: String,
    mut body: String,
    tags: &str,
    kind: AssetKind,
    settings: &Settings,
    test_mode: bool,
    city: Option<&str>,
) -> PushMessage {
    if kind == AssetKind::Video && settings.video_emoji && !body.contains('🎥') {
        body.push_str(" 🎥");
    }
    if let Some(city) = city {
        body.push_str(&format!(" 📍 {city}"));
    }
    let title = if test_mode {
        format!("[TEST] {title}")
    } else {
        title
    };
    PushMessage {
        title,
        body,
        tags: tags.to_string(),
        priority: "default".to_string(),
        click: Some(CLICK_URL.to_string()),
    }
}
