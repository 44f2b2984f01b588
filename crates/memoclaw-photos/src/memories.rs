//! Memory records and the per-date digest the selector works from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One curated memory as Immich returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMemory {
    /// ISO timestamp of the day the memory should surface.
    #[serde(rename = "showAt", default)]
    pub show_at: String,
    #[serde(default)]
    pub data: MemoryData,
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryData {
    #[serde(default)]
    pub year: Option<i32>,
}

/// Wire-level asset inside a memory. Id can be absent on broken records.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAsset {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: AssetKind,
}

/// A usable photo or video asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: AssetKind,
    /// Capture time, present on search results.
    #[serde(rename = "fileCreatedAt", default)]
    pub file_created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetKind {
    #[default]
    Image,
    Video,
}

/// Keep only memories whose show date falls on `date`.
pub fn filter_for_date(memories: &[RawMemory], date: NaiveDate) -> Vec<RawMemory> {
    let prefix = date.to_string();
    memories
        .iter()
        .filter(|m| m.show_at.starts_with(&prefix))
        .cloned()
        .collect()
}

/// Everything one day's memories offer, bucketed by year.
#[derive(Debug, Clone, Default)]
pub struct MemoryDigest {
    pub total_assets: u32,
    pub image_count: u32,
    pub video_count: u32,
    /// Distinct years, newest first.
    pub years: Vec<i32>,
    pub by_year: HashMap<i32, YearBucket>,
}

#[derive(Debug, Clone, Default)]
pub struct YearBucket {
    pub images: u32,
    pub videos: u32,
    pub assets: Vec<Asset>,
}

/// Flatten raw memories into a digest. Assets without an id are dropped;
/// a missing type counts as an image. Memories without a year are skipped.
pub fn parse_memories(memories: &[RawMemory]) -> MemoryDigest {
    let mut digest = MemoryDigest::default();

    for memory in memories {
        let Some(year) = memory.data.year else {
            continue;
        };
        for raw in &memory.assets {
            let Some(id) = raw.id.clone() else {
                continue;
            };
            let bucket = digest.by_year.entry(year).or_default();
            bucket.assets.push(Asset {
                id,
                kind: raw.kind,
                file_created_at: None,
            });
            digest.total_assets += 1;
            match raw.kind {
                AssetKind::Video => {
                    digest.video_count += 1;
                    bucket.videos += 1;
                }
                AssetKind::Image => {
                    digest.image_count += 1;
                    bucket.images += 1;
                }
            }
        }
    }

    digest.years = digest.by_year.keys().copied().collect();
    digest.years.sort_unstable_by(|a, b| b.cmp(a));
    digest
}
