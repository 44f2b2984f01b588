//! Person ranking — who shows up most in the library.

use serde::{Deserialize, Serialize};

use memoclaw_core::config::RetrySettings;
use memoclaw_core::error::Result;
use memoclaw_core::retry::with_retry;

use crate::immich::ImmichClient;

/// One entry from the people index.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A named person with their approximate asset count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPerson {
    pub id: String,
    pub name: String,
    pub asset_count: u64,
}

/// Fetch all people, count each named one's assets via a size-1 metadata
/// search, and return the `limit` most-photographed. A count query that
/// keeps failing demotes that person to count 0 instead of aborting.
pub async fn rank_top_persons(
    client: &ImmichClient,
    retry: &RetrySettings,
    limit: usize,
) -> Result<Vec<RankedPerson>> {
    let people = with_retry("people list", retry.max_attempts, retry.delay_seconds, || {
        client.fetch_people()
    })
    .await?;

    let mut ranked = Vec::new();
    for person in people.into_iter().filter(|p| !p.name.trim().is_empty()) {
        let label = format!("asset count for {}", person.name);
        let count = match with_retry(&label, retry.max_attempts, retry.delay_seconds, || {
            client.search_person_assets(&person.id, 1)
        })
        .await
        {
            Ok(page) => page.total,
            Err(e) => {
                tracing::warn!("⚠️ Keeping {} with count 0: {e}", person.name);
                0
            }
        };
        ranked.push(RankedPerson {
            id: person.id,
            name: person.name,
            asset_count: count,
        });
    }

    Ok(rank(ranked, limit))
}

/// Sort descending by count and keep the top `limit`.
fn rank(mut persons: Vec<RankedPerson>, limit: usize) -> Vec<RankedPerson> {
    persons.sort_by(|a, b| b.asset_count.cmp(&a.asset_count));
    persons.truncate(limit);
    persons
}
