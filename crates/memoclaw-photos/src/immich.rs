//! Immich API client — read-only HTTP queries.
//!
//! Immich answers some endpoints in two shapes depending on version (bare
//! array vs wrapped object). Both decodes live here as untagged enums and
//! are normalized before anything leaves this module.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use memoclaw_core::error::{MemoClawError, Result};

use crate::memories::{Asset, RawMemory};
use crate::persons::PersonRecord;

/// Timeout for JSON endpoints.
const API_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for binary media transfers.
const MEDIA_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only Immich client for one user's API key.
pub struct ImmichClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// All memories the server has curated for this user.
    pub async fn fetch_memories(&self) -> Result<Vec<RawMemory>> {
        let resp = self
            .client
            .get(self.api_url("memories"))
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("memories fetch failed: {e}")))?;
        let resp = check_status(resp, "memories").await?;
        resp.json()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("invalid memories response: {e}")))
    }

    /// Every recognized person in the library.
    pub async fn fetch_people(&self) -> Result<Vec<PersonRecord>> {
        let resp = self
            .client
            .get(self.api_url("people"))
            .header("x-api-key", &self.api_key)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("people fetch failed: {e}")))?;
        let resp = check_status(resp, "people").await?;
        let body: PeopleResponse = resp
            .json()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("invalid people response: {e}")))?;
        Ok(body.into_people())
    }

    /// Metadata search scoped to one person. `size = 1` is the cheap way to
    /// read the server's approximate asset total.
    pub async fn search_person_assets(&self, person_id: &str, size: u32) -> Result<SearchPage> {
        let resp = self
            .client
            .post(self.api_url("search/metadata"))
            .header("x-api-key", &self.api_key)
            .json(&json!({ "personIds": [person_id], "size": size }))
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("metadata search failed: {e}")))?;
        let resp = check_status(resp, "search/metadata").await?;
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("invalid search response: {e}")))?;
        Ok(body.assets.into_page())
    }

    /// Single asset detail: recognized faces plus EXIF.
    pub async fn fetch_asset(&self, asset_id: &str) -> Result<AssetDetail> {
        let resp = self
            .client
            .get(self.api_url(&format!("assets/{asset_id}")))
            .header("x-api-key", &self.api_key)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("asset fetch failed: {e}")))?;
        let resp = check_status(resp, "assets").await?;
        resp.json()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("invalid asset response: {e}")))
    }

    /// Thumbnail bytes for an asset.
    pub async fn fetch_thumbnail(&self, asset_id: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(self.api_url(&format!("assets/{asset_id}/thumbnail")))
            .query(&[("size", "thumbnail")])
            .header("x-api-key", &self.api_key)
            .timeout(MEDIA_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("thumbnail fetch failed: {e}")))?;
        let resp = check_status(resp, "thumbnail").await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("thumbnail read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Turn a non-2xx response into an Upstream error carrying status and body.
async fn check_status(resp: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(MemoClawError::Upstream(format!(
        "Immich {endpoint} error {status}: {body}"
    )))
}

// --- Immich response shapes ---

/// `GET /api/people` — bare array on older servers, wrapped on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeopleResponse {
    Wrapped { people: Vec<PersonRecord> },
    Bare(Vec<PersonRecord>),
}

impl PeopleResponse {
    fn into_people(self) -> Vec<PersonRecord> {
        match self {
            PeopleResponse::Wrapped { people } => people,
            PeopleResponse::Bare(people) => people,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    assets: SearchAssets,
}

/// `POST /api/search/metadata` — paged object or bare item array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchAssets {
    Paged {
        items: Vec<Asset>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<Asset>),
}

impl SearchAssets {
    fn into_page(self) -> SearchPage {
        match self {
            SearchAssets::Paged { items, total } => {
                let total = total.unwrap_or(items.len() as u64);
                SearchPage { items, total }
            }
            SearchAssets::Bare(items) => SearchPage {
                total: items.len() as u64,
                items,
            },
        }
    }
}

/// Normalized search result.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<Asset>,
    /// Server-side approximate match count, independent of page size.
    pub total: u64,
}

/// `GET /api/assets/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDetail {
    #[serde(default)]
    pub people: Vec<AssetFace>,
    #[serde(rename = "exifInfo", default)]
    pub exif: Option<ExifInfo>,
}

/// A face Immich recognized in one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetFace {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExifInfo {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_people_decodes_both_shapes() {
        let bare: PeopleResponse = serde_json::from_str(r#"[{"id":"p1","name":"Ada"}]"#).unwrap();
        assert_eq!(bare.into_people()[0].id, "p1");

        let wrapped: PeopleResponse =
            serde_json::from_str(r#"{"people":[{"id":"p2","name":"Grace"}]}"#).unwrap();
        let people = wrapped.into_people();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "Grace");
    }

    #[test]
    fn test_search_decodes_both_shapes() {
        let paged: SearchResponse = serde_json::from_str(
            r#"{"assets":{"items":[{"id":"a1","type":"IMAGE"}],"total":42}}"#,
        )
        .unwrap();
        let page = paged.assets.into_page();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 42);

        let bare: SearchResponse =
            serde_json::from_str(r#"{"assets":[{"id":"a2","type":"VIDEO"}]}"#).unwrap();
        let page = bare.assets.into_page();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "a2");
    }

    #[test]
    fn test_search_total_falls_back_to_item_count() {
        let paged: SearchResponse =
            serde_json::from_str(r#"{"assets":{"items":[{"id":"a1"},{"id":"a2"}]}}"#).unwrap();
        assert_eq!(paged.assets.into_page().total, 2);
    }

    #[test]
    fn test_asset_detail_tolerates_missing_fields() {
        let detail: AssetDetail = serde_json::from_str(r#"{}"#).unwrap();
        assert!(detail.people.is_empty());
        assert!(detail.exif.is_none());

        let detail: AssetDetail = serde_json::from_str(
            r#"{"people":[{"id":"p1","name":"Ada"}],"exifInfo":{"city":"Lisbon"}}"#,
        )
        .unwrap();
        assert_eq!(detail.people[0].name, "Ada");
        assert_eq!(detail.exif.unwrap().city.as_deref(), Some("Lisbon"));
    }

    #[test]
    fn test_api_url_strips_trailing_slash() {
        let client = ImmichClient::new("http://immich.local/", "key");
        assert_eq!(client.api_url("memories"), "http://immich.local/api/memories");
    }
}
