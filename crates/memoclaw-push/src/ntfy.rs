//! ntfy client — attachment upload + notification publish.

use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use memoclaw_core::error::{MemoClawError, Result};

/// Timeout for the publish POST.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for attachment uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// ntfy server client.
pub struct NtfyClient {
    base_url: String,
    client: reqwest::Client,
}

/// Optional basic auth for a protected ntfy server.
#[derive(Debug, Clone)]
pub struct PushAuth {
    pub username: String,
    pub password: String,
}

/// One rendered notification, ready to publish.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Comma-separated ntfy tags.
    pub tags: String,
    pub priority: String,
    pub click: Option<String>,
}

impl NtfyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Upload thumbnail bytes if given, then publish. The upload is best
    /// effort — a refused attachment still lets the message go out.
    pub async fn send(
        &self,
        topic: &str,
        message: &PushMessage,
        thumbnail: Option<&[u8]>,
        auth: Option<&PushAuth>,
    ) -> Result<()> {
        let mut attach_url = None;
        if let Some(data) = thumbnail {
            attach_url = self.upload_attachment(data, "memory.jpg", auth).await?;
        }
        self.publish(topic, message, attach_url.as_deref(), auth)
            .await
    }

    /// PUT bytes to an ephemeral topic; ntfy answers with a hosted URL.
    /// Any non-200 answer means "no attachment", not failure.
    pub async fn upload_attachment(
        &self,
        data: &[u8],
        filename: &str,
        auth: Option<&PushAuth>,
    ) -> Result<Option<String>> {
        let topic = ephemeral_topic();
        let mut req = self
            .client
            .put(format!("{}/{topic}", self.base_url))
            .header("Filename", filename)
            .body(data.to_vec())
            .timeout(UPLOAD_TIMEOUT);
        if let Some(auth) = auth {
            req = req.basic_auth(&auth.username, Some(&auth.password));
        }
        let resp = req
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("attachment upload failed: {e}")))?;

        if resp.status() != reqwest::StatusCode::OK {
            tracing::warn!("⚠️ Attachment upload refused ({})", resp.status());
            return Ok(None);
        }
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("invalid upload response: {e}")))?;
        Ok(body.attachment.and_then(|a| a.url))
    }

    /// POST the notification to the user's topic.
    pub async fn publish(
        &self,
        topic: &str,
        message: &PushMessage,
        attach_url: Option<&str>,
        auth: Option<&PushAuth>,
    ) -> Result<()> {
        let mut req = self
            .client
            .post(format!("{}/{topic}", self.base_url))
            .header("Title", header_value(&message.title))
            .header("Tags", message.tags.as_str())
            .header("Priority", message.priority.as_str())
            .body(message.body.clone().into_bytes())
            .timeout(PUBLISH_TIMEOUT);
        if let Some(click) = &message.click {
            req = req.header("Click", click.as_str());
        }
        if let Some(url) = attach_url {
            req = req.header("Attach", url);
        }
        if let Some(auth) = auth {
            req = req.basic_auth(&auth.username, Some(&auth.password));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| MemoClawError::Upstream(format!("publish failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MemoClawError::Upstream(format!(
                "ntfy error {status}: {body}"
            )));
        }
        tracing::debug!("📨 Published to topic {topic}");
        Ok(())
    }
}

/// HTTP header values must stay ASCII — percent-encode anything else.
fn header_value(s: &str) -> String {
    if s.is_ascii() {
        s.to_string()
    } else {
        urlencoding::encode(s).into_owned()
    }
}

/// Throwaway upload topic, unique enough for concurrent slot runs.
fn ephemeral_topic() -> String {
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("upload-{:x}-{:04x}", t.as_secs(), rand::random::<u16>())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    attachment: Option<UploadAttachment>,
}

#[derive(Debug, Deserialize)]
struct UploadAttachment {
    #[serde(default)]
    url: Option<String>,
}
