//! GitHub Gist backend
//!
//! The remote snapshot lives in a single JSON file inside a Gist. A pull
//! reads the file content; a push replaces it wholesale, so every push is
//! effectively [`PushMode::ReplaceAll`] regardless of the requested mode.

use super::{parse_api_error, EntryRemote, PushMode, RemoteError, RemoteResult};
use crate::models::Entry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

const GIST_FILENAME: &str = "plata.json";
const GITHUB_API: &str = "https://api.github.com";

/// Gist-backed [`EntryRemote`]
pub struct GistRemote {
    client: reqwest::Client,
    token: String,
    gist_id: String,
}

impl std::fmt::Debug for GistRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GistRemote")
            .field("token", &"[REDACTED]")
            .field("gist_id", &self.gist_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
}

impl GistRemote {
    /// Create a Gist backend for the given token and gist id
    pub fn new(token: impl Into<String>, gist_id: impl Into<String>) -> RemoteResult<Self> {
        let token = token.into().trim().to_string();
        let gist_id = gist_id.into().trim().to_string();
        if token.is_empty() {
            return Err(RemoteError::NotConfigured(
                "GitHub token must not be empty".to_string(),
            ));
        }
        if gist_id.is_empty() {
            return Err(RemoteError::NotConfigured(
                "Gist id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("plata")
                .build()?,
            token,
            gist_id,
        })
    }

    fn url(&self) -> String {
        format!("{GITHUB_API}/gists/{}", self.gist_id)
    }
}

/// Extract the entry array from a Gist response
///
/// A Gist without the data file yet is an empty snapshot, not an error.
fn extract_entries(response: GistResponse) -> RemoteResult<Vec<Entry>> {
    let Some(file) = response.files.get(GIST_FILENAME) else {
        return Ok(Vec::new());
    };
    let Some(content) = file.content.as_deref() else {
        return Ok(Vec::new());
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(content)
        .map_err(|e| RemoteError::InvalidPayload(format!("Gist file is not an entry array: {e}")))
}

#[async_trait]
impl EntryRemote for GistRemote {
    fn name(&self) -> &str {
        "gist"
    }

    async fn pull(&self) -> RemoteResult<Vec<Entry>> {
        let response = self
            .client
            .get(self.url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<GistResponse>().await?;
        extract_entries(payload)
    }

    async fn push(&self, entries: &[Entry], _mode: PushMode) -> RemoteResult<()> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;
        let body = json!({
            "files": { GIST_FILENAME: { "content": content } }
        });

        let response = self
            .client
            .patch(self.url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        tracing::debug!(count = entries.len(), "Pushed entries to gist");
        Ok(())
    }
}
