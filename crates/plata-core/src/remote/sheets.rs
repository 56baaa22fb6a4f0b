//! Google Apps Script web app backend
//!
//! The web app fronts a spreadsheet: `GET` returns the sheet rows as a JSON
//! entry array (bare or wrapped in `{ "entries": [...] }`), `POST` accepts
//! `{ "entries": [...], "mode": "append" | "replace" | "upsert" }`.

use super::{parse_api_error, EntryRemote, PushMode, RemoteError, RemoteResult};
use crate::models::Entry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Apps Script web app [`EntryRemote`]
#[derive(Debug)]
pub struct SheetsRemote {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PullBody {
    List(Vec<Entry>),
    Wrapped { entries: Vec<Entry> },
}

impl PullBody {
    fn into_entries(self) -> Vec<Entry> {
        match self {
            Self::List(entries) | Self::Wrapped { entries } => entries,
        }
    }
}

impl SheetsRemote {
    /// Create a web app backend for the given endpoint URL
    pub fn new(url: impl Into<String>) -> RemoteResult<Self> {
        let url = url.into().trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(RemoteError::NotConfigured(
                "Web app URL must not be empty".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RemoteError::NotConfigured(
                "Web app URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url,
        })
    }
}

#[async_trait]
impl EntryRemote for SheetsRemote {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn pull(&self) -> RemoteResult<Vec<Entry>> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        let payload: PullBody = serde_json::from_str(&body)
            .map_err(|e| RemoteError::InvalidPayload(format!("Unexpected sheet payload: {e}")))?;
        Ok(payload.into_entries())
    }

    async fn push(&self, entries: &[Entry], mode: PushMode) -> RemoteResult<()> {
        let body = json!({
            "entries": entries,
            "mode": mode.as_str(),
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        tracing::debug!(count = entries.len(), mode = mode.as_str(), "Pushed entries to sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(matches!(
            SheetsRemote::new(""),
            Err(RemoteError::NotConfigured(_))
        ));
        assert!(matches!(
            SheetsRemote::new("script.google.com/macros/x"),
            Err(RemoteError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let remote = SheetsRemote::new("https://script.google.com/macros/x/").unwrap();
        assert_eq!(remote.url, "https://script.google.com/macros/x");
    }

    #[test]
    fn test_pull_body_accepts_bare_array() {
        let raw = r#"[{"id":"018f2f48-0000-7000-8000-000000000001","type":"income","amount":10,"date":"2024-05-01"}]"#;
        let body: PullBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.into_entries().len(), 1);
    }

    #[test]
    fn test_pull_body_accepts_wrapped_array() {
        let raw = r#"{"entries":[{"id":"018f2f48-0000-7000-8000-000000000001","type":"payment","amount":3,"date":"2024-05-02"}]}"#;
        let body: PullBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.into_entries().len(), 1);
    }
}
