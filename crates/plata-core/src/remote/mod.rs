//! Remote sync backends
//!
//! Each backend implements [`EntryRemote`]: pull a full snapshot of entries,
//! push entries back. Backends differ in push semantics (a Gist file can only
//! be replaced wholesale; a spreadsheet web app supports append/upsert), so
//! push takes an advisory [`PushMode`].

mod gist;
mod sheets;

pub use gist::GistRemote;
pub use sheets::SheetsRemote;

use crate::models::Entry;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors from remote sync backends
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote not configured: {0}")]
    NotConfigured(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// How a push should be applied on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Replace the full remote snapshot
    ReplaceAll,
    /// Append rows without touching existing ones
    Append,
    /// Insert or update keyed by id
    Upsert,
}

impl PushMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReplaceAll => "replace",
            Self::Append => "append",
            Self::Upsert => "upsert",
        }
    }
}

/// A remote store of entries that can be pulled from and pushed to
#[async_trait]
pub trait EntryRemote: Send + Sync {
    /// Backend key, used for pending-id bookkeeping in settings
    fn name(&self) -> &str;

    /// Fetch the full remote snapshot
    async fn pull(&self) -> RemoteResult<Vec<Entry>>;

    /// Push entries to the remote
    async fn push(&self, entries: &[Entry], mode: PushMode) -> RemoteResult<()>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Render a non-success response into a readable API error message
fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_error_prefers_message_field() {
        let msg = parse_api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Validation Failed"}"#,
        );
        assert_eq!(msg, "Validation Failed (422)");
    }

    #[test]
    fn test_parse_api_error_falls_back_to_body() {
        let msg = parse_api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(msg, "upstream down (502)");
    }

    #[test]
    fn test_parse_api_error_empty_body() {
        let msg = parse_api_error(StatusCode::NOT_FOUND, "");
        assert_eq!(msg, "HTTP 404");
    }

    #[test]
    fn test_push_mode_wire_names() {
        assert_eq!(PushMode::ReplaceAll.as_str(), "replace");
        assert_eq!(PushMode::Append.as_str(), "append");
        assert_eq!(PushMode::Upsert.as_str(), "upsert");
    }
}
