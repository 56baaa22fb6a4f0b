use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use plata_core::db::{Database, EntryRepository, LibSqlEntryRepository};
use plata_core::export::{render_csv_export, suggested_export_file_name, ExportFormat};
use plata_core::import::entries_from_csv;
use plata_core::models::{now_ms, Entry, EntryId, EntryKind};
use plata_core::remote::{EntryRemote, GistRemote, PushMode, SheetsRemote};
use plata_core::sync::{EngineConfig, SyncEngine, SyncService};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    gist: Option<Arc<SyncService>>,
    sheets: Option<Arc<SheetsRemote>>,
    sheets_csv_url: Option<String>,
    engine: Option<Arc<SyncEngine>>,
}

impl AppState {
    /// Assemble services and the optional background engine from config
    pub fn from_config(config: &AppConfig, db: Arc<Database>) -> Result<Self, AppError> {
        let gist = match &config.gist {
            Some(gist) => {
                let remote = GistRemote::new(&gist.token, &gist.gist_id)?;
                Some(Arc::new(SyncService::new(db.clone(), Box::new(remote))))
            }
            None => None,
        };

        let sheets = match &config.sheets_webapp_url {
            Some(url) => Some(Arc::new(SheetsRemote::new(url)?)),
            None => None,
        };

        // The engine owns its own backend instance over the same endpoint
        let engine = match (&config.sheets_webapp_url, config.auto_sync) {
            (Some(url), true) => {
                let remote = SheetsRemote::new(url)?;
                let service = Arc::new(SyncService::new(db.clone(), Box::new(remote)));
                Some(Arc::new(SyncEngine::start(
                    service,
                    EngineConfig {
                        debounce: config.sync_debounce,
                        poll_interval: config.sync_poll_interval,
                    },
                )))
            }
            _ => None,
        };

        Ok(Self {
            db,
            gist,
            sheets,
            sheets_csv_url: config.sheets_csv_url.clone(),
            engine,
        })
    }

    #[cfg(test)]
    fn bare(db: Arc<Database>) -> Self {
        Self {
            db,
            gist: None,
            sheets: None,
            sheets_csv_url: None,
            engine: None,
        }
    }

    fn nudge_sync(&self) {
        if let Some(engine) = &self.engine {
            engine.notify_edit();
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/{id}", delete(delete_entry))
        .route("/api/export/csv", get(export_csv))
        .route("/api/sync/pull", post(sync_pull))
        .route("/api/sync/push", post(sync_push))
        .route("/api/sync/sheets/pull", post(sheets_pull))
        .route("/api/sync/sheets/push", post(sheets_push))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, AppError> {
    let repo = LibSqlEntryRepository::new(state.db.connection());
    Ok(Json(repo.list().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewEntryRequest {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    amount: Option<Decimal>,
    principal: Option<Decimal>,
    date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    #[serde(default)]
    note: String,
    #[serde(default)]
    who: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    account: String,
    #[serde(default)]
    tags: String,
}

async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<NewEntryRequest>,
) -> Result<Json<Entry>, AppError> {
    let kind: EntryKind = request
        .kind
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Field 'type' is required"))?
        .parse()?;
    let amount = request
        .amount
        .ok_or_else(|| AppError::bad_request("Field 'amount' is required"))?;
    if amount < Decimal::ZERO {
        return Err(AppError::bad_request("Field 'amount' must not be negative"));
    }
    let date = request
        .date
        .ok_or_else(|| AppError::bad_request("Field 'date' is required"))?;

    let id = match request.id.as_deref() {
        Some(raw) => raw
            .parse::<EntryId>()
            .map_err(|_| AppError::bad_request(format!("Invalid entry id '{raw}'")))?,
        None => EntryId::new(),
    };

    // The server owns the update timestamp regardless of what the client sent
    let entry = Entry {
        id,
        kind,
        amount,
        principal: request.principal,
        date,
        due_date: request.due_date,
        note: request.note,
        who: request.who,
        category: request.category,
        account: request.account,
        tags: request.tags,
        updated_at: now_ms(),
    };

    let repo = LibSqlEntryRepository::new(state.db.connection());
    repo.upsert(&entry).await?;
    state.nudge_sync();

    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id: EntryId = id
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid entry id '{id}'")))?;

    let repo = LibSqlEntryRepository::new(state.db.connection());
    repo.delete(&id).await?;
    state.nudge_sync();

    Ok(Json(json!({ "ok": true })))
}

async fn export_csv(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    let repo = LibSqlEntryRepository::new(state.db.connection());
    let entries = repo.list().await?;
    let rendered = render_csv_export(&entries)?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        suggested_export_file_name(ExportFormat::Csv, now_ms())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        rendered,
    ))
}

async fn sync_pull(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let service = state
        .gist
        .as_ref()
        .ok_or_else(|| AppError::bad_request("Gist sync is not configured"))?;
    let merged = service.pull_and_merge().await?.unwrap_or(0);
    Ok(Json(json!({ "ok": true, "merged": merged })))
}

async fn sync_push(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let service = state
        .gist
        .as_ref()
        .ok_or_else(|| AppError::bad_request("Gist sync is not configured"))?;
    let pushed = service.push_all().await?;
    Ok(Json(json!({ "ok": true, "pushed": pushed })))
}

async fn sheets_pull(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let entries = if let Some(url) = &state.sheets_csv_url {
        let response = reqwest::get(url)
            .await
            .map_err(|e| AppError::external(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::external(format!(
                "Sheet CSV fetch failed: HTTP {}",
                response.status().as_u16()
            )));
        }
        let text = response
            .text()
            .await
            .map_err(|e| AppError::external(e.to_string()))?;
        entries_from_csv(&text)?
    } else if let Some(remote) = &state.sheets {
        remote.pull().await?
    } else {
        return Err(AppError::bad_request("Sheets sync is not configured"));
    };

    let repo = LibSqlEntryRepository::new(state.db.connection());
    repo.upsert_many(&entries).await?;

    tracing::info!(imported = entries.len(), "Imported entries from sheet");
    Ok(Json(json!({ "ok": true, "imported": entries.len() })))
}

async fn sheets_push(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let remote = state
        .sheets
        .as_ref()
        .ok_or_else(|| AppError::bad_request("Sheets sync is not configured"))?;

    let repo = LibSqlEntryRepository::new(state.db.connection());
    let entries = repo.list().await?;
    remote.push(&entries, PushMode::ReplaceAll).await?;

    Ok(Json(json!({ "ok": true, "pushed": entries.len() })))
}
