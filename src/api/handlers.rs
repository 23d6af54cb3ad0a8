//! HTTP request handlers
//!
//! Each handler translates one request into a record-store query or an
//! engine call; errors become `{error, message}` bodies via [`ApiError`].

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    auth::AuthenticatedActor,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    AppState,
};
use crate::dashboard::{dashboard_rows, detailed_stats, DashboardQuery, DashboardRow, DetailedStats};
use crate::observability::{workflow_metrics, WorkflowStats};
use crate::records::{RecordId, TableQuery, TableStats};
use crate::workflows::{HistoryEntry, Remark, StageDescriptor};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub source: String,
    pub workflow: WorkflowStats,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub count: usize,
    pub rows: Vec<DashboardRow>,
}

#[derive(Debug, Serialize)]
pub struct ColumnValuesResponse {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub stage: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct RemarkResponse {
    pub record_id: RecordId,
    pub stage: String,
    pub text: String,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl From<&Remark> for RemarkResponse {
    fn from(remark: &Remark) -> Self {
        Self {
            record_id: remark.record_id(),
            stage: remark.stage().label().to_string(),
            text: remark.text().to_string(),
            version: remark.version(),
            updated_at: remark.updated_at(),
            updated_by: remark.updated_by().map(|actor| actor.name().to_string()),
            history: remark.history().iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub record_id: RecordId,
    pub entries: Vec<HistoryEntry>,
}

/// Health check handler
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        source: state.records.source_name().to_string(),
        workflow: workflow_metrics().get_stats(),
    })
}

/// Ordered stage labels with terminal flags
pub async fn stages(State(state): State<Arc<AppState>>) -> Json<Vec<StageDescriptor>> {
    Json(state.engine.catalog().describe())
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
) -> Result<Json<TableStats>, ApiError> {
    Ok(Json(state.records.stats().await?))
}

/// Table statistics plus numeric column summaries and per-stage counts
pub async fn detailed(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
) -> Result<Json<DetailedStats>, ApiError> {
    Ok(Json(detailed_stats(&state.records, &state.engine).await?))
}

/// Dashboard rows with their current remark. `limit` caps the result,
/// `stage` keeps rows whose remark is in that stage, and every other query
/// parameter is a column filter.
pub async fn data(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
    ApiQuery(params): ApiQuery<BTreeMap<String, String>>,
) -> Result<Json<DataResponse>, ApiError> {
    let query = dashboard_query(params, state.default_limit)?;
    let rows = dashboard_rows(&state.records, &state.engine, &query).await?;
    Ok(Json(DataResponse {
        count: rows.len(),
        rows,
    }))
}

fn dashboard_query(
    mut params: BTreeMap<String, String>,
    default_limit: usize,
) -> Result<DashboardQuery, ApiError> {
    let stage = params
        .remove("stage")
        .filter(|stage| !stage.trim().is_empty());
    let limit = match params.remove("limit") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("limit must be a number, got {raw:?}")))?,
        None => default_limit,
    };

    Ok(DashboardQuery {
        table: TableQuery {
            limit: Some(limit),
            filters: params
                .into_iter()
                .filter(|(_, value)| !value.trim().is_empty())
                .collect(),
        },
        stage,
    })
}

/// Distinct values of one column, used by the dashboard filter dropdowns
pub async fn column_values(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
    ApiPath(column): ApiPath<String>,
) -> Result<Json<ColumnValuesResponse>, ApiError> {
    let values = state.records.distinct(&column).await?;
    Ok(Json(ColumnValuesResponse { column, values }))
}

/// Drop the cached table so the next read refetches from the source
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
) -> Result<Json<TableStats>, ApiError> {
    state.records.refresh().await;
    Ok(Json(state.records.stats().await?))
}

pub async fn get_remark(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
    ApiPath(record_id): ApiPath<RecordId>,
) -> Result<Json<RemarkResponse>, ApiError> {
    let remark = state.engine.get_current_state(record_id).await?;
    Ok(Json(RemarkResponse::from(&remark)))
}

pub async fn apply_transition(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiPath(record_id): ApiPath<RecordId>,
    ApiJson(request): ApiJson<TransitionRequest>,
) -> Result<Json<RemarkResponse>, ApiError> {
    let remark = state
        .engine
        .apply_transition(record_id, &request.stage, &request.text, &actor)
        .await?;
    Ok(Json(RemarkResponse::from(&remark)))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedActor,
    ApiPath(record_id): ApiPath<RecordId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.engine.get_history(record_id).await?;
    Ok(Json(HistoryResponse {
        record_id,
        entries: history.iter().cloned().collect(),
    }))
}
