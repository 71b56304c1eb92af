//! Route handlers: thin translation between HTTP and the runtime.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use s3gc_core::errors::RestoreError;
use s3gc_core::models::{
    CycleReport, GcMetrics, GcOperation, HealthReport, OperationId, RestoreReport, StatusSummary,
};

use crate::{AdminState, ApiError};

pub async fn health(State(state): State<AdminState>) -> Json<HealthReport> {
    Json(state.runtime.health().await)
}

pub async fn status(State(state): State<AdminState>) -> Result<Json<StatusSummary>, ApiError> {
    Ok(Json(state.runtime.status()?))
}

pub async fn metrics(State(state): State<AdminState>) -> Result<Json<GcMetrics>, ApiError> {
    Ok(Json(state.runtime.metrics()?))
}

pub async fn config(State(state): State<AdminState>) -> Json<serde_json::Value> {
    Json(state.runtime.config().redacted())
}

pub async fn run(State(state): State<AdminState>) -> Result<Json<CycleReport>, ApiError> {
    Ok(Json(state.runtime.run_cycle(None).await?))
}

#[derive(Deserialize)]
pub struct OperationsQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    cursor: Option<String>,
}

fn default_limit() -> usize {
    50
}

#[derive(serde::Serialize)]
pub struct OperationsPage {
    items: Vec<GcOperation>,
    next_cursor: Option<String>,
}

pub async fn operations(
    State(state): State<AdminState>,
    Query(query): Query<OperationsQuery>,
) -> Result<Json<OperationsPage>, ApiError> {
    let limit = query.limit.clamp(1, 500);
    let (items, next_cursor) = state
        .runtime
        .list_operations(limit, query.cursor.as_deref())?;
    Ok(Json(OperationsPage { items, next_cursor }))
}

pub async fn rebuild(State(state): State<AdminState>) -> Result<Json<serde_json::Value>, ApiError> {
    let written = state.runtime.rebuild_registry().await?;
    Ok(Json(serde_json::json!({ "keys_written": written })))
}

#[derive(Deserialize)]
pub struct RestoreQuery {
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    skip_existing: bool,
}

pub async fn restore_operation(
    State(state): State<AdminState>,
    Path(operation_id): Path<String>,
    Query(query): Query<RestoreQuery>,
) -> Result<Json<RestoreReport>, ApiError> {
    let id = OperationId::parse(&operation_id).ok_or_else(|| {
        ApiError::from(s3gc_core::errors::GcError::from(
            RestoreError::UnknownOperation {
                operation_id: operation_id.clone(),
            },
        ))
    })?;
    Ok(Json(
        state
            .runtime
            .restore_operation(&id, query.dry_run, query.skip_existing)
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct RestoreKeyQuery {
    s3_key: String,
    #[serde(default)]
    dry_run: bool,
}

pub async fn restore_key(
    State(state): State<AdminState>,
    Query(query): Query<RestoreKeyQuery>,
) -> Result<Json<RestoreReport>, ApiError> {
    Ok(Json(
        state
            .runtime
            .restore_single_key(&query.s3_key, query.dry_run)
            .await?,
    ))
}
