use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::kpi::model::{
    ApproveRequest, Comment, CommentRequest, CreateKpiRequest, HistoryEntry, Kpi, KpiFilter,
    KpiPage, KpiStatistics, LinkView, ProgressUpdateRequest, RejectRequest, UpdateKpiRequest,
};
use crate::session::Actor;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub year: Option<i32>,
}

pub async fn list_kpis(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<KpiFilter>,
) -> Result<Json<KpiPage>, ApiError> {
    Ok(Json(state.kpis.list(&actor, filter).await?))
}

pub async fn create_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateKpiRequest>,
) -> Result<Json<Kpi>, ApiError> {
    Ok(Json(state.kpis.create(&actor, req).await?))
}

pub async fn get_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Kpi>, ApiError> {
    Ok(Json(state.kpis.get(&actor, id).await?))
}

pub async fn update_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<UpdateKpiRequest>,
) -> Result<Json<Kpi>, ApiError> {
    Ok(Json(state.kpis.update(&actor, id, req).await?))
}

pub async fn delete_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kpis.delete(&actor, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<ProgressUpdateRequest>,
) -> Result<Json<Kpi>, ApiError> {
    Ok(Json(state.kpis.update_progress(&actor, id, req).await?))
}

pub async fn submit_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Kpi>, ApiError> {
    Ok(Json(state.kpis.submit(&actor, id).await?))
}

pub async fn approve_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Kpi>, ApiError> {
    let comment = body.and_then(|Json(req)| req.comment);
    Ok(Json(state.kpis.approve(&actor, id, comment).await?))
}

/// A missing body is treated as a missing reason.
pub async fn reject_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<Kpi>, ApiError> {
    let reason = body.and_then(|Json(req)| req.reason);
    Ok(Json(state.kpis.reject(&actor, id, reason).await?))
}

pub async fn pending_kpis(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(page): Query<PageQuery>,
) -> Result<Json<KpiPage>, ApiError> {
    let limit = page.limit.unwrap_or(100);
    Ok(Json(state.kpis.pending(&actor, page.offset, limit).await?))
}

pub async fn kpi_statistics(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<KpiStatistics>, ApiError> {
    Ok(Json(state.kpis.statistics(&actor, query.year).await?))
}

pub async fn kpi_objectives(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<LinkView>>, ApiError> {
    Ok(Json(state.kpis.objectives_for_kpi(&actor, id).await?))
}

pub async fn kpi_history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.kpis.history(&actor, id).await?))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.kpis.comments(&actor, id).await?))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.kpis.add_comment(&actor, id, &req.body).await?))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kpis.delete_comment(&actor, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
