use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::kpi::model::{LinkRequest, LinkView, WeightRequest};
use crate::objective::model::{
    CreateObjectiveRequest, MoveObjectiveRequest, Objective, ObjectiveDetail, ObjectiveFilter,
    ObjectivePage, ObjectiveStats, ObjectiveSummary, TreeNode, UpdateObjectiveRequest,
};
use crate::progress::ProgressBreakdown;
use crate::session::Actor;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    pub root_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecalculateQuery {
    #[serde(default)]
    pub subtree: bool,
}

pub async fn list_objectives(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<ObjectiveFilter>,
) -> Result<Json<ObjectivePage>, ApiError> {
    Ok(Json(state.objectives.list(&actor, filter).await?))
}

pub async fn create_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateObjectiveRequest>,
) -> Result<Json<Objective>, ApiError> {
    Ok(Json(state.objectives.create(&actor, req).await?))
}

pub async fn get_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<ObjectiveDetail>, ApiError> {
    Ok(Json(state.objectives.get(&actor, id).await?))
}

pub async fn update_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<UpdateObjectiveRequest>,
) -> Result<Json<Objective>, ApiError> {
    Ok(Json(state.objectives.update(&actor, id, req).await?))
}

pub async fn delete_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.objectives.delete(&actor, id, query.cascade).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn move_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<MoveObjectiveRequest>,
) -> Result<Json<Objective>, ApiError> {
    Ok(Json(
        state.objectives.move_to(&actor, id, req.new_parent_id).await?,
    ))
}

pub async fn objective_tree(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<TreeQuery>,
) -> Result<Json<Vec<TreeNode>>, ApiError> {
    Ok(Json(state.objectives.tree(query.root_id).await?))
}

pub async fn objective_stats(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<ObjectiveFilter>,
) -> Result<Json<ObjectiveStats>, ApiError> {
    Ok(Json(state.objectives.stats(&actor, filter).await?))
}

pub async fn list_children(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ObjectiveSummary>>, ApiError> {
    Ok(Json(state.objectives.children(id).await?))
}

pub async fn list_ancestors(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ObjectiveSummary>>, ApiError> {
    Ok(Json(state.objectives.ancestors(id).await?))
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<LinkView>>, ApiError> {
    Ok(Json(state.objectives.links(id).await?))
}

pub async fn link_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<LinkView>, ApiError> {
    Ok(Json(state.objectives.link(&actor, id, req).await?))
}

pub async fn update_link_weight(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, kpi_id)): Path<(i32, i32)>,
    Json(req): Json<WeightRequest>,
) -> Result<Json<LinkView>, ApiError> {
    Ok(Json(
        state
            .objectives
            .update_weight(&actor, id, kpi_id, req.weight)
            .await?,
    ))
}

pub async fn unlink_kpi(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, kpi_id)): Path<(i32, i32)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.objectives.unlink(&actor, id, kpi_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn objective_progress(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<ProgressBreakdown>, ApiError> {
    Ok(Json(state.progress.breakdown(id).await?))
}

pub async fn recalculate_objective(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
    Query(query): Query<RecalculateQuery>,
) -> Result<Json<Objective>, ApiError> {
    if query.subtree {
        state.progress.recalculate_subtree(id).await?;
        return Ok(Json(state.objectives.get(&actor, id).await?.objective));
    }
    Ok(Json(state.progress.recalculate(id).await?))
}
