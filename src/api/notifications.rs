use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::session::Actor;
use crate::storage::entity::notification::Model as Notification;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.notifications.list(&actor, query.unread_only).await?))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.notifications.unread_count(&actor).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.notifications.mark_read(&actor, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state.notifications.mark_all_read(&actor).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
