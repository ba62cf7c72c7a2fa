pub mod error;
pub mod kpis;
pub mod notifications;
pub mod objectives;

use crate::app_state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn configure_objective_routes() -> Router<Arc<AppState>> {
    use objectives::*;

    Router::new()
        .route("/objectives", get(list_objectives).post(create_objective))
        .route("/objectives/tree", get(objective_tree))
        .route("/objectives/stats", get(objective_stats))
        .route(
            "/objectives/:id",
            get(get_objective)
                .put(update_objective)
                .delete(delete_objective),
        )
        .route("/objectives/:id/move", post(move_objective))
        .route("/objectives/:id/children", get(list_children))
        .route("/objectives/:id/ancestors", get(list_ancestors))
        .route("/objectives/:id/kpis", get(list_links).post(link_kpi))
        .route(
            "/objectives/:id/kpis/:kpi_id",
            put(update_link_weight).delete(unlink_kpi),
        )
        .route("/objectives/:id/progress", get(objective_progress))
        .route("/objectives/:id/recalculate", post(recalculate_objective))
}

pub fn configure_kpi_routes() -> Router<Arc<AppState>> {
    use kpis::*;

    Router::new()
        .route("/kpis", get(list_kpis).post(create_kpi))
        .route("/kpis/pending", get(pending_kpis))
        .route("/kpis/statistics", get(kpi_statistics))
        .route("/kpis/:id", get(get_kpi).put(update_kpi).delete(delete_kpi))
        .route("/kpis/:id/progress", put(update_progress))
        .route("/kpis/:id/submit", post(submit_kpi))
        .route("/kpis/:id/approve", post(approve_kpi))
        .route("/kpis/:id/reject", post(reject_kpi))
        .route("/kpis/:id/objectives", get(kpi_objectives))
        .route("/kpis/:id/history", get(kpi_history))
        .route("/kpis/:id/comments", get(list_comments).post(add_comment))
        .route("/comments/:id", delete(delete_comment))
}

pub fn configure_notification_routes() -> Router<Arc<AppState>> {
    use notifications::*;

    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(configure_objective_routes())
        .merge(configure_kpi_routes())
        .merge(configure_notification_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::test_state;
    use crate::session::extract::{USER_ID_HEADER, USER_ROLE_HEADER};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Client {
        app: Router,
    }

    impl Client {
        async fn new() -> Self {
            Self {
                app: router(test_state().await),
            }
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            user: Option<(i32, &str)>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some((id, role)) = user {
                builder = builder
                    .header(USER_ID_HEADER, id.to_string())
                    .header(USER_ROLE_HEADER, role);
            }
            let request = match body {
                Some(v) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(v.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }
    }

    const ADMIN: Option<(i32, &str)> = Some((1, "admin"));
    const MANAGER: Option<(i32, &str)> = Some((2, "manager"));
    const OWNER: Option<(i32, &str)> = Some((10, "employee"));

    fn objective_body(title: &str, level: &str, parent_id: Option<i64>) -> Value {
        json!({
            "title": title,
            "level": level,
            "parent_id": parent_id,
            "year": 2025,
            "period": "annual",
            "owner_id": 1
        })
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let client = Client::new().await;
        let (status, body) = client.call(Method::GET, "/objectives", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthenticated");

        let (status, _) = client
            .call(Method::GET, "/objectives", Some((1, "wizard")), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = client.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cascade_scenario_over_http() {
        let client = Client::new().await;
        let (status, a) = client
            .call(Method::POST, "/objectives", ADMIN, Some(objective_body("A", "company", None)))
            .await;
        assert_eq!(status, StatusCode::OK);
        let a_id = a["id"].as_i64().unwrap();
        let (_, b) = client
            .call(
                Method::POST,
                "/objectives",
                ADMIN,
                Some(objective_body("B", "unit", Some(a_id))),
            )
            .await;
        let b_id = b["id"].as_i64().unwrap();

        let mut kpi_ids = Vec::new();
        for (progress, weight) in [(80.0, 60.0), (40.0, 40.0)] {
            let (status, k) = client
                .call(
                    Method::POST,
                    "/kpis",
                    OWNER,
                    Some(json!({
                        "title": "k",
                        "year": 2025,
                        "quarter": "Q1",
                        "progress_percentage": progress
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            let kpi_id = k["id"].as_i64().unwrap();
            let (status, _) = client
                .call(
                    Method::POST,
                    &format!("/objectives/{}/kpis", b_id),
                    ADMIN,
                    Some(json!({ "kpi_id": kpi_id, "weight": weight })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            kpi_ids.push(kpi_id);
        }

        let (status, body) = client
            .call(
                Method::POST,
                &format!("/objectives/{}/kpis", b_id),
                ADMIN,
                Some(json!({ "kpi_id": kpi_ids[0], "weight": 10.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "DuplicateLink");

        let (_, progress) = client
            .call(Method::GET, &format!("/objectives/{}/progress", b_id), ADMIN, None)
            .await;
        assert_eq!(progress["progress"], 64.0);
        assert_eq!(progress["method"], "kpi_weighted");

        let (status, a) = client
            .call(Method::POST, &format!("/objectives/{}/recalculate", a_id), ADMIN, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(a["progress"], 64.0);

        let (status, body) = client
            .call(Method::DELETE, &format!("/objectives/{}", a_id), ADMIN, None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "HasChildren");

        let (status, _) = client
            .call(
                Method::DELETE,
                &format!("/objectives/{}?cascade=true", a_id),
                ADMIN,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = client
            .call(Method::GET, &format!("/objectives/{}", b_id), ADMIN, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");
    }

    #[tokio::test]
    async fn approval_errors_map_to_statuses() {
        let client = Client::new().await;
        let (_, k) = client
            .call(
                Method::POST,
                "/kpis",
                OWNER,
                Some(json!({ "title": "k", "year": 2025, "quarter": "Q3" })),
            )
            .await;
        let id = k["id"].as_i64().unwrap();
        assert_eq!(k["status"], "draft");

        let (status, body) = client
            .call(Method::POST, &format!("/kpis/{}/approve", id), MANAGER, None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "InvalidTransition");

        let (status, body) = client
            .call(
                Method::POST,
                &format!("/kpis/{}/reject", id),
                MANAGER,
                Some(json!({ "reason": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "ValidationError");

        let (status, _) = client
            .call(Method::POST, &format!("/kpis/{}/submit", id), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = client
            .call(Method::POST, &format!("/kpis/{}/approve", id), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");

        let (status, body) = client
            .call(
                Method::POST,
                &format!("/kpis/{}/reject", id),
                MANAGER,
                Some(json!({ "reason": "needs a baseline" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");

        let (_, count) = client
            .call(Method::GET, "/notifications/unread-count", OWNER, None)
            .await;
        assert_eq!(count["count"], 1);
        let (_, list) = client.call(Method::GET, "/notifications", OWNER, None).await;
        assert_eq!(list[0]["kind"], "kpi_rejected");
        let (status, body) = client
            .call(Method::POST, "/notifications/read-all", OWNER, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 1);
    }

    #[tokio::test]
    async fn hierarchy_violations_are_unprocessable() {
        let client = Client::new().await;
        let (_, a) = client
            .call(Method::POST, "/objectives", ADMIN, Some(objective_body("A", "company", None)))
            .await;
        let a_id = a["id"].as_i64().unwrap();

        let (status, body) = client
            .call(
                Method::POST,
                "/objectives",
                ADMIN,
                Some(objective_body("T", "team", Some(a_id))),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "InvalidHierarchy");

        let (_, u) = client
            .call(
                Method::POST,
                "/objectives",
                ADMIN,
                Some(objective_body("U", "unit", Some(a_id))),
            )
            .await;
        let u_id = u["id"].as_i64().unwrap();
        let (status, _) = client
            .call(
                Method::POST,
                &format!("/objectives/{}/move", a_id),
                ADMIN,
                Some(json!({ "new_parent_id": u_id })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, ancestors) = client
            .call(Method::GET, &format!("/objectives/{}/ancestors", u_id), ADMIN, None)
            .await;
        assert_eq!(ancestors[0]["id"], a_id);
        let (_, tree) = client.call(Method::GET, "/objectives/tree", ADMIN, None).await;
        assert_eq!(tree[0]["children"][0]["objective"]["id"], u_id);
    }
}
