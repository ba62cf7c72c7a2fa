use super::{Actor, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug)]
pub struct MissingIdentity(String);

impl IntoResponse for MissingIdentity {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthenticated", "message": self.0 })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = MissingIdentity;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| MissingIdentity(format!("missing {} header", USER_ID_HEADER)))?
            .parse::<i32>()
            .map_err(|_| MissingIdentity(format!("invalid {} header", USER_ID_HEADER)))?;
        let role = header(USER_ROLE_HEADER)
            .ok_or_else(|| MissingIdentity(format!("missing {} header", USER_ROLE_HEADER)))?
            .parse::<Role>()
            .map_err(MissingIdentity)?;

        Ok(Actor::new(user_id, role))
    }
}
