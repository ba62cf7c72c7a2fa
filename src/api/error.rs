use crate::error::OkrError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;

/// HTTP face of [`OkrError`].
#[derive(Debug)]
pub struct ApiError(pub OkrError);

impl From<OkrError> for ApiError {
    fn from(err: OkrError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OkrError::NotFound { .. } | OkrError::LinkNotFound { .. } => StatusCode::NOT_FOUND,
            OkrError::InvalidHierarchy(_)
            | OkrError::InvalidWeight(_)
            | OkrError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OkrError::HasChildren(_)
            | OkrError::DuplicateLink { .. }
            | OkrError::InvalidTransition { .. } => StatusCode::CONFLICT,
            OkrError::Forbidden(_) => StatusCode::FORBIDDEN,
            OkrError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            OkrError::Database(e) => {
                error!("Storage failure: {}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(serde_json::json!({ "error": self.0.kind(), "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    #[test]
    fn every_kind_has_its_status() {
        let cases = [
            (OkrError::not_found("kpi", 1), StatusCode::NOT_FOUND),
            (
                OkrError::LinkNotFound { objective_id: 1, kpi_id: 2 },
                StatusCode::NOT_FOUND,
            ),
            (OkrError::hierarchy("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (OkrError::InvalidWeight(101.0), StatusCode::UNPROCESSABLE_ENTITY),
            (OkrError::validation("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (OkrError::HasChildren(1), StatusCode::CONFLICT),
            (
                OkrError::DuplicateLink { objective_id: 1, kpi_id: 2 },
                StatusCode::CONFLICT,
            ),
            (
                OkrError::InvalidTransition { action: "approve", from: "draft".into() },
                StatusCode::CONFLICT,
            ),
            (OkrError::forbidden("x"), StatusCode::FORBIDDEN),
            (
                OkrError::Database(DbErr::Custom("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
