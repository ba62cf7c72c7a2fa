use sea_orm::DbErr;

#[derive(thiserror::Error, Debug)]
pub enum OkrError {
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),
    #[error("objective {0} has children")]
    HasChildren(i32),
    #[error("kpi {kpi_id} is already linked to objective {objective_id}")]
    DuplicateLink { objective_id: i32, kpi_id: i32 },
    #[error("kpi {kpi_id} is not linked to objective {objective_id}")]
    LinkNotFound { objective_id: i32, kpi_id: i32 },
    #[error("weight {0} is outside [0, 100]")]
    InvalidWeight(f64),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("cannot {action} a kpi in status {from}")]
    InvalidTransition { action: &'static str, from: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl OkrError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn hierarchy(msg: impl Into<String>) -> Self {
        Self::InvalidHierarchy(msg.into())
    }

    /// Stable machine-readable name, used as the `error` field of API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidHierarchy(_) => "InvalidHierarchy",
            Self::HasChildren(_) => "HasChildren",
            Self::DuplicateLink { .. } => "DuplicateLink",
            Self::LinkNotFound { .. } => "LinkNotFound",
            Self::InvalidWeight(_) => "InvalidWeight",
            Self::NotFound { .. } => "NotFound",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Forbidden(_) => "Forbidden",
            Self::ValidationError(_) => "ValidationError",
            Self::Database(_) => "Database",
        }
    }
}

pub type OkrResult<T> = Result<T, OkrError>;
