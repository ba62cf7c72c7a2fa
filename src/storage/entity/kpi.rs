use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kpis")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub category: Option<String>,
    pub year: i32,
    pub quarter: String,
    #[sea_orm(nullable)]
    pub target_value: Option<String>,
    #[sea_orm(nullable)]
    pub current_value: Option<String>,
    #[sea_orm(nullable)]
    pub progress_percentage: Option<f64>,
    pub status: String, // draft/submitted/approved/rejected
    #[sea_orm(nullable)]
    pub submitted_at: Option<i64>,
    #[sea_orm(nullable)]
    pub reviewed_at: Option<i64>,
    #[sea_orm(nullable)]
    pub reviewed_by: Option<i32>,
    // approval comment or rejection reason
    #[sea_orm(nullable)]
    pub review_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::objective_kpi_link::Entity")]
    ObjectiveLinks,
}

impl Related<super::objective_kpi_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ObjectiveLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
