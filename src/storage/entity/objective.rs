use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "objectives")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub level: String, // company/unit/division/team/individual
    #[sea_orm(nullable)]
    pub parent_id: Option<i32>,
    pub owner_id: i32,
    #[sea_orm(nullable)]
    pub department: Option<String>,
    pub year: i32,
    pub period: String, // annual/H1/H2/Q1..Q4
    pub status: String,
    pub manual_progress: f64,
    // last value written by a recalculation pass
    pub progress: f64,
    pub is_featured: bool,
    pub created_by: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::objective_kpi_link::Entity")]
    KpiLinks,
}

impl Related<super::objective_kpi_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KpiLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
