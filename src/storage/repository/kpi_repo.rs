use crate::kpi::model::{CreateKpiRequest, KpiFilter, KpiStatistics, KpiStatus, Quarter};
use crate::storage::entity::kpi::{
    ActiveModel as KpiActiveModel, Column as KpiColumn, Entity as Kpi, Model as KpiModel,
};
use chrono::Utc;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Value,
};
use std::collections::BTreeMap;

use super::objective_repo::MAX_PAGE;

const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

pub struct KpiRepository;

impl KpiRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        req: &CreateKpiRequest,
        owner_id: i32,
        progress: Option<f64>,
    ) -> Result<KpiModel, sea_orm::DbErr> {
        let now = Utc::now().timestamp();
        let active_model = KpiActiveModel {
            owner_id: Set(owner_id),
            title: Set(req.title.trim().to_string()),
            description: Set(req.description.clone()),
            category: Set(req.category.clone()),
            year: Set(req.year),
            quarter: Set(req.quarter.as_str().to_string()),
            target_value: Set(req.target_value.clone()),
            current_value: Set(req.current_value.clone()),
            progress_percentage: Set(progress),
            status: Set(KpiStatus::Draft.as_str().to_string()),
            submitted_at: Set(None),
            reviewed_at: Set(None),
            reviewed_by: Set(None),
            review_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<KpiModel>, sea_orm::DbErr> {
        Kpi::find_by_id(id).one(db).await
    }

    pub async fn find_many<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i32>,
    ) -> Result<Vec<KpiModel>, sea_orm::DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Kpi::find()
            .filter(KpiColumn::Id.is_in(ids))
            .order_by_asc(KpiColumn::Id)
            .all(db)
            .await
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        filter: &KpiFilter,
    ) -> Result<(Vec<KpiModel>, u64), sea_orm::DbErr> {
        let mut query = Kpi::find();
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(KpiColumn::OwnerId.eq(owner_id));
        }
        if let Some(year) = filter.year {
            query = query.filter(KpiColumn::Year.eq(year));
        }
        if let Some(quarter) = filter.quarter {
            query = query.filter(KpiColumn::Quarter.eq(quarter.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(KpiColumn::Status.eq(status.as_str()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(KpiColumn::Title.contains(search))
                    .add(KpiColumn::Description.contains(search)),
            );
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(KpiColumn::CreatedAt)
            .order_by_desc(KpiColumn::Id)
            .offset(filter.offset.unwrap_or(0))
            .limit(filter.limit.unwrap_or(100).min(MAX_PAGE))
            .all(db)
            .await?;
        Ok((items, total))
    }

    pub async fn pending<C: ConnectionTrait>(
        db: &C,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<KpiModel>, u64), sea_orm::DbErr> {
        let query = Kpi::find().filter(KpiColumn::Status.eq(KpiStatus::Submitted.as_str()));
        let total = query.clone().count(db).await?;
        let items = query
            .order_by_asc(KpiColumn::SubmittedAt)
            .order_by_asc(KpiColumn::Id)
            .offset(offset)
            .limit(limit.min(MAX_PAGE))
            .all(db)
            .await?;
        Ok((items, total))
    }

    /// Writes only `changes` (plus `updated_at`). With `expected_status` the
    /// row must still be in that status; returns the rows written.
    pub async fn update_columns<C: ConnectionTrait>(
        db: &C,
        id: i32,
        expected_status: Option<KpiStatus>,
        changes: Vec<(KpiColumn, Value)>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut update = Kpi::update_many()
            .col_expr(KpiColumn::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(KpiColumn::Id.eq(id));
        for (column, value) in changes {
            update = update.col_expr(column, Expr::value(value));
        }
        if let Some(status) = expected_status {
            update = update.filter(KpiColumn::Status.eq(status.as_str()));
        }
        let res = update.exec(db).await?;
        Ok(res.rows_affected)
    }

    /// Deletes the row only while it is still in `status`.
    pub async fn delete_in_status<C: ConnectionTrait>(
        db: &C,
        id: i32,
        status: KpiStatus,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = Kpi::delete_many()
            .filter(KpiColumn::Id.eq(id))
            .filter(KpiColumn::Status.eq(status.as_str()))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    /// Counts per status, quarter and category. A kpi without progress
    /// counts as 0 towards the average.
    pub async fn statistics<C: ConnectionTrait>(
        db: &C,
        owner_id: Option<i32>,
        year: Option<i32>,
    ) -> Result<KpiStatistics, sea_orm::DbErr> {
        let mut base = Kpi::find();
        if let Some(owner_id) = owner_id {
            base = base.filter(KpiColumn::OwnerId.eq(owner_id));
        }
        if let Some(year) = year {
            base = base.filter(KpiColumn::Year.eq(year));
        }

        let rows = base
            .clone()
            .select_only()
            .column(KpiColumn::Status)
            .column_as(Expr::col(KpiColumn::Id).count(), "count")
            .group_by(KpiColumn::Status)
            .into_model::<StatusCountRow>()
            .all(db)
            .await?;

        let mut by_status: BTreeMap<String, u64> = KpiStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total = 0u64;
        for row in rows {
            let n = row.count.max(0) as u64;
            total += n;
            by_status.insert(row.status, n);
        }

        let details: Vec<(String, Option<String>, Option<f64>)> = base
            .select_only()
            .column(KpiColumn::Quarter)
            .column(KpiColumn::Category)
            .column(KpiColumn::ProgressPercentage)
            .into_tuple()
            .all(db)
            .await?;

        let mut by_quarter: BTreeMap<String, u64> = Quarter::ALL
            .iter()
            .map(|q| (q.as_str().to_string(), 0))
            .collect();
        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        let mut progress_sum = 0.0;
        for (quarter, category, progress) in &details {
            *by_quarter.entry(quarter.clone()).or_insert(0) += 1;
            let category = category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNCATEGORIZED);
            *by_category.entry(category.to_string()).or_insert(0) += 1;
            progress_sum += progress.unwrap_or(0.0);
        }

        let count_of = |status: KpiStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
        let (average_progress, completion_rate) = if details.is_empty() {
            (0.0, 0.0)
        } else {
            let n = details.len() as f64;
            let approved = count_of(KpiStatus::Approved) as f64;
            (round2(progress_sum / n), round2(approved / n * 100.0))
        };
        let pending_approval = count_of(KpiStatus::Submitted);

        Ok(KpiStatistics {
            total,
            by_status,
            by_quarter,
            by_category,
            average_progress,
            completion_rate,
            my_kpis: 0,
            pending_approval,
        })
    }

    pub async fn count_owned<C: ConnectionTrait>(
        db: &C,
        owner_id: i32,
        year: Option<i32>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut query = Kpi::find().filter(KpiColumn::OwnerId.eq(owner_id));
        if let Some(year) = year {
            query = query.filter(KpiColumn::Year.eq(year));
        }
        query.count(db).await
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
