use crate::error::{OkrError, OkrResult};
use crate::storage::entity::kpi::Model as KpiModel;
use crate::storage::entity::kpi_comment::Model as CommentModel;
use crate::storage::entity::kpi_history::Model as HistoryModel;
use crate::storage::entity::objective_kpi_link::Model as LinkModel;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl KpiStatus {
    pub const ALL: [KpiStatus; 4] = [
        KpiStatus::Draft,
        KpiStatus::Submitted,
        KpiStatus::Approved,
        KpiStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Content (title, target, ...) may only change in these states.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

impl FromStr for KpiStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KpiStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown kpi status: {}", s))
    }
}

impl fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl FromStr for Quarter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quarter::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown quarter: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kpi {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub year: i32,
    pub quarter: Quarter,
    pub target_value: Option<String>,
    pub current_value: Option<String>,
    pub progress_percentage: Option<f64>,
    pub status: KpiStatus,
    pub submitted_at: Option<i64>,
    pub reviewed_at: Option<i64>,
    pub reviewed_by: Option<i32>,
    pub review_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<KpiModel> for Kpi {
    type Error = OkrError;

    fn try_from(m: KpiModel) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            OkrError::Database(DbErr::Type(format!(
                "kpi {} has invalid {}: {}",
                m.id, field, e
            )))
        };
        let status = m.status.parse().map_err(|e| corrupt("status", e))?;
        let quarter = m.quarter.parse().map_err(|e| corrupt("quarter", e))?;
        Ok(Self {
            id: m.id,
            owner_id: m.owner_id,
            title: m.title,
            description: m.description,
            category: m.category,
            year: m.year,
            quarter,
            target_value: m.target_value,
            current_value: m.current_value,
            progress_percentage: m.progress_percentage,
            status,
            submitted_at: m.submitted_at,
            reviewed_at: m.reviewed_at,
            reviewed_by: m.reviewed_by,
            review_note: m.review_note,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

pub fn kpis_from_models(models: Vec<KpiModel>) -> OkrResult<Vec<Kpi>> {
    models.into_iter().map(Kpi::try_from).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKpiRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub year: i32,
    pub quarter: Quarter,
    pub target_value: Option<String>,
    pub current_value: Option<String>,
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateKpiRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<Quarter>,
    pub target_value: Option<String>,
    pub current_value: Option<String>,
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdateRequest {
    pub current_value: Option<String>,
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiFilter {
    pub owner_id: Option<i32>,
    pub year: Option<i32>,
    pub quarter: Option<Quarter>,
    pub status: Option<KpiStatus>,
    pub search: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiPage {
    pub items: Vec<Kpi>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiStatistics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_quarter: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub average_progress: f64,
    /// Share of approved kpis, in percent.
    pub completion_rate: f64,
    pub my_kpis: u64,
    pub pending_approval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkView {
    pub objective_id: i32,
    pub kpi_id: i32,
    pub weight: f64,
    pub created_at: i64,
}

impl From<LinkModel> for LinkView {
    fn from(m: LinkModel) -> Self {
        Self {
            objective_id: m.objective_id,
            kpi_id: m.kpi_id,
            weight: m.weight,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub kpi_id: i32,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRequest {
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub type Comment = CommentModel;
pub type HistoryEntry = HistoryModel;

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | ' ' | '_'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Progress derived from free-form target/current values, when both are
/// numeric and the target is non-zero.
pub fn derive_progress(target: Option<&str>, current: Option<&str>) -> Option<f64> {
    let target = parse_number(target?)?;
    let current = parse_number(current?)?;
    if target == 0.0 {
        return None;
    }
    Some((current / target * 100.0).clamp(0.0, 100.0))
}
