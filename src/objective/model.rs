use crate::error::{OkrError, OkrResult};
use crate::storage::entity::objective::Model as ObjectiveModel;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Organizational level of an objective, ordered from the top of the
/// hierarchy (`Company`) down to `Individual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Company,
    Unit,
    Division,
    Team,
    Individual,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Company,
        Level::Unit,
        Level::Division,
        Level::Team,
        Level::Individual,
    ];

    /// The only level a parent of this level may have.
    pub fn parent_level(self) -> Option<Level> {
        match self {
            Self::Company => None,
            Self::Unit => Some(Self::Company),
            Self::Division => Some(Self::Unit),
            Self::Team => Some(Self::Division),
            Self::Individual => Some(Self::Team),
        }
    }

    pub fn child_level(self) -> Option<Level> {
        match self {
            Self::Company => Some(Self::Unit),
            Self::Unit => Some(Self::Division),
            Self::Division => Some(Self::Team),
            Self::Team => Some(Self::Individual),
            Self::Individual => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Unit => "unit",
            Self::Division => "division",
            Self::Team => "team",
            Self::Individual => "individual",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Unit => "Business Unit",
            Self::Division => "Division",
            Self::Team => "Team",
            Self::Individual => "Individual",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("unknown level: {}", s))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Active,
    Completed,
    OnHold,
    Cancelled,
}

impl ObjectiveStatus {
    pub const ALL: [ObjectiveStatus; 4] = [
        ObjectiveStatus::Active,
        ObjectiveStatus::Completed,
        ObjectiveStatus::OnHold,
        ObjectiveStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ObjectiveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectiveStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown objective status: {}", s))
    }
}

/// Time horizon of an objective within its year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "annual")]
    Annual,
    H1,
    H2,
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Period {
    pub const ALL: [Period; 7] = [
        Period::Annual,
        Period::H1,
        Period::H2,
        Period::Q1,
        Period::Q2,
        Period::Q3,
        Period::Q4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown period: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Objective {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub parent_id: Option<i32>,
    pub owner_id: i32,
    pub department: Option<String>,
    pub year: i32,
    pub period: Period,
    pub status: ObjectiveStatus,
    pub manual_progress: f64,
    pub progress: f64,
    pub is_featured: bool,
    pub created_by: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

fn corrupt(field: &str, id: i32, msg: String) -> OkrError {
    OkrError::Database(DbErr::Type(format!(
        "objective {} has invalid {}: {}",
        id, field, msg
    )))
}

impl TryFrom<ObjectiveModel> for Objective {
    type Error = OkrError;

    fn try_from(m: ObjectiveModel) -> Result<Self, Self::Error> {
        let level = m.level.parse().map_err(|e| corrupt("level", m.id, e))?;
        let period = m.period.parse().map_err(|e| corrupt("period", m.id, e))?;
        let status = m.status.parse().map_err(|e| corrupt("status", m.id, e))?;
        Ok(Self {
            id: m.id,
            title: m.title,
            description: m.description,
            level,
            parent_id: m.parent_id,
            owner_id: m.owner_id,
            department: m.department,
            year: m.year,
            period,
            status,
            manual_progress: m.manual_progress,
            progress: m.progress,
            is_featured: m.is_featured,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

pub fn objectives_from_models(models: Vec<ObjectiveModel>) -> OkrResult<Vec<Objective>> {
    models.into_iter().map(Objective::try_from).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObjectiveRequest {
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub parent_id: Option<i32>,
    pub year: i32,
    #[serde(default = "default_period")]
    pub period: Period,
    pub department: Option<String>,
    pub owner_id: i32,
    pub manual_progress: Option<f64>,
    pub status: Option<ObjectiveStatus>,
    pub is_featured: Option<bool>,
}

fn default_period() -> Period {
    Period::Annual
}

/// Mutable fields. The parent is changed only through `move`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateObjectiveRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<Level>,
    pub department: Option<String>,
    pub owner_id: Option<i32>,
    pub year: Option<i32>,
    pub period: Option<Period>,
    pub status: Option<ObjectiveStatus>,
    pub manual_progress: Option<f64>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveObjectiveRequest {
    pub new_parent_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectiveFilter {
    pub level: Option<Level>,
    pub year: Option<i32>,
    pub period: Option<Period>,
    pub status: Option<ObjectiveStatus>,
    pub department: Option<String>,
    pub owner_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl ObjectiveFilter {
    /// In-memory counterpart of the repository query, paging ignored.
    pub fn matches(&self, o: &Objective) -> bool {
        self.level.map_or(true, |l| o.level == l)
            && self.year.map_or(true, |y| o.year == y)
            && self.period.map_or(true, |p| o.period == p)
            && self.status.map_or(true, |s| o.status == s)
            && self
                .department
                .as_ref()
                .map_or(true, |d| o.department.as_ref() == Some(d))
            && self.owner_id.map_or(true, |id| o.owner_id == id)
            && self.parent_id.map_or(true, |id| o.parent_id == Some(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectivePage {
    pub items: Vec<Objective>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveDetail {
    #[serde(flatten)]
    pub objective: Objective,
    pub parent_title: Option<String>,
    pub children_count: u64,
    pub kpi_count: u64,
}

/// Summary form used by the children and ancestors listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveSummary {
    pub id: i32,
    pub title: String,
    pub level: Level,
    pub level_label: String,
    pub parent_id: Option<i32>,
    pub status: ObjectiveStatus,
    pub progress: f64,
}

impl From<&Objective> for ObjectiveSummary {
    fn from(o: &Objective) -> Self {
        Self {
            id: o.id,
            title: o.title.clone(),
            level: o.level,
            level_label: o.level.label().to_string(),
            parent_id: o.parent_id,
            status: o.status,
            progress: o.progress,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub objective: ObjectiveSummary,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectiveStats {
    pub total: usize,
    pub by_level: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub average_progress: f64,
}

pub fn validate_title(title: &str) -> OkrResult<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(OkrError::validation("title must be 1..=200 characters"));
    }
    Ok(())
}

pub fn validate_year(year: i32) -> OkrResult<()> {
    if !(2000..=2100).contains(&year) {
        return Err(OkrError::validation(format!("year {} out of range", year)));
    }
    Ok(())
}

pub fn validate_percentage(field: &str, value: f64) -> OkrResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(OkrError::validation(format!(
            "{} must be within [0, 100], got {}",
            field, value
        )));
    }
    Ok(())
}
