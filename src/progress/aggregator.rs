use crate::kpi::model::KpiStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMethod {
    KpiWeighted,
    ChildAverage,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiInput {
    pub kpi_id: i32,
    pub progress_percentage: Option<f64>,
    pub weight: f64,
    pub status: KpiStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildInput {
    pub objective_id: i32,
    pub progress: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressInputs {
    pub kpis: Vec<KpiInput>,
    pub children: Vec<ChildInput>,
    pub manual_progress: f64,
}

impl ProgressInputs {
    /// Fixes summation order so repeated passes give bit-identical results.
    pub fn normalized(mut self) -> Self {
        self.kpis.sort_by_key(|k| k.kpi_id);
        self.children.sort_by_key(|c| c.objective_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressBreakdown {
    pub objective_id: i32,
    pub progress: f64,
    pub method: ProgressMethod,
    pub inputs: ProgressInputs,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationPolicy {
    /// only `approved` kpis contribute
    pub approved_only: bool,
}

fn clamp_pct(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

/// Weighted kpi average, then child average, then manual progress.
///
/// Weights are normalized by their sum, so partial configurations (weights
/// not adding up to 100) still yield a value in [0, 100]. Links whose
/// weights sum to zero contribute nothing and the next rule applies.
///
/// This is the one case where a linked objective can still end up on
/// `manual_progress`: a leaf whose links all weigh zero, or whose kpis are
/// all filtered out by `approved_only`.
pub fn aggregate(inputs: &ProgressInputs, policy: AggregationPolicy) -> (f64, ProgressMethod) {
    let counted = inputs
        .kpis
        .iter()
        .filter(|k| !policy.approved_only || k.status == KpiStatus::Approved);

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for k in counted {
        let w = k.weight.max(0.0);
        weighted_sum += clamp_pct(k.progress_percentage.unwrap_or(0.0)) * w;
        weight_total += w;
    }
    if weight_total > 0.0 {
        return (
            clamp_pct(weighted_sum / weight_total),
            ProgressMethod::KpiWeighted,
        );
    }

    if !inputs.children.is_empty() {
        let sum: f64 = inputs.children.iter().map(|c| clamp_pct(c.progress)).sum();
        return (
            clamp_pct(sum / inputs.children.len() as f64),
            ProgressMethod::ChildAverage,
        );
    }

    (clamp_pct(inputs.manual_progress), ProgressMethod::Manual)
}

pub fn breakdown(
    objective_id: i32,
    inputs: ProgressInputs,
    policy: AggregationPolicy,
) -> ProgressBreakdown {
    let inputs = inputs.normalized();
    let (progress, method) = aggregate(&inputs, policy);
    ProgressBreakdown {
        objective_id,
        progress,
        method,
        inputs,
    }
}
