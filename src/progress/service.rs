use crate::error::{OkrError, OkrResult};
use crate::kpi::model::KpiStatus;
use crate::objective::model::{objectives_from_models, Objective};
use crate::objective::tree::ObjectiveTree;
use crate::progress::aggregator::{
    self, AggregationPolicy, ChildInput, KpiInput, ProgressBreakdown, ProgressInputs,
};
use crate::storage::entity::objective::Model as ObjectiveModel;
use crate::storage::repository::{KpiRepository, LinkRepository, ObjectiveRepository};
use log::{debug, info};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Held for the whole of a recalculation pass or a structural change
/// (move, delete, link) that ends in one.
pub type RecalcGuard<'a> = MutexGuard<'a, ()>;

struct NodeRecalc {
    parent_id: Option<i32>,
    changed: bool,
}

pub struct ProgressService {
    db: Arc<DatabaseConnection>,
    policy: AggregationPolicy,
    lock: Mutex<()>,
}

impl ProgressService {
    pub fn new(db: Arc<DatabaseConnection>, policy: AggregationPolicy) -> Self {
        Self {
            db,
            policy,
            lock: Mutex::new(()),
        }
    }

    pub async fn lock(&self) -> RecalcGuard<'_> {
        self.lock.lock().await
    }

    /// Current inputs and the value they aggregate to. Nothing is written.
    pub async fn breakdown(&self, objective_id: i32) -> OkrResult<ProgressBreakdown> {
        let db = self.db.as_ref();
        let objective = ObjectiveRepository::find(db, objective_id)
            .await?
            .ok_or_else(|| OkrError::not_found("objective", objective_id))?;
        let inputs = load_inputs(db, &objective).await?;
        Ok(aggregator::breakdown(objective_id, inputs, self.policy))
    }

    /// Recomputes `objective_id`, then every ancestor up to the root.
    pub async fn recalculate(&self, objective_id: i32) -> OkrResult<Objective> {
        let guard = self.lock().await;
        self.recalculate_chain_locked(&guard, objective_id).await?;
        self.reload(objective_id).await
    }

    /// Recomputes every node under `root_id` children first, then the
    /// root's ancestors. Returns the number of nodes whose value changed.
    pub async fn recalculate_subtree(&self, root_id: i32) -> OkrResult<usize> {
        let _guard = self.lock().await;
        let tree = self.load_tree().await?;
        tree.require(root_id)?;

        let mut order = tree.subtree_post_order(root_id);
        order.extend(tree.ancestor_ids_upward(root_id));

        let mut changed = 0;
        for id in order {
            if self.recalculate_node(id).await?.is_some_and(|n| n.changed) {
                changed += 1;
            }
        }
        info!("Recalculated subtree of objective {}: {} changed", root_id, changed);
        Ok(changed)
    }

    /// Recomputes every objective the kpi is linked to, with their ancestors.
    pub async fn recalculate_for_kpi(&self, kpi_id: i32) -> OkrResult<usize> {
        let guard = self.lock().await;
        self.recalculate_for_kpi_locked(&guard, kpi_id).await
    }

    pub async fn recalculate_for_kpi_locked(
        &self,
        guard: &RecalcGuard<'_>,
        kpi_id: i32,
    ) -> OkrResult<usize> {
        let links = LinkRepository::list_for_kpi(self.db.as_ref(), kpi_id).await?;
        let objective_ids: BTreeSet<i32> = links.iter().map(|l| l.objective_id).collect();
        let mut touched = 0;
        for id in objective_ids {
            touched += self.recalculate_chain_locked(guard, id).await?;
        }
        Ok(touched)
    }

    /// Walks from `objective_id` to the root, one transaction per node.
    /// Returns the number of nodes visited.
    pub async fn recalculate_chain_locked(
        &self,
        _guard: &RecalcGuard<'_>,
        objective_id: i32,
    ) -> OkrResult<usize> {
        if ObjectiveRepository::find(self.db.as_ref(), objective_id)
            .await?
            .is_none()
        {
            return Err(OkrError::not_found("objective", objective_id));
        }

        let mut seen = HashSet::new();
        let mut current = Some(objective_id);
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            current = self
                .recalculate_node(id)
                .await?
                .and_then(|n| n.parent_id);
        }
        Ok(seen.len())
    }

    /// read -> aggregate -> write for a single node inside one transaction.
    /// `None` when the node no longer exists.
    async fn recalculate_node(&self, id: i32) -> OkrResult<Option<NodeRecalc>> {
        let txn = self.db.begin().await?;
        let Some(objective) = ObjectiveRepository::find(&txn, id).await? else {
            txn.rollback().await?;
            return Ok(None);
        };
        let inputs = load_inputs(&txn, &objective).await?.normalized();
        let (progress, method) = aggregator::aggregate(&inputs, self.policy);

        if progress.to_bits() == objective.progress.to_bits() {
            txn.commit().await?;
            debug!("Objective {} progress unchanged at {}", id, progress);
            return Ok(Some(NodeRecalc {
                parent_id: objective.parent_id,
                changed: false,
            }));
        }

        ObjectiveRepository::set_progress(&txn, id, progress).await?;
        txn.commit().await?;
        info!(
            "Objective {} progress {:.2} -> {:.2} ({:?})",
            id, objective.progress, progress, method
        );
        Ok(Some(NodeRecalc {
            parent_id: objective.parent_id,
            changed: true,
        }))
    }

    pub async fn load_tree(&self) -> OkrResult<ObjectiveTree> {
        let models = ObjectiveRepository::load_all(self.db.as_ref()).await?;
        Ok(ObjectiveTree::new(objectives_from_models(models)?))
    }

    async fn reload(&self, id: i32) -> OkrResult<Objective> {
        let model = ObjectiveRepository::find(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| OkrError::not_found("objective", id))?;
        Objective::try_from(model)
    }
}

async fn load_inputs<C: ConnectionTrait>(
    conn: &C,
    objective: &ObjectiveModel,
) -> OkrResult<ProgressInputs> {
    let links = LinkRepository::list_for_objective(conn, objective.id).await?;
    let kpi_ids: Vec<i32> = links.iter().map(|l| l.kpi_id).collect();
    let kpis: HashMap<i32, _> = KpiRepository::find_many(conn, kpi_ids)
        .await?
        .into_iter()
        .map(|k| (k.id, k))
        .collect();

    let mut kpi_inputs = Vec::with_capacity(links.len());
    for link in &links {
        let Some(kpi) = kpis.get(&link.kpi_id) else {
            continue;
        };
        let status: KpiStatus = kpi.status.parse().map_err(|e: String| {
            OkrError::Database(sea_orm::DbErr::Type(format!("kpi {}: {}", kpi.id, e)))
        })?;
        kpi_inputs.push(KpiInput {
            kpi_id: kpi.id,
            progress_percentage: kpi.progress_percentage,
            weight: link.weight,
            status,
        });
    }

    let children = ObjectiveRepository::children(conn, objective.id)
        .await?
        .into_iter()
        .map(|c| ChildInput {
            objective_id: c.id,
            progress: c.progress,
        })
        .collect();

    Ok(ProgressInputs {
        kpis: kpi_inputs,
        children,
        manual_progress: objective.manual_progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::{seed_kpi, test_state};
    use crate::progress::ProgressMethod;

    #[tokio::test]
    async fn unknown_objectives_are_not_found() {
        let state = test_state().await;
        assert!(matches!(
            state.progress.recalculate(404).await,
            Err(OkrError::NotFound { entity: "objective", id: 404 })
        ));
        assert!(matches!(
            state.progress.breakdown(404).await,
            Err(OkrError::NotFound { .. })
        ));
        assert!(matches!(
            state.progress.recalculate_subtree(404).await,
            Err(OkrError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn breakdown_reads_without_writing() {
        let state = test_state().await;
        let db = state.db.as_ref();
        let req = crate::objective::model::CreateObjectiveRequest {
            title: "raw".to_string(),
            description: None,
            level: crate::objective::Level::Team,
            parent_id: None,
            year: 2025,
            period: crate::objective::Period::Q3,
            department: None,
            owner_id: 1,
            manual_progress: Some(5.0),
            status: None,
            is_featured: None,
        };
        let objective = ObjectiveRepository::insert(db, &req, 1).await.unwrap();
        let kpi = seed_kpi(&state, 3, Some(90.0), KpiStatus::Approved).await;
        // linked behind the service's back, so the stored value is stale
        LinkRepository::insert(db, objective.id, kpi, 20.0).await.unwrap();

        let b = state.progress.breakdown(objective.id).await.unwrap();
        assert_eq!(b.method, ProgressMethod::KpiWeighted);
        assert_eq!(b.progress, 90.0);
        let stored = ObjectiveRepository::find(db, objective.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 5.0);

        assert_eq!(state.progress.recalculate_for_kpi(kpi).await.unwrap(), 1);
        let stored = ObjectiveRepository::find(db, objective.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 90.0);
    }
}
