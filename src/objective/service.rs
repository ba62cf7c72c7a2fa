use crate::error::{OkrError, OkrResult};
use crate::kpi::model::{LinkRequest, LinkView};
use crate::objective::model::{
    objectives_from_models, validate_percentage, validate_title, validate_year,
    CreateObjectiveRequest, Level, Objective, ObjectiveDetail, ObjectiveFilter, ObjectivePage,
    ObjectiveStats, ObjectiveSummary, TreeNode, UpdateObjectiveRequest,
};
use crate::objective::tree::check_parent_level;
use crate::progress::ProgressService;
use crate::session::Actor;
use crate::storage::repository::objective_repo::MAX_PAGE;
use crate::storage::repository::{KpiRepository, LinkRepository, ObjectiveRepository};
use log::info;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::Arc;

pub struct ObjectiveService {
    db: Arc<DatabaseConnection>,
    progress: Arc<ProgressService>,
}

fn authorize_create(actor: &Actor, level: Level) -> OkrResult<()> {
    if actor.is_admin() || (actor.is_reviewer() && level != Level::Company) {
        return Ok(());
    }
    Err(OkrError::forbidden(format!(
        "{} may not create {} objectives",
        actor.role, level
    )))
}

fn authorize_manage(actor: &Actor, objective: &Objective) -> OkrResult<()> {
    if actor.is_reviewer() || actor.owns(objective.owner_id) {
        return Ok(());
    }
    Err(OkrError::forbidden(format!(
        "user {} may not modify objective {}",
        actor.user_id, objective.id
    )))
}

fn authorize_view(actor: &Actor, objective: &Objective) -> OkrResult<()> {
    if actor.is_reviewer() || actor.owns(objective.owner_id) {
        return Ok(());
    }
    Err(OkrError::forbidden(format!(
        "user {} may not view objective {}",
        actor.user_id, objective.id
    )))
}

fn validate_weight(weight: f64) -> OkrResult<()> {
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(OkrError::InvalidWeight(weight));
    }
    Ok(())
}

impl ObjectiveService {
    pub fn new(db: Arc<DatabaseConnection>, progress: Arc<ProgressService>) -> Self {
        Self { db, progress }
    }

    async fn require(&self, id: i32) -> OkrResult<Objective> {
        let model = ObjectiveRepository::find(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| OkrError::not_found("objective", id))?;
        Objective::try_from(model)
    }

    pub async fn create(&self, actor: &Actor, req: CreateObjectiveRequest) -> OkrResult<Objective> {
        authorize_create(actor, req.level)?;
        validate_title(&req.title)?;
        validate_year(req.year)?;
        if let Some(manual) = req.manual_progress {
            validate_percentage("manual_progress", manual)?;
        }

        let guard = self.progress.lock().await;
        let parent_level = match req.parent_id {
            Some(pid) => Some(self.require(pid).await?.level),
            None => None,
        };
        check_parent_level(req.level, parent_level)?;

        let model = ObjectiveRepository::insert(self.db.as_ref(), &req, actor.user_id).await?;
        info!(
            "Created {} objective {} under {:?} by user {}",
            req.level, model.id, req.parent_id, actor.user_id
        );
        // the new leaf joins its parent's child average
        self.progress.recalculate_chain_locked(&guard, model.id).await?;
        drop(guard);
        self.require(model.id).await
    }

    /// Employees only see the detail of objectives they own.
    pub async fn get(&self, actor: &Actor, id: i32) -> OkrResult<ObjectiveDetail> {
        let objective = self.require(id).await?;
        authorize_view(actor, &objective)?;
        let db = self.db.as_ref();
        let parent = async {
            match objective.parent_id {
                Some(pid) => ObjectiveRepository::find(db, pid).await,
                None => Ok(None),
            }
        };
        let (parent, children_count, kpi_count) = futures::try_join!(
            parent,
            ObjectiveRepository::count_children(db, id),
            LinkRepository::count_for_objective(db, id),
        )?;
        Ok(ObjectiveDetail {
            objective,
            parent_title: parent.map(|p| p.title),
            children_count,
            kpi_count,
        })
    }

    pub async fn list(&self, actor: &Actor, mut filter: ObjectiveFilter) -> OkrResult<ObjectivePage> {
        if !actor.is_reviewer() {
            filter.owner_id = Some(actor.user_id);
        }
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(100).min(MAX_PAGE);
        let (models, total) = ObjectiveRepository::list(self.db.as_ref(), &filter).await?;
        Ok(ObjectivePage {
            items: objectives_from_models(models)?,
            total,
            offset,
            limit,
        })
    }

    /// Nested view of one subtree, or of every root when `root_id` is `None`.
    pub async fn tree(&self, root_id: Option<i32>) -> OkrResult<Vec<TreeNode>> {
        let tree = self.progress.load_tree().await?;
        match root_id {
            Some(id) => {
                tree.require(id)?;
                Ok(tree.build(id).into_iter().collect())
            }
            None => Ok(tree.forest()),
        }
    }

    pub async fn stats(&self, actor: &Actor, mut filter: ObjectiveFilter) -> OkrResult<ObjectiveStats> {
        if !actor.is_reviewer() {
            filter.owner_id = Some(actor.user_id);
        }
        let models = ObjectiveRepository::load_all(self.db.as_ref()).await?;
        let objectives: Vec<Objective> = objectives_from_models(models)?
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect();

        let mut stats = ObjectiveStats {
            total: objectives.len(),
            ..Default::default()
        };
        for level in Level::ALL {
            stats.by_level.insert(level.as_str().to_string(), 0);
        }
        let mut progress_sum = 0.0;
        for o in &objectives {
            *stats.by_level.entry(o.level.as_str().to_string()).or_default() += 1;
            *stats.by_status.entry(o.status.as_str().to_string()).or_default() += 1;
            progress_sum += o.progress;
        }
        if !objectives.is_empty() {
            stats.average_progress = progress_sum / objectives.len() as f64;
        }
        Ok(stats)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i32,
        req: UpdateObjectiveRequest,
    ) -> OkrResult<Objective> {
        let guard = self.progress.lock().await;
        let current = self.require(id).await?;
        authorize_manage(actor, &current)?;

        let mut model = ObjectiveRepository::find(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| OkrError::not_found("objective", id))?;

        if let Some(level) = req.level.filter(|l| *l != current.level) {
            let tree = self.progress.load_tree().await?;
            tree.check_level_change(id, level)?;
            model.level = level.as_str().to_string();
        }
        if let Some(title) = req.title {
            validate_title(&title)?;
            model.title = title.trim().to_string();
        }
        if let Some(year) = req.year {
            validate_year(year)?;
            model.year = year;
        }
        if let Some(description) = req.description {
            model.description = Some(description);
        }
        if let Some(department) = req.department {
            model.department = Some(department);
        }
        if let Some(owner_id) = req.owner_id {
            model.owner_id = owner_id;
        }
        if let Some(period) = req.period {
            model.period = period.as_str().to_string();
        }
        if let Some(status) = req.status {
            model.status = status.as_str().to_string();
        }
        if let Some(featured) = req.is_featured {
            model.is_featured = featured;
        }
        let mut manual_changed = false;
        if let Some(manual) = req.manual_progress {
            validate_percentage("manual_progress", manual)?;
            manual_changed = manual.to_bits() != model.manual_progress.to_bits();
            model.manual_progress = manual;
        }

        ObjectiveRepository::save(self.db.as_ref(), model).await?;
        info!("Updated objective {} by user {}", id, actor.user_id);

        if manual_changed {
            self.progress.recalculate_chain_locked(&guard, id).await?;
        }
        drop(guard);
        self.require(id).await
    }

    /// Re-parents `id`. `None` turns it into a root.
    pub async fn move_to(
        &self,
        actor: &Actor,
        id: i32,
        new_parent_id: Option<i32>,
    ) -> OkrResult<Objective> {
        let guard = self.progress.lock().await;
        let tree = self.progress.load_tree().await?;
        let node = tree.require(id)?.clone();
        authorize_manage(actor, &node)?;
        tree.check_move(id, new_parent_id)?;

        if node.parent_id == new_parent_id {
            return Ok(node);
        }

        ObjectiveRepository::set_parent(self.db.as_ref(), id, new_parent_id).await?;
        info!(
            "Moved objective {} from {:?} to {:?} by user {}",
            id, node.parent_id, new_parent_id, actor.user_id
        );

        if let Some(old_parent) = node.parent_id {
            self.progress
                .recalculate_chain_locked(&guard, old_parent)
                .await?;
        }
        self.progress.recalculate_chain_locked(&guard, id).await?;
        drop(guard);
        self.require(id).await
    }

    /// Without `cascade`, an objective with children is not deleted. With it,
    /// the whole subtree goes, together with every link of every removed node.
    pub async fn delete(&self, actor: &Actor, id: i32, cascade: bool) -> OkrResult<()> {
        let guard = self.progress.lock().await;
        let tree = self.progress.load_tree().await?;
        let node = tree.require(id)?;
        authorize_manage(actor, node)?;

        if !tree.child_ids(id).is_empty() && !cascade {
            return Err(OkrError::HasChildren(id));
        }
        let parent_id = node.parent_id;
        let ids = tree.subtree_post_order(id);
        let removed = ids.len();

        let txn = self.db.begin().await?;
        LinkRepository::delete_for_objectives(&txn, ids.clone()).await?;
        ObjectiveRepository::delete_many(&txn, ids).await?;
        txn.commit().await?;
        info!(
            "Deleted objective {} ({} objectives removed) by user {}",
            id, removed, actor.user_id
        );

        if let Some(pid) = parent_id {
            self.progress.recalculate_chain_locked(&guard, pid).await?;
        }
        Ok(())
    }

    pub async fn children(&self, id: i32) -> OkrResult<Vec<ObjectiveSummary>> {
        self.require(id).await?;
        let models = ObjectiveRepository::children(self.db.as_ref(), id).await?;
        Ok(objectives_from_models(models)?
            .iter()
            .map(ObjectiveSummary::from)
            .collect())
    }

    /// Root first, ending at the immediate parent.
    pub async fn ancestors(&self, id: i32) -> OkrResult<Vec<ObjectiveSummary>> {
        let tree = self.progress.load_tree().await?;
        tree.require(id)?;
        Ok(tree
            .ancestors(id)
            .into_iter()
            .map(ObjectiveSummary::from)
            .collect())
    }

    pub async fn link(
        &self,
        actor: &Actor,
        objective_id: i32,
        req: LinkRequest,
    ) -> OkrResult<LinkView> {
        validate_weight(req.weight)?;
        let guard = self.progress.lock().await;
        let objective = self.require(objective_id).await?;
        authorize_manage(actor, &objective)?;
        if KpiRepository::find(self.db.as_ref(), req.kpi_id).await?.is_none() {
            return Err(OkrError::not_found("kpi", req.kpi_id));
        }
        if LinkRepository::find(self.db.as_ref(), objective_id, req.kpi_id)
            .await?
            .is_some()
        {
            return Err(OkrError::DuplicateLink {
                objective_id,
                kpi_id: req.kpi_id,
            });
        }

        let link =
            LinkRepository::insert(self.db.as_ref(), objective_id, req.kpi_id, req.weight).await?;
        info!(
            "Linked kpi {} to objective {} with weight {}",
            req.kpi_id, objective_id, req.weight
        );
        self.progress
            .recalculate_chain_locked(&guard, objective_id)
            .await?;
        Ok(link.into())
    }

    pub async fn unlink(&self, actor: &Actor, objective_id: i32, kpi_id: i32) -> OkrResult<()> {
        let guard = self.progress.lock().await;
        let objective = self.require(objective_id).await?;
        authorize_manage(actor, &objective)?;

        let removed = LinkRepository::delete(self.db.as_ref(), objective_id, kpi_id).await?;
        if removed == 0 {
            return Err(OkrError::LinkNotFound {
                objective_id,
                kpi_id,
            });
        }
        info!("Unlinked kpi {} from objective {}", kpi_id, objective_id);
        self.progress
            .recalculate_chain_locked(&guard, objective_id)
            .await?;
        Ok(())
    }

    pub async fn update_weight(
        &self,
        actor: &Actor,
        objective_id: i32,
        kpi_id: i32,
        weight: f64,
    ) -> OkrResult<LinkView> {
        validate_weight(weight)?;
        let guard = self.progress.lock().await;
        let objective = self.require(objective_id).await?;
        authorize_manage(actor, &objective)?;

        if LinkRepository::update_weight(self.db.as_ref(), objective_id, kpi_id, weight).await? == 0
        {
            return Err(OkrError::LinkNotFound {
                objective_id,
                kpi_id,
            });
        }
        info!(
            "Weight of kpi {} on objective {} set to {}",
            kpi_id, objective_id, weight
        );
        self.progress
            .recalculate_chain_locked(&guard, objective_id)
            .await?;

        let link = LinkRepository::find(self.db.as_ref(), objective_id, kpi_id)
            .await?
            .ok_or(OkrError::LinkNotFound {
                objective_id,
                kpi_id,
            })?;
        Ok(link.into())
    }

    pub async fn links(&self, objective_id: i32) -> OkrResult<Vec<LinkView>> {
        self.require(objective_id).await?;
        let links = LinkRepository::list_for_objective(self.db.as_ref(), objective_id).await?;
        Ok(links.into_iter().map(LinkView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::{seed_kpi, test_state};
    use crate::kpi::model::KpiStatus;
    use crate::objective::model::{ObjectiveStatus, Period};
    use crate::progress::ProgressMethod;
    use crate::session::Role;

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    fn new_objective(title: &str, level: Level, parent_id: Option<i32>) -> CreateObjectiveRequest {
        CreateObjectiveRequest {
            title: title.to_string(),
            description: None,
            level,
            parent_id,
            year: 2025,
            period: Period::Annual,
            department: None,
            owner_id: 1,
            manual_progress: None,
            status: None,
            is_featured: None,
        }
    }

    #[tokio::test]
    async fn weighted_kpis_cascade_to_the_company_objective() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let b = svc
            .create(&admin(), new_objective("B", Level::Unit, Some(a.id)))
            .await
            .unwrap();
        let k1 = seed_kpi(&state, 5, Some(80.0), KpiStatus::Approved).await;
        let k2 = seed_kpi(&state, 5, Some(40.0), KpiStatus::Approved).await;

        svc.link(&admin(), b.id, LinkRequest { kpi_id: k1, weight: 60.0 })
            .await
            .unwrap();
        svc.link(&admin(), b.id, LinkRequest { kpi_id: k2, weight: 40.0 })
            .await
            .unwrap();

        assert_eq!(svc.get(&admin(), b.id).await.unwrap().objective.progress, 64.0);
        assert_eq!(svc.get(&admin(), a.id).await.unwrap().objective.progress, 64.0);

        let breakdown = state.progress.breakdown(a.id).await.unwrap();
        assert_eq!(breakdown.method, ProgressMethod::ChildAverage);
        assert_eq!(breakdown.inputs.children.len(), 1);
    }

    #[tokio::test]
    async fn recalculation_is_idempotent() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let b = svc
            .create(&admin(), new_objective("B", Level::Unit, Some(a.id)))
            .await
            .unwrap();
        let mut c = new_objective("C", Level::Unit, Some(a.id));
        c.manual_progress = Some(33.3);
        svc.create(&admin(), c).await.unwrap();
        let k = seed_kpi(&state, 5, Some(71.7), KpiStatus::Submitted).await;
        svc.link(&admin(), b.id, LinkRequest { kpi_id: k, weight: 35.0 })
            .await
            .unwrap();

        let first = state.progress.recalculate(a.id).await.unwrap().progress;
        assert_eq!(state.progress.recalculate_subtree(a.id).await.unwrap(), 0);
        let second = state.progress.recalculate(a.id).await.unwrap().progress;
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[tokio::test]
    async fn manual_progress_applies_to_bare_leaves() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let updated = svc
            .update(
                &admin(),
                a.id,
                UpdateObjectiveRequest {
                    manual_progress: Some(42.0),
                    status: Some(ObjectiveStatus::OnHold),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.progress, 42.0);
        assert_eq!(updated.status, ObjectiveStatus::OnHold);
    }

    #[tokio::test]
    async fn hierarchy_rules_are_enforced_on_create_and_move() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let err = svc
            .create(&admin(), new_objective("skip", Level::Division, Some(a.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::InvalidHierarchy(_)));

        let b = svc
            .create(&admin(), new_objective("B", Level::Unit, Some(a.id)))
            .await
            .unwrap();
        let d = svc
            .create(&admin(), new_objective("D", Level::Division, Some(b.id)))
            .await
            .unwrap();

        // B under its own descendant D
        let err = svc.move_to(&admin(), b.id, Some(d.id)).await.unwrap_err();
        assert!(matches!(err, OkrError::InvalidHierarchy(_)));
        let err = svc.move_to(&admin(), d.id, Some(a.id)).await.unwrap_err();
        assert!(matches!(err, OkrError::InvalidHierarchy(_)));

        let moved = svc.move_to(&admin(), b.id, None).await.unwrap();
        assert_eq!(moved.parent_id, None);
        assert!(svc.children(a.id).await.unwrap().is_empty());
        let chain: Vec<i32> = svc.ancestors(d.id).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(chain, vec![b.id]);
    }

    #[tokio::test]
    async fn move_recalculates_old_and_new_parents() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a1 = svc
            .create(&admin(), new_objective("A1", Level::Company, None))
            .await
            .unwrap();
        let a2 = svc
            .create(&admin(), new_objective("A2", Level::Company, None))
            .await
            .unwrap();
        let mut b = new_objective("B", Level::Unit, Some(a1.id));
        b.manual_progress = Some(80.0);
        let b = svc.create(&admin(), b).await.unwrap();
        assert_eq!(svc.get(&admin(), a1.id).await.unwrap().objective.progress, 80.0);

        svc.move_to(&admin(), b.id, Some(a2.id)).await.unwrap();
        assert_eq!(svc.get(&admin(), a1.id).await.unwrap().objective.progress, 0.0);
        assert_eq!(svc.get(&admin(), a2.id).await.unwrap().objective.progress, 80.0);
    }

    #[tokio::test]
    async fn delete_with_children_needs_cascade() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let b = svc
            .create(&admin(), new_objective("B", Level::Unit, Some(a.id)))
            .await
            .unwrap();
        let d = svc
            .create(&admin(), new_objective("D", Level::Division, Some(b.id)))
            .await
            .unwrap();
        let k = seed_kpi(&state, 5, Some(50.0), KpiStatus::Draft).await;
        svc.link(&admin(), d.id, LinkRequest { kpi_id: k, weight: 100.0 })
            .await
            .unwrap();

        let err = svc.delete(&admin(), b.id, false).await.unwrap_err();
        assert!(matches!(err, OkrError::HasChildren(id) if id == b.id));

        svc.delete(&admin(), b.id, true).await.unwrap();
        assert!(matches!(
            svc.get(&admin(), d.id).await,
            Err(OkrError::NotFound { .. })
        ));
        let remaining = LinkRepository::list_for_kpi(state.db.as_ref(), k).await.unwrap();
        assert!(remaining.is_empty());
        assert_eq!(svc.get(&admin(), a.id).await.unwrap().children_count, 0);
    }

    #[tokio::test]
    async fn link_table_errors() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        let k = seed_kpi(&state, 5, Some(10.0), KpiStatus::Draft).await;

        svc.link(&admin(), a.id, LinkRequest { kpi_id: k, weight: 50.0 })
            .await
            .unwrap();
        let err = svc
            .link(&admin(), a.id, LinkRequest { kpi_id: k, weight: 20.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::DuplicateLink { .. }));

        let err = svc
            .link(&admin(), a.id, LinkRequest { kpi_id: k, weight: 120.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::InvalidWeight(w) if w == 120.0));

        let link = svc.update_weight(&admin(), a.id, k, 25.0).await.unwrap();
        assert_eq!(link.weight, 25.0);

        svc.unlink(&admin(), a.id, k).await.unwrap();
        let err = svc.unlink(&admin(), a.id, k).await.unwrap_err();
        assert!(matches!(err, OkrError::LinkNotFound { .. }));
        assert!(svc.links(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn roles_gate_objective_writes() {
        let state = test_state().await;
        let svc = &state.objectives;
        let manager = Actor::new(2, Role::Manager);
        let employee = Actor::new(3, Role::Employee);

        let err = svc
            .create(&manager, new_objective("A", Level::Company, None))
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::Forbidden(_)));
        let err = svc
            .create(&employee, new_objective("U", Level::Unit, None))
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::Forbidden(_)));

        let u = svc
            .create(&manager, new_objective("U", Level::Unit, None))
            .await
            .unwrap();
        let err = svc
            .update(&employee, u.id, UpdateObjectiveRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::Forbidden(_)));

        let page = svc.list(&employee, ObjectiveFilter::default()).await.unwrap();
        assert_eq!(page.total, 0);
        let err = svc.get(&employee, u.id).await.unwrap_err();
        assert!(matches!(err, OkrError::Forbidden(_)));
        let owned = svc
            .create(
                &manager,
                CreateObjectiveRequest {
                    owner_id: 3,
                    ..new_objective("D", Level::Division, Some(u.id))
                },
            )
            .await
            .unwrap();
        assert_eq!(svc.get(&employee, owned.id).await.unwrap().objective.owner_id, 3);
        assert_eq!(svc.get(&manager, u.id).await.unwrap().objective.id, u.id);
        let page = svc.list(&manager, ObjectiveFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn tree_and_stats_cover_all_roots() {
        let state = test_state().await;
        let svc = &state.objectives;
        let a = svc
            .create(&admin(), new_objective("A", Level::Company, None))
            .await
            .unwrap();
        svc.create(&admin(), new_objective("B", Level::Unit, Some(a.id)))
            .await
            .unwrap();
        svc.create(&admin(), new_objective("Z", Level::Company, None))
            .await
            .unwrap();

        let forest = svc.tree(None).await.unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].children.len(), 1);
        let single = svc.tree(Some(a.id)).await.unwrap();
        assert_eq!(single.len(), 1);

        let stats = svc.stats(&admin(), ObjectiveFilter::default()).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_level["company"], 2);
        assert_eq!(stats.by_level["individual"], 0);
    }
}
