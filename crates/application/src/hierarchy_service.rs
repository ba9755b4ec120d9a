use std::sync::Arc;

use scholaris_core::{AppError, AppResult, Clock, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, HierarchyEdge, HierarchyGraph, HierarchyIssue,
    RelationshipKind,
};
use tracing::warn;

use crate::administration_ports::{AdministratorRepository, HierarchyEdgeLog};

/// Application service that owns parent pointer changes and graph queries.
#[derive(Clone)]
pub struct HierarchyService {
    administrators: Arc<dyn AdministratorRepository>,
    edges: Arc<dyn HierarchyEdgeLog>,
    clock: Arc<dyn Clock>,
}

impl HierarchyService {
    /// Creates a hierarchy service from repository implementations.
    #[must_use]
    pub fn new(
        administrators: Arc<dyn AdministratorRepository>,
        edges: Arc<dyn HierarchyEdgeLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            administrators,
            edges,
            clock,
        }
    }

    /// Replaces the parent of `child_id` and returns the previous parent.
    ///
    /// Rejects unknown ids with `NotFound`, self or descendant parents with
    /// `Cycle`, and a parent ranked below the child with `Validation`. The
    /// pointer write is the source of truth; the edge log is appended after it.
    pub async fn set_parent(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        child_id: AdministratorId,
        parent_id: Option<AdministratorId>,
    ) -> AppResult<Option<AdministratorId>> {
        let administrators = self.administrators.list_administrators(tenant_id).await?;
        let child = find_in(&administrators, tenant_id, child_id)?;
        if let Some(parent_id) = parent_id {
            let parent = find_in(&administrators, tenant_id, parent_id)?;
            let graph = HierarchyGraph::from_administrators(&administrators);
            if graph.would_create_cycle(child_id, Some(parent_id)) {
                return Err(AppError::Cycle(format!(
                    "administrator '{parent_id}' is '{child_id}' or one of its descendants"
                )));
            }
            if child.level().outranks(parent.level()) {
                return Err(AppError::Validation(format!(
                    "{} '{child_id}' cannot report to {} '{parent_id}'",
                    child.level(),
                    parent.level()
                )));
            }
        }

        let previous_parent = child.parent_admin_id();
        if previous_parent == parent_id {
            return Ok(previous_parent);
        }

        self.administrators
            .update_parent(tenant_id, child_id, parent_id, self.clock.now())
            .await?;
        self.log_reparent(
            tenant_id,
            actor_id,
            child_id,
            previous_parent,
            parent_id,
            RelationshipKind::Direct,
        )
        .await;

        Ok(previous_parent)
    }

    /// Returns whether `proposed_parent` is `child_id` or one of its descendants.
    pub async fn would_create_cycle(
        &self,
        tenant_id: TenantId,
        child_id: AdministratorId,
        proposed_parent: Option<AdministratorId>,
    ) -> AppResult<bool> {
        Ok(self
            .load_graph(tenant_id)
            .await?
            .would_create_cycle(child_id, proposed_parent))
    }

    /// Returns every administrator below `admin_id`, excluding itself.
    pub async fn get_descendants(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<AdministratorId>> {
        let graph = self.load_graph(tenant_id).await?;
        ensure_known(&graph, tenant_id, admin_id)?;
        Ok(graph.descendants(admin_id))
    }

    /// Returns the reporting chain from the root down to `admin_id`.
    pub async fn get_ancestor_chain(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<AdministratorId>> {
        let graph = self.load_graph(tenant_id).await?;
        ensure_known(&graph, tenant_id, admin_id)?;
        Ok(graph.ancestor_chain(admin_id))
    }

    /// Scans one tenant for orphaned parents, level-order violations and cycles.
    pub async fn validate_hierarchy_integrity(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Vec<HierarchyIssue>> {
        Ok(self.load_graph(tenant_id).await?.integrity_issues())
    }

    /// Moves every direct child of `from_id` under `to_id` and returns how many moved.
    ///
    /// All children are validated before the first write so a rejected call
    /// leaves every pointer untouched.
    pub async fn reassign_children(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        from_id: AdministratorId,
        to_id: Option<AdministratorId>,
    ) -> AppResult<usize> {
        let administrators = self.administrators.list_administrators(tenant_id).await?;
        find_in(&administrators, tenant_id, from_id)?;
        let graph = HierarchyGraph::from_administrators(&administrators);
        let children: Vec<&Administrator> = graph
            .children_of(from_id)
            .iter()
            .filter_map(|child_id| {
                administrators
                    .iter()
                    .find(|administrator| administrator.id() == *child_id)
            })
            .collect();

        if let Some(to_id) = to_id {
            if to_id == from_id {
                return Err(AppError::Validation(format!(
                    "cannot reassign children of '{from_id}' to itself"
                )));
            }
            let target = find_in(&administrators, tenant_id, to_id)?;
            for child in &children {
                if graph.would_create_cycle(child.id(), Some(to_id)) {
                    return Err(AppError::Cycle(format!(
                        "administrator '{to_id}' is '{}' or one of its descendants",
                        child.id()
                    )));
                }
                if child.level().outranks(target.level()) {
                    return Err(AppError::Validation(format!(
                        "{} '{}' cannot report to {} '{to_id}'",
                        child.level(),
                        child.id(),
                        target.level()
                    )));
                }
            }
        }

        let now = self.clock.now();
        for child in &children {
            self.administrators
                .update_parent(tenant_id, child.id(), to_id, now)
                .await?;
            self.log_reparent(
                tenant_id,
                actor_id,
                child.id(),
                Some(from_id),
                to_id,
                RelationshipKind::Inherited,
            )
            .await;
        }

        Ok(children.len())
    }

    /// Records the initial parent of a freshly created administrator.
    pub(crate) async fn log_initial_parent(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        child_id: AdministratorId,
        parent_id: Option<AdministratorId>,
    ) {
        self.log_reparent(
            tenant_id,
            actor_id,
            child_id,
            None,
            parent_id,
            RelationshipKind::Direct,
        )
        .await;
    }

    async fn load_graph(&self, tenant_id: TenantId) -> AppResult<HierarchyGraph> {
        let administrators = self.administrators.list_administrators(tenant_id).await?;
        Ok(HierarchyGraph::from_administrators(&administrators))
    }

    async fn log_reparent(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        child_id: AdministratorId,
        previous_parent: Option<AdministratorId>,
        next_parent: Option<AdministratorId>,
        kind: RelationshipKind,
    ) {
        let now = self.clock.now();
        let rows = previous_parent
            .map(|parent_admin_id| (parent_admin_id, false))
            .into_iter()
            .chain(next_parent.map(|parent_admin_id| (parent_admin_id, true)));

        for (parent_admin_id, is_active) in rows {
            let edge = HierarchyEdge {
                company_id: tenant_id,
                parent_admin_id,
                child_admin_id: child_id,
                kind,
                is_active,
                created_by: actor_id,
                created_at: now,
            };
            if let Err(error) = self.edges.append_edge(edge).await {
                warn!(
                    tenant_id = %tenant_id,
                    child_admin_id = %child_id,
                    parent_admin_id = %parent_admin_id,
                    error = %error,
                    "failed to append hierarchy edge"
                );
            }
        }
    }
}

fn find_in(
    administrators: &[Administrator],
    tenant_id: TenantId,
    admin_id: AdministratorId,
) -> AppResult<&Administrator> {
    administrators
        .iter()
        .find(|administrator| administrator.id() == admin_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "administrator '{admin_id}' does not exist in tenant '{tenant_id}'"
            ))
        })
}

fn ensure_known(
    graph: &HierarchyGraph,
    tenant_id: TenantId,
    admin_id: AdministratorId,
) -> AppResult<()> {
    if graph.contains(admin_id) {
        return Ok(());
    }

    Err(AppError::NotFound(format!(
        "administrator '{admin_id}' does not exist in tenant '{tenant_id}'"
    )))
}
