use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholaris_application::{
    AdministratorRepository, AuditCountFilter, AuditLogEntry, AuditLogPage, AuditLogQuery,
    AuditLogRepository, AuditRepository, HierarchyEdgeLog, OrganizationDirectory, ScopeRepository,
};
use scholaris_core::{AppError, AppResult, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, HierarchyEdge, HierarchyGraph, ScopeAssignment,
    ScopeAssignmentId, ScopeType,
};
use tokio::sync::RwLock;
use uuid::Uuid;

mod audit;
mod scopes;


/// In-memory implementation of every administration port.
///
/// Used by tests and single-process deployments without a database.
#[derive(Debug, Default)]
pub struct InMemoryAdministrationStore {
    administrators: RwLock<HashMap<(TenantId, AdministratorId), Administrator>>,
    scopes: RwLock<HashMap<ScopeAssignmentId, ScopeAssignment>>,
    branches: RwLock<HashMap<(TenantId, Uuid), Vec<Uuid>>>,
    edges: RwLock<Vec<HierarchyEdge>>,
    audit_entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAdministrationStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            administrators: RwLock::new(HashMap::new()),
            scopes: RwLock::new(HashMap::new()),
            branches: RwLock::new(HashMap::new()),
            edges: RwLock::new(Vec::new()),
            audit_entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers a branch under a school so school-scope joins can find it.
    pub async fn register_branch(&self, tenant_id: TenantId, school_id: Uuid, branch_id: Uuid) {
        let mut branches = self.branches.write().await;
        let school_branches = branches.entry((tenant_id, school_id)).or_default();
        if !school_branches.contains(&branch_id) {
            school_branches.push(branch_id);
        }
    }
}

fn email_taken(
    administrators: &HashMap<(TenantId, AdministratorId), Administrator>,
    candidate: &Administrator,
) -> bool {
    administrators.values().any(|stored| {
        stored.company_id() == candidate.company_id()
            && stored.id() != candidate.id()
            && stored.email() == candidate.email()
    })
}

#[async_trait]
impl AdministratorRepository for InMemoryAdministrationStore {
    async fn find_administrator(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Option<Administrator>> {
        Ok(self
            .administrators
            .read()
            .await
            .get(&(tenant_id, admin_id))
            .cloned())
    }

    async fn list_administrators(&self, tenant_id: TenantId) -> AppResult<Vec<Administrator>> {
        let administrators = self.administrators.read().await;

        let mut values: Vec<Administrator> = administrators
            .iter()
            .filter_map(|((stored_tenant_id, _), administrator)| {
                (stored_tenant_id == &tenant_id).then_some(administrator.clone())
            })
            .collect();
        values.sort_by(|left, right| {
            left.created_at()
                .cmp(&right.created_at())
                .then_with(|| left.id().cmp(&right.id()))
        });

        Ok(values)
    }

    async fn insert_administrator(&self, administrator: Administrator) -> AppResult<()> {
        let key = (administrator.company_id(), administrator.id());
        let mut administrators = self.administrators.write().await;

        if administrators.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "administrator '{}' already exists for tenant '{}'",
                key.1, key.0
            )));
        }

        if email_taken(&administrators, &administrator) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already used in tenant '{}'",
                administrator.email().as_str(),
                key.0
            )));
        }

        administrators.insert(key, administrator);
        Ok(())
    }

    async fn update_administrator(&self, administrator: Administrator) -> AppResult<()> {
        let key = (administrator.company_id(), administrator.id());
        let mut administrators = self.administrators.write().await;

        if email_taken(&administrators, &administrator) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already used in tenant '{}'",
                administrator.email().as_str(),
                key.0
            )));
        }

        let Some(stored) = administrators.get_mut(&key) else {
            return Err(AppError::NotFound(format!(
                "administrator '{}' does not exist for tenant '{}'",
                key.1, key.0
            )));
        };

        let mut administrator = administrator;
        administrator.set_parent(stored.parent_admin_id(), administrator.updated_at())?;
        *stored = administrator;
        Ok(())
    }

    async fn update_parent(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        parent_admin_id: Option<AdministratorId>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        // The write lock covers the cycle check and the write together.
        let mut administrators = self.administrators.write().await;

        if let Some(parent_admin_id) = parent_admin_id
            && !administrators.contains_key(&(tenant_id, parent_admin_id))
        {
            return Err(AppError::NotFound(format!(
                "parent administrator '{parent_admin_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        let graph = HierarchyGraph::from_administrators(
            administrators
                .iter()
                .filter_map(|((stored_tenant_id, _), administrator)| {
                    (stored_tenant_id == &tenant_id).then_some(administrator)
                }),
        );
        if graph.would_create_cycle(admin_id, parent_admin_id) {
            return Err(AppError::Cycle(format!(
                "administrator '{admin_id}' cannot report to itself or a descendant"
            )));
        }

        let Some(stored) = administrators.get_mut(&(tenant_id, admin_id)) else {
            return Err(AppError::NotFound(format!(
                "administrator '{admin_id}' does not exist for tenant '{tenant_id}'"
            )));
        };

        stored.set_parent(parent_admin_id, updated_at)
    }
}

#[async_trait]
impl ScopeRepository for InMemoryAdministrationStore {
    async fn list_scope_assignments(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        self.list_scope_assignments_impl(tenant_id, admin_id).await
    }

    async fn list_assignments_for_scopes(
        &self,
        tenant_id: TenantId,
        scope_type: ScopeType,
        scope_ids: &[Uuid],
    ) -> AppResult<Vec<ScopeAssignment>> {
        self.list_assignments_for_scopes_impl(tenant_id, scope_type, scope_ids)
            .await
    }

    async fn insert_scope_assignment(&self, assignment: ScopeAssignment) -> AppResult<()> {
        self.insert_scope_assignment_impl(assignment).await
    }

    async fn deactivate_scope_assignment(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<Option<ScopeAssignment>> {
        self.deactivate_scope_assignment_impl(tenant_id, admin_id, assignment_id)
            .await
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryAdministrationStore {
    async fn list_branches_in_school(
        &self,
        tenant_id: TenantId,
        school_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        Ok(self
            .branches
            .read()
            .await
            .get(&(tenant_id, school_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl HierarchyEdgeLog for InMemoryAdministrationStore {
    async fn append_edge(&self, edge: HierarchyEdge) -> AppResult<()> {
        self.edges.write().await.push(edge);
        Ok(())
    }

    async fn list_edges(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<HierarchyEdge>> {
        Ok(self
            .edges
            .read()
            .await
            .iter()
            .filter(|edge| {
                edge.company_id == tenant_id
                    && (edge.child_admin_id == admin_id || edge.parent_admin_id == admin_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditRepository for InMemoryAdministrationStore {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.audit_entries.write().await.push(entry);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAdministrationStore {
    async fn query_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        self.query_entries_impl(tenant_id, query).await
    }

    async fn count_entries(
        &self,
        tenant_id: TenantId,
        filter: &AuditCountFilter,
    ) -> AppResult<u64> {
        self.count_entries_impl(tenant_id, filter).await
    }

    async fn purge_entries_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        self.purge_entries_older_than_impl(cutoff).await
    }
}
