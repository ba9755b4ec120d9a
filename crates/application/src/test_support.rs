use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use scholaris_core::{AppError, AppResult, FixedClock, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, AdministratorInput, AdministratorLevel, HierarchyEdge,
    HierarchyGraph, PermissionFragment, ScopeAssignment, ScopeAssignmentId, ScopeCapabilities,
    ScopeGrant, ScopeType,
};

use crate::administration_ports::{
    AccessPolicy, AuditCountFilter, AuditLogEntry, AuditLogPage, AuditLogQuery,
    AuditLogRepository, AuditRepository, AdministratorRepository, HierarchyEdgeLog,
    OrganizationDirectory, ScopeRepository,
};
use crate::engine::{AdministrationEngine, AdministrationPorts};

pub(crate) fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub administrators: Mutex<Vec<Administrator>>,
    pub scopes: Mutex<Vec<ScopeAssignment>>,
    pub branches: Mutex<HashMap<(TenantId, Uuid), Vec<Uuid>>>,
    pub edges: Mutex<Vec<HierarchyEdge>>,
    pub audit_entries: Mutex<Vec<AuditLogEntry>>,
    pub fail_audit_writes: AtomicBool,
    pub fail_scope_reads: AtomicBool,
}

impl FakeStore {
    pub(crate) async fn seed(
        &self,
        tenant_id: TenantId,
        level: AdministratorLevel,
        parent_admin_id: Option<AdministratorId>,
    ) -> Administrator {
        let id = AdministratorId::new();
        let administrator = Administrator::new(AdministratorInput {
            id,
            company_id: tenant_id,
            auth_user_id: format!("auth|{id}"),
            display_name: format!("{} {}", level.as_str(), id),
            email: format!("{id}@school.example"),
            level,
            is_active: true,
            parent_admin_id,
            permission_overrides: None,
            created_at: test_now(),
        })
        .unwrap_or_else(|error| panic!("invalid seed administrator: {error}"));

        self.administrators.lock().await.push(administrator.clone());
        administrator
    }

    pub(crate) async fn seed_with_overrides(
        &self,
        tenant_id: TenantId,
        level: AdministratorLevel,
        overrides: PermissionFragment,
    ) -> Administrator {
        let mut administrator = self.seed(tenant_id, level, None).await;
        administrator.set_permission_overrides(Some(overrides), test_now());
        self.replace(administrator.clone()).await;
        administrator
    }

    pub(crate) async fn seed_scope(
        &self,
        administrator: &Administrator,
        scope_type: ScopeType,
        scope_id: Uuid,
        permission_overrides: Option<PermissionFragment>,
    ) -> ScopeAssignment {
        let assignment = ScopeAssignment::new(
            administrator.company_id(),
            administrator.id(),
            ScopeGrant {
                scope_type,
                scope_id,
                capabilities: ScopeCapabilities::default(),
                permission_overrides,
                expires_at: None,
            },
            administrator.id(),
            test_now(),
        )
        .unwrap_or_else(|error| panic!("invalid seed scope: {error}"));

        self.scopes.lock().await.push(assignment.clone());
        assignment
    }

    pub(crate) async fn seed_branch(&self, tenant_id: TenantId, school_id: Uuid) -> Uuid {
        let branch_id = Uuid::new_v4();
        self.branches
            .lock()
            .await
            .entry((tenant_id, school_id))
            .or_default()
            .push(branch_id);
        branch_id
    }

    pub(crate) async fn administrator(&self, admin_id: AdministratorId) -> Option<Administrator> {
        self.administrators
            .lock()
            .await
            .iter()
            .find(|administrator| administrator.id() == admin_id)
            .cloned()
    }

    pub(crate) async fn replace(&self, administrator: Administrator) {
        let mut administrators = self.administrators.lock().await;
        if let Some(stored) = administrators
            .iter_mut()
            .find(|stored| stored.id() == administrator.id())
        {
            *stored = administrator;
        }
    }
}

#[async_trait]
impl AdministratorRepository for FakeStore {
    async fn find_administrator(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Option<Administrator>> {
        Ok(self
            .administrators
            .lock()
            .await
            .iter()
            .find(|administrator| {
                administrator.company_id() == tenant_id && administrator.id() == admin_id
            })
            .cloned())
    }

    async fn list_administrators(&self, tenant_id: TenantId) -> AppResult<Vec<Administrator>> {
        Ok(self
            .administrators
            .lock()
            .await
            .iter()
            .filter(|administrator| administrator.company_id() == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_administrator(&self, administrator: Administrator) -> AppResult<()> {
        let mut administrators = self.administrators.lock().await;
        if administrators.iter().any(|stored| {
            stored.company_id() == administrator.company_id()
                && stored.email() == administrator.email()
        }) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already used in tenant '{}'",
                administrator.email().as_str(),
                administrator.company_id()
            )));
        }
        administrators.push(administrator);
        Ok(())
    }

    async fn update_administrator(&self, administrator: Administrator) -> AppResult<()> {
        let mut administrators = self.administrators.lock().await;
        if administrators.iter().any(|stored| {
            stored.company_id() == administrator.company_id()
                && stored.id() != administrator.id()
                && stored.email() == administrator.email()
        }) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already used",
                administrator.email().as_str()
            )));
        }

        let Some(stored) = administrators.iter_mut().find(|stored| {
            stored.company_id() == administrator.company_id() && stored.id() == administrator.id()
        }) else {
            return Err(AppError::NotFound(format!(
                "administrator '{}' does not exist",
                administrator.id()
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
        let mut administrators = self.administrators.lock().await;
        let graph = HierarchyGraph::from_administrators(
            administrators
                .iter()
                .filter(|administrator| administrator.company_id() == tenant_id),
        );
        if graph.would_create_cycle(admin_id, parent_admin_id) {
            return Err(AppError::Cycle(format!(
                "administrator '{admin_id}' cannot report to a descendant"
            )));
        }

        let Some(stored) = administrators.iter_mut().find(|stored| {
            stored.company_id() == tenant_id && stored.id() == admin_id
        }) else {
            return Err(AppError::NotFound(format!(
                "administrator '{admin_id}' does not exist"
            )));
        };
        stored.set_parent(parent_admin_id, updated_at)
    }
}

#[async_trait]
impl ScopeRepository for FakeStore {
    async fn list_scope_assignments(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        if self.fail_scope_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("scope store unavailable".to_owned()));
        }

        Ok(self
            .scopes
            .lock()
            .await
            .iter()
            .filter(|assignment| {
                assignment.company_id() == tenant_id && assignment.admin_id() == admin_id
            })
            .cloned()
            .collect())
    }

    async fn list_assignments_for_scopes(
        &self,
        tenant_id: TenantId,
        scope_type: ScopeType,
        scope_ids: &[Uuid],
    ) -> AppResult<Vec<ScopeAssignment>> {
        Ok(self
            .scopes
            .lock()
            .await
            .iter()
            .filter(|assignment| {
                assignment.company_id() == tenant_id
                    && assignment.scope_type() == scope_type
                    && scope_ids.contains(&assignment.scope_id())
            })
            .cloned()
            .collect())
    }

    async fn insert_scope_assignment(&self, assignment: ScopeAssignment) -> AppResult<()> {
        let mut scopes = self.scopes.lock().await;
        if scopes.iter().any(|stored| {
            stored.is_active()
                && stored.company_id() == assignment.company_id()
                && stored.admin_id() == assignment.admin_id()
                && stored.targets(assignment.scope_type(), assignment.scope_id())
        }) {
            return Err(AppError::Conflict("scope already assigned".to_owned()));
        }
        scopes.push(assignment);
        Ok(())
    }

    async fn deactivate_scope_assignment(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<Option<ScopeAssignment>> {
        let mut scopes = self.scopes.lock().await;
        Ok(scopes
            .iter_mut()
            .find(|stored| {
                stored.is_active()
                    && stored.company_id() == tenant_id
                    && stored.admin_id() == admin_id
                    && stored.id() == assignment_id
            })
            .map(|stored| {
                stored.deactivate();
                stored.clone()
            }))
    }
}

#[async_trait]
impl OrganizationDirectory for FakeStore {
    async fn list_branches_in_school(
        &self,
        tenant_id: TenantId,
        school_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        Ok(self
            .branches
            .lock()
            .await
            .get(&(tenant_id, school_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl HierarchyEdgeLog for FakeStore {
    async fn append_edge(&self, edge: HierarchyEdge) -> AppResult<()> {
        self.edges.lock().await.push(edge);
        Ok(())
    }

    async fn list_edges(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<HierarchyEdge>> {
        Ok(self
            .edges
            .lock()
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
impl AuditRepository for FakeStore {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }
        self.audit_entries.lock().await.push(entry);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for FakeStore {
    async fn query_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let entries = self.audit_entries.lock().await;
        let mut matching: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|entry| entry.company_id == tenant_id && query.matches(entry))
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        let total = matching.len() as u64;
        Ok(AuditLogPage {
            entries: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .collect(),
            total,
        })
    }

    async fn count_entries(
        &self,
        tenant_id: TenantId,
        filter: &AuditCountFilter,
    ) -> AppResult<u64> {
        Ok(self
            .audit_entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.company_id == tenant_id && filter.matches(entry))
            .count() as u64)
    }

    async fn purge_entries_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.audit_entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

pub(crate) fn engine_with(store: Arc<FakeStore>, policy: AccessPolicy) -> AdministrationEngine {
    AdministrationEngine::new(
        AdministrationPorts {
            administrators: store.clone(),
            scopes: store.clone(),
            directory: store.clone(),
            hierarchy_edges: store.clone(),
            audit: store.clone(),
            audit_log: store,
        },
        Arc::new(FixedClock::new(test_now())),
        policy,
    )
}

pub(crate) fn engine(store: Arc<FakeStore>) -> AdministrationEngine {
    engine_with(store, AccessPolicy::default())
}
