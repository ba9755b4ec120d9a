use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use scholaris_core::{AppResult, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, HierarchyEdge, ScopeAssignment, ScopeAssignmentId, ScopeType,
};

/// Repository port for administrator records.
///
/// Implementations enforce `(tenant, email)` uniqueness and report violations
/// as `AppError::Conflict`.
#[async_trait]
pub trait AdministratorRepository: Send + Sync {
    /// Finds one administrator in tenant scope.
    async fn find_administrator(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Option<Administrator>>;

    /// Lists every administrator of a tenant, active or not.
    async fn list_administrators(&self, tenant_id: TenantId) -> AppResult<Vec<Administrator>>;

    /// Inserts a new administrator.
    async fn insert_administrator(&self, administrator: Administrator) -> AppResult<()>;

    /// Replaces an existing administrator record.
    ///
    /// The stored parent pointer is kept; only `update_parent` rewrites it.
    async fn update_administrator(&self, administrator: Administrator) -> AppResult<()>;

    /// Atomically rewrites one parent pointer.
    ///
    /// Implementations must serialize concurrent calls per tenant and reject a
    /// write that would close a cycle with `AppError::Cycle`.
    async fn update_parent(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        parent_admin_id: Option<AdministratorId>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Repository port for scope assignments.
///
/// Implementations enforce one active assignment per administrator and scope
/// entity and report violations as `AppError::Conflict`.
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    /// Lists every assignment row of an administrator, including inactive ones.
    async fn list_scope_assignments(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>>;

    /// Lists every assignment row targeting any of the given entities.
    async fn list_assignments_for_scopes(
        &self,
        tenant_id: TenantId,
        scope_type: ScopeType,
        scope_ids: &[Uuid],
    ) -> AppResult<Vec<ScopeAssignment>>;

    /// Inserts a new assignment.
    async fn insert_scope_assignment(&self, assignment: ScopeAssignment) -> AppResult<()>;

    /// Soft-deletes an active assignment and returns it, or `None` when no active row matched.
    async fn deactivate_scope_assignment(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<Option<ScopeAssignment>>;
}

/// Read port over the school/branch structure owned by another module.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Lists branch ids that belong to a school.
    async fn list_branches_in_school(
        &self,
        tenant_id: TenantId,
        school_id: Uuid,
    ) -> AppResult<Vec<Uuid>>;
}

/// Append-only log of hierarchy edges kept for audit and recovery.
#[async_trait]
pub trait HierarchyEdgeLog: Send + Sync {
    /// Appends one edge row.
    async fn append_edge(&self, edge: HierarchyEdge) -> AppResult<()>;

    /// Lists edge rows touching an administrator, oldest first.
    async fn list_edges(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<HierarchyEdge>>;
}
