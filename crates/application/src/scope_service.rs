use std::collections::HashSet;
use std::sync::Arc;

use scholaris_core::{AppError, AppResult, Clock, TenantId};
use scholaris_domain::{
    AdministratorId, AdministratorLevel, ScopeAssignment, ScopeAssignmentId, ScopeGrant,
    ScopeType,
};
use tracing::warn;
use uuid::Uuid;

use crate::administration_ports::{AdministratorRepository, ScopeRepository};

/// Application service over school and branch scope assignments.
#[derive(Clone)]
pub struct ScopeService {
    administrators: Arc<dyn AdministratorRepository>,
    scopes: Arc<dyn ScopeRepository>,
    clock: Arc<dyn Clock>,
}

impl ScopeService {
    /// Creates a scope service from repository implementations.
    #[must_use]
    pub fn new(
        administrators: Arc<dyn AdministratorRepository>,
        scopes: Arc<dyn ScopeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            administrators,
            scopes,
            clock,
        }
    }

    /// Lists assignments that are active and not expired.
    pub async fn list_scopes(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        let now = self.clock.now();
        Ok(self
            .scopes
            .list_scope_assignments(tenant_id, admin_id)
            .await?
            .into_iter()
            .filter(|assignment| assignment.is_effective(now))
            .collect())
    }

    /// Assigns a scope to an administrator.
    ///
    /// Returns `None` without writing when the administrator is an entity
    /// administrator, whose access already covers the whole tenant. An
    /// expired assignment for the same entity is retired before the new one
    /// is inserted.
    pub async fn assign_scope(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        grant: ScopeGrant,
        assigned_by: AdministratorId,
    ) -> AppResult<Option<ScopeAssignment>> {
        let administrator = self
            .administrators
            .find_administrator(tenant_id, admin_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "administrator '{admin_id}' does not exist in tenant '{tenant_id}'"
                ))
            })?;

        if administrator.level() == AdministratorLevel::EntityAdmin {
            warn!(
                tenant_id = %tenant_id,
                admin_id = %admin_id,
                scope_type = %grant.scope_type,
                scope_id = %grant.scope_id,
                "ignoring scope assignment for entity administrator"
            );
            return Ok(None);
        }

        let now = self.clock.now();
        let existing = self
            .scopes
            .list_scope_assignments(tenant_id, admin_id)
            .await?;
        for stale in existing.iter().filter(|assignment| {
            assignment.is_active() && assignment.targets(grant.scope_type, grant.scope_id)
        }) {
            if stale.is_effective(now) {
                return Err(AppError::Conflict(format!(
                    "administrator '{admin_id}' is already assigned to {} '{}'",
                    grant.scope_type, grant.scope_id
                )));
            }
            self.scopes
                .deactivate_scope_assignment(tenant_id, admin_id, stale.id())
                .await?;
        }

        let assignment = ScopeAssignment::new(tenant_id, admin_id, grant, assigned_by, now)?;
        self.scopes
            .insert_scope_assignment(assignment.clone())
            .await?;

        Ok(Some(assignment))
    }

    /// Builds the initial assignments for an administrator that is not stored yet.
    ///
    /// Every grant is validated up front so a rejected grant leaves nothing
    /// behind. Entity administrators get no rows.
    pub fn prepare_initial_scopes(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        level: AdministratorLevel,
        grants: Vec<ScopeGrant>,
        assigned_by: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        if level == AdministratorLevel::EntityAdmin {
            if !grants.is_empty() {
                warn!(
                    tenant_id = %tenant_id,
                    admin_id = %admin_id,
                    grants = grants.len(),
                    "ignoring initial scopes for entity administrator"
                );
            }
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut seen = HashSet::new();
        grants
            .into_iter()
            .map(|grant| {
                if !seen.insert((grant.scope_type, grant.scope_id)) {
                    return Err(AppError::Validation(format!(
                        "{} '{}' is granted more than once",
                        grant.scope_type, grant.scope_id
                    )));
                }
                ScopeAssignment::new(tenant_id, admin_id, grant, assigned_by, now)
            })
            .collect()
    }

    /// Stores assignments built by `prepare_initial_scopes`.
    pub async fn insert_prepared(&self, assignments: &[ScopeAssignment]) -> AppResult<()> {
        for assignment in assignments {
            self.scopes
                .insert_scope_assignment(assignment.clone())
                .await?;
        }

        Ok(())
    }

    /// Soft-deletes an active assignment.
    pub async fn remove_scope(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<ScopeAssignment> {
        self.scopes
            .deactivate_scope_assignment(tenant_id, admin_id, assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "administrator '{admin_id}' has no active scope assignment '{assignment_id}'"
                ))
            })
    }

    /// Returns whether an effective assignment targets exactly this entity.
    pub async fn has_access_to_scope(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        scope_type: ScopeType,
        scope_id: Uuid,
    ) -> AppResult<bool> {
        Ok(self
            .list_scopes(tenant_id, admin_id)
            .await?
            .iter()
            .any(|assignment| assignment.targets(scope_type, scope_id)))
    }
}

#[cfg(test)]
mod tests;
