use std::sync::Arc;

use chrono::{DateTime, Utc};
use scholaris_core::{AppResult, Clock, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, PermissionMergePolicy, PermissionSet, ScopeAssignment,
    default_permissions_for,
};
use tracing::warn;

use crate::administration_ports::{AdministratorRepository, ScopeRepository};

/// Merges level defaults, personal overrides and effective scope overrides.
///
/// Inactive administrators resolve to the minimal bundle. Scope assignments
/// that are inactive or expired at `now` are ignored.
#[must_use]
pub fn resolve_permissions(
    administrator: &Administrator,
    scopes: &[ScopeAssignment],
    now: DateTime<Utc>,
    policy: PermissionMergePolicy,
) -> PermissionSet {
    if !administrator.is_active() {
        return PermissionSet::minimal();
    }

    let mut resolved = default_permissions_for(administrator.level());
    if let Some(overrides) = administrator.permission_overrides() {
        resolved = resolved.merged(overrides, policy);
    }

    for assignment in scopes.iter().filter(|assignment| {
        assignment.admin_id() == administrator.id() && assignment.is_effective(now)
    }) {
        if let Some(overrides) = assignment.permission_overrides() {
            resolved = resolved.merged(overrides, policy);
        }
    }

    resolved
}

/// Application service that computes effective permission bundles.
#[derive(Clone)]
pub struct PermissionResolver {
    administrators: Arc<dyn AdministratorRepository>,
    scopes: Arc<dyn ScopeRepository>,
    clock: Arc<dyn Clock>,
    merge_policy: PermissionMergePolicy,
}

impl PermissionResolver {
    /// Creates a resolver from repository implementations.
    #[must_use]
    pub fn new(
        administrators: Arc<dyn AdministratorRepository>,
        scopes: Arc<dyn ScopeRepository>,
        clock: Arc<dyn Clock>,
        merge_policy: PermissionMergePolicy,
    ) -> Self {
        Self {
            administrators,
            scopes,
            clock,
            merge_policy,
        }
    }

    /// Returns the merge policy applied to overrides.
    #[must_use]
    pub fn merge_policy(&self) -> PermissionMergePolicy {
        self.merge_policy
    }

    /// Resolves the effective bundle of an administrator.
    ///
    /// Never fails: a missing record or a store error resolves to
    /// [`PermissionSet::minimal`].
    pub async fn resolve_effective_permissions(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> PermissionSet {
        match self.administrators.find_administrator(tenant_id, admin_id).await {
            Ok(Some(administrator)) => self.resolve_for(&administrator).await,
            Ok(None) => {
                warn!(
                    tenant_id = %tenant_id,
                    admin_id = %admin_id,
                    "administrator not found, resolving minimal permissions"
                );
                PermissionSet::minimal()
            }
            Err(error) => {
                warn!(
                    tenant_id = %tenant_id,
                    admin_id = %admin_id,
                    error = %error,
                    "administrator lookup failed, resolving minimal permissions"
                );
                PermissionSet::minimal()
            }
        }
    }

    /// Resolves the effective bundle of an already loaded administrator.
    pub async fn resolve_for(&self, administrator: &Administrator) -> PermissionSet {
        match self.try_resolve_for(administrator).await {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(
                    tenant_id = %administrator.company_id(),
                    admin_id = %administrator.id(),
                    error = %error,
                    "scope lookup failed, resolving minimal permissions"
                );
                PermissionSet::minimal()
            }
        }
    }

    async fn try_resolve_for(&self, administrator: &Administrator) -> AppResult<PermissionSet> {
        let scopes = self
            .scopes
            .list_scope_assignments(administrator.company_id(), administrator.id())
            .await?;

        Ok(resolve_permissions(
            administrator,
            &scopes,
            self.clock.now(),
            self.merge_policy,
        ))
    }
}
