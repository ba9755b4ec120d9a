use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use scholaris_core::{AppError, AppResult, Clock, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, AdministratorLevel, PermissionKey, ScopeType,
};

use crate::administration_ports::{
    AccessPolicy, AdministratorRepository, OrganizationDirectory, ScopeRepository,
};
use crate::permission_resolver::PermissionResolver;

mod decision;

pub use decision::{Decision, DenialReason, ModifyIntent, evaluate_assign_level, evaluate_modify};

/// Decision engine for administrator modifications, level grants and visibility.
///
/// The engine only decides. Callers perform the store write and record the
/// audit entry when a decision allows a change.
#[derive(Clone)]
pub struct AuthorizationService {
    administrators: Arc<dyn AdministratorRepository>,
    scopes: Arc<dyn ScopeRepository>,
    directory: Arc<dyn OrganizationDirectory>,
    resolver: PermissionResolver,
    clock: Arc<dyn Clock>,
    policy: AccessPolicy,
}

impl AuthorizationService {
    /// Creates an authorization service.
    #[must_use]
    pub fn new(
        administrators: Arc<dyn AdministratorRepository>,
        scopes: Arc<dyn ScopeRepository>,
        directory: Arc<dyn OrganizationDirectory>,
        resolver: PermissionResolver,
        clock: Arc<dyn Clock>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            administrators,
            scopes,
            directory,
            resolver,
            clock,
            policy,
        }
    }

    /// Decides whether `actor_id` may modify `target_id` with the given intent.
    pub async fn can_modify(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        target_id: AdministratorId,
        intent: ModifyIntent,
    ) -> AppResult<Decision> {
        let actor = self.load(tenant_id, actor_id).await?;
        let target = self.load(tenant_id, target_id).await?;
        Ok(self.decide_modify(&actor, &target, intent).await)
    }

    /// Decides a modification between two loaded administrators.
    pub async fn decide_modify(
        &self,
        actor: &Administrator,
        target: &Administrator,
        intent: ModifyIntent,
    ) -> Decision {
        let decision = evaluate_modify(actor, target, intent);
        if !decision.is_allowed() {
            return decision;
        }

        let required = intent.required_permission(target.level());
        if self.resolver.resolve_for(actor).await.get(required) {
            Decision::Allowed
        } else {
            Decision::Denied(DenialReason::MissingPermission(required))
        }
    }

    /// Returns whether the actor may grant `level` to anyone.
    pub async fn can_assign_level(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        level: AdministratorLevel,
    ) -> AppResult<bool> {
        let actor = self.load(tenant_id, actor_id).await?;
        Ok(actor.is_active() && evaluate_assign_level(actor.level(), level).is_allowed())
    }

    /// Decides whether the actor may create an administrator at `level`.
    pub async fn can_create_administrator(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        level: AdministratorLevel,
    ) -> AppResult<Decision> {
        let actor = self.load(tenant_id, actor_id).await?;
        if !actor.is_active() {
            return Ok(Decision::Denied(DenialReason::InactiveActor));
        }

        let decision = evaluate_assign_level(actor.level(), level);
        if !decision.is_allowed() {
            return Ok(decision);
        }

        let required = PermissionKey::create_for(level);
        if self.resolver.resolve_for(&actor).await.get(required) {
            Ok(Decision::Allowed)
        } else {
            Ok(Decision::Denied(DenialReason::MissingPermission(required)))
        }
    }

    /// Filters `candidates` down to the administrators the actor may see.
    ///
    /// Unknown ids and ids of other tenants are dropped. Order is preserved.
    pub async fn visible_administrators(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        candidates: &[AdministratorId],
    ) -> AppResult<Vec<AdministratorId>> {
        let actor = self.load(tenant_id, actor_id).await?;
        if !actor.is_active() {
            return Ok(Vec::new());
        }

        let administrators: BTreeMap<AdministratorId, Administrator> = self
            .administrators
            .list_administrators(tenant_id)
            .await?
            .into_iter()
            .map(|administrator| (administrator.id(), administrator))
            .collect();

        let visible_branch_admins = match actor.level() {
            AdministratorLevel::SchoolAdmin => self.branch_admins_under_schools_of(&actor).await?,
            _ => BTreeSet::new(),
        };

        Ok(candidates
            .iter()
            .copied()
            .filter(|candidate_id| {
                let Some(candidate) = administrators.get(candidate_id) else {
                    return false;
                };
                if candidate.id() == actor.id() {
                    return true;
                }

                match actor.level() {
                    AdministratorLevel::EntityAdmin => true,
                    AdministratorLevel::SubEntityAdmin => {
                        candidate.level() != AdministratorLevel::EntityAdmin
                            || self.policy.sub_entity_sees_entity_admins
                    }
                    AdministratorLevel::SchoolAdmin => {
                        candidate.level() == AdministratorLevel::BranchAdmin
                            && visible_branch_admins.contains(candidate_id)
                    }
                    AdministratorLevel::BranchAdmin => false,
                }
            })
            .collect())
    }

    /// Fails with `Forbidden` unless the actor's effective bundle grants `permission`.
    pub async fn require_permission(
        &self,
        tenant_id: TenantId,
        actor_id: AdministratorId,
        permission: PermissionKey,
    ) -> AppResult<()> {
        if self
            .resolver
            .resolve_effective_permissions(tenant_id, actor_id)
            .await
            .get(permission)
        {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "administrator '{actor_id}' lacks permission '{permission}' in tenant '{tenant_id}'"
        )))
    }

    async fn branch_admins_under_schools_of(
        &self,
        actor: &Administrator,
    ) -> AppResult<BTreeSet<AdministratorId>> {
        let tenant_id = actor.company_id();
        let now = self.clock.now();
        let school_ids: Vec<_> = self
            .scopes
            .list_scope_assignments(tenant_id, actor.id())
            .await?
            .into_iter()
            .filter(|assignment| {
                assignment.scope_type() == ScopeType::School && assignment.is_effective(now)
            })
            .map(|assignment| assignment.scope_id())
            .collect();

        let mut branch_ids = Vec::new();
        for school_id in school_ids {
            branch_ids.extend(
                self.directory
                    .list_branches_in_school(tenant_id, school_id)
                    .await?,
            );
        }
        if branch_ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        Ok(self
            .scopes
            .list_assignments_for_scopes(tenant_id, ScopeType::Branch, &branch_ids)
            .await?
            .into_iter()
            .filter(|assignment| assignment.is_effective(now))
            .map(|assignment| assignment.admin_id())
            .collect())
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Administrator> {
        self.administrators
            .find_administrator(tenant_id, admin_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "administrator '{admin_id}' does not exist in tenant '{tenant_id}'"
                ))
            })
    }
}
