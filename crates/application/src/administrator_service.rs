use std::sync::Arc;

use scholaris_core::{AppError, AppResult, Clock, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, AdministratorInput, AdministratorLevel, AuditAction,
    PermissionFragment, PermissionKey, PermissionSet, ScopeAssignment, ScopeAssignmentId,
    ScopeGrant,
};
use serde_json::Value;

use crate::administration_ports::{
    ActivitySummary, ActorContext, AdministratorRepository, AuditLogPage, AuditLogQuery,
    NewAuditEntry,
};
use crate::audit_recorder::AuditRecorder;
use crate::authorization_service::{AuthorizationService, DenialReason, ModifyIntent};
use crate::hierarchy_service::HierarchyService;
use crate::permission_resolver::PermissionResolver;
use crate::scope_service::ScopeService;

const TARGET_ADMINISTRATOR: &str = "administrator";
const TARGET_SCOPE: &str = "scope_assignment";

/// Input payload for creating an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAdministratorRequest {
    /// Identity-provider subject.
    pub auth_user_id: String,
    /// Display name.
    pub display_name: String,
    /// Contact email.
    pub email: String,
    /// Requested level.
    pub level: AdministratorLevel,
    /// Reporting parent; defaults to the actor for non-root levels.
    pub parent_admin_id: Option<AdministratorId>,
    /// Optional personal overrides.
    pub permission_overrides: Option<PermissionFragment>,
    /// Initial scope grants.
    pub scopes: Vec<ScopeGrant>,
}

/// Profile fields to change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New contact email.
    pub email: Option<String>,
}

/// Orchestrates administrator mutations: decide, write, then audit.
#[derive(Clone)]
pub struct AdministratorService {
    administrators: Arc<dyn AdministratorRepository>,
    authorization: AuthorizationService,
    resolver: PermissionResolver,
    scopes: ScopeService,
    hierarchy: HierarchyService,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
}

impl AdministratorService {
    /// Creates the orchestration service from its collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        administrators: Arc<dyn AdministratorRepository>,
        authorization: AuthorizationService,
        resolver: PermissionResolver,
        scopes: ScopeService,
        hierarchy: HierarchyService,
        audit: AuditRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            administrators,
            authorization,
            resolver,
            scopes,
            hierarchy,
            audit,
            clock,
        }
    }

    /// Creates an administrator, its initial scopes and their audit entries.
    pub async fn create_administrator(
        &self,
        actor: &ActorContext,
        request: CreateAdministratorRequest,
    ) -> AppResult<Administrator> {
        let tenant_id = actor.tenant_id();
        self.authorization
            .can_create_administrator(tenant_id, actor.actor_id(), request.level)
            .await?
            .into_result()?;

        let parent_admin_id = match request.parent_admin_id {
            Some(parent_admin_id) => Some(parent_admin_id),
            None if request.level.is_root_level() => None,
            None => Some(actor.actor_id()),
        };
        if let Some(parent_admin_id) = parent_admin_id {
            let parent = self.load(tenant_id, parent_admin_id).await?;
            if request.level.outranks(parent.level()) {
                return Err(AppError::Validation(format!(
                    "{} cannot report to {} '{parent_admin_id}'",
                    request.level,
                    parent.level()
                )));
            }
        }

        let actor_record = self.load(tenant_id, actor.actor_id()).await?;
        let actor_permissions = self.resolver.resolve_for(&actor_record).await;
        if let Some(overrides) = &request.permission_overrides {
            ensure_grantable(&actor_permissions, overrides)?;
        }
        for grant in &request.scopes {
            if let Some(overrides) = &grant.permission_overrides {
                ensure_grantable(&actor_permissions, overrides)?;
            }
        }

        let admin_id = AdministratorId::new();
        let assignments = self.scopes.prepare_initial_scopes(
            tenant_id,
            admin_id,
            request.level,
            request.scopes,
            actor.actor_id(),
        )?;

        let administrator = Administrator::new(AdministratorInput {
            id: admin_id,
            company_id: tenant_id,
            auth_user_id: request.auth_user_id,
            display_name: request.display_name,
            email: request.email,
            level: request.level,
            is_active: true,
            parent_admin_id,
            permission_overrides: request.permission_overrides,
            created_at: self.clock.now(),
        })?;
        self.administrators
            .insert_administrator(administrator.clone())
            .await?;
        self.scopes.insert_prepared(&assignments).await?;
        self.hierarchy
            .log_initial_parent(tenant_id, actor.actor_id(), administrator.id(), parent_admin_id)
            .await;

        self.audit
            .record(
                self.entry(actor, AuditAction::AdminCreated)
                    .with_target(TARGET_ADMINISTRATOR, administrator.id())
                    .with_change("level", Value::Null, administrator.level().as_str())
                    .with_change("email", Value::Null, administrator.email().as_str())
                    .with_change(
                        "parent_admin_id",
                        Value::Null,
                        optional_id(administrator.parent_admin_id()),
                    ),
            )
            .await;

        for assignment in &assignments {
            self.record_scope(actor, AuditAction::ScopeAssigned, assignment).await;
        }

        Ok(administrator)
    }

    /// Changes display name and email.
    pub async fn update_profile(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        update: ProfileUpdate,
    ) -> AppResult<Administrator> {
        let mut target = self
            .authorize(actor, admin_id, ModifyIntent::ProfileUpdate)
            .await?;
        let now = self.clock.now();
        let mut entry = self
            .entry(actor, AuditAction::AdminModified)
            .with_target(TARGET_ADMINISTRATOR, admin_id);

        if let Some(display_name) = update.display_name {
            let previous = target.display_name().to_owned();
            target.rename(&display_name, now)?;
            if previous != target.display_name() {
                entry = entry.with_change("display_name", previous, target.display_name());
            }
        }
        if let Some(email) = update.email {
            let previous = target.email().as_str().to_owned();
            target.change_email(&email, now)?;
            if previous != target.email().as_str() {
                entry = entry.with_change("email", previous, target.email().as_str());
            }
        }

        if entry.changes.is_empty() {
            return Ok(target);
        }

        self.administrators
            .update_administrator(target.clone())
            .await?;
        self.audit.record(entry).await;
        Ok(target)
    }

    /// Moves an administrator to another level.
    ///
    /// The new level must not exceed the actor's level, must not outrank the
    /// parent and must not be outranked by any direct child.
    pub async fn change_level(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        level: AdministratorLevel,
    ) -> AppResult<Administrator> {
        let tenant_id = actor.tenant_id();
        let mut target = self
            .authorize(actor, admin_id, ModifyIntent::LevelChange)
            .await?;
        let actor_record = self.load(tenant_id, actor.actor_id()).await?;
        if level.outranks(actor_record.level()) {
            return Err(AppError::PrivilegeEscalation(
                DenialReason::LevelAboveActor {
                    actor_level: actor_record.level(),
                    requested_level: level,
                }
                .to_string(),
            ));
        }

        let previous = target.level();
        if previous == level {
            return Ok(target);
        }

        let administrators = self.administrators.list_administrators(tenant_id).await?;
        if let Some(parent) = target.parent_admin_id().and_then(|parent_admin_id| {
            administrators
                .iter()
                .find(|administrator| administrator.id() == parent_admin_id)
        }) && level.outranks(parent.level())
        {
            return Err(AppError::Validation(format!(
                "{level} cannot report to {} '{}'",
                parent.level(),
                parent.id()
            )));
        }
        if let Some(child) = administrators.iter().find(|administrator| {
            administrator.parent_admin_id() == Some(admin_id)
                && administrator.level().outranks(level)
        }) {
            return Err(AppError::Validation(format!(
                "{} '{}' cannot report to {level}",
                child.level(),
                child.id()
            )));
        }
        if target.parent_admin_id().is_none() && !level.is_root_level() {
            return Err(AppError::Validation(format!(
                "{level} administrators need a reporting parent"
            )));
        }

        target.change_level(level, self.clock.now());
        self.administrators
            .update_administrator(target.clone())
            .await?;
        self.audit
            .record(
                self.entry(actor, AuditAction::AdminModified)
                    .with_target(TARGET_ADMINISTRATOR, admin_id)
                    .with_change("level", previous.as_str(), level.as_str()),
            )
            .await;

        Ok(target)
    }

    /// Replaces personal overrides and audits every flag that flipped.
    pub async fn update_permissions(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        overrides: Option<PermissionFragment>,
    ) -> AppResult<Administrator> {
        let tenant_id = actor.tenant_id();
        let mut target = self
            .authorize(actor, admin_id, ModifyIntent::PermissionChange)
            .await?;
        if let Some(overrides) = &overrides {
            let actor_record = self.load(tenant_id, actor.actor_id()).await?;
            ensure_grantable(&self.resolver.resolve_for(&actor_record).await, overrides)?;
        }

        let before = self.resolver.resolve_for(&target).await;
        let previous_overrides = target.permission_overrides().cloned();
        target.set_permission_overrides(overrides, self.clock.now());
        self.administrators
            .update_administrator(target.clone())
            .await?;
        let after = self.resolver.resolve_for(&target).await;

        let diff = before.diff(&after);
        if !diff.granted.is_empty() {
            self.audit
                .record(permission_entry(
                    self.entry(actor, AuditAction::PermissionGranted)
                        .with_target(TARGET_ADMINISTRATOR, admin_id),
                    &diff.granted,
                    false,
                ))
                .await;
        }
        if !diff.revoked.is_empty() {
            self.audit
                .record(permission_entry(
                    self.entry(actor, AuditAction::PermissionRevoked)
                        .with_target(TARGET_ADMINISTRATOR, admin_id),
                    &diff.revoked,
                    true,
                ))
                .await;
        }
        if diff.is_empty() && previous_overrides.as_ref() != target.permission_overrides() {
            self.audit
                .record(
                    self.entry(actor, AuditAction::AdminModified)
                        .with_target(TARGET_ADMINISTRATOR, admin_id)
                        .with_change(
                            "permission_overrides",
                            optional_fragment(previous_overrides.as_ref()),
                            optional_fragment(target.permission_overrides()),
                        ),
                )
                .await;
        }

        Ok(target)
    }

    /// Deactivates an administrator after moving its direct reports to its parent.
    ///
    /// A root has no parent, so its reports move under the actor instead.
    pub async fn deactivate_administrator(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
    ) -> AppResult<Administrator> {
        let tenant_id = actor.tenant_id();
        let target = self
            .authorize(actor, admin_id, ModifyIntent::Deactivate)
            .await?;
        if !target.is_active() {
            return Err(AppError::Conflict(format!(
                "administrator '{admin_id}' is already deactivated"
            )));
        }

        let new_parent = target.parent_admin_id().or(Some(actor.actor_id()));
        let reassigned = self
            .hierarchy
            .reassign_children(tenant_id, actor.actor_id(), admin_id, new_parent)
            .await?;

        let mut target = self.load(tenant_id, admin_id).await?;
        target.set_active(false, self.clock.now());
        self.administrators
            .update_administrator(target.clone())
            .await?;
        self.audit
            .record(
                self.entry(actor, AuditAction::AdminDeleted)
                    .with_target(TARGET_ADMINISTRATOR, admin_id)
                    .with_change("is_active", true, false)
                    .with_change("reassigned_children", Value::Null, reassigned),
            )
            .await;

        Ok(target)
    }

    /// Reactivates a deactivated administrator.
    pub async fn restore_administrator(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
    ) -> AppResult<Administrator> {
        let mut target = self
            .authorize(actor, admin_id, ModifyIntent::Restore)
            .await?;
        if target.is_active() {
            return Err(AppError::Conflict(format!(
                "administrator '{admin_id}' is already active"
            )));
        }

        target.set_active(true, self.clock.now());
        self.administrators
            .update_administrator(target.clone())
            .await?;
        self.audit
            .record(
                self.entry(actor, AuditAction::AdminActivated)
                    .with_target(TARGET_ADMINISTRATOR, admin_id)
                    .with_change("is_active", false, true),
            )
            .await;

        Ok(target)
    }

    /// Moves an administrator under another parent.
    pub async fn change_parent(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        parent_admin_id: Option<AdministratorId>,
    ) -> AppResult<()> {
        let target = self
            .authorize(actor, admin_id, ModifyIntent::HierarchyChange)
            .await?;
        if parent_admin_id.is_none() && !target.level().is_root_level() {
            return Err(AppError::Validation(format!(
                "{} administrators need a reporting parent",
                target.level()
            )));
        }

        let previous = self
            .hierarchy
            .set_parent(actor.tenant_id(), actor.actor_id(), admin_id, parent_admin_id)
            .await?;
        if previous != parent_admin_id {
            self.audit
                .record(
                    self.entry(actor, AuditAction::HierarchyChanged)
                        .with_target(TARGET_ADMINISTRATOR, admin_id)
                        .with_change(
                            "parent_admin_id",
                            optional_id(previous),
                            optional_id(parent_admin_id),
                        ),
                )
                .await;
        }

        Ok(())
    }

    /// Assigns a scope on behalf of the actor.
    pub async fn assign_scope(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        grant: ScopeGrant,
    ) -> AppResult<Option<ScopeAssignment>> {
        let tenant_id = actor.tenant_id();
        self.authorize(actor, admin_id, ModifyIntent::ScopeChange)
            .await?;
        if let Some(overrides) = &grant.permission_overrides {
            let actor_record = self.load(tenant_id, actor.actor_id()).await?;
            ensure_grantable(&self.resolver.resolve_for(&actor_record).await, overrides)?;
        }

        let assignment = self
            .scopes
            .assign_scope(tenant_id, admin_id, grant, actor.actor_id())
            .await?;
        if let Some(assignment) = &assignment {
            self.record_scope(actor, AuditAction::ScopeAssigned, assignment).await;
        }

        Ok(assignment)
    }

    /// Removes a scope on behalf of the actor.
    pub async fn remove_scope(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<ScopeAssignment> {
        self.authorize(actor, admin_id, ModifyIntent::ScopeChange)
            .await?;
        let assignment = self
            .scopes
            .remove_scope(actor.tenant_id(), admin_id, assignment_id)
            .await?;
        self.record_scope(actor, AuditAction::ScopeRemoved, &assignment)
            .await;

        Ok(assignment)
    }

    /// Lists the administrators of the tenant that the actor may see.
    pub async fn list_visible_administrators(
        &self,
        actor: &ActorContext,
    ) -> AppResult<Vec<Administrator>> {
        let administrators = self
            .administrators
            .list_administrators(actor.tenant_id())
            .await?;
        let candidates: Vec<AdministratorId> =
            administrators.iter().map(Administrator::id).collect();
        let visible = self
            .authorization
            .visible_administrators(actor.tenant_id(), actor.actor_id(), &candidates)
            .await?;

        Ok(administrators
            .into_iter()
            .filter(|administrator| visible.contains(&administrator.id()))
            .collect())
    }

    /// Reads the tenant audit log.
    pub async fn audit_log(
        &self,
        actor: &ActorContext,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        self.authorization
            .require_permission(actor.tenant_id(), actor.actor_id(), PermissionKey::ViewAuditLogs)
            .await?;
        self.audit.query(actor.tenant_id(), query).await
    }

    /// Reads tenant activity counters.
    pub async fn activity_summary(&self, actor: &ActorContext) -> AppResult<ActivitySummary> {
        self.authorization
            .require_permission(actor.tenant_id(), actor.actor_id(), PermissionKey::ViewAuditLogs)
            .await?;
        self.audit.activity_summary(actor.tenant_id()).await
    }

    async fn authorize(
        &self,
        actor: &ActorContext,
        admin_id: AdministratorId,
        intent: ModifyIntent,
    ) -> AppResult<Administrator> {
        let tenant_id = actor.tenant_id();
        let actor_record = self.load(tenant_id, actor.actor_id()).await?;
        let target = self.load(tenant_id, admin_id).await?;
        self.authorization
            .decide_modify(&actor_record, &target, intent)
            .await
            .into_result()?;
        Ok(target)
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

    fn entry(&self, actor: &ActorContext, action: AuditAction) -> NewAuditEntry {
        NewAuditEntry::new(actor.tenant_id(), action, actor.actor_id())
            .with_request(actor.request().clone())
    }

    async fn record_scope(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        assignment: &ScopeAssignment,
    ) {
        self.audit
            .record(
                self.entry(actor, action)
                    .with_target(TARGET_SCOPE, assignment.id())
                    .with_change(
                        "admin_id",
                        Value::Null,
                        assignment.admin_id().to_string(),
                    )
                    .with_change("scope_type", Value::Null, assignment.scope_type().as_str())
                    .with_change("scope_id", Value::Null, assignment.scope_id().to_string())
                    .with_change(
                        "is_active",
                        action == AuditAction::ScopeRemoved,
                        assignment.is_active(),
                    ),
            )
            .await;
    }
}

fn ensure_grantable(
    actor_permissions: &PermissionSet,
    overrides: &PermissionFragment,
) -> AppResult<()> {
    match overrides
        .entries()
        .find(|(key, value)| *value && !actor_permissions.get(*key))
    {
        Some((key, _)) => Err(AppError::PrivilegeEscalation(format!(
            "cannot grant permission '{key}' the actor does not hold"
        ))),
        None => Ok(()),
    }
}

fn permission_entry(entry: NewAuditEntry, keys: &[PermissionKey], old: bool) -> NewAuditEntry {
    keys.iter()
        .fold(entry, |entry, key| entry.with_change(&key.to_string(), old, !old))
}

fn optional_id(admin_id: Option<AdministratorId>) -> Value {
    admin_id.map_or(Value::Null, |admin_id| Value::String(admin_id.to_string()))
}

fn optional_fragment(fragment: Option<&PermissionFragment>) -> Value {
    fragment.map_or(Value::Null, PermissionFragment::to_json)
}

#[cfg(test)]
mod tests;
