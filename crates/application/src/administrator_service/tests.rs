use std::sync::Arc;

use chrono::Duration;
use scholaris_core::{AppError, RequestMetadata, TenantId};
use scholaris_domain::{
    AdministratorId, AdministratorLevel, AuditAction, PermissionFragment, PermissionKey,
    ScopeCapabilities, ScopeGrant, ScopeType,
};
use uuid::Uuid;

use crate::administration_ports::{ActorContext, AuditLogQuery};
use crate::test_support::{FakeStore, engine, test_now};

use super::{CreateAdministratorRequest, ProfileUpdate};

fn request(level: AdministratorLevel, email: &str) -> CreateAdministratorRequest {
    CreateAdministratorRequest {
        auth_user_id: format!("auth|{email}"),
        display_name: "New Administrator".to_owned(),
        email: email.to_owned(),
        level,
        parent_admin_id: None,
        permission_overrides: None,
        scopes: Vec::new(),
    }
}

fn school_grant(school_id: Uuid) -> ScopeGrant {
    ScopeGrant {
        scope_type: ScopeType::School,
        scope_id: school_id,
        capabilities: ScopeCapabilities {
            can_create_users: true,
            can_modify_users: true,
            ..ScopeCapabilities::default()
        },
        permission_overrides: None,
        expires_at: None,
    }
}

async fn actions(store: &FakeStore) -> Vec<AuditAction> {
    store
        .audit_entries
        .lock()
        .await
        .iter()
        .map(|entry| entry.action)
        .collect()
}

#[tokio::test]
async fn entity_admin_creates_scoped_school_admin() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id()).with_request(RequestMetadata::new(
        Some("192.0.2.4".to_owned()),
        None,
    ));
    let school_id = Uuid::new_v4();

    let created = engine
        .administrators()
        .create_administrator(
            &actor,
            CreateAdministratorRequest {
                scopes: vec![school_grant(school_id)],
                ..request(AdministratorLevel::SchoolAdmin, "S1@School.Example")
            },
        )
        .await
        .unwrap_or_else(|error| panic!("create failed: {error}"));

    assert_eq!(created.parent_admin_id(), Some(entity.id()));
    assert_eq!(created.email().as_str(), "s1@school.example");

    let resolved = engine
        .resolver()
        .resolve_effective_permissions(tenant_id, created.id())
        .await;
    assert!(resolved.users.create_branch_admin);
    assert!(!resolved.users.create_school_admin);
    assert!(!resolved.organization.view_all_schools);

    assert_eq!(
        engine
            .scopes()
            .has_access_to_scope(tenant_id, created.id(), ScopeType::School, school_id)
            .await
            .ok(),
        Some(true)
    );
    assert_eq!(
        actions(&store).await,
        vec![AuditAction::AdminCreated, AuditAction::ScopeAssigned]
    );
    let entries = store.audit_entries.lock().await.clone();
    assert_eq!(entries[0].request.ip_address(), Some("192.0.2.4"));
    assert_eq!(store.edges.lock().await.len(), 1);
}

#[tokio::test]
async fn school_admin_cannot_create_higher_or_equal_levels() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, Some(entity.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, school.id());

    let escalated = engine
        .administrators()
        .create_administrator(&actor, request(AdministratorLevel::EntityAdmin, "e2@school.example"))
        .await;
    assert!(matches!(escalated, Err(AppError::PrivilegeEscalation(_))));

    let peer = engine
        .administrators()
        .create_administrator(&actor, request(AdministratorLevel::SchoolAdmin, "s2@school.example"))
        .await;
    assert!(matches!(peer, Err(AppError::Forbidden(_))));

    let branch = engine
        .administrators()
        .create_administrator(&actor, request(AdministratorLevel::BranchAdmin, "b1@school.example"))
        .await;
    assert!(branch.is_ok());
}

#[tokio::test]
async fn overrides_above_actor_bundle_are_rejected() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, None)
        .await;
    let engine = engine(store.clone());

    let created = engine
        .administrators()
        .create_administrator(
            &ActorContext::new(tenant_id, school.id()),
            CreateAdministratorRequest {
                permission_overrides: Some(
                    PermissionFragment::new().with(PermissionKey::DeleteUsers, true),
                ),
                ..request(AdministratorLevel::BranchAdmin, "b1@school.example")
            },
        )
        .await;

    assert!(matches!(created, Err(AppError::PrivilegeEscalation(_))));
    assert_eq!(store.administrators.lock().await.len(), 1);
}

#[tokio::test]
async fn duplicate_email_in_tenant_is_a_conflict() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let engine = engine(store);
    let actor = ActorContext::new(tenant_id, entity.id());

    let first = engine
        .administrators()
        .create_administrator(
            &actor,
            request(AdministratorLevel::BranchAdmin, "dup@school.example"),
        )
        .await;
    assert!(first.is_ok());

    let second = engine
        .administrators()
        .create_administrator(
            &actor,
            request(AdministratorLevel::BranchAdmin, "DUP@school.example"),
        )
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn self_deactivation_is_denied_even_for_entity_admin() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let engine = engine(store.clone());

    let result = engine
        .administrators()
        .deactivate_administrator(&ActorContext::new(tenant_id, entity.id()), entity.id())
        .await;

    assert!(matches!(
        result,
        Err(AppError::SelfAction(message)) if message == "cannot deactivate your own account"
    ));
    assert!(
        store
            .administrator(entity.id())
            .await
            .is_some_and(|entity| entity.is_active())
    );
    assert!(actions(&store).await.is_empty());
}

#[tokio::test]
async fn entity_admin_updates_own_profile() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());

    let updated = engine
        .administrators()
        .update_profile(
            &actor,
            entity.id(),
            ProfileUpdate {
                display_name: Some("Renamed".to_owned()),
                email: None,
            },
        )
        .await;
    assert_eq!(
        updated.ok().map(|administrator| administrator.display_name().to_owned()),
        Some("Renamed".to_owned())
    );

    let level_change = engine
        .administrators()
        .change_level(&actor, entity.id(), AdministratorLevel::SubEntityAdmin)
        .await;
    assert!(matches!(level_change, Err(AppError::SelfAction(_))));
    assert_eq!(actions(&store).await, vec![AuditAction::AdminModified]);
}

#[tokio::test]
async fn deactivation_moves_reports_to_grandparent() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, Some(entity.id()))
        .await;
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, Some(school.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());

    let deactivated = engine
        .administrators()
        .deactivate_administrator(&actor, school.id())
        .await
        .unwrap_or_else(|error| panic!("deactivate failed: {error}"));

    assert!(!deactivated.is_active());
    assert_eq!(
        store
            .administrator(branch.id())
            .await
            .and_then(|branch| branch.parent_admin_id()),
        Some(entity.id())
    );
    assert_eq!(actions(&store).await, vec![AuditAction::AdminDeleted]);

    let again = engine
        .administrators()
        .deactivate_administrator(&actor, school.id())
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let restored = engine
        .administrators()
        .restore_administrator(&actor, school.id())
        .await;
    assert!(restored.is_ok_and(|school| school.is_active()));
    assert_eq!(
        actions(&store).await,
        vec![AuditAction::AdminDeleted, AuditAction::AdminActivated]
    );
}

#[tokio::test]
async fn permission_changes_audit_each_flipped_flag() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, Some(entity.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());

    let granted = engine
        .administrators()
        .update_permissions(
            &actor,
            branch.id(),
            Some(
                PermissionFragment::new()
                    .with(PermissionKey::ViewAuditLogs, true)
                    .with(PermissionKey::ExportData, true),
            ),
        )
        .await;
    assert!(granted.is_ok());

    let revoked = engine
        .administrators()
        .update_permissions(&actor, branch.id(), None)
        .await;
    assert!(revoked.is_ok());

    let entries = store.audit_entries.lock().await.clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, AuditAction::PermissionGranted);
    assert_eq!(entries[0].changes.len(), 2);
    assert!(entries[0].changes.contains_key("settings.view_audit_logs"));
    assert_eq!(entries[1].action, AuditAction::PermissionRevoked);
    assert!(entries[1].changes.contains_key("settings.export_data"));
}

#[tokio::test]
async fn change_parent_rejects_cycles_and_audits_moves() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let sub_entity = store
        .seed(tenant_id, AdministratorLevel::SubEntityAdmin, Some(entity.id()))
        .await;
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, Some(entity.id()))
        .await;
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, Some(school.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());

    let cycle = engine
        .administrators()
        .change_parent(&actor, school.id(), Some(branch.id()))
        .await;
    assert!(matches!(cycle, Err(AppError::Cycle(_))));

    let detached = engine
        .administrators()
        .change_parent(&actor, school.id(), None)
        .await;
    assert!(matches!(detached, Err(AppError::Validation(_))));

    let moved = engine
        .administrators()
        .change_parent(&actor, school.id(), Some(sub_entity.id()))
        .await;
    assert!(moved.is_ok());
    assert_eq!(actions(&store).await, vec![AuditAction::HierarchyChanged]);
}

#[tokio::test]
async fn scope_changes_are_audited() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, Some(entity.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());

    let assigned = engine
        .administrators()
        .assign_scope(&actor, school.id(), school_grant(Uuid::new_v4()))
        .await;
    let Ok(Some(assigned)) = assigned else {
        panic!("expected scope to be assigned");
    };

    let removed = engine
        .administrators()
        .remove_scope(&actor, school.id(), assigned.id())
        .await;
    assert!(removed.is_ok_and(|removed| !removed.is_active()));

    let own = engine
        .administrators()
        .assign_scope(&actor, entity.id(), school_grant(Uuid::new_v4()))
        .await;
    assert!(matches!(own, Err(AppError::SelfAction(_))));

    assert_eq!(
        actions(&store).await,
        vec![AuditAction::ScopeAssigned, AuditAction::ScopeRemoved]
    );
}

#[tokio::test]
async fn audit_log_requires_view_permission() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, Some(entity.id()))
        .await;
    let engine = engine(store);

    let denied = engine
        .administrators()
        .audit_log(&ActorContext::new(tenant_id, branch.id()), AuditLogQuery::default())
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let allowed = engine
        .administrators()
        .activity_summary(&ActorContext::new(tenant_id, entity.id()))
        .await;
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn visible_listing_for_branch_admin_is_itself() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, Some(entity.id()))
        .await;
    let engine = engine(store);

    let listed = engine
        .administrators()
        .list_visible_administrators(&ActorContext::new(tenant_id, branch.id()))
        .await
        .unwrap_or_default();
    let ids: Vec<AdministratorId> = listed.iter().map(|administrator| administrator.id()).collect();

    assert_eq!(ids, vec![branch.id()]);
}

#[tokio::test]
async fn rejected_initial_grant_leaves_no_administrator_behind() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, entity.id());
    let school_id = Uuid::new_v4();

    let duplicated = engine
        .administrators()
        .create_administrator(
            &actor,
            CreateAdministratorRequest {
                scopes: vec![school_grant(school_id), school_grant(school_id)],
                ..request(AdministratorLevel::SchoolAdmin, "dup@school.example")
            },
        )
        .await;
    assert!(matches!(duplicated, Err(AppError::Validation(_))));

    let expired = engine
        .administrators()
        .create_administrator(
            &actor,
            CreateAdministratorRequest {
                scopes: vec![ScopeGrant {
                    expires_at: Some(test_now() - Duration::days(1)),
                    ..school_grant(school_id)
                }],
                ..request(AdministratorLevel::SchoolAdmin, "dup@school.example")
            },
        )
        .await;
    assert!(matches!(expired, Err(AppError::Validation(_))));

    assert_eq!(store.administrators.lock().await.len(), 1);
    assert!(store.scopes.lock().await.is_empty());
    assert!(store.edges.lock().await.is_empty());
    assert!(actions(&store).await.is_empty());

    let retried = engine
        .administrators()
        .create_administrator(
            &actor,
            CreateAdministratorRequest {
                scopes: vec![school_grant(school_id)],
                ..request(AdministratorLevel::SchoolAdmin, "dup@school.example")
            },
        )
        .await;
    assert!(retried.is_ok());
    assert_eq!(
        actions(&store).await,
        vec![AuditAction::AdminCreated, AuditAction::ScopeAssigned]
    );
}

#[tokio::test]
async fn deactivating_a_root_moves_reports_under_the_actor() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let root = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let acting = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let sub_entity = store
        .seed(tenant_id, AdministratorLevel::SubEntityAdmin, Some(root.id()))
        .await;
    let engine = engine(store.clone());
    let actor = ActorContext::new(tenant_id, acting.id());

    let deactivated = engine
        .administrators()
        .deactivate_administrator(&actor, root.id())
        .await;
    assert!(deactivated.is_ok_and(|root| !root.is_active()));
    assert_eq!(
        store
            .administrator(sub_entity.id())
            .await
            .and_then(|sub_entity| sub_entity.parent_admin_id()),
        Some(acting.id())
    );

    let level_change = engine
        .administrators()
        .change_level(&actor, sub_entity.id(), AdministratorLevel::SchoolAdmin)
        .await;
    assert!(level_change.is_ok());
}
