use std::sync::Arc;

use chrono::Duration;
use scholaris_core::{AppError, TenantId};
use scholaris_domain::{
    AdministratorId, AdministratorLevel, ScopeAssignment, ScopeAssignmentId, ScopeCapabilities,
    ScopeGrant, ScopeType,
};
use uuid::Uuid;

use crate::test_support::{FakeStore, engine, test_now};

fn grant(scope_type: ScopeType, scope_id: Uuid) -> ScopeGrant {
    ScopeGrant {
        scope_type,
        scope_id,
        capabilities: ScopeCapabilities {
            can_view_all: true,
            ..ScopeCapabilities::default()
        },
        permission_overrides: None,
        expires_at: None,
    }
}

#[tokio::test]
async fn assign_list_remove_round_trip() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, Some(entity.id()))
        .await;
    let school_id = Uuid::new_v4();
    let engine = engine(store.clone());
    let scopes = engine.scopes();

    let assigned = scopes
        .assign_scope(
            tenant_id,
            school.id(),
            grant(ScopeType::School, school_id),
            entity.id(),
        )
        .await;
    let Ok(Some(assigned)) = assigned else {
        panic!("expected scope to be assigned");
    };

    let listed = scopes.list_scopes(tenant_id, school.id()).await;
    assert_eq!(listed.ok(), Some(vec![assigned.clone()]));
    assert_eq!(
        scopes
            .has_access_to_scope(tenant_id, school.id(), ScopeType::School, school_id)
            .await
            .ok(),
        Some(true)
    );

    let removed = scopes
        .remove_scope(tenant_id, school.id(), assigned.id())
        .await;
    assert!(removed.is_ok());

    let listed = scopes.list_scopes(tenant_id, school.id()).await;
    assert_eq!(listed.ok(), Some(Vec::new()));
    assert_eq!(
        scopes
            .has_access_to_scope(tenant_id, school.id(), ScopeType::School, school_id)
            .await
            .ok(),
        Some(false)
    );

    let stored: Vec<ScopeAssignment> = store.scopes.lock().await.clone();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_active());
}

#[tokio::test]
async fn entity_admin_scope_assignment_is_a_no_op() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let entity = store
        .seed(tenant_id, AdministratorLevel::EntityAdmin, None)
        .await;

    let assigned = engine(store.clone())
        .scopes()
        .assign_scope(
            tenant_id,
            entity.id(),
            grant(ScopeType::School, Uuid::new_v4()),
            entity.id(),
        )
        .await;

    assert!(matches!(assigned, Ok(None)));
    assert!(store.scopes.lock().await.is_empty());
}

#[tokio::test]
async fn duplicate_active_scope_is_a_conflict() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, None)
        .await;
    let branch_id = Uuid::new_v4();
    let engine = engine(store);
    let scopes = engine.scopes();

    let first = scopes
        .assign_scope(
            tenant_id,
            branch.id(),
            grant(ScopeType::Branch, branch_id),
            branch.id(),
        )
        .await;
    assert!(matches!(first, Ok(Some(_))));

    let second = scopes
        .assign_scope(
            tenant_id,
            branch.id(),
            grant(ScopeType::Branch, branch_id),
            branch.id(),
        )
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn expired_assignment_is_replaced_on_reassign() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, None)
        .await;
    let branch_id = Uuid::new_v4();
    let expired = ScopeAssignment::restore(
        ScopeAssignmentId::new(),
        tenant_id,
        branch.id(),
        ScopeType::Branch,
        branch_id,
        ScopeCapabilities::default(),
        None,
        branch.id(),
        test_now() - Duration::days(10),
        Some(test_now() - Duration::days(1)),
        true,
    );
    store.scopes.lock().await.push(expired);

    let engine = engine(store.clone());
    let reassigned = engine
        .scopes()
        .assign_scope(
            tenant_id,
            branch.id(),
            grant(ScopeType::Branch, branch_id),
            branch.id(),
        )
        .await;

    assert!(matches!(reassigned, Ok(Some(_))));
    let active = store
        .scopes
        .lock()
        .await
        .iter()
        .filter(|assignment| assignment.is_active())
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn assigning_to_unknown_administrator_is_not_found() {
    let store = Arc::new(FakeStore::default());

    let assigned = engine(store)
        .scopes()
        .assign_scope(
            TenantId::new(),
            AdministratorId::new(),
            grant(ScopeType::School, Uuid::new_v4()),
            AdministratorId::new(),
        )
        .await;

    assert!(matches!(assigned, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn removing_unknown_assignment_is_not_found() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let branch = store
        .seed(tenant_id, AdministratorLevel::BranchAdmin, None)
        .await;

    let removed = engine(store)
        .scopes()
        .remove_scope(tenant_id, branch.id(), ScopeAssignmentId::new())
        .await;

    assert!(matches!(removed, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn scope_access_requires_exact_entity_match() {
    let store = Arc::new(FakeStore::default());
    let tenant_id = TenantId::new();
    let school = store
        .seed(tenant_id, AdministratorLevel::SchoolAdmin, None)
        .await;
    let school_id = Uuid::new_v4();
    let branch_id = store.seed_branch(tenant_id, school_id).await;
    store
        .seed_scope(&school, ScopeType::School, school_id, None)
        .await;

    let engine = engine(store);
    let scopes = engine.scopes();

    assert_eq!(
        scopes
            .has_access_to_scope(tenant_id, school.id(), ScopeType::Branch, branch_id)
            .await
            .ok(),
        Some(false)
    );
    assert_eq!(
        scopes
            .has_access_to_scope(tenant_id, school.id(), ScopeType::Branch, school_id)
            .await
            .ok(),
        Some(false)
    );
}
