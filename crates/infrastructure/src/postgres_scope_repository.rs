use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholaris_application::ScopeRepository;
use scholaris_core::{AppError, AppResult, TenantId};
use scholaris_domain::{
    AdministratorId, PermissionFragment, ScopeAssignment, ScopeAssignmentId, ScopeCapabilities,
    ScopeType,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;


/// PostgreSQL-backed scope assignment repository.
#[derive(Clone)]
pub struct PostgresScopeRepository {
    pool: PgPool,
}

impl PostgresScopeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScopeAssignmentRow {
    id: Uuid,
    company_id: Uuid,
    admin_id: Uuid,
    scope_type: String,
    scope_id: Uuid,
    can_create_users: bool,
    can_modify_users: bool,
    can_delete_users: bool,
    can_view_all: bool,
    can_export_data: bool,
    can_manage_settings: bool,
    permission_overrides: Option<Value>,
    assigned_by: Uuid,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

fn assignment_from_row(row: ScopeAssignmentRow) -> AppResult<ScopeAssignment> {
    let assignment_id = row.id;
    let invalid = move |error: AppError| {
        AppError::Internal(format!(
            "persisted scope assignment '{assignment_id}' is invalid: {error}"
        ))
    };

    let scope_type = ScopeType::from_str(row.scope_type.as_str()).map_err(invalid)?;
    let permission_overrides = row
        .permission_overrides
        .as_ref()
        .map(PermissionFragment::from_json)
        .transpose()
        .map_err(invalid)?;

    Ok(ScopeAssignment::restore(
        ScopeAssignmentId::from_uuid(row.id),
        TenantId::from_uuid(row.company_id),
        AdministratorId::from_uuid(row.admin_id),
        scope_type,
        row.scope_id,
        ScopeCapabilities {
            can_create_users: row.can_create_users,
            can_modify_users: row.can_modify_users,
            can_delete_users: row.can_delete_users,
            can_view_all: row.can_view_all,
            can_export_data: row.can_export_data,
            can_manage_settings: row.can_manage_settings,
        },
        permission_overrides,
        AdministratorId::from_uuid(row.assigned_by),
        row.assigned_at,
        row.expires_at,
        row.is_active,
    ))
}

#[async_trait]
impl ScopeRepository for PostgresScopeRepository {
    async fn list_scope_assignments(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        let rows = sqlx::query_as::<_, ScopeAssignmentRow>(
            r#"
            SELECT
                id, company_id, admin_id, scope_type, scope_id,
                can_create_users, can_modify_users, can_delete_users,
                can_view_all, can_export_data, can_manage_settings,
                permission_overrides, assigned_by, assigned_at, expires_at, is_active
            FROM administrator_scopes
            WHERE company_id = $1 AND admin_id = $2
            ORDER BY assigned_at, id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(admin_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list scopes of administrator '{admin_id}' ({tenant_id}): {error}"
            ))
        })?;

        rows.into_iter().map(assignment_from_row).collect()
    }

    async fn list_assignments_for_scopes(
        &self,
        tenant_id: TenantId,
        scope_type: ScopeType,
        scope_ids: &[Uuid],
    ) -> AppResult<Vec<ScopeAssignment>> {
        if scope_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ScopeAssignmentRow>(
            r#"
            SELECT
                id, company_id, admin_id, scope_type, scope_id,
                can_create_users, can_modify_users, can_delete_users,
                can_view_all, can_export_data, can_manage_settings,
                permission_overrides, assigned_by, assigned_at, expires_at, is_active
            FROM administrator_scopes
            WHERE company_id = $1 AND scope_type = $2 AND scope_id = ANY($3)
            ORDER BY assigned_at, id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(scope_type.as_str())
        .bind(scope_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list {scope_type} scope assignments in tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(assignment_from_row).collect()
    }

    async fn insert_scope_assignment(&self, assignment: ScopeAssignment) -> AppResult<()> {
        let capabilities = assignment.capabilities();
        let result = sqlx::query(
            r#"
            INSERT INTO administrator_scopes (
                id, company_id, admin_id, scope_type, scope_id,
                can_create_users, can_modify_users, can_delete_users,
                can_view_all, can_export_data, can_manage_settings,
                permission_overrides, assigned_by, assigned_at, expires_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(assignment.id().as_uuid())
        .bind(assignment.company_id().as_uuid())
        .bind(assignment.admin_id().as_uuid())
        .bind(assignment.scope_type().as_str())
        .bind(assignment.scope_id())
        .bind(capabilities.can_create_users)
        .bind(capabilities.can_modify_users)
        .bind(capabilities.can_delete_users)
        .bind(capabilities.can_view_all)
        .bind(capabilities.can_export_data)
        .bind(capabilities.can_manage_settings)
        .bind(
            assignment
                .permission_overrides()
                .map(PermissionFragment::to_json),
        )
        .bind(assignment.assigned_by().as_uuid())
        .bind(assignment.assigned_at())
        .bind(assignment.expires_at())
        .bind(assignment.is_active())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "administrator '{}' already holds an active {} scope '{}'",
                        assignment.admin_id(),
                        assignment.scope_type(),
                        assignment.scope_id()
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to save scope assignment '{}': {error}",
                    assignment.id()
                )))
            }
        }
    }

    async fn deactivate_scope_assignment(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<Option<ScopeAssignment>> {
        let row = sqlx::query_as::<_, ScopeAssignmentRow>(
            r#"
            UPDATE administrator_scopes
            SET is_active = FALSE
            WHERE company_id = $1 AND admin_id = $2 AND id = $3 AND is_active
            RETURNING
                id, company_id, admin_id, scope_type, scope_id,
                can_create_users, can_modify_users, can_delete_users,
                can_view_all, can_export_data, can_manage_settings,
                permission_overrides, assigned_by, assigned_at, expires_at, is_active
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(admin_id.as_uuid())
        .bind(assignment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to deactivate scope assignment '{assignment_id}': {error}"
            ))
        })?;

        row.map(assignment_from_row).transpose()
    }
}
