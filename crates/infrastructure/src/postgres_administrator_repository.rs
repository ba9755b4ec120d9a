use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholaris_application::AdministratorRepository;
use scholaris_core::{AppError, AppResult, TenantId};
use scholaris_domain::{
    Administrator, AdministratorId, AdministratorInput, AdministratorLevel, PermissionFragment,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;


/// PostgreSQL-backed administrator repository.
#[derive(Clone)]
pub struct PostgresAdministratorRepository {
    pool: PgPool,
}

impl PostgresAdministratorRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AdministratorRow {
    id: Uuid,
    company_id: Uuid,
    auth_user_id: String,
    display_name: String,
    email: String,
    admin_level: String,
    is_active: bool,
    parent_admin_id: Option<Uuid>,
    permission_overrides: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn administrator_from_row(row: AdministratorRow) -> AppResult<Administrator> {
    let admin_id = row.id;
    let invalid = move |error: AppError| {
        AppError::Internal(format!(
            "persisted administrator '{admin_id}' is invalid: {error}"
        ))
    };

    let level = AdministratorLevel::from_str(row.admin_level.as_str()).map_err(invalid)?;
    let permission_overrides = row
        .permission_overrides
        .as_ref()
        .map(PermissionFragment::from_json)
        .transpose()
        .map_err(invalid)?;

    Administrator::restore(
        AdministratorInput {
            id: AdministratorId::from_uuid(row.id),
            company_id: TenantId::from_uuid(row.company_id),
            auth_user_id: row.auth_user_id,
            display_name: row.display_name,
            email: row.email,
            level,
            is_active: row.is_active,
            parent_admin_id: row.parent_admin_id.map(AdministratorId::from_uuid),
            permission_overrides,
            created_at: row.created_at,
        },
        row.updated_at,
    )
    .map_err(invalid)
}

fn map_email_conflict(error: sqlx::Error, administrator: &Administrator, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "email '{}' is already used in tenant '{}'",
            administrator.email().as_str(),
            administrator.company_id()
        ));
    }

    AppError::Internal(format!(
        "failed to {action} administrator '{}': {error}",
        administrator.id()
    ))
}

#[async_trait]
impl AdministratorRepository for PostgresAdministratorRepository {
    async fn find_administrator(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Option<Administrator>> {
        let row = sqlx::query_as::<_, AdministratorRow>(
            r#"
            SELECT
                id,
                company_id,
                auth_user_id,
                display_name,
                email,
                admin_level,
                is_active,
                parent_admin_id,
                permission_overrides,
                created_at,
                updated_at
            FROM administrators
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(admin_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find administrator '{admin_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(administrator_from_row).transpose()
    }

    async fn list_administrators(&self, tenant_id: TenantId) -> AppResult<Vec<Administrator>> {
        let rows = sqlx::query_as::<_, AdministratorRow>(
            r#"
            SELECT
                id,
                company_id,
                auth_user_id,
                display_name,
                email,
                admin_level,
                is_active,
                parent_admin_id,
                permission_overrides,
                created_at,
                updated_at
            FROM administrators
            WHERE company_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list administrators for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(administrator_from_row).collect()
    }

    async fn insert_administrator(&self, administrator: Administrator) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO administrators (
                id,
                company_id,
                auth_user_id,
                display_name,
                email,
                admin_level,
                is_active,
                parent_admin_id,
                permission_overrides,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(administrator.id().as_uuid())
        .bind(administrator.company_id().as_uuid())
        .bind(administrator.auth_user_id())
        .bind(administrator.display_name())
        .bind(administrator.email().as_str())
        .bind(administrator.level().as_str())
        .bind(administrator.is_active())
        .bind(administrator.parent_admin_id().map(|id| id.as_uuid()))
        .bind(
            administrator
                .permission_overrides()
                .map(PermissionFragment::to_json),
        )
        .bind(administrator.created_at())
        .bind(administrator.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| map_email_conflict(error, &administrator, "insert"))?;

        Ok(())
    }

    async fn update_administrator(&self, administrator: Administrator) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE administrators
            SET
                display_name = $3,
                email = $4,
                admin_level = $5,
                is_active = $6,
                permission_overrides = $7,
                updated_at = $8
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(administrator.company_id().as_uuid())
        .bind(administrator.id().as_uuid())
        .bind(administrator.display_name())
        .bind(administrator.email().as_str())
        .bind(administrator.level().as_str())
        .bind(administrator.is_active())
        .bind(
            administrator
                .permission_overrides()
                .map(PermissionFragment::to_json),
        )
        .bind(administrator.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| map_email_conflict(error, &administrator, "update"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "administrator '{}' does not exist for tenant '{}'",
                administrator.id(),
                administrator.company_id()
            )));
        }

        Ok(())
    }

    async fn update_parent(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        parent_admin_id: Option<AdministratorId>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if parent_admin_id == Some(admin_id) {
            return Err(AppError::Cycle(format!(
                "administrator '{admin_id}' cannot report to itself"
            )));
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start hierarchy transaction for tenant '{tenant_id}': {error}"
            ))
        })?;

        // One reparenting per tenant at a time; the lock is released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("administrator_hierarchy:{tenant_id}"))
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to lock hierarchy for tenant '{tenant_id}': {error}"
                ))
            })?;

        if let Some(parent_admin_id) = parent_admin_id {
            let parent_exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM administrators WHERE company_id = $1 AND id = $2
                )
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(parent_admin_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to look up parent administrator '{parent_admin_id}': {error}"
                ))
            })?;

            if !parent_exists {
                return Err(AppError::NotFound(format!(
                    "parent '{parent_admin_id}' does not exist in tenant '{tenant_id}'"
                )));
            }

            let closes_cycle: bool = sqlx::query_scalar(
                r#"
                WITH RECURSIVE descendants AS (
                    SELECT id
                    FROM administrators
                    WHERE company_id = $1 AND parent_admin_id = $2

                    UNION

                    SELECT child.id
                    FROM administrators child
                    INNER JOIN descendants parent ON child.parent_admin_id = parent.id
                    WHERE child.company_id = $1
                )
                SELECT EXISTS (SELECT 1 FROM descendants WHERE id = $3)
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(admin_id.as_uuid())
            .bind(parent_admin_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to check descendants of administrator '{admin_id}': {error}"
                ))
            })?;

            if closes_cycle {
                return Err(AppError::Cycle(format!(
                    "administrator '{admin_id}' cannot report to its descendant '{parent_admin_id}'"
                )));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE administrators
            SET parent_admin_id = $3, updated_at = $4
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(admin_id.as_uuid())
        .bind(parent_admin_id.map(|id| id.as_uuid()))
        .bind(updated_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update parent of administrator '{admin_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "administrator '{admin_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit hierarchy transaction for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(())
    }
}
