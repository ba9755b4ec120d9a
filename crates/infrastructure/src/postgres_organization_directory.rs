use async_trait::async_trait;
use scholaris_application::OrganizationDirectory;
use scholaris_core::{AppError, AppResult, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed read model of schools and their branches.
#[derive(Clone)]
pub struct PostgresOrganizationDirectory {
    pool: PgPool,
}

impl PostgresOrganizationDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationDirectory for PostgresOrganizationDirectory {
    async fn list_branches_in_school(
        &self,
        tenant_id: TenantId,
        school_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM school_branches
            WHERE company_id = $1 AND school_id = $2
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(school_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list branches of school '{school_id}' in tenant '{tenant_id}': {error}"
            ))
        })
    }
}
