use async_trait::async_trait;
use sqlx::PgPool;

use scholaris_application::{AuditLogEntry, AuditRepository};
use scholaris_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        let changes = serde_json::to_value(&entry.changes).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize changes of audit entry '{}': {error}",
                entry.id
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                id,
                company_id,
                action,
                actor_id,
                target_type,
                target_id,
                changes,
                ip_address,
                user_agent,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.company_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.actor_id.as_uuid())
        .bind(entry.target_type.as_deref())
        .bind(entry.target_id.as_deref())
        .bind(changes)
        .bind(entry.request.ip_address())
        .bind(entry.request.user_agent())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }
}
