use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use scholaris_application::{
    AuditCountFilter, AuditLogEntry, AuditLogPage, AuditLogQuery, AuditLogRepository,
};
use scholaris_core::{AppError, AppResult, RequestMetadata, TenantId};
use scholaris_domain::{AdministratorId, AuditAction, AuditChanges};


/// PostgreSQL-backed repository for audit log reads and retention.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: uuid::Uuid,
    company_id: uuid::Uuid,
    action: String,
    actor_id: uuid::Uuid,
    target_type: Option<String>,
    target_id: Option<String>,
    changes: Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

fn entry_from_row(row: AuditLogRow) -> AppResult<AuditLogEntry> {
    let entry_id = row.id;
    let action = AuditAction::from_str(row.action.as_str()).map_err(|error| {
        AppError::Internal(format!(
            "persisted audit entry '{entry_id}' is invalid: {error}"
        ))
    })?;
    let changes = serde_json::from_value::<AuditChanges>(row.changes).map_err(|error| {
        AppError::Internal(format!(
            "persisted audit entry '{entry_id}' has malformed changes: {error}"
        ))
    })?;

    Ok(AuditLogEntry {
        id: row.id,
        company_id: TenantId::from_uuid(row.company_id),
        action,
        actor_id: AdministratorId::from_uuid(row.actor_id),
        target_type: row.target_type,
        target_id: row.target_id,
        changes,
        request: RequestMetadata::new(row.ip_address, row.user_agent),
        created_at: row.created_at,
    })
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn query_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let actor_id = query.actor_id.map(|actor_id| actor_id.as_uuid());
        let action = query.action.map(|action| action.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM audit_log_entries
            WHERE company_id = $1
                AND ($2::UUID IS NULL OR actor_id = $2)
                AND ($3::TEXT IS NULL OR target_type = $3)
                AND ($4::TEXT IS NULL OR target_id = $4)
                AND ($5::TEXT IS NULL OR action = $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at >= $6)
                AND ($7::TIMESTAMPTZ IS NULL OR created_at < $7)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(actor_id)
        .bind(query.target_type.as_deref())
        .bind(query.target_id.as_deref())
        .bind(action)
        .bind(query.from)
        .bind(query.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count audit log entries: {error}"))
        })?;

        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
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
            FROM audit_log_entries
            WHERE company_id = $1
                AND ($2::UUID IS NULL OR actor_id = $2)
                AND ($3::TEXT IS NULL OR target_type = $3)
                AND ($4::TEXT IS NULL OR target_id = $4)
                AND ($5::TEXT IS NULL OR action = $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at >= $6)
                AND ($7::TIMESTAMPTZ IS NULL OR created_at < $7)
            ORDER BY created_at DESC, id DESC
            LIMIT $8
            OFFSET $9
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(actor_id)
        .bind(query.target_type.as_deref())
        .bind(query.target_id.as_deref())
        .bind(action)
        .bind(query.from)
        .bind(query.to)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log entries: {error}"))
        })?;

        Ok(AuditLogPage {
            entries: rows
                .into_iter()
                .map(entry_from_row)
                .collect::<AppResult<Vec<_>>>()?,
            total: total.max(0) as u64,
        })
    }

    async fn count_entries(
        &self,
        tenant_id: TenantId,
        filter: &AuditCountFilter,
    ) -> AppResult<u64> {
        let actions: Option<Vec<String>> = filter.actions.as_ref().map(|actions| {
            actions
                .iter()
                .map(|action| action.as_str().to_owned())
                .collect()
        });

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM audit_log_entries
            WHERE company_id = $1
                AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
                AND ($3::TEXT[] IS NULL OR action = ANY($3))
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(filter.since)
        .bind(actions)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count audit log entries for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(count.max(0) as u64)
    }

    async fn purge_entries_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM audit_log_entries
            WHERE created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge audit log entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
