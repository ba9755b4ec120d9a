use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scholaris_application::HierarchyEdgeLog;
use scholaris_core::{AppError, AppResult, TenantId};
use scholaris_domain::{AdministratorId, HierarchyEdge, RelationshipKind};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed append-only hierarchy edge log.
#[derive(Clone)]
pub struct PostgresHierarchyEdgeLog {
    pool: PgPool,
}

impl PostgresHierarchyEdgeLog {
    /// Creates an edge log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct HierarchyEdgeRow {
    company_id: Uuid,
    parent_admin_id: Uuid,
    child_admin_id: Uuid,
    relationship_type: String,
    is_active: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl HierarchyEdgeLog for PostgresHierarchyEdgeLog {
    async fn append_edge(&self, edge: HierarchyEdge) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO administrator_hierarchy_edges (
                company_id,
                parent_admin_id,
                child_admin_id,
                relationship_type,
                is_active,
                created_by,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(edge.company_id.as_uuid())
        .bind(edge.parent_admin_id.as_uuid())
        .bind(edge.child_admin_id.as_uuid())
        .bind(edge.kind.as_str())
        .bind(edge.is_active)
        .bind(edge.created_by.as_uuid())
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append hierarchy edge for administrator '{}': {error}",
                edge.child_admin_id
            ))
        })?;

        Ok(())
    }

    async fn list_edges(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<HierarchyEdge>> {
        let rows = sqlx::query_as::<_, HierarchyEdgeRow>(
            r#"
            SELECT
                company_id,
                parent_admin_id,
                child_admin_id,
                relationship_type,
                is_active,
                created_by,
                created_at
            FROM administrator_hierarchy_edges
            WHERE company_id = $1 AND (child_admin_id = $2 OR parent_admin_id = $2)
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(admin_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list hierarchy edges of administrator '{admin_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(|row| {
                let kind = RelationshipKind::from_str(row.relationship_type.as_str()).map_err(
                    |error| {
                        AppError::Internal(format!(
                            "persisted hierarchy edge for administrator '{}' is invalid: {error}",
                            row.child_admin_id
                        ))
                    },
                )?;

                Ok(HierarchyEdge {
                    company_id: TenantId::from_uuid(row.company_id),
                    parent_admin_id: AdministratorId::from_uuid(row.parent_admin_id),
                    child_admin_id: AdministratorId::from_uuid(row.child_admin_id),
                    kind,
                    is_active: row.is_active,
                    created_by: AdministratorId::from_uuid(row.created_by),
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}
