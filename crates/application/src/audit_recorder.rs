use std::sync::Arc;

use chrono::{Days, Duration};
use scholaris_core::{AppError, AppResult, Clock, TenantId};
use scholaris_domain::AuditAction;
use tracing::{info, warn};

use crate::administration_ports::{
    ActivitySummary, AuditCountFilter, AuditLogEntry, AuditLogPage, AuditLogQuery,
    AuditLogRepository, AuditRepository, NewAuditEntry,
};

const MAX_PAGE_SIZE: usize = 200;

/// Append-only audit trail writer and reader.
#[derive(Clone)]
pub struct AuditRecorder {
    writer: Arc<dyn AuditRepository>,
    log: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditRecorder {
    /// Creates an audit recorder.
    #[must_use]
    pub fn new(
        writer: Arc<dyn AuditRepository>,
        log: Arc<dyn AuditLogRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { writer, log, clock }
    }

    /// Appends one entry. A failed write is logged and swallowed.
    pub async fn record(&self, entry: NewAuditEntry) {
        let entry = AuditLogEntry::from_new(entry, self.clock.now());
        let tenant_id = entry.company_id;
        let action = entry.action;
        let actor_id = entry.actor_id;

        if let Err(error) = self.writer.append_entry(entry).await {
            warn!(
                tenant_id = %tenant_id,
                action = %action,
                actor_id = %actor_id,
                error = %error,
                "failed to record audit entry"
            );
        }
    }

    /// Lists tenant entries matching `query`, newest first.
    ///
    /// The page size is clamped to `1..=200`.
    pub async fn query(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        if let (Some(from), Some(to)) = (query.from, query.to)
            && from > to
        {
            return Err(AppError::Validation(
                "audit query range start must not be after its end".to_owned(),
            ));
        }

        let query = AuditLogQuery {
            limit: query.limit.clamp(1, MAX_PAGE_SIZE),
            ..query
        };
        self.log.query_entries(tenant_id, &query).await
    }

    /// Counts tenant entries by recency bucket and criticality.
    pub async fn activity_summary(&self, tenant_id: TenantId) -> AppResult<ActivitySummary> {
        let now = self.clock.now();
        let total = self
            .log
            .count_entries(tenant_id, &AuditCountFilter::default())
            .await?;
        let since = |window: Duration| AuditCountFilter {
            since: Some(now - window),
            actions: None,
        };
        let last_24_hours = self
            .log
            .count_entries(tenant_id, &since(Duration::hours(24)))
            .await?;
        let last_7_days = self
            .log
            .count_entries(tenant_id, &since(Duration::days(7)))
            .await?;
        let last_30_days = self
            .log
            .count_entries(tenant_id, &since(Duration::days(30)))
            .await?;
        let critical = self
            .log
            .count_entries(
                tenant_id,
                &AuditCountFilter {
                    since: None,
                    actions: Some(AuditAction::critical().collect()),
                },
            )
            .await?;

        Ok(ActivitySummary {
            total,
            last_24_hours,
            last_7_days,
            last_30_days,
            critical,
            non_critical: total.saturating_sub(critical),
        })
    }

    /// Returns every entry that targets one resource, newest first.
    pub async fn entity_trail(
        &self,
        tenant_id: TenantId,
        target_type: &str,
        target_id: &str,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let mut query = AuditLogQuery {
            target_type: Some(target_type.to_owned()),
            target_id: Some(target_id.to_owned()),
            limit: MAX_PAGE_SIZE,
            ..AuditLogQuery::default()
        };
        let mut entries = Vec::new();

        loop {
            let page = self.log.query_entries(tenant_id, &query).await?;
            let fetched = page.entries.len();
            entries.extend(page.entries);
            if fetched < query.limit || entries.len() as u64 >= page.total {
                break;
            }
            query.offset += fetched;
        }

        Ok(entries)
    }

    /// Deletes entries of every tenant older than `retention_days` and returns the count.
    pub async fn purge_older_than(&self, retention_days: u32) -> AppResult<u64> {
        if retention_days == 0 {
            return Err(AppError::Validation(
                "audit retention must be at least one day".to_owned(),
            ));
        }

        let cutoff = self
            .clock
            .now()
            .checked_sub_days(Days::new(u64::from(retention_days)))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "audit retention of {retention_days} days is out of range"
                ))
            })?;
        let deleted = self.log.purge_entries_older_than(cutoff).await?;
        info!(
            retention_days,
            cutoff = %cutoff,
            deleted,
            "purged audit entries past retention"
        );

        Ok(deleted)
    }
}
