use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use scholaris_core::{AppResult, RequestMetadata, TenantId};
use scholaris_domain::{AdministratorId, AuditAction, AuditChanges, FieldChange};

/// Audit payload assembled by callers before the recorder stamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Tenant scope for the entry.
    pub company_id: TenantId,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Administrator that performed the action.
    pub actor_id: AdministratorId,
    /// Target resource type label.
    pub target_type: Option<String>,
    /// Target resource identifier.
    pub target_id: Option<String>,
    /// Field-level changes.
    pub changes: AuditChanges,
    /// Request metadata of the originating call.
    pub request: RequestMetadata,
}

impl NewAuditEntry {
    /// Creates an entry without target or changes.
    #[must_use]
    pub fn new(company_id: TenantId, action: AuditAction, actor_id: AdministratorId) -> Self {
        Self {
            company_id,
            action,
            actor_id,
            target_type: None,
            target_id: None,
            changes: AuditChanges::new(),
            request: RequestMetadata::default(),
        }
    }

    /// Sets the target resource.
    #[must_use]
    pub fn with_target(mut self, target_type: &str, target_id: impl ToString) -> Self {
        self.target_type = Some(target_type.to_owned());
        self.target_id = Some(target_id.to_string());
        self
    }

    /// Adds one field change.
    #[must_use]
    pub fn with_change(
        mut self,
        field: &str,
        old: impl Into<Value>,
        new: impl Into<Value>,
    ) -> Self {
        self.changes
            .insert(field.to_owned(), FieldChange::new(old, new));
        self
    }

    /// Attaches request metadata.
    #[must_use]
    pub fn with_request(mut self, request: RequestMetadata) -> Self {
        self.request = request;
        self
    }
}

/// Persisted, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub id: Uuid,
    /// Tenant scope.
    pub company_id: TenantId,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Administrator that performed the action.
    pub actor_id: AdministratorId,
    /// Target resource type label.
    pub target_type: Option<String>,
    /// Target resource identifier.
    pub target_id: Option<String>,
    /// Field-level changes.
    pub changes: AuditChanges,
    /// Request metadata of the originating call.
    pub request: RequestMetadata,
    /// Recording timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Stamps a new entry with an id and timestamp.
    #[must_use]
    pub fn from_new(entry: NewAuditEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: entry.company_id,
            action: entry.action,
            actor_id: entry.actor_id,
            target_type: entry.target_type,
            target_id: entry.target_id,
            changes: entry.changes,
            request: entry.request,
            created_at,
        }
    }
}

/// Filters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Optional actor filter.
    pub actor_id: Option<AdministratorId>,
    /// Optional target type filter.
    pub target_type: Option<String>,
    /// Optional target id filter.
    pub target_id: Option<String>,
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            actor_id: None,
            target_type: None,
            target_id: None,
            action: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl AuditLogQuery {
    /// Returns whether an entry passes every filter, ignoring pagination.
    #[must_use]
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor_id.is_none_or(|actor_id| entry.actor_id == actor_id)
            && self
                .target_type
                .as_deref()
                .is_none_or(|target_type| entry.target_type.as_deref() == Some(target_type))
            && self
                .target_id
                .as_deref()
                .is_none_or(|target_id| entry.target_id.as_deref() == Some(target_id))
            && self.action.is_none_or(|action| entry.action == action)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
    }
}

/// One page of audit entries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogPage {
    /// Entries in this page.
    pub entries: Vec<AuditLogEntry>,
    /// Number of entries matching the filters across all pages.
    pub total: u64,
}

/// Count filter used by activity summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditCountFilter {
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Restricts the count to these actions when present.
    pub actions: Option<Vec<AuditAction>>,
}

impl AuditCountFilter {
    /// Returns whether an entry is counted.
    #[must_use]
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.since.is_none_or(|since| entry.created_at >= since)
            && self
                .actions
                .as_ref()
                .is_none_or(|actions| actions.contains(&entry.action))
    }
}

/// Tenant activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    /// Every entry of the tenant.
    pub total: u64,
    /// Entries recorded in the last 24 hours.
    pub last_24_hours: u64,
    /// Entries recorded in the last 7 days.
    pub last_7_days: u64,
    /// Entries recorded in the last 30 days.
    pub last_30_days: u64,
    /// Entries whose action is critical.
    pub critical: u64,
    /// Entries whose action is not critical.
    pub non_critical: u64,
}

/// Port for persisting append-only audit entries.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit entry.
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()>;
}

/// Repository port for reading and retaining tenant audit logs.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists entries matching the query, newest first.
    async fn query_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<AuditLogPage>;

    /// Counts tenant entries matching the filter.
    async fn count_entries(&self, tenant_id: TenantId, filter: &AuditCountFilter)
    -> AppResult<u64>;

    /// Deletes entries of every tenant created before `cutoff`.
    async fn purge_entries_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
