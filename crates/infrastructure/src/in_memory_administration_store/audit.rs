use super::*;

impl InMemoryAdministrationStore {
    pub(super) async fn query_entries_impl(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let audit_entries = self.audit_entries.read().await;

        let mut matching: Vec<&AuditLogEntry> = audit_entries
            .iter()
            .filter(|entry| entry.company_id == tenant_id && query.matches(entry))
            .collect();
        matching.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(AuditLogPage { entries, total })
    }

    pub(super) async fn count_entries_impl(
        &self,
        tenant_id: TenantId,
        filter: &AuditCountFilter,
    ) -> AppResult<u64> {
        Ok(self
            .audit_entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.company_id == tenant_id && filter.matches(entry))
            .count() as u64)
    }

    pub(super) async fn purge_entries_older_than_impl(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut audit_entries = self.audit_entries.write().await;
        let before = audit_entries.len();
        audit_entries.retain(|entry| entry.created_at >= cutoff);

        Ok((before - audit_entries.len()) as u64)
    }
}
