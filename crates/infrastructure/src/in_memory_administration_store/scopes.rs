use super::*;

impl InMemoryAdministrationStore {
    pub(super) async fn list_scope_assignments_impl(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
    ) -> AppResult<Vec<ScopeAssignment>> {
        let scopes = self.scopes.read().await;

        let mut values: Vec<ScopeAssignment> = scopes
            .values()
            .filter(|assignment| {
                assignment.company_id() == tenant_id && assignment.admin_id() == admin_id
            })
            .cloned()
            .collect();
        sort_assignments(&mut values);

        Ok(values)
    }

    pub(super) async fn list_assignments_for_scopes_impl(
        &self,
        tenant_id: TenantId,
        scope_type: ScopeType,
        scope_ids: &[Uuid],
    ) -> AppResult<Vec<ScopeAssignment>> {
        let scopes = self.scopes.read().await;

        let mut values: Vec<ScopeAssignment> = scopes
            .values()
            .filter(|assignment| {
                assignment.company_id() == tenant_id
                    && assignment.scope_type() == scope_type
                    && scope_ids.contains(&assignment.scope_id())
            })
            .cloned()
            .collect();
        sort_assignments(&mut values);

        Ok(values)
    }

    pub(super) async fn insert_scope_assignment_impl(
        &self,
        assignment: ScopeAssignment,
    ) -> AppResult<()> {
        let mut scopes = self.scopes.write().await;

        if scopes.contains_key(&assignment.id()) {
            return Err(AppError::Conflict(format!(
                "scope assignment '{}' already exists",
                assignment.id()
            )));
        }

        let duplicate_active = assignment.is_active()
            && scopes.values().any(|stored| {
                stored.is_active()
                    && stored.company_id() == assignment.company_id()
                    && stored.admin_id() == assignment.admin_id()
                    && stored.targets(assignment.scope_type(), assignment.scope_id())
            });
        if duplicate_active {
            return Err(AppError::Conflict(format!(
                "administrator '{}' already holds an active {} scope '{}'",
                assignment.admin_id(),
                assignment.scope_type(),
                assignment.scope_id()
            )));
        }

        scopes.insert(assignment.id(), assignment);
        Ok(())
    }

    pub(super) async fn deactivate_scope_assignment_impl(
        &self,
        tenant_id: TenantId,
        admin_id: AdministratorId,
        assignment_id: ScopeAssignmentId,
    ) -> AppResult<Option<ScopeAssignment>> {
        let mut scopes = self.scopes.write().await;

        let Some(stored) = scopes.get_mut(&assignment_id).filter(|stored| {
            stored.is_active() && stored.company_id() == tenant_id && stored.admin_id() == admin_id
        }) else {
            return Ok(None);
        };

        stored.deactivate();
        Ok(Some(stored.clone()))
    }
}

fn sort_assignments(values: &mut [ScopeAssignment]) {
    values.sort_by(|left, right| {
        left.assigned_at()
            .cmp(&right.assigned_at())
            .then_with(|| left.id().cmp(&right.id()))
    });
}
