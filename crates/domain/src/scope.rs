//! School and branch scope assignments.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use scholaris_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::administrator::AdministratorId;
use crate::permission::PermissionFragment;

/// Kind of organizational entity an administrator can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// A school.
    School,
    /// A branch of a school.
    Branch,
}

impl ScopeType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Branch => "branch",
        }
    }
}

impl Display for ScopeType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "school" => Ok(Self::School),
            "branch" => Ok(Self::Branch),
            _ => Err(AppError::Validation(format!("unknown scope type '{value}'"))),
        }
    }
}

/// Identifier of one scope assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeAssignmentId(Uuid);

impl ScopeAssignmentId {
    /// Creates a random assignment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScopeAssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ScopeAssignmentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Per-scope capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScopeCapabilities {
    pub can_create_users: bool,
    pub can_modify_users: bool,
    pub can_delete_users: bool,
    pub can_view_all: bool,
    pub can_export_data: bool,
    pub can_manage_settings: bool,
}

/// Scope requested by a caller before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeGrant {
    /// School or branch.
    pub scope_type: ScopeType,
    /// Identifier of the school or branch.
    pub scope_id: Uuid,
    /// Capability flags.
    pub capabilities: ScopeCapabilities,
    /// Optional permission override carried by the scope.
    pub permission_overrides: Option<PermissionFragment>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// One administrator-to-scope link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAssignment {
    id: ScopeAssignmentId,
    company_id: TenantId,
    admin_id: AdministratorId,
    scope_type: ScopeType,
    scope_id: Uuid,
    capabilities: ScopeCapabilities,
    permission_overrides: Option<PermissionFragment>,
    assigned_by: AdministratorId,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl ScopeAssignment {
    /// Creates an active assignment from a grant.
    pub fn new(
        company_id: TenantId,
        admin_id: AdministratorId,
        grant: ScopeGrant,
        assigned_by: AdministratorId,
        assigned_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if grant
            .expires_at
            .is_some_and(|expires_at| expires_at <= assigned_at)
        {
            return Err(AppError::Validation(
                "scope expiry must be later than the assignment time".to_owned(),
            ));
        }

        Ok(Self {
            id: ScopeAssignmentId::new(),
            company_id,
            admin_id,
            scope_type: grant.scope_type,
            scope_id: grant.scope_id,
            capabilities: grant.capabilities,
            permission_overrides: grant.permission_overrides,
            assigned_by,
            assigned_at,
            expires_at: grant.expires_at,
            is_active: true,
        })
    }

    /// Rebuilds an assignment from persisted columns.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        id: ScopeAssignmentId,
        company_id: TenantId,
        admin_id: AdministratorId,
        scope_type: ScopeType,
        scope_id: Uuid,
        capabilities: ScopeCapabilities,
        permission_overrides: Option<PermissionFragment>,
        assigned_by: AdministratorId,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            company_id,
            admin_id,
            scope_type,
            scope_id,
            capabilities,
            permission_overrides,
            assigned_by,
            assigned_at,
            expires_at,
            is_active,
        }
    }

    /// Returns the assignment id.
    #[must_use]
    pub fn id(&self) -> ScopeAssignmentId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn company_id(&self) -> TenantId {
        self.company_id
    }

    /// Returns the scoped administrator.
    #[must_use]
    pub fn admin_id(&self) -> AdministratorId {
        self.admin_id
    }

    /// Returns the scope kind.
    #[must_use]
    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    /// Returns the school or branch id.
    #[must_use]
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Returns capability flags.
    #[must_use]
    pub fn capabilities(&self) -> ScopeCapabilities {
        self.capabilities
    }

    /// Returns the scope-level permission override, if any.
    #[must_use]
    pub fn permission_overrides(&self) -> Option<&PermissionFragment> {
        self.permission_overrides.as_ref()
    }

    /// Returns the granting administrator.
    #[must_use]
    pub fn assigned_by(&self) -> AdministratorId {
        self.assigned_by
    }

    /// Returns the assignment timestamp.
    #[must_use]
    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Returns the expiry, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the soft-delete flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the assignment is active and not expired at `now`.
    #[must_use]
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    /// Returns whether the assignment targets exactly this entity.
    #[must_use]
    pub fn targets(&self, scope_type: ScopeType, scope_id: Uuid) -> bool {
        self.scope_type == scope_type && self.scope_id == scope_id
    }

    /// Soft-deletes the assignment.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn grant(expires_at: Option<DateTime<Utc>>) -> ScopeGrant {
        ScopeGrant {
            scope_type: ScopeType::School,
            scope_id: Uuid::new_v4(),
            capabilities: ScopeCapabilities {
                can_view_all: true,
                ..ScopeCapabilities::default()
            },
            permission_overrides: None,
            expires_at,
        }
    }

    #[test]
    fn expired_assignment_is_not_effective() {
        let now = Utc::now();
        let assignment = ScopeAssignment::new(
            TenantId::new(),
            AdministratorId::new(),
            grant(Some(now + Duration::hours(1))),
            AdministratorId::new(),
            now,
        );
        assert!(assignment.is_ok());
        let assignment = assignment.unwrap_or_else(|_| panic!("test"));

        assert!(assignment.is_effective(now));
        assert!(!assignment.is_effective(now + Duration::hours(2)));
    }

    #[test]
    fn deactivated_assignment_is_not_effective() {
        let now = Utc::now();
        let assignment = ScopeAssignment::new(
            TenantId::new(),
            AdministratorId::new(),
            grant(None),
            AdministratorId::new(),
            now,
        );
        let mut assignment = assignment.unwrap_or_else(|_| panic!("test"));
        assignment.deactivate();
        assert!(!assignment.is_effective(now));
    }

    #[test]
    fn expiry_in_the_past_is_rejected() {
        let now = Utc::now();
        let assignment = ScopeAssignment::new(
            TenantId::new(),
            AdministratorId::new(),
            grant(Some(now - Duration::minutes(5))),
            AdministratorId::new(),
            now,
        );
        assert!(matches!(assignment, Err(AppError::Validation(_))));
    }

    #[test]
    fn scope_type_roundtrip_storage_value() {
        assert_eq!(ScopeType::from_str("branch").ok(), Some(ScopeType::Branch));
        assert!(ScopeType::from_str("district").is_err());
    }
}
