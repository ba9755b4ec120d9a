use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use scholaris_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of audited administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An administrator was created.
    AdminCreated,
    /// Administrator fields were changed.
    AdminModified,
    /// An administrator was deactivated.
    AdminDeleted,
    /// A deactivated administrator was restored.
    AdminActivated,
    /// A capability flag was turned on.
    PermissionGranted,
    /// A capability flag was turned off.
    PermissionRevoked,
    /// A school or branch scope was assigned.
    ScopeAssigned,
    /// A school or branch scope was removed.
    ScopeRemoved,
    /// A reporting line changed.
    HierarchyChanged,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminCreated => "admin_created",
            Self::AdminModified => "admin_modified",
            Self::AdminDeleted => "admin_deleted",
            Self::AdminActivated => "admin_activated",
            Self::PermissionGranted => "permission_granted",
            Self::PermissionRevoked => "permission_revoked",
            Self::ScopeAssigned => "scope_assigned",
            Self::ScopeRemoved => "scope_removed",
            Self::HierarchyChanged => "hierarchy_changed",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditAction] = &[
            AuditAction::AdminCreated,
            AuditAction::AdminModified,
            AuditAction::AdminDeleted,
            AuditAction::AdminActivated,
            AuditAction::PermissionGranted,
            AuditAction::PermissionRevoked,
            AuditAction::ScopeAssigned,
            AuditAction::ScopeRemoved,
            AuditAction::HierarchyChanged,
        ];

        ALL
    }

    /// Returns whether the action belongs to the critical subset.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::AdminCreated
                | Self::AdminDeleted
                | Self::PermissionGranted
                | Self::PermissionRevoked
                | Self::HierarchyChanged
        )
    }

    /// Returns the critical subset.
    pub fn critical() -> impl Iterator<Item = Self> {
        Self::all().iter().copied().filter(Self::is_critical)
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audit action '{value}'")))
    }
}

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the change.
    pub old: Value,
    /// Value after the change.
    pub new: Value,
}

impl FieldChange {
    /// Creates a change record.
    #[must_use]
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Field-to-change map stored on audit entries.
pub type AuditChanges = BTreeMap<String, FieldChange>;
