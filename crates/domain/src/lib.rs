//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod administrator;
mod audit;
mod catalog;
mod hierarchy;
mod permission;
mod scope;

pub use administrator::{
    Administrator, AdministratorId, AdministratorInput, AdministratorLevel, EmailAddress,
};
pub use audit::{AuditAction, AuditChanges, FieldChange};
pub use catalog::default_permissions_for;
pub use hierarchy::{HierarchyEdge, HierarchyGraph, HierarchyIssue, RelationshipKind};
pub use permission::{
    OrganizationPermissions, PermissionCategory, PermissionDiff, PermissionFragment,
    PermissionKey, PermissionMergePolicy, PermissionSet, SettingsPermissions, UserPermissions,
};
pub use scope::{ScopeAssignment, ScopeAssignmentId, ScopeCapabilities, ScopeGrant, ScopeType};
