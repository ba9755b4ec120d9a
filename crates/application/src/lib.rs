//! Application services and ports.

#![forbid(unsafe_code)]

mod administration_ports;
mod administrator_service;
mod audit_recorder;
mod authorization_service;
mod engine;
mod hierarchy_service;
mod permission_resolver;
mod scope_service;

#[cfg(test)]
mod test_support;

pub use administration_ports::{
    AccessPolicy, ActivitySummary, ActorContext, AdministratorRepository, AuditCountFilter,
    AuditLogEntry, AuditLogPage, AuditLogQuery, AuditLogRepository, AuditRepository,
    HierarchyEdgeLog, NewAuditEntry, OrganizationDirectory, ScopeRepository,
};
pub use administrator_service::{AdministratorService, CreateAdministratorRequest, ProfileUpdate};
pub use audit_recorder::AuditRecorder;
pub use authorization_service::{
    AuthorizationService, Decision, DenialReason, ModifyIntent, evaluate_assign_level,
    evaluate_modify,
};
pub use engine::{AdministrationEngine, AdministrationPorts};
pub use hierarchy_service::HierarchyService;
pub use permission_resolver::{PermissionResolver, resolve_permissions};
pub use scope_service::ScopeService;
