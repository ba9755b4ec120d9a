mod actor;
mod audit;
mod policy;
mod repositories;

pub use actor::ActorContext;
pub use audit::{
    ActivitySummary, AuditCountFilter, AuditLogEntry, AuditLogPage, AuditLogQuery,
    AuditLogRepository, AuditRepository, NewAuditEntry,
};
pub use policy::AccessPolicy;
pub use repositories::{
    AdministratorRepository, HierarchyEdgeLog, OrganizationDirectory, ScopeRepository,
};
