//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod engine_config;
mod in_memory_administration_store;
mod postgres_administrator_repository;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_hierarchy_edge_log;
mod postgres_organization_directory;
mod postgres_scope_repository;

pub use engine_config::EngineConfig;
pub use in_memory_administration_store::InMemoryAdministrationStore;
pub use postgres_administrator_repository::PostgresAdministratorRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_hierarchy_edge_log::PostgresHierarchyEdgeLog;
pub use postgres_organization_directory::PostgresOrganizationDirectory;
pub use postgres_scope_repository::PostgresScopeRepository;
