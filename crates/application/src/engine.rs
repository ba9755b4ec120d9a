use std::sync::Arc;

use scholaris_core::Clock;

use crate::administration_ports::{
    AccessPolicy, AdministratorRepository, AuditLogRepository, AuditRepository, HierarchyEdgeLog,
    OrganizationDirectory, ScopeRepository,
};
use crate::administrator_service::AdministratorService;
use crate::audit_recorder::AuditRecorder;
use crate::authorization_service::AuthorizationService;
use crate::hierarchy_service::HierarchyService;
use crate::permission_resolver::PermissionResolver;
use crate::scope_service::ScopeService;

/// Port implementations the engine is wired from.
#[derive(Clone)]
pub struct AdministrationPorts {
    /// Administrator records.
    pub administrators: Arc<dyn AdministratorRepository>,
    /// Scope assignments.
    pub scopes: Arc<dyn ScopeRepository>,
    /// School and branch structure.
    pub directory: Arc<dyn OrganizationDirectory>,
    /// Hierarchy edge log.
    pub hierarchy_edges: Arc<dyn HierarchyEdgeLog>,
    /// Audit writer.
    pub audit: Arc<dyn AuditRepository>,
    /// Audit reader and retention.
    pub audit_log: Arc<dyn AuditLogRepository>,
}

/// Fully wired administrator-management engine.
#[derive(Clone)]
pub struct AdministrationEngine {
    resolver: PermissionResolver,
    scopes: ScopeService,
    hierarchy: HierarchyService,
    authorization: AuthorizationService,
    audit: AuditRecorder,
    administrators: AdministratorService,
}

impl AdministrationEngine {
    /// Wires every service from one set of ports.
    #[must_use]
    pub fn new(ports: AdministrationPorts, clock: Arc<dyn Clock>, policy: AccessPolicy) -> Self {
        let resolver = PermissionResolver::new(
            ports.administrators.clone(),
            ports.scopes.clone(),
            clock.clone(),
            policy.merge_policy,
        );
        let scopes = ScopeService::new(
            ports.administrators.clone(),
            ports.scopes.clone(),
            clock.clone(),
        );
        let hierarchy = HierarchyService::new(
            ports.administrators.clone(),
            ports.hierarchy_edges,
            clock.clone(),
        );
        let authorization = AuthorizationService::new(
            ports.administrators.clone(),
            ports.scopes,
            ports.directory,
            resolver.clone(),
            clock.clone(),
            policy,
        );
        let audit = AuditRecorder::new(ports.audit, ports.audit_log, clock.clone());
        let administrators = AdministratorService::new(
            ports.administrators,
            authorization.clone(),
            resolver.clone(),
            scopes.clone(),
            hierarchy.clone(),
            audit.clone(),
            clock,
        );

        Self {
            resolver,
            scopes,
            hierarchy,
            authorization,
            audit,
            administrators,
        }
    }

    /// Returns the permission resolver.
    #[must_use]
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Returns the scope service.
    #[must_use]
    pub fn scopes(&self) -> &ScopeService {
        &self.scopes
    }

    /// Returns the hierarchy service.
    #[must_use]
    pub fn hierarchy(&self) -> &HierarchyService {
        &self.hierarchy
    }

    /// Returns the authorization decision engine.
    #[must_use]
    pub fn authorization(&self) -> &AuthorizationService {
        &self.authorization
    }

    /// Returns the audit recorder.
    #[must_use]
    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// Returns the administrator orchestration service.
    #[must_use]
    pub fn administrators(&self) -> &AdministratorService {
        &self.administrators
    }
}
