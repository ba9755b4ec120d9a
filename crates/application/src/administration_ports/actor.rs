use scholaris_core::{RequestMetadata, TenantId};
use scholaris_domain::AdministratorId;

/// Acting administrator supplied by the identity layer on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    tenant_id: TenantId,
    actor_id: AdministratorId,
    request: RequestMetadata,
}

impl ActorContext {
    /// Creates an actor context without transport metadata.
    #[must_use]
    pub fn new(tenant_id: TenantId, actor_id: AdministratorId) -> Self {
        Self {
            tenant_id,
            actor_id,
            request: RequestMetadata::default(),
        }
    }

    /// Attaches request metadata recorded on audit entries.
    #[must_use]
    pub fn with_request(mut self, request: RequestMetadata) -> Self {
        self.request = request;
        self
    }

    /// Returns the tenant the actor operates in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the acting administrator id.
    #[must_use]
    pub fn actor_id(&self) -> AdministratorId {
        self.actor_id
    }

    /// Returns request metadata.
    #[must_use]
    pub fn request(&self) -> &RequestMetadata {
        &self.request
    }
}
