use scholaris_domain::PermissionMergePolicy;

/// Tunable decisions of the authorization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// How personal and scope overrides combine with level defaults.
    pub merge_policy: PermissionMergePolicy,
    /// Whether sub-entity administrators see entity administrators in listings.
    pub sub_entity_sees_entity_admins: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            merge_policy: PermissionMergePolicy::TrueBiased,
            sub_entity_sees_entity_admins: true,
        }
    }
}
