use std::env;
use std::str::FromStr;

use scholaris_application::AccessPolicy;
use scholaris_core::{AppError, AppResult};
use tracing::debug;

const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 365;
const MAX_AUDIT_RETENTION_DAYS: u32 = 36_500;

/// Engine settings read from the process environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Access policy handed to the engine.
    pub access_policy: AccessPolicy,
    /// Audit entries older than this many days are purged.
    pub audit_retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            access_policy: AccessPolicy::default(),
            audit_retention_days: DEFAULT_AUDIT_RETENTION_DAYS,
        }
    }
}

impl EngineConfig {
    /// Loads settings from environment variables.
    ///
    /// Reads `PERMISSION_MERGE_POLICY`, `SUB_ENTITY_SEES_ENTITY_ADMINS` and
    /// `AUDIT_RETENTION_DAYS`; unset variables keep their defaults.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();

        let merge_policy = parse_var(
            &lookup,
            "PERMISSION_MERGE_POLICY",
            defaults.access_policy.merge_policy,
        )?;
        let sub_entity_sees_entity_admins = parse_var(
            &lookup,
            "SUB_ENTITY_SEES_ENTITY_ADMINS",
            defaults.access_policy.sub_entity_sees_entity_admins,
        )?;
        let audit_retention_days = parse_var(
            &lookup,
            "AUDIT_RETENTION_DAYS",
            defaults.audit_retention_days,
        )?;

        if audit_retention_days == 0 {
            return Err(AppError::Validation(
                "AUDIT_RETENTION_DAYS must be greater than zero".to_owned(),
            ));
        }
        if audit_retention_days > MAX_AUDIT_RETENTION_DAYS {
            return Err(AppError::Validation(format!(
                "AUDIT_RETENTION_DAYS must be at most {MAX_AUDIT_RETENTION_DAYS}"
            )));
        }

        let config = Self {
            access_policy: AccessPolicy {
                merge_policy,
                sub_entity_sees_entity_admins,
            },
            audit_retention_days,
        };
        debug!(
            merge_policy = config.access_policy.merge_policy.as_str(),
            sub_entity_sees_entity_admins,
            audit_retention_days,
            "loaded engine configuration"
        );

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use scholaris_core::AppError;
    use scholaris_domain::PermissionMergePolicy;

    use super::EngineConfig;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name: &str| values.get(name).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config.ok(), Some(EngineConfig::default()));
        assert_eq!(EngineConfig::default().audit_retention_days, 365);
    }

    #[test]
    fn reads_policy_and_retention_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PERMISSION_MERGE_POLICY", "category_replace"),
            ("SUB_ENTITY_SEES_ENTITY_ADMINS", "false"),
            ("AUDIT_RETENTION_DAYS", " 90 "),
        ]))
        .unwrap_or_default();

        assert_eq!(
            config.access_policy.merge_policy,
            PermissionMergePolicy::CategoryReplace
        );
        assert!(!config.access_policy.sub_entity_sees_entity_admins);
        assert_eq!(config.audit_retention_days, 90);
    }

    #[test]
    fn rejects_unknown_policy_and_zero_retention() {
        let policy = EngineConfig::from_lookup(lookup(&[("PERMISSION_MERGE_POLICY", "strict")]));
        assert!(matches!(policy, Err(AppError::Validation(_))));

        let retention = EngineConfig::from_lookup(lookup(&[("AUDIT_RETENTION_DAYS", "0")]));
        assert!(matches!(retention, Err(AppError::Validation(_))));

        let flag = EngineConfig::from_lookup(lookup(&[("SUB_ENTITY_SEES_ENTITY_ADMINS", "maybe")]));
        assert!(matches!(flag, Err(AppError::Validation(_))));
    }

    #[test]
    fn caps_retention_at_one_hundred_years() {
        let longest = EngineConfig::from_lookup(lookup(&[("AUDIT_RETENTION_DAYS", "36500")]));
        assert_eq!(longest.map(|config| config.audit_retention_days).ok(), Some(36_500));

        let beyond = EngineConfig::from_lookup(lookup(&[("AUDIT_RETENTION_DAYS", "100000000")]));
        assert!(matches!(beyond, Err(AppError::Validation(_))));
    }
}
