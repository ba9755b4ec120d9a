use std::fmt::{Display, Formatter};

use scholaris_core::{AppError, AppResult};
use scholaris_domain::{Administrator, AdministratorLevel, PermissionKey};

/// Kind of change an actor wants to make to a target administrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModifyIntent {
    /// Unspecified modification.
    #[default]
    General,
    /// Name or email change.
    ProfileUpdate,
    /// Setting the active flag to `false`.
    Deactivate,
    /// Setting the active flag back to `true`.
    Restore,
    /// Moving to another level.
    LevelChange,
    /// Changing the reporting parent.
    HierarchyChange,
    /// Changing personal permission overrides.
    PermissionChange,
    /// Assigning or removing scopes.
    ScopeChange,
}

impl ModifyIntent {
    /// Returns the capability an actor needs for this intent on a target of `target_level`.
    #[must_use]
    pub fn required_permission(self, target_level: AdministratorLevel) -> PermissionKey {
        match self {
            Self::Deactivate => PermissionKey::DeleteUsers,
            _ => PermissionKey::modify_for(target_level),
        }
    }
}

/// Why an authorization decision was negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// Actor tried to deactivate its own account.
    SelfDeactivation,
    /// Actor tried a disallowed change on its own account.
    SelfModification,
    /// Actor account is deactivated.
    InactiveActor,
    /// Level rules forbid the actor from touching the target.
    InsufficientRank {
        /// Actor level.
        actor_level: AdministratorLevel,
        /// Target level.
        target_level: AdministratorLevel,
    },
    /// Actor lacks a capability flag.
    MissingPermission(PermissionKey),
    /// Requested level is above the actor's own level.
    LevelAboveActor {
        /// Actor level.
        actor_level: AdministratorLevel,
        /// Requested level.
        requested_level: AdministratorLevel,
    },
}

impl Display for DenialReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfDeactivation => formatter.write_str("cannot deactivate your own account"),
            Self::SelfModification => {
                formatter.write_str("cannot modify own account for security reasons")
            }
            Self::InactiveActor => {
                formatter.write_str("deactivated administrators cannot modify administrators")
            }
            Self::InsufficientRank {
                actor_level,
                target_level,
            } => write!(
                formatter,
                "{actor_level} cannot modify {target_level} administrators"
            ),
            Self::MissingPermission(key) => write!(formatter, "missing permission '{key}'"),
            Self::LevelAboveActor {
                actor_level,
                requested_level,
            } => write!(
                formatter,
                "{actor_level} cannot assign the higher level {requested_level}"
            ),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allowed,
    /// The action must not proceed.
    Denied(DenialReason),
}

impl Decision {
    /// Returns whether the action may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns the denial reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&DenialReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    /// Converts a denial into the matching error.
    pub fn into_result(self) -> AppResult<()> {
        let Self::Denied(reason) = self else {
            return Ok(());
        };

        let message = reason.to_string();
        Err(match reason {
            DenialReason::SelfDeactivation | DenialReason::SelfModification => {
                AppError::SelfAction(message)
            }
            DenialReason::LevelAboveActor { .. } => AppError::PrivilegeEscalation(message),
            DenialReason::InactiveActor
            | DenialReason::InsufficientRank { .. }
            | DenialReason::MissingPermission(_) => AppError::Forbidden(message),
        })
    }
}

/// Applies the self-action, activity and level rules of a modification.
///
/// Capability flags are checked separately because they need the actor's
/// resolved permissions.
#[must_use]
pub fn evaluate_modify(
    actor: &Administrator,
    target: &Administrator,
    intent: ModifyIntent,
) -> Decision {
    if actor.id() == target.id() {
        return match intent {
            ModifyIntent::Deactivate => Decision::Denied(DenialReason::SelfDeactivation),
            ModifyIntent::ProfileUpdate
                if actor.level() == AdministratorLevel::EntityAdmin && actor.is_active() =>
            {
                Decision::Allowed
            }
            _ => Decision::Denied(DenialReason::SelfModification),
        };
    }

    if !actor.is_active() {
        return Decision::Denied(DenialReason::InactiveActor);
    }

    let allowed = match actor.level() {
        AdministratorLevel::EntityAdmin => true,
        AdministratorLevel::SubEntityAdmin => target.level() != AdministratorLevel::EntityAdmin,
        AdministratorLevel::SchoolAdmin | AdministratorLevel::BranchAdmin => {
            actor.level().outranks(target.level())
        }
    };

    if allowed {
        Decision::Allowed
    } else {
        Decision::Denied(DenialReason::InsufficientRank {
            actor_level: actor.level(),
            target_level: target.level(),
        })
    }
}

/// Returns whether `actor_level` may create or promote to `requested_level`.
#[must_use]
pub fn evaluate_assign_level(
    actor_level: AdministratorLevel,
    requested_level: AdministratorLevel,
) -> Decision {
    if requested_level.outranks(actor_level) {
        Decision::Denied(DenialReason::LevelAboveActor {
            actor_level,
            requested_level,
        })
    } else {
        Decision::Allowed
    }
}
