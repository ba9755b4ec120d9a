//! Administrator identity, level and lifecycle rules.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use scholaris_core::{AppError, AppResult, NonEmptyString, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::PermissionFragment;

/// Unique identifier for an administrator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdministratorId(Uuid);

impl AdministratorId {
    /// Creates a new random administrator identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an administrator identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AdministratorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AdministratorId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated, lower-cased email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// The four administrator tiers, highest authority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdministratorLevel {
    /// Full-tenant administrator.
    EntityAdmin,
    /// Administrator below the entity level.
    SubEntityAdmin,
    /// Administrator of one or more schools.
    SchoolAdmin,
    /// Administrator of one or more branches.
    BranchAdmin,
}

impl AdministratorLevel {
    /// Returns the numeric authority rank; higher means more authority.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::EntityAdmin => 4,
            Self::SubEntityAdmin => 3,
            Self::SchoolAdmin => 2,
            Self::BranchAdmin => 1,
        }
    }

    /// Returns whether this level has strictly more authority than `other`.
    #[must_use]
    pub fn outranks(self, other: Self) -> bool {
        self.rank() > other.rank()
    }

    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityAdmin => "entity_admin",
            Self::SubEntityAdmin => "sub_entity_admin",
            Self::SchoolAdmin => "school_admin",
            Self::BranchAdmin => "branch_admin",
        }
    }

    /// Returns all levels, highest authority first.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AdministratorLevel] = &[
            AdministratorLevel::EntityAdmin,
            AdministratorLevel::SubEntityAdmin,
            AdministratorLevel::SchoolAdmin,
            AdministratorLevel::BranchAdmin,
        ];

        ALL
    }

    /// Returns whether administrators at this level may exist without a parent.
    #[must_use]
    pub fn is_root_level(self) -> bool {
        self == Self::EntityAdmin
    }
}

impl Display for AdministratorLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AdministratorLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "entity_admin" => Ok(Self::EntityAdmin),
            "sub_entity_admin" => Ok(Self::SubEntityAdmin),
            "school_admin" => Ok(Self::SchoolAdmin),
            "branch_admin" => Ok(Self::BranchAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown administrator level '{value}'"
            ))),
        }
    }
}

/// Input payload for constructing an administrator record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdministratorInput {
    /// Identifier, usually freshly generated.
    pub id: AdministratorId,
    /// Tenant owning the record.
    pub company_id: TenantId,
    /// Identity-provider subject linked to this administrator.
    pub auth_user_id: String,
    /// Display name.
    pub display_name: String,
    /// Contact email, unique per tenant.
    pub email: String,
    /// Administrator tier.
    pub level: AdministratorLevel,
    /// Whether the account starts active.
    pub is_active: bool,
    /// Optional reporting parent.
    pub parent_admin_id: Option<AdministratorId>,
    /// Optional personal permission overrides.
    pub permission_overrides: Option<PermissionFragment>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Administrator aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Administrator {
    id: AdministratorId,
    company_id: TenantId,
    auth_user_id: NonEmptyString,
    display_name: NonEmptyString,
    email: EmailAddress,
    level: AdministratorLevel,
    is_active: bool,
    parent_admin_id: Option<AdministratorId>,
    permission_overrides: Option<PermissionFragment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Administrator {
    /// Creates a validated administrator record.
    pub fn new(input: AdministratorInput) -> AppResult<Self> {
        if input.parent_admin_id == Some(input.id) {
            return Err(AppError::Cycle(format!(
                "administrator '{}' cannot report to itself",
                input.id
            )));
        }

        Ok(Self {
            id: input.id,
            company_id: input.company_id,
            auth_user_id: NonEmptyString::new(input.auth_user_id)?,
            display_name: NonEmptyString::new(input.display_name.trim())?,
            email: EmailAddress::new(input.email)?,
            level: input.level,
            is_active: input.is_active,
            parent_admin_id: input.parent_admin_id,
            permission_overrides: input.permission_overrides,
            created_at: input.created_at,
            updated_at: input.created_at,
        })
    }

    /// Rehydrates a stored record, keeping its last modification time.
    pub fn restore(input: AdministratorInput, updated_at: DateTime<Utc>) -> AppResult<Self> {
        let mut administrator = Self::new(input)?;
        administrator.updated_at = updated_at;
        Ok(administrator)
    }

    /// Returns the administrator id.
    #[must_use]
    pub fn id(&self) -> AdministratorId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn company_id(&self) -> TenantId {
        self.company_id
    }

    /// Returns the identity-provider subject.
    #[must_use]
    pub fn auth_user_id(&self) -> &str {
        self.auth_user_id.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the contact email.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the administrator tier.
    #[must_use]
    pub fn level(&self) -> AdministratorLevel {
        self.level
    }

    /// Returns whether the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the reporting parent, if any.
    #[must_use]
    pub fn parent_admin_id(&self) -> Option<AdministratorId> {
        self.parent_admin_id
    }

    /// Returns personal permission overrides, if any.
    #[must_use]
    pub fn permission_overrides(&self) -> Option<&PermissionFragment> {
        self.permission_overrides.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the display name.
    pub fn rename(&mut self, display_name: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.display_name = NonEmptyString::new(display_name.trim())?;
        self.updated_at = at;
        Ok(())
    }

    /// Replaces the contact email.
    pub fn change_email(&mut self, email: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.email = EmailAddress::new(email)?;
        self.updated_at = at;
        Ok(())
    }

    /// Moves the administrator to another tier.
    pub fn change_level(&mut self, level: AdministratorLevel, at: DateTime<Utc>) {
        self.level = level;
        self.updated_at = at;
    }

    /// Replaces the reporting parent.
    pub fn set_parent(
        &mut self,
        parent_admin_id: Option<AdministratorId>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if parent_admin_id == Some(self.id) {
            return Err(AppError::Cycle(format!(
                "administrator '{}' cannot report to itself",
                self.id
            )));
        }

        self.parent_admin_id = parent_admin_id;
        self.updated_at = at;
        Ok(())
    }

    /// Activates or deactivates the account.
    pub fn set_active(&mut self, is_active: bool, at: DateTime<Utc>) {
        self.is_active = is_active;
        self.updated_at = at;
    }

    /// Replaces personal permission overrides.
    pub fn set_permission_overrides(
        &mut self,
        permission_overrides: Option<PermissionFragment>,
        at: DateTime<Utc>,
    ) {
        self.permission_overrides = permission_overrides;
        self.updated_at = at;
    }
}
