//! Permission bundles, fragments and the merge contract.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use scholaris_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::administrator::AdministratorLevel;

/// Top-level permission groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// User and administrator management.
    Users,
    /// Schools, branches and departments.
    Organization,
    /// Settings, audit and export.
    Settings,
}

impl PermissionCategory {
    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Organization => "organization",
            Self::Settings => "settings",
        }
    }

    /// Returns all categories.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Users, Self::Organization, Self::Settings]
    }

    /// Returns the keys grouped under this category.
    pub fn keys(self) -> impl Iterator<Item = PermissionKey> {
        PermissionKey::all()
            .iter()
            .copied()
            .filter(move |key| key.category() == self)
    }
}

impl FromStr for PermissionCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "users" => Ok(Self::Users),
            "organization" => Ok(Self::Organization),
            "settings" => Ok(Self::Settings),
            _ => Err(AppError::Validation(format!(
                "unknown permission category '{value}'"
            ))),
        }
    }
}

/// One boolean capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionKey {
    /// Create entity administrators.
    CreateEntityAdmin,
    /// Modify entity administrators.
    ModifyEntityAdmin,
    /// Create sub-entity administrators.
    CreateSubEntityAdmin,
    /// Modify sub-entity administrators.
    ModifySubEntityAdmin,
    /// Create school administrators.
    CreateSchoolAdmin,
    /// Modify school administrators.
    ModifySchoolAdmin,
    /// Create branch administrators.
    CreateBranchAdmin,
    /// Modify branch administrators.
    ModifyBranchAdmin,
    /// Create teachers.
    CreateTeacher,
    /// Modify teachers.
    ModifyTeacher,
    /// Create students.
    CreateStudent,
    /// Modify students.
    ModifyStudent,
    /// Deactivate users and administrators.
    DeleteUsers,
    /// See every user in the tenant.
    ViewAllUsers,
    /// Create schools.
    CreateSchool,
    /// Modify schools.
    ModifySchool,
    /// Delete schools.
    DeleteSchool,
    /// Create branches.
    CreateBranch,
    /// Modify branches.
    ModifyBranch,
    /// Delete branches.
    DeleteBranch,
    /// See every school in the tenant.
    ViewAllSchools,
    /// See every branch in the tenant.
    ViewAllBranches,
    /// Manage departments.
    ManageDepartments,
    /// Manage company-wide settings.
    ManageCompanySettings,
    /// Manage school settings.
    ManageSchoolSettings,
    /// Manage branch settings.
    ManageBranchSettings,
    /// Read the audit trail.
    ViewAuditLogs,
    /// Export tenant data.
    ExportData,
}

impl PermissionKey {
    /// Returns all known keys in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionKey] = &[
            PermissionKey::CreateEntityAdmin,
            PermissionKey::ModifyEntityAdmin,
            PermissionKey::CreateSubEntityAdmin,
            PermissionKey::ModifySubEntityAdmin,
            PermissionKey::CreateSchoolAdmin,
            PermissionKey::ModifySchoolAdmin,
            PermissionKey::CreateBranchAdmin,
            PermissionKey::ModifyBranchAdmin,
            PermissionKey::CreateTeacher,
            PermissionKey::ModifyTeacher,
            PermissionKey::CreateStudent,
            PermissionKey::ModifyStudent,
            PermissionKey::DeleteUsers,
            PermissionKey::ViewAllUsers,
            PermissionKey::CreateSchool,
            PermissionKey::ModifySchool,
            PermissionKey::DeleteSchool,
            PermissionKey::CreateBranch,
            PermissionKey::ModifyBranch,
            PermissionKey::DeleteBranch,
            PermissionKey::ViewAllSchools,
            PermissionKey::ViewAllBranches,
            PermissionKey::ManageDepartments,
            PermissionKey::ManageCompanySettings,
            PermissionKey::ManageSchoolSettings,
            PermissionKey::ManageBranchSettings,
            PermissionKey::ViewAuditLogs,
            PermissionKey::ExportData,
        ];

        ALL
    }

    /// Returns the category this key belongs to.
    #[must_use]
    pub fn category(self) -> PermissionCategory {
        match self {
            Self::CreateEntityAdmin
            | Self::ModifyEntityAdmin
            | Self::CreateSubEntityAdmin
            | Self::ModifySubEntityAdmin
            | Self::CreateSchoolAdmin
            | Self::ModifySchoolAdmin
            | Self::CreateBranchAdmin
            | Self::ModifyBranchAdmin
            | Self::CreateTeacher
            | Self::ModifyTeacher
            | Self::CreateStudent
            | Self::ModifyStudent
            | Self::DeleteUsers
            | Self::ViewAllUsers => PermissionCategory::Users,
            Self::CreateSchool
            | Self::ModifySchool
            | Self::DeleteSchool
            | Self::CreateBranch
            | Self::ModifyBranch
            | Self::DeleteBranch
            | Self::ViewAllSchools
            | Self::ViewAllBranches
            | Self::ManageDepartments => PermissionCategory::Organization,
            Self::ManageCompanySettings
            | Self::ManageSchoolSettings
            | Self::ManageBranchSettings
            | Self::ViewAuditLogs
            | Self::ExportData => PermissionCategory::Settings,
        }
    }

    /// Returns the key name inside its category.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateEntityAdmin => "create_entity_admin",
            Self::ModifyEntityAdmin => "modify_entity_admin",
            Self::CreateSubEntityAdmin => "create_sub_entity_admin",
            Self::ModifySubEntityAdmin => "modify_sub_entity_admin",
            Self::CreateSchoolAdmin => "create_school_admin",
            Self::ModifySchoolAdmin => "modify_school_admin",
            Self::CreateBranchAdmin => "create_branch_admin",
            Self::ModifyBranchAdmin => "modify_branch_admin",
            Self::CreateTeacher => "create_teacher",
            Self::ModifyTeacher => "modify_teacher",
            Self::CreateStudent => "create_student",
            Self::ModifyStudent => "modify_student",
            Self::DeleteUsers => "delete_users",
            Self::ViewAllUsers => "view_all_users",
            Self::CreateSchool => "create_school",
            Self::ModifySchool => "modify_school",
            Self::DeleteSchool => "delete_school",
            Self::CreateBranch => "create_branch",
            Self::ModifyBranch => "modify_branch",
            Self::DeleteBranch => "delete_branch",
            Self::ViewAllSchools => "view_all_schools",
            Self::ViewAllBranches => "view_all_branches",
            Self::ManageDepartments => "manage_departments",
            Self::ManageCompanySettings => "manage_company_settings",
            Self::ManageSchoolSettings => "manage_school_settings",
            Self::ManageBranchSettings => "manage_branch_settings",
            Self::ViewAuditLogs => "view_audit_logs",
            Self::ExportData => "export_data",
        }
    }

    /// Resolves a key from its category and name.
    pub fn parse(category: PermissionCategory, name: &str) -> AppResult<Self> {
        category.keys().find(|key| key.name() == name).ok_or_else(|| {
            AppError::Validation(format!(
                "unknown permission '{}.{name}'",
                category.as_str()
            ))
        })
    }

    /// Returns the key that allows creating administrators of `level`.
    #[must_use]
    pub fn create_for(level: AdministratorLevel) -> Self {
        match level {
            AdministratorLevel::EntityAdmin => Self::CreateEntityAdmin,
            AdministratorLevel::SubEntityAdmin => Self::CreateSubEntityAdmin,
            AdministratorLevel::SchoolAdmin => Self::CreateSchoolAdmin,
            AdministratorLevel::BranchAdmin => Self::CreateBranchAdmin,
        }
    }

    /// Returns the key that allows modifying administrators of `level`.
    #[must_use]
    pub fn modify_for(level: AdministratorLevel) -> Self {
        match level {
            AdministratorLevel::EntityAdmin => Self::ModifyEntityAdmin,
            AdministratorLevel::SubEntityAdmin => Self::ModifySubEntityAdmin,
            AdministratorLevel::SchoolAdmin => Self::ModifySchoolAdmin,
            AdministratorLevel::BranchAdmin => Self::ModifyBranchAdmin,
        }
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}.{}", self.category().as_str(), self.name())
    }
}

/// User-management flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct UserPermissions {
    pub create_entity_admin: bool,
    pub modify_entity_admin: bool,
    pub create_sub_entity_admin: bool,
    pub modify_sub_entity_admin: bool,
    pub create_school_admin: bool,
    pub modify_school_admin: bool,
    pub create_branch_admin: bool,
    pub modify_branch_admin: bool,
    pub create_teacher: bool,
    pub modify_teacher: bool,
    pub create_student: bool,
    pub modify_student: bool,
    pub delete_users: bool,
    pub view_all_users: bool,
}

/// Organization-structure flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct OrganizationPermissions {
    pub create_school: bool,
    pub modify_school: bool,
    pub delete_school: bool,
    pub create_branch: bool,
    pub modify_branch: bool,
    pub delete_branch: bool,
    pub view_all_schools: bool,
    pub view_all_branches: bool,
    pub manage_departments: bool,
}

/// Settings, audit and export flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct SettingsPermissions {
    pub manage_company_settings: bool,
    pub manage_school_settings: bool,
    pub manage_branch_settings: bool,
    pub view_audit_logs: bool,
    pub export_data: bool,
}

/// Fully populated capability bundle.
///
/// `Default` is the minimal bundle with every flag `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionSet {
    /// User-management flags.
    pub users: UserPermissions,
    /// Organization-structure flags.
    pub organization: OrganizationPermissions,
    /// Settings, audit and export flags.
    pub settings: SettingsPermissions,
}

impl PermissionSet {
    /// Returns the all-`false` bundle used when resolution fails closed.
    #[must_use]
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Returns a bundle with every flag set to `value`.
    #[must_use]
    pub fn uniform(value: bool) -> Self {
        let mut set = Self::minimal();
        for key in PermissionKey::all() {
            set.set(*key, value);
        }
        set
    }

    /// Parses and validates a complete bundle from JSON.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|error| AppError::Validation(format!("invalid permission bundle: {error}")))
    }

    /// Returns the flag value for `key`.
    #[must_use]
    pub fn get(&self, key: PermissionKey) -> bool {
        match key {
            PermissionKey::CreateEntityAdmin => self.users.create_entity_admin,
            PermissionKey::ModifyEntityAdmin => self.users.modify_entity_admin,
            PermissionKey::CreateSubEntityAdmin => self.users.create_sub_entity_admin,
            PermissionKey::ModifySubEntityAdmin => self.users.modify_sub_entity_admin,
            PermissionKey::CreateSchoolAdmin => self.users.create_school_admin,
            PermissionKey::ModifySchoolAdmin => self.users.modify_school_admin,
            PermissionKey::CreateBranchAdmin => self.users.create_branch_admin,
            PermissionKey::ModifyBranchAdmin => self.users.modify_branch_admin,
            PermissionKey::CreateTeacher => self.users.create_teacher,
            PermissionKey::ModifyTeacher => self.users.modify_teacher,
            PermissionKey::CreateStudent => self.users.create_student,
            PermissionKey::ModifyStudent => self.users.modify_student,
            PermissionKey::DeleteUsers => self.users.delete_users,
            PermissionKey::ViewAllUsers => self.users.view_all_users,
            PermissionKey::CreateSchool => self.organization.create_school,
            PermissionKey::ModifySchool => self.organization.modify_school,
            PermissionKey::DeleteSchool => self.organization.delete_school,
            PermissionKey::CreateBranch => self.organization.create_branch,
            PermissionKey::ModifyBranch => self.organization.modify_branch,
            PermissionKey::DeleteBranch => self.organization.delete_branch,
            PermissionKey::ViewAllSchools => self.organization.view_all_schools,
            PermissionKey::ViewAllBranches => self.organization.view_all_branches,
            PermissionKey::ManageDepartments => self.organization.manage_departments,
            PermissionKey::ManageCompanySettings => self.settings.manage_company_settings,
            PermissionKey::ManageSchoolSettings => self.settings.manage_school_settings,
            PermissionKey::ManageBranchSettings => self.settings.manage_branch_settings,
            PermissionKey::ViewAuditLogs => self.settings.view_audit_logs,
            PermissionKey::ExportData => self.settings.export_data,
        }
    }

    /// Sets the flag value for `key`.
    pub fn set(&mut self, key: PermissionKey, value: bool) {
        let flag = match key {
            PermissionKey::CreateEntityAdmin => &mut self.users.create_entity_admin,
            PermissionKey::ModifyEntityAdmin => &mut self.users.modify_entity_admin,
            PermissionKey::CreateSubEntityAdmin => &mut self.users.create_sub_entity_admin,
            PermissionKey::ModifySubEntityAdmin => &mut self.users.modify_sub_entity_admin,
            PermissionKey::CreateSchoolAdmin => &mut self.users.create_school_admin,
            PermissionKey::ModifySchoolAdmin => &mut self.users.modify_school_admin,
            PermissionKey::CreateBranchAdmin => &mut self.users.create_branch_admin,
            PermissionKey::ModifyBranchAdmin => &mut self.users.modify_branch_admin,
            PermissionKey::CreateTeacher => &mut self.users.create_teacher,
            PermissionKey::ModifyTeacher => &mut self.users.modify_teacher,
            PermissionKey::CreateStudent => &mut self.users.create_student,
            PermissionKey::ModifyStudent => &mut self.users.modify_student,
            PermissionKey::DeleteUsers => &mut self.users.delete_users,
            PermissionKey::ViewAllUsers => &mut self.users.view_all_users,
            PermissionKey::CreateSchool => &mut self.organization.create_school,
            PermissionKey::ModifySchool => &mut self.organization.modify_school,
            PermissionKey::DeleteSchool => &mut self.organization.delete_school,
            PermissionKey::CreateBranch => &mut self.organization.create_branch,
            PermissionKey::ModifyBranch => &mut self.organization.modify_branch,
            PermissionKey::DeleteBranch => &mut self.organization.delete_branch,
            PermissionKey::ViewAllSchools => &mut self.organization.view_all_schools,
            PermissionKey::ViewAllBranches => &mut self.organization.view_all_branches,
            PermissionKey::ManageDepartments => &mut self.organization.manage_departments,
            PermissionKey::ManageCompanySettings => &mut self.settings.manage_company_settings,
            PermissionKey::ManageSchoolSettings => &mut self.settings.manage_school_settings,
            PermissionKey::ManageBranchSettings => &mut self.settings.manage_branch_settings,
            PermissionKey::ViewAuditLogs => &mut self.settings.view_audit_logs,
            PermissionKey::ExportData => &mut self.settings.export_data,
        };
        *flag = value;
    }

    /// Returns every key currently granted.
    pub fn granted(&self) -> impl Iterator<Item = PermissionKey> + '_ {
        PermissionKey::all()
            .iter()
            .copied()
            .filter(|key| self.get(*key))
    }

    /// Returns a copy with `fragment` merged on top under `policy`.
    #[must_use]
    pub fn merged(mut self, fragment: &PermissionFragment, policy: PermissionMergePolicy) -> Self {
        match policy {
            PermissionMergePolicy::TrueBiased => {
                for (key, value) in fragment.entries() {
                    if value {
                        self.set(key, true);
                    }
                }
            }
            PermissionMergePolicy::CategoryReplace => {
                for category in fragment.categories() {
                    for key in category.keys() {
                        self.set(key, fragment.get(key).unwrap_or(false));
                    }
                }
            }
        }
        self
    }

    /// Returns keys that are granted in `next` but not here, and keys revoked in `next`.
    #[must_use]
    pub fn diff(&self, next: &Self) -> PermissionDiff {
        let mut diff = PermissionDiff::default();
        for key in PermissionKey::all().iter().copied() {
            match (self.get(key), next.get(key)) {
                (false, true) => diff.granted.push(key),
                (true, false) => diff.revoked.push(key),
                _ => {}
            }
        }
        diff
    }
}

/// Keys that changed between two bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    /// Keys flipped to `true`.
    pub granted: Vec<PermissionKey>,
    /// Keys flipped to `false`.
    pub revoked: Vec<PermissionKey>,
}

impl PermissionDiff {
    /// Returns whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }
}

/// How an override fragment combines with a base bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMergePolicy {
    /// Per-leaf OR: a `true` override wins, a `false` override never lowers a `true`.
    #[default]
    TrueBiased,
    /// Each category present in the override replaces the base category.
    ///
    /// Leaves absent from a replaced category become `false`.
    CategoryReplace,
}

impl PermissionMergePolicy {
    /// Returns a stable configuration value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrueBiased => "true_biased",
            Self::CategoryReplace => "category_replace",
        }
    }
}

impl FromStr for PermissionMergePolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "true_biased" => Ok(Self::TrueBiased),
            "category_replace" => Ok(Self::CategoryReplace),
            _ => Err(AppError::Validation(format!(
                "unknown permission merge policy '{value}'"
            ))),
        }
    }
}

/// Partial bundle used for personal and scope overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct PermissionFragment {
    categories: BTreeSet<PermissionCategory>,
    values: BTreeMap<PermissionKey, bool>,
}

impl PermissionFragment {
    /// Creates an empty fragment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fragment with one more leaf set.
    #[must_use]
    pub fn with(mut self, key: PermissionKey, value: bool) -> Self {
        self.categories.insert(key.category());
        self.values.insert(key, value);
        self
    }

    /// Parses and validates a fragment from JSON.
    ///
    /// Every present category must be known and map to an object whose leaves
    /// are known keys with boolean values.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        let Some(categories) = value.as_object() else {
            return Err(AppError::Validation(
                "permission overrides must be a JSON object".to_owned(),
            ));
        };

        let mut fragment = Self::new();
        for (category_name, leaves) in categories {
            let category = PermissionCategory::from_str(category_name)?;
            let Some(leaves) = leaves.as_object() else {
                return Err(AppError::Validation(format!(
                    "permission category '{category_name}' must be a JSON object"
                )));
            };

            fragment.categories.insert(category);
            for (leaf_name, leaf) in leaves {
                let key = PermissionKey::parse(category, leaf_name)?;
                let Some(flag) = leaf.as_bool() else {
                    return Err(AppError::Validation(format!(
                        "permission '{key}' must be a boolean"
                    )));
                };
                fragment.values.insert(key, flag);
            }
        }

        Ok(fragment)
    }

    /// Serializes the fragment as nested JSON objects.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for category in &self.categories {
            let leaves: Map<String, Value> = self
                .values
                .iter()
                .filter(|(key, _)| key.category() == *category)
                .map(|(key, value)| (key.name().to_owned(), Value::Bool(*value)))
                .collect();
            root.insert(category.as_str().to_owned(), Value::Object(leaves));
        }
        Value::Object(root)
    }

    /// Returns the explicit value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: PermissionKey) -> Option<bool> {
        self.values.get(&key).copied()
    }

    /// Returns explicit leaves.
    pub fn entries(&self) -> impl Iterator<Item = (PermissionKey, bool)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Returns categories present in the fragment, including empty ones.
    pub fn categories(&self) -> impl Iterator<Item = PermissionCategory> + '_ {
        self.categories.iter().copied()
    }

    /// Returns whether the fragment carries no category.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl TryFrom<Value> for PermissionFragment {
    type Error = AppError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl From<PermissionFragment> for Value {
    fn from(value: PermissionFragment) -> Self {
        value.to_json()
    }
}
