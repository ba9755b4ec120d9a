//! Static default permission bundles per administrator level.

use crate::administrator::AdministratorLevel;
use crate::permission::{
    OrganizationPermissions, PermissionSet, SettingsPermissions, UserPermissions,
};

/// Returns the hard-coded default bundle for `level`.
///
/// Every flag is present in every bundle. Scope restrictions (which schools or
/// branches a lower-level administrator can reach) are not expressed here.
#[must_use]
pub fn default_permissions_for(level: AdministratorLevel) -> PermissionSet {
    match level {
        AdministratorLevel::EntityAdmin => PermissionSet::uniform(true),
        AdministratorLevel::SubEntityAdmin => sub_entity_admin_defaults(),
        AdministratorLevel::SchoolAdmin => school_admin_defaults(),
        AdministratorLevel::BranchAdmin => branch_admin_defaults(),
    }
}

fn sub_entity_admin_defaults() -> PermissionSet {
    let mut permissions = PermissionSet::uniform(true);
    permissions.users.create_entity_admin = false;
    permissions.users.modify_entity_admin = false;
    permissions.settings.manage_company_settings = false;
    permissions
}

fn school_admin_defaults() -> PermissionSet {
    PermissionSet {
        users: UserPermissions {
            create_entity_admin: false,
            modify_entity_admin: false,
            create_sub_entity_admin: false,
            modify_sub_entity_admin: false,
            create_school_admin: false,
            modify_school_admin: false,
            create_branch_admin: true,
            modify_branch_admin: true,
            create_teacher: true,
            modify_teacher: true,
            create_student: true,
            modify_student: true,
            delete_users: false,
            view_all_users: false,
        },
        organization: OrganizationPermissions {
            create_school: false,
            modify_school: false,
            delete_school: false,
            create_branch: true,
            modify_branch: true,
            delete_branch: false,
            view_all_schools: false,
            view_all_branches: false,
            manage_departments: true,
        },
        settings: SettingsPermissions {
            manage_company_settings: false,
            manage_school_settings: true,
            manage_branch_settings: true,
            view_audit_logs: true,
            export_data: true,
        },
    }
}

fn branch_admin_defaults() -> PermissionSet {
    let mut permissions = PermissionSet::minimal();
    permissions.users.create_teacher = true;
    permissions.users.modify_teacher = true;
    permissions.users.create_student = true;
    permissions.users.modify_student = true;
    permissions.settings.manage_branch_settings = true;
    permissions
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::permission::{PermissionKey, PermissionSet};

    use super::*;

    #[test]
    fn entity_admin_has_every_flag() {
        let permissions = default_permissions_for(AdministratorLevel::EntityAdmin);
        assert_eq!(permissions.granted().count(), PermissionKey::all().len());
        assert!(permissions.users.modify_entity_admin);
    }

    #[test]
    fn sub_entity_admin_cannot_touch_entity_admins_or_company_settings() {
        let permissions = default_permissions_for(AdministratorLevel::SubEntityAdmin);
        let denied: Vec<PermissionKey> = PermissionKey::all()
            .iter()
            .copied()
            .filter(|key| !permissions.get(*key))
            .collect();

        assert_eq!(
            denied,
            vec![
                PermissionKey::CreateEntityAdmin,
                PermissionKey::ModifyEntityAdmin,
                PermissionKey::ManageCompanySettings,
            ]
        );
    }

    #[test]
    fn school_admin_manages_branch_admins_only() {
        let permissions = default_permissions_for(AdministratorLevel::SchoolAdmin);
        assert!(permissions.users.create_branch_admin);
        assert!(!permissions.users.create_school_admin);
        assert!(!permissions.users.modify_sub_entity_admin);
        assert!(!permissions.users.delete_users);
        assert!(!permissions.organization.modify_school);
        assert!(!permissions.organization.view_all_schools);
    }

    #[test]
    fn branch_admin_manages_teachers_and_students() {
        let permissions = default_permissions_for(AdministratorLevel::BranchAdmin);
        for level in AdministratorLevel::all() {
            assert!(!permissions.get(PermissionKey::create_for(*level)));
            assert!(!permissions.get(PermissionKey::modify_for(*level)));
        }
        assert!(permissions.users.create_teacher);
        assert!(permissions.users.modify_student);
        assert!(!permissions.users.view_all_users);
        assert!(permissions.settings.manage_branch_settings);
        assert!(!permissions.settings.manage_school_settings);
    }

    proptest! {
        #[test]
        fn every_default_bundle_is_complete(index in 0..AdministratorLevel::all().len()) {
            let level = AdministratorLevel::all()[index];
            let value = serde_json::to_value(default_permissions_for(level));
            prop_assert!(value.is_ok());
            let value = value.unwrap_or_default();

            let restored = PermissionSet::from_json(&value);
            prop_assert!(restored.is_ok());

            for key in PermissionKey::all() {
                let leaf = &value[key.category().as_str()][key.name()];
                prop_assert!(leaf.is_boolean());
            }
        }
    }
}
