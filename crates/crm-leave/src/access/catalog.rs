use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Capabilities granted through roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    AskLeave,
    ApproveLeaveTeam,
    ApproveLeaveHr,
    ApproveLeaveManagement,
    ViewLeaveRequests,
    ViewLeaveReports,
    ManageLeavePolicies,
    ManageUsers,
    ViewUsers,
    EditProfile,
    EditOtherProfiles,
    ManageTeams,
    ViewTeams,
    AssignTeamLead,
    ManageRoles,
    ViewRoles,
    ViewReports,
    ViewAnalytics,
    ExportData,
    SystemAdmin,
    AuditLogs,
}

impl Permission {
    pub const ALL: [Permission; 21] = [
        Permission::AskLeave,
        Permission::ApproveLeaveTeam,
        Permission::ApproveLeaveHr,
        Permission::ApproveLeaveManagement,
        Permission::ViewLeaveRequests,
        Permission::ViewLeaveReports,
        Permission::ManageLeavePolicies,
        Permission::ManageUsers,
        Permission::ViewUsers,
        Permission::EditProfile,
        Permission::EditOtherProfiles,
        Permission::ManageTeams,
        Permission::ViewTeams,
        Permission::AssignTeamLead,
        Permission::ManageRoles,
        Permission::ViewRoles,
        Permission::ViewReports,
        Permission::ViewAnalytics,
        Permission::ExportData,
        Permission::SystemAdmin,
        Permission::AuditLogs,
    ];

    /// Stable numeric id, 1-based in declaration order.
    pub fn id(self) -> u16 {
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .map(|index| index as u16 + 1)
            .unwrap_or(0)
    }

    pub fn from_id(id: u16) -> Option<Self> {
        id.checked_sub(1)
            .and_then(|index| Self::ALL.get(usize::from(index)).copied())
    }

    pub fn key(self) -> &'static str {
        match self {
            Permission::AskLeave => "ASK_LEAVE",
            Permission::ApproveLeaveTeam => "APPROVE_LEAVE_TEAM",
            Permission::ApproveLeaveHr => "APPROVE_LEAVE_HR",
            Permission::ApproveLeaveManagement => "APPROVE_LEAVE_MANAGEMENT",
            Permission::ViewLeaveRequests => "VIEW_LEAVE_REQUESTS",
            Permission::ViewLeaveReports => "VIEW_LEAVE_REPORTS",
            Permission::ManageLeavePolicies => "MANAGE_LEAVE_POLICIES",
            Permission::ManageUsers => "MANAGE_USERS",
            Permission::ViewUsers => "VIEW_USERS",
            Permission::EditProfile => "EDIT_PROFILE",
            Permission::EditOtherProfiles => "EDIT_OTHER_PROFILES",
            Permission::ManageTeams => "MANAGE_TEAMS",
            Permission::ViewTeams => "VIEW_TEAMS",
            Permission::AssignTeamLead => "ASSIGN_TEAM_LEAD",
            Permission::ManageRoles => "MANAGE_ROLES",
            Permission::ViewRoles => "VIEW_ROLES",
            Permission::ViewReports => "VIEW_REPORTS",
            Permission::ViewAnalytics => "VIEW_ANALYTICS",
            Permission::ExportData => "EXPORT_DATA",
            Permission::SystemAdmin => "SYSTEM_ADMIN",
            Permission::AuditLogs => "AUDIT_LOGS",
        }
    }
}

/// Predefined organisational roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    TeamLead,
    Hr,
    Management,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Employee,
        Role::TeamLead,
        Role::Hr,
        Role::Management,
        Role::Admin,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Role::Employee => "Regular employee with basic permissions",
            Role::TeamLead => "Team leader with team management permissions",
            Role::Hr => "Human Resources with HR-specific permissions",
            Role::Management => "Management with high-level permissions",
            Role::Admin => "System administrator with all permissions",
        }
    }

    fn default_permission_ids(self) -> &'static [u16] {
        match self {
            Role::Employee => &[1, 5, 10, 13, 16],
            Role::TeamLead => &[1, 2, 5, 6, 9, 10, 11, 13, 16, 17],
            Role::Hr => &[1, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19],
            Role::Management => &[
                1, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
            ],
            Role::Admin => &[
                1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21,
            ],
        }
    }
}

/// Read-only role → permission lookup, built once at startup and shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: BTreeMap<Role, BTreeSet<Permission>>,
}

impl RoleCatalog {
    pub fn predefined() -> Self {
        let roles = Role::ALL
            .iter()
            .map(|role| {
                let permissions = role
                    .default_permission_ids()
                    .iter()
                    .filter_map(|id| Permission::from_id(*id))
                    .collect();
                (*role, permissions)
            })
            .collect();
        Self { roles }
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, BTreeSet<Permission>)>,
    {
        Self {
            roles: entries.into_iter().collect(),
        }
    }

    pub fn permissions_for(&self, role: Role) -> Option<&BTreeSet<Permission>> {
        self.roles.get(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.keys().copied()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::predefined()
    }
}

/// Union of the permissions granted by every assigned role. Roles missing from the
/// catalog contribute nothing.
pub fn resolve_permissions<'a, I>(roles: I, catalog: &RoleCatalog) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .filter_map(|role| catalog.permissions_for(*role))
        .flat_map(|permissions| permissions.iter().copied())
        .collect()
}
