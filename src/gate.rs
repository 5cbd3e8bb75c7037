use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AppError;

/// Permission
///
/// The closed set of capabilities a user can hold, either directly or through a role.
/// The serialized names are the ones stored in the `permissions` table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub enum Permission {
    #[serde(rename = "videosManager")]
    VideosManager,
    #[serde(rename = "manageSeries")]
    ManageSeries,
    #[serde(rename = "manageUsers")]
    ManageUsers,
}

/// Role
///
/// Named bundle of permissions. The bundle granted to each role lives in the
/// `role_permissions` table and is seeded from `default_permissions`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub enum Role {
    #[serde(rename = "super-admin")]
    SuperAdmin,
    #[serde(rename = "video-manager")]
    VideoManager,
    #[serde(rename = "series-manager")]
    SeriesManager,
    #[serde(rename = "user-manager")]
    UserManager,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} name: {name}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

impl Permission {
    pub const ALL: [Permission; 3] = [
        Permission::VideosManager,
        Permission::ManageSeries,
        Permission::ManageUsers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::VideosManager => "videosManager",
            Permission::ManageSeries => "manageSeries",
            Permission::ManageUsers => "manageUsers",
        }
    }
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::SuperAdmin,
        Role::VideoManager,
        Role::SeriesManager,
        Role::UserManager,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super-admin",
            Role::VideoManager => "video-manager",
            Role::SeriesManager => "series-manager",
            Role::UserManager => "user-manager",
        }
    }

    /// The permissions a freshly seeded role is granted.
    pub fn default_permissions(self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => &Permission::ALL,
            Role::VideoManager => &[Permission::VideosManager],
            Role::SeriesManager => &[Permission::ManageSeries],
            Role::UserManager => &[Permission::ManageUsers],
        }
    }
}

impl FromStr for Permission {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "permission",
                name: s.to_string(),
            })
    }
}

impl FromStr for Role {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "role",
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access
///
/// The resolved capabilities of one identity: its roles and its *effective*
/// permissions (direct grants plus everything granted through its roles).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Access {
    pub roles: BTreeSet<Role>,
    pub permissions: BTreeSet<Permission>,
}

impl Access {
    /// Builds an `Access` from raw names read from the store. Names outside the
    /// closed sets are dropped with a warning and never grant anything.
    pub fn from_names<R, P>(roles: R, permissions: P) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let roles = roles
            .into_iter()
            .filter_map(|name| match name.as_ref().parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!("ignoring stored role: {}", e);
                    None
                }
            })
            .collect();
        let permissions = permissions
            .into_iter()
            .filter_map(|name| match name.as_ref().parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(e) => {
                    tracing::warn!("ignoring stored permission: {}", e);
                    None
                }
            })
            .collect();
        Self { roles, permissions }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Super admins hold every permission.
    pub fn can(&self, permission: Permission) -> bool {
        self.has_role(Role::SuperAdmin) || self.permissions.contains(&permission)
    }

    pub fn satisfies(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::Permission(p) => self.can(p),
            Requirement::Role(r) => self.has_role(r),
        }
    }
}

/// What a protected action demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Permission(Permission),
    Role(Role),
}

impl From<Permission> for Requirement {
    fn from(p: Permission) -> Self {
        Requirement::Permission(p)
    }
}

impl From<Role> for Requirement {
    fn from(r: Role) -> Self {
        Requirement::Role(r)
    }
}

/// Decision
///
/// Outcome of a gate check. Missing identity and missing capability are kept apart:
/// the first sends the caller to the login flow, the second is a hard 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    Forbidden,
}

impl Decision {
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::RedirectToLogin => Err(AppError::AuthenticationRequired { wants_json: false }),
            Decision::Forbidden => Err(AppError::Forbidden),
        }
    }
}

/// check
///
/// The authorization gate: `identity` is `None` for anonymous callers.
pub fn check(identity: Option<&Access>, requirement: impl Into<Requirement>) -> Decision {
    let requirement = requirement.into();
    match identity {
        None => Decision::RedirectToLogin,
        Some(access) if access.satisfies(requirement) => Decision::Allow,
        Some(_) => Decision::Forbidden,
    }
}
