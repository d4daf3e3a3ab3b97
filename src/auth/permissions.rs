use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every permission an identity can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Permission {
    CreatePosts = 0,
    EditPosts = 1,
    DeletePosts = 2,
    ManagePosts = 3,
    PublishPosts = 4,
    ManageCategories = 5,
    ManageUsers = 6,
    ViewPosts = 7,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::CreatePosts,
        Permission::EditPosts,
        Permission::DeletePosts,
        Permission::ManagePosts,
        Permission::PublishPosts,
        Permission::ManageCategories,
        Permission::ManageUsers,
        Permission::ViewPosts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreatePosts => "create_posts",
            Permission::EditPosts => "edit_posts",
            Permission::DeletePosts => "delete_posts",
            Permission::ManagePosts => "manage_posts",
            Permission::PublishPosts => "publish_posts",
            Permission::ManageCategories => "manage_categories",
            Permission::ManageUsers => "manage_users",
            Permission::ViewPosts => "view_posts",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{}'", s))
    }
}

/// Compact set of permissions, one bit per [`Permission`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet(u16);

impl PermissionSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::from_iter(Permission::ALL)
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.insert(permission);
        self
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.bit();
    }

    pub fn union(self, other: PermissionSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.as_str()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = PermissionSet::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

/// Named bundles of permissions assigned to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Role {
    Admin,
    Editor,
    Author,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Author => "Author",
            Role::Reader => "Reader",
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        use Permission::*;
        match self {
            Role::Admin => PermissionSet::all(),
            Role::Editor => [ManagePosts, PublishPosts, EditPosts, DeletePosts].into_iter().collect(),
            Role::Author => [CreatePosts, EditPosts].into_iter().collect(),
            Role::Reader => [ViewPosts].into_iter().collect(),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Editor" => Ok(Role::Editor),
            "Author" => Ok(Role::Author),
            "Reader" => Ok(Role::Reader),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated actor of a request, resolved by the auth middleware.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub permissions: PermissionSet,
}

impl Identity {
    /// Effective permissions are the union of every role plus direct grants.
    pub fn new(id: i64, name: String, email: String, roles: Vec<Role>, direct: PermissionSet) -> Self {
        let permissions = roles
            .iter()
            .fold(direct, |acc, role| acc.union(role.permissions()));
        Self { id, name, email, roles, permissions }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}
