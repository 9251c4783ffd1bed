use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    ACTION_FOLDERS_READ, ACTION_LIBRARY_PANELS_CREATE, ACTION_LIBRARY_PANELS_DELETE,
    ACTION_LIBRARY_PANELS_READ, ACTION_LIBRARY_PANELS_WRITE, SCOPE_FOLDERS_ALL,
};

/// Action -> granted scopes
pub type Permissions = HashMap<String, HashSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
}

impl OrgRole {
    /// Permissions every member with this role gets inside their org
    pub fn basic_permissions(&self) -> Permissions {
        let mut actions = vec![ACTION_FOLDERS_READ, ACTION_LIBRARY_PANELS_READ];
        if matches!(self, OrgRole::Editor | OrgRole::Admin) {
            actions.extend([
                ACTION_LIBRARY_PANELS_CREATE,
                ACTION_LIBRARY_PANELS_WRITE,
                ACTION_LIBRARY_PANELS_DELETE,
            ]);
        }

        actions
            .into_iter()
            .map(|action| {
                (
                    action.to_string(),
                    HashSet::from([SCOPE_FOLDERS_ALL.to_string()]),
                )
            })
            .collect()
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(OrgRole::Viewer),
            "editor" => Ok(OrgRole::Editor),
            "admin" => Ok(OrgRole::Admin),
            other => Err(format!("unknown org role '{}'", other)),
        }
    }
}

/// The acting identity for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInUser {
    pub user_id: i64,
    pub uid: String,
    pub login: String,
    pub name: String,
    pub org_id: i64,
    pub org_role: OrgRole,
    pub permissions: Permissions,
}

impl SignedInUser {
    /// User with the basic permissions of `role`
    pub fn new(org_id: i64, user_id: i64, uid: impl Into<String>, role: OrgRole) -> Self {
        let uid = uid.into();
        Self {
            user_id,
            login: uid.clone(),
            name: uid.clone(),
            uid,
            org_id,
            org_role: role,
            permissions: role.basic_permissions(),
        }
    }

    /// User with nothing granted; build up with [`SignedInUser::grant`]
    pub fn without_permissions(org_id: i64, user_id: i64, uid: impl Into<String>) -> Self {
        let mut user = Self::new(org_id, user_id, uid, OrgRole::Viewer);
        user.permissions.clear();
        user
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn grant(mut self, action: &str, scope: &str) -> Self {
        self.permissions
            .entry(action.to_string())
            .or_default()
            .insert(scope.to_string());
        self
    }

    /// Stable id used to isolate per-identity cached state
    pub fn unique_id(&self) -> &str {
        &self.uid
    }
}
