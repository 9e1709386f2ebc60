use thiserror::Error;

use stockroom_core::UserId;

use crate::{Permission, Role, permissions_for_roles};

/// A verified principal with its effective permissions resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }

    /// Highest-privilege role name, for display and the users table.
    pub fn primary_role(&self) -> &str {
        for wanted in ["admin", "manager", "user"] {
            if self.roles.iter().any(|r| r.as_str() == wanted) {
                return wanted;
            }
        }
        "user"
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Permissions an operation requires, checked before it runs.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
