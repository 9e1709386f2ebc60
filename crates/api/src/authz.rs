//! Permission guard run by handlers before they touch the store.

use stockroom_auth::{AuthzError, CommandAuthorization, Permission, Principal, authorize};

use crate::context::PrincipalContext;

/// Permissions a single route needs.
pub struct RouteAuth {
    required: Vec<Permission>,
}

impl RouteAuth {
    pub fn new(required: Permission) -> Self {
        Self { required: vec![required] }
    }
}

impl CommandAuthorization for RouteAuth {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Resolve the principal's permissions and check every one `op` requires.
pub fn authorize_request<C: CommandAuthorization>(
    principal: &PrincipalContext,
    op: &C,
) -> Result<Principal, AuthzError> {
    let resolved = Principal::from_roles(principal.user_id(), principal.roles().to_vec());
    for perm in op.required_permissions() {
        authorize(&resolved, perm)?;
    }
    Ok(resolved)
}

/// Shorthand for the common single-permission case.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<Principal, AuthzError> {
    authorize_request(principal, &RouteAuth::new(permission))
}
