//! Static role → permission policy.

use std::collections::BTreeSet;

use crate::{Permission, Role};

const MANAGER: &[Permission] = &[
    Permission::PRODUCTS_READ,
    Permission::PRODUCTS_WRITE,
    Permission::STOCK_ADJUST,
    Permission::CATEGORIES_READ,
    Permission::CATEGORIES_WRITE,
    Permission::MOVEMENTS_READ,
    Permission::REPORTS_READ,
];

const USER: &[Permission] = &[
    Permission::PRODUCTS_READ,
    Permission::CATEGORIES_READ,
    Permission::MOVEMENTS_READ,
    Permission::REPORTS_READ,
];

/// Union of the permissions granted by `roles`.
///
/// `admin` collapses to the wildcard; deletes are only reachable through it.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(Role::is_admin) {
        return vec![Permission::WILDCARD];
    }

    let mut granted: BTreeSet<&str> = BTreeSet::new();
    let mut out = Vec::new();
    for role in roles {
        let perms = match role.as_str() {
            "manager" => MANAGER,
            "user" => USER,
            _ => &[],
        };
        for p in perms {
            if granted.insert(p.as_str()) {
                out.push(p.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(perms: &[Permission], p: &Permission) -> bool {
        perms.iter().any(|x| x == p || x.is_wildcard())
    }

    #[test]
    fn admin_gets_wildcard() {
        let perms = permissions_for_roles(&[Role::USER, Role::ADMIN]);
        assert_eq!(perms, vec![Permission::WILDCARD]);
    }

    #[test]
    fn manager_writes_but_cannot_delete() {
        let perms = permissions_for_roles(&[Role::MANAGER]);
        assert!(has(&perms, &Permission::PRODUCTS_WRITE));
        assert!(has(&perms, &Permission::STOCK_ADJUST));
        assert!(!has(&perms, &Permission::PRODUCTS_DELETE));
        assert!(!has(&perms, &Permission::CATEGORIES_DELETE));
    }

    #[test]
    fn user_is_read_only() {
        let perms = permissions_for_roles(&[Role::USER]);
        assert!(has(&perms, &Permission::PRODUCTS_READ));
        assert!(has(&perms, &Permission::REPORTS_READ));
        assert!(!has(&perms, &Permission::PRODUCTS_WRITE));
        assert!(!has(&perms, &Permission::STOCK_ADJUST));
    }

    #[test]
    fn overlapping_roles_do_not_duplicate() {
        let perms = permissions_for_roles(&[Role::USER, Role::MANAGER]);
        assert_eq!(perms.len(), MANAGER.len());
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(permissions_for_roles(&[Role::new("auditor")]).is_empty());
    }
}
