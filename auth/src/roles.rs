//! Role derivation.
//!
//! Which role a user gets is deployment policy, so it is injected into the
//! verifier and the bridge as a [`RoleMapper`].

use crate::constants::DEFAULT_ADMIN_GROUP;
use crate::providers::IdentityClaims;
use crate::state::Role;

/// Maps identity claims to a role.
///
/// Implemented for any `Fn(&IdentityClaims) -> Role` closure.
pub trait RoleMapper: Send + Sync {
    /// Derive the role for a set of claims.
    fn map_role(&self, claims: &IdentityClaims) -> Role;
}

impl<F> RoleMapper for F
where
    F: Fn(&IdentityClaims) -> Role + Send + Sync,
{
    fn map_role(&self, claims: &IdentityClaims) -> Role {
        self(claims)
    }
}

/// Grants admin to members of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRoleMapper {
    admin_group: String,
}

impl GroupRoleMapper {
    /// Create a mapper for the given admin group.
    #[must_use]
    pub fn new(admin_group: impl Into<String>) -> Self {
        Self {
            admin_group: admin_group.into(),
        }
    }
}

impl Default for GroupRoleMapper {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_GROUP)
    }
}

impl RoleMapper for GroupRoleMapper {
    fn map_role(&self, claims: &IdentityClaims) -> Role {
        if claims.groups.iter().any(|g| g == &self.admin_group) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Role reported by the legacy auth service or the gateway.
#[must_use]
pub fn role_from_service(role: Option<&str>) -> Role {
    match role.map(str::trim) {
        Some(r) if r.eq_ignore_ascii_case("admin") || r.eq_ignore_ascii_case("super_admin") => {
            Role::Admin
        }
        _ => Role::User,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with_groups(groups: &[&str]) -> IdentityClaims {
        IdentityClaims {
            sub: "s".to_string(),
            groups: groups.iter().map(ToString::to_string).collect(),
            ..IdentityClaims::default()
        }
    }

    #[test]
    fn test_admin_group_membership() {
        let mapper = GroupRoleMapper::default();
        assert_eq!(mapper.map_role(&claims_with_groups(&["authentik Admins"])), Role::Admin);
        assert_eq!(mapper.map_role(&claims_with_groups(&["staff"])), Role::User);
        assert_eq!(mapper.map_role(&claims_with_groups(&[])), Role::User);
    }

    #[test]
    fn test_group_match_is_exact() {
        let mapper = GroupRoleMapper::default();
        assert_eq!(mapper.map_role(&claims_with_groups(&["authentik admins"])), Role::User);
    }

    #[test]
    fn test_closure_mapper() {
        let everyone_admin = |_: &IdentityClaims| Role::Admin;
        assert_eq!(everyone_admin.map_role(&claims_with_groups(&[])), Role::Admin);
    }

    #[test]
    fn test_service_roles() {
        assert_eq!(role_from_service(Some("admin")), Role::Admin);
        assert_eq!(role_from_service(Some("super_admin")), Role::Admin);
        assert_eq!(role_from_service(Some("editor")), Role::User);
        assert_eq!(role_from_service(None), Role::User);
    }
}
