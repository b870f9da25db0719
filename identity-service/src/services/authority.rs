//! Authority aggregation.
//!
//! Pure function, no I/O: role grants plus the tenant-admin flag collapse
//! into a deduplicated authority set. Output is a set; callers must not
//! depend on iteration order beyond display.

use std::collections::BTreeSet;

use crate::models::RoleGrant;

/// Authority token granted for each role, prefixing the role name.
pub const ROLE_PREFIX: &str = "role:";

/// Fixed tokens added for tenant administrators.
pub const TENANT_ADMIN_ROLE: &str = "role:tenant-admin";
pub const TENANT_ADMIN_PERMISSION: &str = "tenant:admin";

/// Aggregate a user's authorities from their role grants.
///
/// A grant contributes only while the assignment is currently active (flag
/// set, not expired) and its role is active. Each contributing grant emits a
/// `role:<name>` token plus one token per permission string.
pub fn aggregate_authorities(grants: &[RoleGrant], tenant_admin: bool) -> BTreeSet<String> {
    let mut authorities = BTreeSet::new();

    for grant in grants {
        if !grant.is_currently_active() || !grant.role_active {
            continue;
        }
        authorities.insert(format!("{ROLE_PREFIX}{}", grant.role_name));
        for permission in &grant.permissions {
            authorities.insert(permission.clone());
        }
    }

    if tenant_admin {
        authorities.insert(TENANT_ADMIN_ROLE.to_string());
        authorities.insert(TENANT_ADMIN_PERMISSION.to_string());
    }

    authorities
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn grant(role_name: &str, permissions: &[&str]) -> RoleGrant {
        RoleGrant {
            assignment_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            role_name: role_name.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            role_active: true,
            assignment_active: true,
            expires_utc: None,
        }
    }

    #[test]
    fn deduplicates_overlapping_permissions() {
        let grants = vec![
            grant("EDITOR", &["documents:read", "documents:write"]),
            grant("VIEWER", &["documents:read"]),
        ];
        let authorities = aggregate_authorities(&grants, false);
        assert_eq!(
            authorities.iter().filter(|a| *a == "documents:read").count(),
            1
        );
        assert!(authorities.contains("role:EDITOR"));
        assert!(authorities.contains("role:VIEWER"));
    }

    #[test]
    fn output_is_invariant_under_input_reordering() {
        let a = grant("EDITOR", &["documents:write"]);
        let b = grant("VIEWER", &["documents:read"]);
        let forward = aggregate_authorities(&[a.clone(), b.clone()], false);
        let reversed = aggregate_authorities(&[b, a], false);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn expired_grant_is_excluded_even_when_flagged_active() {
        let mut g = grant("VIEWER", &["documents:read"]);
        g.expires_utc = Some(Utc::now() - Duration::minutes(5));
        assert!(g.assignment_active);
        let authorities = aggregate_authorities(&[g], false);
        assert!(authorities.is_empty());
    }

    #[test]
    fn deactivated_grant_is_excluded_even_when_unexpired() {
        let mut g = grant("VIEWER", &["documents:read"]);
        g.assignment_active = false;
        g.expires_utc = Some(Utc::now() + Duration::days(30));
        let authorities = aggregate_authorities(&[g], false);
        assert!(authorities.is_empty());
    }

    #[test]
    fn inactive_role_is_excluded() {
        let mut g = grant("RETIRED", &["documents:read"]);
        g.role_active = false;
        let authorities = aggregate_authorities(&[g], false);
        assert!(authorities.is_empty());
    }

    #[test]
    fn tenant_admin_adds_fixed_tokens() {
        let authorities = aggregate_authorities(&[], true);
        assert!(authorities.contains(TENANT_ADMIN_ROLE));
        assert!(authorities.contains(TENANT_ADMIN_PERMISSION));
        assert_eq!(authorities.len(), 2);
    }
}
