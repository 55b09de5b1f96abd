//! Permission evaluator.
//!
//! `Grants` is the granted permission/role set of the current session. All
//! checks are exact membership tests against the flat sets; the permission
//! tree is never consulted for authorization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    MissingPermission(String),

    #[error("forbidden: none of the roles {0:?} is granted")]
    MissingRole(Vec<String>),
}

/// Granted permission and role codes.
///
/// - No IO
/// - No panics
/// - No caching: callers read the current set from the session on every check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    #[serde(default)]
    permissions: BTreeSet<Permission>,
    #[serde(default)]
    roles: BTreeSet<Role>,
}

impl Grants {
    pub fn new<P, R>(permissions: P, roles: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<Permission>,
        R: IntoIterator,
        R::Item: Into<Role>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    /// True iff at least one code is granted. Empty input is `false`.
    pub fn has_any_permission<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().any(|c| self.has_permission(c.as_ref()))
    }

    /// True iff every code is granted. Empty input is `true`.
    pub fn has_all_permissions<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().all(|c| self.has_permission(c.as_ref()))
    }

    pub fn has_role(&self, code: &str) -> bool {
        self.roles.contains(code)
    }

    pub fn has_any_role<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().any(|c| self.has_role(c.as_ref()))
    }

    pub fn has_all_roles<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().all(|c| self.has_role(c.as_ref()))
    }

    /// Imperative form of [`Grants::has_permission`] for command boundaries.
    pub fn require_permission(&self, required: &Permission) -> Result<(), AuthzError> {
        if self.has_permission(required.as_str()) {
            Ok(())
        } else {
            Err(AuthzError::MissingPermission(required.as_str().to_string()))
        }
    }

    /// Imperative form of [`Grants::has_any_role`].
    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), AuthzError> {
        if self.has_any_role(roles.iter().map(Role::as_str)) {
            Ok(())
        } else {
            Err(AuthzError::MissingRole(
                roles.iter().map(|r| r.as_str().to_string()).collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Grants {
        Grants::new(["user:edit"], ["editor"])
    }

    #[test]
    fn any_and_all_over_mixed_grants() {
        let grants = editor();
        let codes = ["user:create", "user:edit"];

        assert!(grants.has_any_permission(codes));
        assert!(!grants.has_all_permissions(codes));
    }

    #[test]
    fn empty_code_lists() {
        let grants = editor();
        let none: [&str; 0] = [];

        assert!(grants.has_all_permissions(none));
        assert!(!grants.has_any_permission(none));
        assert!(grants.has_all_roles(none));
        assert!(!grants.has_any_role(none));
    }

    #[test]
    fn membership_is_exact() {
        let grants = Grants::new(["user:edit"], ["admin"]);

        assert!(grants.has_permission("user:edit"));
        assert!(!grants.has_permission("user"));
        assert!(!grants.has_permission("user:edit:own"));
        assert!(grants.has_role("admin"));
        assert!(!grants.has_role("Admin"));
    }

    #[test]
    fn require_reports_what_is_missing() {
        let grants = editor();

        assert!(grants.require_permission(&Permission::new("user:edit")).is_ok());
        assert_eq!(
            grants.require_permission(&Permission::new("role:delete")),
            Err(AuthzError::MissingPermission("role:delete".to_string()))
        );
        assert_eq!(
            grants.require_any_role(&[Role::new("admin"), Role::new("ops")]),
            Err(AuthzError::MissingRole(vec!["admin".into(), "ops".into()]))
        );
        assert!(grants.require_any_role(&[Role::new("editor")]).is_ok());
    }

    #[test]
    fn round_trips_through_session_json() {
        let grants = editor();
        let json = serde_json::to_value(&grants).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "permissions": ["user:edit"], "roles": ["editor"] })
        );
        let back: Grants = serde_json::from_value(json).unwrap();
        assert_eq!(back, grants);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: vacuous truth holds for any granted set.
            #[test]
            fn empty_queries_are_vacuous(
                perms in proptest::collection::vec("[a-z]{1,8}:[a-z]{1,8}", 0..16),
                roles in proptest::collection::vec("[a-z]{1,8}", 0..8),
            ) {
                let grants = Grants::new(perms, roles);
                let none: Vec<String> = Vec::new();

                prop_assert!(grants.has_all_permissions(&none));
                prop_assert!(!grants.has_any_permission(&none));
                prop_assert!(grants.has_all_roles(&none));
                prop_assert!(!grants.has_any_role(&none));
            }

            /// Property: any-of agrees with a per-code membership scan.
            #[test]
            fn any_of_matches_membership(
                granted in proptest::collection::vec("[a-c]{1,2}", 0..6),
                asked in proptest::collection::vec("[a-c]{1,2}", 0..6),
            ) {
                let grants = Grants::new(granted.clone(), Vec::<String>::new());
                let expected_any = asked.iter().any(|c| granted.contains(c));
                let expected_all = asked.iter().all(|c| granted.contains(c));

                prop_assert_eq!(grants.has_any_permission(&asked), expected_any);
                prop_assert_eq!(grants.has_all_permissions(&asked), expected_all);
            }
        }
    }
}
