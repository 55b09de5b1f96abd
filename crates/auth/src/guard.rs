//! Navigation guard.
//!
//! Consulted before every navigation. It reads the current credential and
//! grants and returns a decision; performing the redirect is up to the
//! router that asked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Credential, Grants, Role};

/// Per-route metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,
    /// When non-empty, any one of these roles admits the user.
    #[serde(default)]
    pub roles: Vec<Role>,
}

fn default_requires_auth() -> bool {
    true
}

impl Default for RouteMeta {
    fn default() -> Self {
        Self {
            requires_auth: true,
            roles: Vec::new(),
        }
    }
}

impl RouteMeta {
    pub fn public() -> Self {
        Self {
            requires_auth: false,
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Role>,
    {
        Self {
            requires_auth: true,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Where the user is trying to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub path: String,
    /// Path plus query string; carried through the login redirect.
    pub full_path: String,
    pub meta: RouteMeta,
}

impl RouteTarget {
    pub fn new(path: impl Into<String>, meta: RouteMeta) -> Self {
        let path = path.into();
        Self {
            full_path: path.clone(),
            path,
            meta,
        }
    }

    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = full_path.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    RedirectToLogin { redirect: String },
    RedirectHome,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn check(
        &self,
        to: &RouteTarget,
        credential: &Credential,
        grants: &Grants,
        now: DateTime<Utc>,
    ) -> NavigationDecision {
        let authenticated = credential.is_usable(now);

        if to.meta.requires_auth && !authenticated {
            tracing::warn!(path = %to.path, "navigation denied, redirecting to login");
            return NavigationDecision::RedirectToLogin {
                redirect: to.full_path.clone(),
            };
        }

        if to.path == self.login_path && authenticated {
            return NavigationDecision::RedirectHome;
        }

        if to.meta.requires_auth
            && !to.meta.roles.is_empty()
            && !grants.has_any_role(to.meta.roles.iter().map(Role::as_str))
        {
            tracing::warn!(path = %to.path, "navigation denied, insufficient roles");
            return NavigationDecision::Forbidden;
        }

        NavigationDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signed_in() -> Credential {
        Credential::new("t1", "r1", Some(Utc::now() + Duration::hours(1))).unwrap()
    }

    #[test]
    fn anonymous_user_is_sent_to_login_with_return_path() {
        let guard = RouteGuard::default();
        let to = RouteTarget::new("/system/users", RouteMeta::default())
            .with_full_path("/system/users?page=2");

        let decision = guard.check(&to, &Credential::empty(), &Grants::default(), Utc::now());

        assert_eq!(
            decision,
            NavigationDecision::RedirectToLogin {
                redirect: "/system/users?page=2".to_string()
            }
        );
    }

    #[test]
    fn public_routes_are_open() {
        let guard = RouteGuard::default();
        let to = RouteTarget::new("/404", RouteMeta::public());

        assert_eq!(
            guard.check(&to, &Credential::empty(), &Grants::default(), Utc::now()),
            NavigationDecision::Allow
        );
    }

    #[test]
    fn signed_in_user_skips_login_page() {
        let guard = RouteGuard::default();
        let to = RouteTarget::new("/login", RouteMeta::public());

        assert_eq!(
            guard.check(&to, &signed_in(), &Grants::default(), Utc::now()),
            NavigationDecision::RedirectHome
        );
    }

    #[test]
    fn role_restricted_routes_use_any_role() {
        let guard = RouteGuard::default();
        let to = RouteTarget::new("/system/roles", RouteMeta::with_roles(["admin", "ops"]));

        let ops = Grants::new(Vec::<String>::new(), ["ops"]);
        let viewer = Grants::new(Vec::<String>::new(), ["viewer"]);

        assert_eq!(
            guard.check(&to, &signed_in(), &ops, Utc::now()),
            NavigationDecision::Allow
        );
        assert_eq!(
            guard.check(&to, &signed_in(), &viewer, Utc::now()),
            NavigationDecision::Forbidden
        );
    }

    #[test]
    fn expired_but_refreshable_session_is_admitted() {
        let guard = RouteGuard::default();
        let to = RouteTarget::new("/demo", RouteMeta::default());
        let now = Utc::now();
        let stale = Credential::new("t1", "r1", Some(now - Duration::minutes(1))).unwrap();

        // Still refreshable, so the transport will renew it on first use.
        assert_eq!(
            guard.check(&to, &stale, &Grants::default(), now),
            NavigationDecision::Allow
        );
    }
}
