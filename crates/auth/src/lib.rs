//! `adminconsole-auth`: pure authorization boundary for the console.
//!
//! This crate is intentionally decoupled from HTTP and storage: it evaluates
//! granted permission/role sets, builds the permission tree for menus, and
//! answers route-guard and UI-gate questions.

pub mod credential;
pub mod gate;
pub mod grants;
pub mod guard;
pub mod identity;
pub mod permissions;
pub mod roles;
pub mod tree;

pub use credential::{Credential, CredentialError, expiry_from_millis};
pub use gate::{PermissionSpec, should_render};
pub use grants::{AuthzError, Grants};
pub use guard::{NavigationDecision, RouteGuard, RouteMeta, RouteTarget};
pub use identity::AuthenticatedIdentity;
pub use permissions::Permission;
pub use roles::Role;
pub use tree::{PermissionRecord, PermissionTreeNode, build_permission_tree};
