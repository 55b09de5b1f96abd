//! UI gate predicate.
//!
//! The UI layer asks `should_render` once when an element mounts and drops
//! the element when the answer is `false`. The predicate never touches a UI
//! tree itself, and later permission changes do not re-evaluate a mounted
//! element.

use serde::{Deserialize, Serialize};

use crate::Grants;

/// What an element requires to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionSpec {
    /// One permission code.
    Single(String),
    /// Several codes; `all == false` means any-of.
    Many {
        codes: Vec<String>,
        #[serde(default)]
        all: bool,
    },
}

impl PermissionSpec {
    pub fn single(code: impl Into<String>) -> Self {
        Self::Single(code.into())
    }

    pub fn any_of<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many {
            codes: codes.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    pub fn all_of<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many {
            codes: codes.into_iter().map(Into::into).collect(),
            all: true,
        }
    }
}

pub fn should_render(spec: &PermissionSpec, grants: &Grants) -> bool {
    match spec {
        PermissionSpec::Single(code) => grants.has_permission(code),
        PermissionSpec::Many { codes, all: true } => grants.has_all_permissions(codes),
        PermissionSpec::Many { codes, all: false } => grants.has_any_permission(codes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_follow_the_evaluator() {
        let grants = Grants::new(["user:edit", "user:view"], ["editor"]);

        assert!(should_render(&PermissionSpec::single("user:edit"), &grants));
        assert!(!should_render(&PermissionSpec::single("user:create"), &grants));
        assert!(should_render(
            &PermissionSpec::any_of(["user:create", "user:edit"]),
            &grants
        ));
        assert!(!should_render(
            &PermissionSpec::all_of(["user:create", "user:edit"]),
            &grants
        ));
        assert!(should_render(
            &PermissionSpec::all_of(["user:view", "user:edit"]),
            &grants
        ));
    }

    #[test]
    fn spec_accepts_directive_shapes() {
        let single: PermissionSpec = serde_json::from_str(r#""user:create""#).unwrap();
        assert_eq!(single, PermissionSpec::single("user:create"));

        let all: PermissionSpec =
            serde_json::from_str(r#"{"codes":["a","b"],"all":true}"#).unwrap();
        assert_eq!(all, PermissionSpec::all_of(["a", "b"]));

        let any: PermissionSpec = serde_json::from_str(r#"{"codes":["a"]}"#).unwrap();
        assert_eq!(any, PermissionSpec::any_of(["a"]));
    }
}
