use serde::{Deserialize, Serialize};

use adminconsole_core::UserId;

use crate::Grants;

/// Identity of the logged-in user, derived from a login response.
///
/// Replaced wholesale on every successful login; never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub user_id: UserId,
    pub user_name: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub grants: Grants,
}

impl AuthenticatedIdentity {
    pub fn grants(&self) -> &Grants {
        &self.grants
    }
}
