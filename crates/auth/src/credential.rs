use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh credential pair held by the session.
///
/// Both tokens are present or both are empty; there is no constructor for a
/// half-populated credential.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,

    #[error("access token and refresh token must both be present")]
    Partial,

    #[error("access token has expired")]
    Expired,
}

impl Credential {
    /// Build a credential from a login or refresh response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Self, CredentialError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        match (access_token.is_empty(), refresh_token.is_empty()) {
            (true, true) => Err(CredentialError::Empty),
            (false, false) => Ok(Self {
                access_token,
                refresh_token,
                expiry,
            }),
            _ => Err(CredentialError::Partial),
        }
    }

    /// The logged-out credential.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<&str> {
        (!self.access_token.is_empty()).then_some(self.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        (!self.refresh_token.is_empty()).then_some(self.refresh_token.as_str())
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|at| now >= at)
    }

    /// Deterministically validate the credential against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if self.is_empty() {
            return Err(CredentialError::Empty);
        }
        if self.refresh_token.is_empty() {
            return Err(CredentialError::Partial);
        }
        if self.is_expired(now) {
            return Err(CredentialError::Expired);
        }
        Ok(())
    }

    /// Whether the session can still make authenticated calls: the access
    /// token is valid, or it expired but a refresh token can renew it.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        match self.validate(now) {
            Ok(()) => true,
            Err(CredentialError::Expired) => self.refresh_token().is_some(),
            Err(_) => false,
        }
    }
}

/// Convert the backend's `expiredTime` (epoch milliseconds) into an expiry.
///
/// `0`, negative and out-of-range values mean "no expiry".
pub fn expiry_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

// Tokens are secrets; keep them out of `{:?}` output and therefore out of logs.
impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expiry", &self.expiry)
            .finish()
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() { "<empty>" } else { "<redacted>" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_partial_credentials() {
        assert_eq!(Credential::new("t1", "", None), Err(CredentialError::Partial));
        assert_eq!(Credential::new("", "r1", None), Err(CredentialError::Partial));
        assert_eq!(Credential::new("", "", None), Err(CredentialError::Empty));
    }

    #[test]
    fn validate_checks_expiry() {
        let now = Utc::now();
        let live = Credential::new("t1", "r1", Some(now + Duration::hours(1))).unwrap();
        let stale = Credential::new("t1", "r1", Some(now - Duration::seconds(1))).unwrap();
        let forever = Credential::new("t1", "r1", None).unwrap();

        assert_eq!(live.validate(now), Ok(()));
        assert_eq!(stale.validate(now), Err(CredentialError::Expired));
        assert_eq!(forever.validate(now), Ok(()));
        assert_eq!(Credential::empty().validate(now), Err(CredentialError::Empty));
    }

    #[test]
    fn expired_credential_is_usable_while_refreshable() {
        let now = Utc::now();
        let stale = Credential::new("t1", "r1", Some(now - Duration::minutes(5))).unwrap();

        assert!(stale.is_expired(now));
        assert!(stale.is_usable(now));
        assert!(!Credential::empty().is_usable(now));
    }

    #[test]
    fn expiry_millis_conversion() {
        assert_eq!(expiry_from_millis(0), None);
        assert_eq!(expiry_from_millis(-5), None);
        let at = expiry_from_millis(1_700_000_000_000).unwrap();
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let cred = Credential::new("secret-access", "secret-refresh", None).unwrap();
        let out = format!("{cred:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("<redacted>"));
    }
}
