//! Navigation collaborator.
//!
//! The client never navigates itself; on an unrecoverable auth failure it
//! signals the embedding UI once through a [`Navigator`].

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoutReason {
    /// The refresh call failed.
    SessionExpired,
    /// A 401 arrived and there was no refresh token to renew with.
    MissingRefreshToken,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionExpired => f.write_str("session_expired"),
            Self::MissingRefreshToken => f.write_str("missing_refresh_token"),
        }
    }
}

pub trait Navigator: Send + Sync + fmt::Debug {
    fn redirect_to_login(&self, reason: LogoutReason);
}

/// Logs the redirect and does nothing else. Used by headless tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        tracing::info!(%reason, "redirect to login requested");
    }
}

/// Forwards redirects to a channel the UI layer drains.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<LogoutReason>,
}

impl ChannelNavigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogoutReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        tracing::info!(%reason, "redirect to login requested");
        if self.tx.send(reason).is_err() {
            tracing::warn!(%reason, "navigation receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_navigator_delivers_reason() {
        let (nav, mut rx) = ChannelNavigator::channel();

        nav.redirect_to_login(LogoutReason::SessionExpired);

        assert_eq!(rx.try_recv().unwrap(), LogoutReason::SessionExpired);
        assert!(rx.try_recv().is_err());
    }
}
