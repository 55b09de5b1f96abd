//! `adminconsole-client`
//!
//! **Responsibility:** Authenticated transport for the admin console backend.
//!
//! This crate provides:
//! - A transport pipeline that attaches bearer credentials and classifies
//!   every response (success / business error / HTTP error / auth challenge)
//! - A refresh coordinator: one refresh call per burst of 401s, FIFO replay
//!   of the challenged requests, clean logout when the refresh fails
//! - A credential store persisted through a pluggable key/value backend
//!   (in-memory or SQLite)
//! - Login/logout and generic `get`/`post`/`put`/`patch`/`delete` verbs
//!
//! The client never navigates or renders: unrecoverable auth failures are
//! signalled once through a [`Navigator`].

pub mod client;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod dto;
pub mod error;
pub mod navigation;
pub mod progress;
pub mod request;
pub mod store;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use coordinator::{RefreshCoordinator, RefreshState};
pub use credentials::{CredentialStore, Session};
pub use dto::{LoginInput, LoginOutput, RefreshTokenInput, RefreshTokenOutput, UserInfo};
pub use error::{TransportError, TransportResult};
pub use navigation::{ChannelNavigator, LogoutReason, Navigator, NoopNavigator};
pub use progress::{ProgressGuard, ProgressIndicator};
pub use request::{ApiRequest, Method};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use transport::{Classification, HttpTransport, Transport, classify};

pub use tokio_util::sync::CancellationToken;
