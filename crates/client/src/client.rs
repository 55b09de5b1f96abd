//! `ApiClient`: the authenticated transport façade.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use adminconsole_auth::{
    AuthenticatedIdentity, Credential, Grants, NavigationDecision, PermissionSpec, RouteGuard, RouteTarget,
    should_render,
};

use crate::config::ClientConfig;
use crate::coordinator::{RefreshCoordinator, RefreshState};
use crate::credentials::{CredentialStore, Session};
use crate::dto::{LoginInput, LoginOutput};
use crate::error::{TransportError, TransportResult};
use crate::navigation::{Navigator, NoopNavigator};
use crate::progress::ProgressIndicator;
use crate::request::ApiRequest;
use crate::store::{KeyValueStore, MemoryStore};
use crate::transport::{Classification, HttpTransport, Transport};

/// Cheap to clone; clones share the session, the refresh state and the
/// progress indicator.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
    progress: ProgressIndicator,
}

#[derive(Debug)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    /// Persistence backend for the session. Defaults to [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receiver of redirect-to-login signals. Defaults to [`NoopNavigator`].
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> anyhow::Result<ApiClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.clone())?),
        };
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));

        let credentials = Arc::new(CredentialStore::new(self.config.storage_key.clone(), store));
        let coordinator = RefreshCoordinator::new(Arc::clone(&transport), Arc::clone(&credentials), navigator);

        tracing::debug!(base_url = %self.config.base_url, "api client ready");
        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                credentials,
                coordinator,
                progress: ProgressIndicator::new(),
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            store: None,
            navigator: None,
            transport: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Send a request and return the envelope's unwrapped `data`.
    ///
    /// The current access token is attached as a bearer header. A 401 is
    /// handed to the refresh coordinator and this call resolves with the
    /// replay's outcome; every other failure is returned as is.
    pub async fn send(&self, request: ApiRequest) -> TransportResult<Value> {
        let _progress = self.inner.progress.start();

        let credential = self.inner.credentials.get();
        let bearer = credential.access_token();

        match self.inner.transport.dispatch(&request, bearer).await? {
            Classification::AuthChallenge => {
                tracing::debug!(request_id = %request.id(), "handing challenged request to refresh coordinator");
                self.inner.coordinator.handle_challenge(request, bearer).await
            }
            other => other.into_result(),
        }
    }

    /// [`send`](Self::send), resolving with [`TransportError::Cancelled`] as
    /// soon as `cancel` fires. A request queued for replay is dequeued.
    pub async fn send_cancellable(&self, request: ApiRequest, cancel: &CancellationToken) -> TransportResult<Value> {
        let request_id = request.id();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%request_id, "request cancelled by caller");
                Err(TransportError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    /// [`send`](Self::send) and deserialize `data` into `T`.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> TransportResult<T> {
        let data = self.send(request).await?;
        decode(data)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> TransportResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request(ApiRequest::get(path).with_query(query)?).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> TransportResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> TransportResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> TransportResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::patch(path).with_json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        self.request(ApiRequest::delete(path)).await
    }

    pub async fn delete_with_query<T, Q>(&self, path: &str, query: &Q) -> TransportResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request(ApiRequest::delete(path).with_query(query)?).await
    }

    /// Log in and replace the whole session with the returned credential and
    /// identity.
    ///
    /// The login call never goes through the refresh coordinator: a 401 here
    /// means bad credentials.
    pub async fn login(&self, input: &LoginInput) -> TransportResult<AuthenticatedIdentity> {
        let _progress = self.inner.progress.start();
        tracing::info!(user_name = %input.user_name, "logging in");

        let request = ApiRequest::post(self.inner.config.login_path.clone()).with_json(input)?;
        let data = match self.inner.transport.dispatch(&request, None).await? {
            Classification::AuthChallenge => {
                tracing::warn!(user_name = %input.user_name, "login rejected");
                return Err(TransportError::Http {
                    status: 401,
                    message: "Invalid username or password".to_string(),
                });
            }
            other => other.into_result()?,
        };

        let output: LoginOutput = decode(data)?;
        let (credential, identity) = output
            .into_session()
            .map_err(|err| TransportError::Decode(format!("login response carried an unusable credential: {err}")))?;

        self.inner
            .coordinator
            .begin_session(Session::new(credential, identity.clone()))
            .await;
        tracing::info!(user_id = %identity.user_id, "logged in");
        Ok(identity)
    }

    /// Clear the session. Does not signal the navigator; the caller is
    /// already navigating.
    pub async fn logout(&self) {
        self.inner.coordinator.end_session().await;
        tracing::info!("logged out");
    }

    pub async fn refresh_now(&self) -> TransportResult<()> {
        self.inner.coordinator.refresh_now().await
    }

    /// Reload the persisted session and make it current, resetting the
    /// refresh state to `Idle`. Returns whether one was found.
    pub async fn restore_session(&self) -> anyhow::Result<bool> {
        match self.inner.credentials.load().await? {
            Some(session) => {
                self.inner.coordinator.resume_session(session).await;
                tracing::info!(key = %self.inner.credentials.key(), "session restored");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn credential(&self) -> Credential {
        self.inner.credentials.get()
    }

    pub fn current_identity(&self) -> Option<AuthenticatedIdentity> {
        self.inner.credentials.identity()
    }

    pub fn grants(&self) -> Grants {
        self.inner.credentials.grants()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.credentials.get().is_usable(Utc::now())
    }

    pub fn progress(&self) -> &ProgressIndicator {
        &self.inner.progress
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.coordinator.state()
    }

    pub fn refresh_count(&self) -> u64 {
        self.inner.coordinator.refresh_count()
    }

    /// Evaluate `guard` for a navigation to `to` against the current session.
    pub fn check_navigation(&self, guard: &RouteGuard, to: &RouteTarget) -> NavigationDecision {
        guard.check(to, &self.credential(), &self.grants(), Utc::now())
    }

    /// Mount-time UI gate against the current grants.
    pub fn should_render(&self, spec: &PermissionSpec) -> bool {
        should_render(spec, &self.grants())
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> TransportResult<T> {
    serde_json::from_value(data).map_err(|err| TransportError::Decode(err.to_string()))
}
