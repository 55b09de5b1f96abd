//! Refresh Coordinator.
//!
//! `Idle -> Refreshing -> {Idle, Failed}`. Every 401 goes through one
//! mutex-protected decision point, so however many requests are challenged
//! at once, at most one refresh call is outstanding. Challenged requests
//! wait in a FIFO queue and are replayed with the renewed credential, or all
//! fail with [`TransportError::AuthExpired`] when the refresh fails.
//!
//! The refresh itself runs on a spawned task so that a caller giving up on
//! its own request never strands the rest of the queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::oneshot;

use adminconsole_auth::Credential;

use crate::credentials::{CredentialStore, Session};
use crate::error::{TransportError, TransportResult};
use crate::navigation::{LogoutReason, Navigator};
use crate::request::ApiRequest;
use crate::transport::{Classification, Transport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    /// Terminal until the next login.
    Failed,
}

/// A caller parked behind the outstanding refresh.
struct PendingRequest {
    ticket: u64,
    /// `None` for callers that only wait for the refresh (`refresh_now`).
    request: Option<ApiRequest>,
    reply: oneshot::Sender<TransportResult<Value>>,
}

#[derive(Default)]
struct Shared {
    state: RefreshState,
    queue: VecDeque<PendingRequest>,
    /// Bumped by login/logout; a refresh started under an older generation
    /// must not touch the new session.
    generation: u64,
    next_ticket: u64,
}

struct Inner {
    shared: Mutex<Shared>,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    refresh_calls: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("RefreshCoordinator")
            .field("state", &shared.state)
            .field("pending", &shared.queue.len())
            .field("generation", &shared.generation)
            .finish_non_exhaustive()
    }
}

enum Decision {
    /// Parked behind a refresh another caller started.
    Wait(Ticket),
    /// Parked, and this caller must start the refresh.
    Lead(Ticket, u64),
    /// A refresh already renewed the credential since this request was sent.
    Replay(ApiRequest, String),
    Reject(TransportError),
    /// No refresh token: tear the session down without a network call.
    Teardown(Vec<PendingRequest>),
}

/// Receiving half of a queued request. Dropping it (caller cancelled)
/// removes the request from the queue.
struct Ticket {
    id: u64,
    rx: oneshot::Receiver<TransportResult<Value>>,
    inner: Arc<Inner>,
    resolved: bool,
}

impl Ticket {
    async fn wait(mut self) -> TransportResult<Value> {
        let outcome = (&mut self.rx)
            .await
            .unwrap_or_else(|_| Err(TransportError::auth_expired("token refresh was abandoned")));
        self.resolved = true;
        outcome
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let mut shared = self.inner.lock();
        let before = shared.queue.len();
        shared.queue.retain(|pending| pending.ticket != self.id);
        if shared.queue.len() != before {
            tracing::debug!(ticket = self.id, "queued request cancelled");
        }
    }
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared::default()),
                transport,
                credentials,
                navigator,
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    /// Number of callers waiting on the outstanding refresh.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Refresh calls issued over the coordinator's lifetime.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// Recover `request`, which was answered with 401 after being sent with
    /// `sent_with` as its bearer token.
    ///
    /// Resolves with the replay's outcome, or `AuthExpired` when the session
    /// cannot be renewed.
    pub async fn handle_challenge(&self, request: ApiRequest, sent_with: Option<&str>) -> TransportResult<Value> {
        let decision = {
            let mut shared = self.inner.lock();
            match shared.state {
                RefreshState::Failed => Decision::Reject(TransportError::auth_expired("session has expired")),
                RefreshState::Refreshing => Decision::Wait(self.enqueue(&mut shared, Some(request))),
                RefreshState::Idle => {
                    let current = self.inner.credentials.get();
                    match (sent_with, current.access_token()) {
                        (Some(sent), Some(now)) if sent != now => Decision::Replay(request, now.to_owned()),
                        (Some(_), None) => Decision::Reject(TransportError::auth_expired(
                            "session ended while the request was in flight",
                        )),
                        _ if current.refresh_token().is_none() => {
                            tracing::warn!(request_id = %request.id(), "challenged without a refresh token");
                            Decision::Teardown(self.fail_locked(&mut shared))
                        }
                        _ => self.start_refresh(&mut shared, Some(request)),
                    }
                }
            }
        };

        self.resolve(decision).await
    }

    /// Renew the credential now. Joins the outstanding refresh if there is
    /// one.
    pub async fn refresh_now(&self) -> TransportResult<()> {
        let decision = {
            let mut shared = self.inner.lock();
            match shared.state {
                RefreshState::Failed => Decision::Reject(TransportError::auth_expired("session has expired")),
                RefreshState::Refreshing => Decision::Wait(self.enqueue(&mut shared, None)),
                RefreshState::Idle if self.inner.credentials.get().refresh_token().is_none() => {
                    Decision::Reject(TransportError::auth_expired("no refresh token"))
                }
                RefreshState::Idle => self.start_refresh(&mut shared, None),
            }
        };
        self.resolve(decision).await.map(|_| ())
    }

    /// Install a freshly logged-in session and reset to `Idle`.
    pub(crate) async fn begin_session(&self, session: Session) {
        self.reset(session, "session was replaced by a new login").await;
    }

    /// Install a session read back from storage and reset to `Idle`.
    pub(crate) async fn resume_session(&self, session: Session) {
        self.reset(session, "session was replaced by a restored one").await;
    }

    /// Clear the session and reset to `Idle`. Does not redirect.
    pub(crate) async fn end_session(&self) {
        self.reset(Session::default(), "session ended").await;
    }

    async fn reset(&self, session: Session, reason: &str) {
        let pending = {
            let mut shared = self.inner.lock();
            shared.generation += 1;
            shared.state = RefreshState::Idle;
            self.inner.credentials.replace(session);
            std::mem::take(&mut shared.queue)
        };
        self.inner.credentials.persist().await;

        for pending in pending {
            let _ = pending.reply.send(Err(TransportError::auth_expired(reason)));
        }
    }

    fn enqueue(&self, shared: &mut Shared, request: Option<ApiRequest>) -> Ticket {
        let id = shared.next_ticket;
        shared.next_ticket += 1;

        let (reply, rx) = oneshot::channel();
        shared.queue.push_back(PendingRequest {
            ticket: id,
            request,
            reply,
        });

        Ticket {
            id,
            rx,
            inner: Arc::clone(&self.inner),
            resolved: false,
        }
    }

    fn start_refresh(&self, shared: &mut Shared, request: Option<ApiRequest>) -> Decision {
        shared.state = RefreshState::Refreshing;
        let ticket = self.enqueue(shared, request);
        Decision::Lead(ticket, shared.generation)
    }

    async fn resolve(&self, decision: Decision) -> TransportResult<Value> {
        match decision {
            Decision::Wait(ticket) => ticket.wait().await,
            Decision::Lead(ticket, generation) => {
                tokio::spawn(self.clone().run_refresh(generation));
                ticket.wait().await
            }
            Decision::Replay(request, token) => {
                tracing::debug!(request_id = %request.id(), "credential already renewed, replaying");
                self.replay(&request, Some(&token)).await
            }
            Decision::Reject(err) => Err(err),
            Decision::Teardown(pending) => {
                let err = TransportError::auth_expired("no refresh token");
                self.finish_failure(pending, &err, LogoutReason::MissingRefreshToken)
                    .await;
                Err(err)
            }
        }
    }

    async fn run_refresh(self, generation: u64) {
        let credential = self.inner.credentials.get();
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tracing::info!(generation, "refreshing access token");

        match self.inner.transport.refresh(&credential).await {
            Ok(renewed) => self.complete(generation, renewed).await,
            Err(err) => {
                tracing::warn!(generation, error = %err, "token refresh failed");
                self.abort(generation, err).await;
            }
        }
    }

    async fn complete(&self, generation: u64, renewed: Credential) {
        let pending = {
            let mut shared = self.inner.lock();
            if shared.generation != generation {
                tracing::debug!(generation, "discarding refresh result from an ended session");
                return;
            }
            self.inner.credentials.update_credential(renewed.clone());
            shared.state = RefreshState::Idle;
            std::mem::take(&mut shared.queue)
        };
        self.inner.credentials.persist().await;
        tracing::info!(replays = pending.len(), "access token refreshed");

        // join_all polls in queue order, so replays start FIFO.
        let token = renewed.access_token();
        join_all(pending.into_iter().map(|pending| self.replay_pending(pending, token))).await;
    }

    async fn abort(&self, generation: u64, err: TransportError) {
        let pending = {
            let mut shared = self.inner.lock();
            if shared.generation != generation {
                return;
            }
            self.fail_locked(&mut shared)
        };

        let err = match err {
            TransportError::AuthExpired(_) => err,
            other => TransportError::auth_expired(other.to_string()),
        };
        self.finish_failure(pending, &err, LogoutReason::SessionExpired)
            .await;
    }

    /// Enter `Failed` and clear the session while the decision lock is held.
    fn fail_locked(&self, shared: &mut Shared) -> Vec<PendingRequest> {
        shared.state = RefreshState::Failed;
        self.inner.credentials.clear();
        shared.queue.drain(..).collect()
    }

    async fn finish_failure(&self, pending: Vec<PendingRequest>, err: &TransportError, reason: LogoutReason) {
        self.inner.credentials.persist().await;
        tracing::info!(%reason, failed = pending.len(), "session ended, logging out");

        for pending in pending {
            let _ = pending.reply.send(Err(err.clone()));
        }
        self.inner.navigator.redirect_to_login(reason);
    }

    async fn replay_pending(&self, pending: PendingRequest, token: Option<&str>) {
        if pending.reply.is_closed() {
            return;
        }
        let outcome = match &pending.request {
            Some(request) => self.replay(request, token).await,
            None => Ok(Value::Null),
        };
        let _ = pending.reply.send(outcome);
    }

    async fn replay(&self, request: &ApiRequest, token: Option<&str>) -> TransportResult<Value> {
        match self.inner.transport.dispatch(request, token).await? {
            Classification::AuthChallenge => {
                tracing::warn!(request_id = %request.id(), "replay rejected after token refresh");
                Err(TransportError::auth_expired(
                    "request was rejected again after token refresh",
                ))
            }
            other => other.into_result(),
        }
    }
}
