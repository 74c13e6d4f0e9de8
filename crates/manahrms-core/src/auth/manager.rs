//! The session authority.
//!
//! `SessionManager` owns the in-memory `Session` and is the only writer of it.
//! Session-mutating operations run one at a time; a call made while another is
//! in flight waits for it to finish.
//!
//! The transport clears persisted credentials on its own when it sees a 401
//! and broadcasts a `TransportEvent`. Every public call here first drains those
//! events and drops the in-memory session if its token was the one rejected.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::repository::{PersistedSession, SessionRepository};
use super::session::{Session, SessionPhase, SessionSnapshot};
use crate::api::{ApiClient, ApiError, TransportEvent};
use crate::error::{SessionError, SessionResult};
use crate::models::UserRecord;

/// Buffered snapshots per subscriber
const UPDATE_CHANNEL_CAPACITY: usize = 32;

pub struct SessionManager {
    api: ApiClient,
    repo: SessionRepository,
    state: RwLock<Session>,
    op_lock: Mutex<()>,
    invalidations: Mutex<broadcast::Receiver<TransportEvent>>,
    updates: broadcast::Sender<SessionSnapshot>,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        let repo = api.session_repository().clone();
        let invalidations = Mutex::new(api.subscribe());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            api,
            repo,
            state: RwLock::new(Session::default()),
            op_lock: Mutex::new(()),
            invalidations,
            updates,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Receive every snapshot published after a state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.sync_invalidations().await;
        self.state.read().await.snapshot()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.snapshot().await.is_authenticated
    }

    /// Restore the persisted session. Runs once; later calls return the current state.
    pub async fn initialize(&self) -> SessionSnapshot {
        let _guard = self.op_lock.lock().await;
        self.sync_invalidations().await;

        if self.state.read().await.phase != SessionPhase::Unknown {
            debug!("Session already initialized");
            return self.state.read().await.snapshot();
        }

        match self.repo.load().await {
            Some(persisted) => {
                info!(user = ?persisted.user.email(), "Restored persisted session");
                self.transition(|s| s.restore(persisted)).await
            }
            None => {
                debug!("No persisted session");
                self.transition(|s| s.phase = SessionPhase::Unauthenticated)
                    .await
            }
        }
    }

    /// Authenticate against the API and persist the new session.
    ///
    /// Any failure leaves the session cleared and recorded in `error`.
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<SessionSnapshot> {
        let _guard = self.op_lock.lock().await;
        self.sync_invalidations().await;

        self.transition(|s| {
            s.phase = SessionPhase::Authenticating;
            s.last_error = None;
        })
        .await;

        match self.api.login(email, password).await {
            Ok(response) => {
                let persisted = PersistedSession {
                    access_token: response.token,
                    refresh_token: response.refresh_token,
                    user: response.user,
                };
                // The transport reads the token from storage, so persist before announcing.
                self.repo.save(&persisted).await;
                info!(user = ?persisted.user.email(), "Login successful");
                Ok(self.transition(|s| s.restore(persisted)).await)
            }
            Err(e) => {
                let err = SessionError::from_login(e);
                error!(error = %err, "Login failed");
                self.repo.clear().await;
                let message = err.to_string();
                self.transition(|s| {
                    s.clear();
                    s.phase = SessionPhase::Unauthenticated;
                    s.last_error = Some(message);
                })
                .await;
                Err(err)
            }
        }
    }

    /// Sign out remotely if possible, then always clear local state.
    pub async fn logout(&self) -> SessionSnapshot {
        let _guard = self.op_lock.lock().await;
        self.sync_invalidations().await;

        self.transition(|s| s.phase = SessionPhase::SigningOut).await;

        if let Err(e) = self.api.logout().await {
            self.repo.reporter().report(&e, "remote logout");
        }

        self.repo.clear().await;
        let snapshot = self
            .transition(|s| {
                s.clear();
                s.phase = SessionPhase::Unauthenticated;
                s.last_error = None;
            })
            .await;
        info!("Logged out");
        snapshot
    }

    /// Overlay `partial` onto the current user and re-persist. No remote call.
    pub async fn update_user(&self, partial: UserRecord) -> SessionResult<UserRecord> {
        let _guard = self.op_lock.lock().await;
        self.sync_invalidations().await;

        let (persisted, mutating) = {
            let mut guard = self.state.write().await;
            let session = &mut *guard;
            if session.phase != SessionPhase::Authenticated {
                return Err(SessionError::NotAuthenticated);
            }
            let (Some(token), Some(user)) = (session.access_token.as_ref(), session.user.as_mut())
            else {
                return Err(SessionError::NotAuthenticated);
            };
            user.merge(partial);
            let persisted = PersistedSession {
                access_token: token.clone(),
                refresh_token: session.refresh_token.clone(),
                user: user.clone(),
            };
            session.phase = SessionPhase::Mutating;
            (persisted, session.snapshot())
        };
        self.publish(mutating);

        self.repo.save(&persisted).await;
        self.transition(|s| s.phase = SessionPhase::Authenticated)
            .await;
        debug!("User record updated");
        Ok(persisted.user)
    }

    /// Clear the recorded error only.
    pub async fn clear_error(&self) -> SessionSnapshot {
        self.sync_invalidations().await;
        self.transition(|s| s.last_error = None).await
    }

    /// Apply invalidations reported by the transport since the last call.
    async fn sync_invalidations(&self) {
        let mut rx = self.invalidations.lock().await;
        let mut invalidated = false;
        loop {
            match rx.try_recv() {
                Ok(TransportEvent::SessionInvalidated { rejected_token }) => {
                    let state = self.state.read().await;
                    if rejected_token.is_some() && state.access_token == rejected_token {
                        invalidated = true;
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    // Rejections were dropped. The transport removes the stored
                    // token when it rejects the current one, so only an empty
                    // store means ours may have been among them.
                    warn!(missed, "Missed transport events, re-reading stored token");
                    if self.repo.access_token().await.is_none() {
                        invalidated = true;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        drop(rx);

        if invalidated && self.state.read().await.is_authenticated() {
            warn!("Session invalidated by the server");
            let message = ApiError::Unauthorized.to_string();
            self.transition(|s| {
                s.clear();
                s.phase = SessionPhase::Unauthenticated;
                s.last_error = Some(message);
            })
            .await;
        }
    }

    async fn transition<F>(&self, apply: F) -> SessionSnapshot
    where
        F: FnOnce(&mut Session),
    {
        let snapshot = {
            let mut state = self.state.write().await;
            apply(&mut state);
            debug!(phase = ?state.phase, authenticated = state.is_authenticated(), "Session transition");
            state.snapshot()
        };
        self.publish(snapshot.clone());
        snapshot
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        // No subscribers is fine
        let _ = self.updates.send(snapshot);
    }
}
