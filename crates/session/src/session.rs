//! The session record and its lifecycle state machine.
//!
//! One process-wide [`Session`] behind a single `RwLock`; request handlers
//! and platform event callbacks alike take the lock in short scopes, which
//! serializes every mutation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use {
    serde::Serialize,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use zapbridge_platform::{ClientEvent, ClientFactory, EventCallback, PlatformClient, SessionState};

use crate::{
    digest::{self, ChatSummary},
    dispatch::{self, DispatchReport, DispatchRequest},
    error::SessionError,
    pairing,
};

/// The single in-memory record of one platform connection.
pub struct Session {
    pub state: SessionState,
    /// Last pairing payload issued by the platform. Only meaningful while
    /// the state is `UnpairedIdle`; cleared on every transition into
    /// `Connected` or `Unlaunched`.
    pub qr: Option<String>,
    pub owner_user_id: Option<i64>,
    /// At most one client exists at a time; the session owns it exclusively.
    pub client: Option<Arc<dyn PlatformClient>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::Unlaunched,
            qr: None,
            owner_user_id: None,
            client: None,
        }
    }
}

/// Shared handle to the process-wide session.
pub type SharedSession = Arc<RwLock<Session>>;

pub(crate) fn read_session(session: &SharedSession) -> RwLockReadGuard<'_, Session> {
    session.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_session(session: &SharedSession) -> RwLockWriteGuard<'_, Session> {
    session.write().unwrap_or_else(PoisonError::into_inner)
}

/// Reply to `connect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectReply {
    pub is_connected: bool,
    pub qr_code: Option<String>,
}

/// Reply to `disconnect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReply {
    pub is_connected: bool,
    pub message: String,
}

/// Reply to `check`: a pure read of the session record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReply {
    pub state: SessionState,
    pub qr: Option<String>,
    pub user_id: Option<i64>,
}

/// Drives the session against an injected client factory.
pub struct SessionService {
    session: SharedSession,
    factory: Arc<dyn ClientFactory>,
    /// Serializes client launch and teardown. The existence check, the
    /// launch await, and the store must act as one step or two racing
    /// `connect` calls each launch a client and the loser leaks.
    lifecycle: Mutex<()>,
}

impl SessionService {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            session: Arc::new(RwLock::new(Session::default())),
            factory,
            lifecycle: Mutex::new(()),
        }
    }

    /// Shared handle to the underlying session record.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Create a new client, or observe the existing session.
    ///
    /// If a client already exists the call reports "connected" to any
    /// caller, whoever owns the session. Otherwise a client is launched,
    /// the caller becomes the owner, and the reply returns immediately
    /// with whatever pairing payload is stored (normally none yet) —
    /// callers poll `check` until the `qr` event lands. Concurrent calls
    /// are serialized; only the first of a race launches a client.
    pub async fn connect(&self, user_id: i64) -> Result<ConnectReply, SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let session = read_session(&self.session);
            if session.client.is_some() {
                return Ok(ConnectReply {
                    is_connected: true,
                    qr_code: session.qr.clone(),
                });
            }
        }

        info!(user_id, "launching new platform client");
        let shared = Arc::clone(&self.session);
        let callback: EventCallback = Arc::new(move |event| handle_client_event(event, &shared));

        let client = self
            .factory
            .launch(callback)
            .await
            .map_err(SessionError::Platform)?;

        {
            let mut session = write_session(&self.session);
            session.client = Some(Arc::clone(&client));
            session.owner_user_id = Some(user_id);
            session.state = SessionState::Opening;
        }

        // Initialization is not awaited; pairing progress arrives as events.
        tokio::spawn(async move {
            if let Err(e) = client.initialize().await {
                warn!(error = %e, "client initialize failed");
            }
        });

        let session = read_session(&self.session);
        Ok(ConnectReply {
            is_connected: false,
            qr_code: session.qr.clone(),
        })
    }

    /// Tear the session down and reset it to its initial values.
    pub async fn disconnect(&self, user_id: i64) -> DisconnectReply {
        let _lifecycle = self.lifecycle.lock().await;

        let client = {
            let session = read_session(&self.session);
            session.client.clone()
        };

        let Some(client) = client.filter(|c| c.is_live()) else {
            return DisconnectReply {
                is_connected: false,
                message: "not connected".into(),
            };
        };

        let platform_state = client.get_state().await.unwrap_or_else(|e| {
            debug!(error = %e, "state query failed before close");
            None
        });

        if platform_state == Some(SessionState::Connected) {
            if let Err(e) = client.close().await {
                warn!(error = %e, "graceful close failed");
            }
        } else {
            // Deregister listeners first so a lingering event cannot land
            // on the half-torn-down session; the close itself is
            // fire-and-forget since the session is discarded regardless.
            client.remove_all_listeners();
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let _ = client.close().await;
            });
        }

        {
            let mut session = write_session(&self.session);
            *session = Session::default();
            session.owner_user_id = Some(user_id);
        }

        info!(user_id, "session disconnected");
        DisconnectReply {
            is_connected: false,
            message: "disconnected successfully".into(),
        }
    }

    /// Pure read of the session record. Never fails, never mutates.
    pub fn check(&self) -> CheckReply {
        let session = read_session(&self.session);
        CheckReply {
            state: session.state,
            qr: session.qr.clone(),
            user_id: session.owner_user_id,
        }
    }

    /// Send a templated message to every lead in the request.
    pub async fn send_bulk(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchReport, SessionError> {
        dispatch::send_bulk(&self.session, request).await
    }

    /// Digest of recent one-on-one chats.
    pub async fn recent_chats(
        &self,
        labels: Option<Vec<String>>,
    ) -> Result<Vec<ChatSummary>, SessionError> {
        digest::recent_chats(&self.session, labels).await
    }
}

/// Apply one platform lifecycle event to the session.
pub(crate) fn handle_client_event(event: ClientEvent, session: &SharedSession) {
    match event {
        ClientEvent::LoadingScreen { percent, message } => {
            debug!(percent, status = %message, "loading screen");
            let mut session = write_session(session);
            // A late loading event must not regress an established session.
            if session.state == SessionState::Connected {
                return;
            }
            session.state = SessionState::Pairing;
        },
        ClientEvent::Authenticated => {
            info!("client authenticated");
            let mut session = write_session(session);
            if session.state == SessionState::Connected {
                return;
            }
            session.state = SessionState::Pairing;
        },
        ClientEvent::AuthFailure { message } => {
            warn!(reason = %message, "authentication failure");
            let mut session = write_session(session);
            session.state = SessionState::Conflict;
        },
        ClientEvent::Ready => {
            info!("client ready");
            let mut session = write_session(session);
            session.state = SessionState::Connected;
            session.qr = None;
        },
        ClientEvent::Qr { qr } => {
            pairing::print_to_terminal(&qr);
            info!("pairing payload acquired");
            let mut session = write_session(session);
            session.state = SessionState::UnpairedIdle;
            session.qr = Some(qr);
        },
        ClientEvent::Disconnected { reason } => {
            warn!(?reason, "client disconnected");
            let mut session = write_session(session);
            session.state = SessionState::Unlaunched;
            session.qr = None;
            session.client = None;
        },
    }
}
