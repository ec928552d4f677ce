//! Route handlers for the bridge surface.

use std::sync::Arc;

use {
    axum::{
        Json, Router,
        extract::State,
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::info,
};

use zapbridge_session::{
    CheckReply, ChatSummary, ConnectReply, DisconnectReply, DispatchReport, DispatchRequest, Lead,
    MediaInput, SessionService,
};

use crate::error::ApiError;

/// State shared with every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SessionService>,
}

/// Build the bridge router.
pub fn router(service: Arc<SessionService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/check", post(check))
        .route("/connect", post(connect))
        .route("/send-message", post(send_message))
        .route("/disconnect", post(disconnect))
        .route("/get-recent-chats", post(get_recent_chats))
        .with_state(AppState { service })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DisconnectRequest {
    pub user_id: i64,
}

/// The attachment as it arrives on the wire, base64-encoded.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePayload {
    pub mimetype: String,
    pub buffer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageRequest {
    pub user_id: i64,
    pub message: String,
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub file: Option<FilePayload>,
}

// Unknown fields are tolerated here, matching the original surface.
#[derive(Debug, Deserialize)]
pub struct RecentChatsRequest {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

async fn health() -> Json<Value> {
    info!("health-check request");
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "stable": true,
    }))
}

async fn check(State(state): State<AppState>) -> Json<CheckReply> {
    info!("check request");
    Json(state.service.check())
}

async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectReply>, ApiError> {
    info!(user_id = req.user_id, "connect request");
    let reply = state.service.connect(req.user_id).await?;
    Ok(Json(reply))
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<DispatchReport>, ApiError> {
    info!(
        user_id = req.user_id,
        leads = req.leads.len(),
        "send-message request"
    );
    let media = req.file.map(|f| MediaInput {
        mime_type: f.mimetype,
        base64_bytes: f.buffer,
    });
    let report = state
        .service
        .send_bulk(DispatchRequest {
            requesting_user_id: req.user_id,
            template: req.message,
            leads: req.leads,
            media,
        })
        .await?;
    Ok(Json(report))
}

async fn disconnect(
    State(state): State<AppState>,
    Json(req): Json<DisconnectRequest>,
) -> Json<DisconnectReply> {
    info!(user_id = req.user_id, "disconnect request");
    Json(state.service.disconnect(req.user_id).await)
}

async fn get_recent_chats(
    State(state): State<AppState>,
    Json(req): Json<RecentChatsRequest>,
) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    info!(filtered = req.labels.is_some(), "get-recent-chats request");
    let chats = state.service.recent_chats(req.labels).await?;
    Ok(Json(chats))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        anyhow::Result,
        async_trait::async_trait,
        zapbridge_platform::{ClientFactory, EventCallback, PlatformClient},
        zapbridge_session::SessionState,
    };

    use super::*;

    struct NeverLaunches;

    #[async_trait]
    impl ClientFactory for NeverLaunches {
        async fn launch(&self, _on_event: EventCallback) -> Result<Arc<dyn PlatformClient>> {
            anyhow::bail!("unreachable sidecar")
        }
    }

    fn state() -> AppState {
        AppState {
            service: Arc::new(SessionService::new(Arc::new(NeverLaunches))),
        }
    }

    #[tokio::test]
    async fn health_reports_version_and_stability() {
        let Json(body) = health().await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["stable"], true);
    }

    #[tokio::test]
    async fn check_reads_the_initial_session() {
        let Json(reply) = check(State(state())).await;
        assert_eq!(reply.state, SessionState::Unlaunched);
        assert_eq!(reply.qr, None);
        assert_eq!(reply.user_id, None);
    }

    #[tokio::test]
    async fn connect_surfaces_launch_failures_as_bad_gateway() {
        let err = connect(State(state()), Json(ConnectRequest { user_id: 1 }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn send_message_without_an_owner_is_forbidden() {
        let app = state();
        // The ownership check runs before the connection check, so a fresh
        // session rejects any caller with 403.
        let err = send_message(
            State(app),
            Json(SendMessageRequest {
                user_id: 1,
                message: "Hello $[NOME]".into(),
                leads: Vec::new(),
                file: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn whitelisted_bodies_reject_unknown_fields() {
        let err = serde_json::from_str::<ConnectRequest>(r#"{"userId":1,"extra":true}"#);
        assert!(err.is_err());

        let ok = serde_json::from_str::<RecentChatsRequest>(r#"{"labels":null,"extra":true}"#);
        assert!(ok.is_ok(), "recent-chats body tolerates unknown fields");
    }

    #[test]
    fn leads_parse_from_the_original_wire_shape() {
        let req: SendMessageRequest = serde_json::from_str(
            r#"{
                "userId": 1,
                "message": "Hello $[NOME]",
                "leads": [{"id": 1, "name": "John Doe", "phone": "123456789"}],
                "file": {"mimetype": "image/png", "buffer": "aGk="}
            }"#,
        )
        .unwrap();
        assert_eq!(req.leads[0].name, "John Doe");
        assert_eq!(req.leads[0].phone, "123456789");
        assert_eq!(req.file.unwrap().mimetype, "image/png");
    }

    #[tokio::test]
    async fn disconnect_on_fresh_session_reports_not_connected() {
        let Json(reply) = disconnect(State(state()), Json(DisconnectRequest { user_id: 1 })).await;
        assert!(!reply.is_connected);
        assert_eq!(reply.message, "not connected");
    }
}
