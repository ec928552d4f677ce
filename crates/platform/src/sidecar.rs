//! WebSocket client for the browser-automation sidecar.
//!
//! The sidecar is a separate Node process that runs the actual WhatsApp Web
//! session. This module only moves tagged JSON frames over a local
//! WebSocket: commands out, lifecycle events and request replies in.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    futures::{SinkExt, StreamExt},
    serde::{Deserialize, Serialize},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, error, info, warn},
    uuid::Uuid,
};

use crate::{
    client::{ClientFactory, EventCallback, PlatformClient},
    types::{Chat, ClientEvent, Contact, Label, MediaPayload, SessionState},
};

/// Default sidecar WebSocket endpoint.
pub const DEFAULT_SIDECAR_URL: &str = "ws://127.0.0.1:9876";

/// Commands sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SidecarCommand {
    Initialize,
    SendText {
        to: String,
        text: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    SendMedia {
        to: String,
        text: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded attachment bytes.
        data: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetState {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetChats {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetLabels {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetLabelChats {
        #[serde(rename = "labelId")]
        label_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetContact {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetChatLabels {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Close,
}

/// Reply to a correlated request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarResponse {
    request_id: String,
    ok: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Any inbound frame: a request reply or a lifecycle event.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarFrame {
    Response(SidecarResponse),
    Event(ClientEvent),
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<SidecarResponse>>>>;

/// A platform client backed by the sidecar process.
pub struct SidecarClient {
    tx: mpsc::Sender<SidecarCommand>,
    connected: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
    pending: PendingMap,
}

impl SidecarClient {
    /// Connect to the sidecar and spawn reader/writer tasks.
    pub async fn connect(url: &str, on_event: EventCallback) -> Result<Arc<Self>> {
        info!(url = %url, "connecting to sidecar");

        let (ws_stream, _) = connect_async(url)
            .await
            .context("failed to connect to sidecar")?;

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<SidecarCommand>(32);

        let connected = Arc::new(AtomicBool::new(true));
        let listening = Arc::new(AtomicBool::new(true));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let connected_reader = Arc::clone(&connected);
        let connected_writer = Arc::clone(&connected);
        let listening_reader = Arc::clone(&listening);
        let pending_reader = Arc::clone(&pending);

        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SidecarFrame>(&text) {
                        Ok(SidecarFrame::Response(resp)) => {
                            let waiter = pending_reader
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .remove(&resp.request_id);
                            match waiter {
                                Some(sender) => {
                                    let _ = sender.send(resp);
                                },
                                None => {
                                    warn!(request_id = %resp.request_id, "reply with no waiter");
                                },
                            }
                        },
                        Ok(SidecarFrame::Event(event)) => {
                            if listening_reader.load(Ordering::SeqCst) {
                                debug!(?event, "received lifecycle event");
                                on_event(event);
                            } else {
                                debug!(?event, "listeners removed, dropping event");
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, text = %text, "failed to parse sidecar frame");
                        },
                    },
                    Ok(Message::Close(_)) => {
                        info!("sidecar connection closed");
                        break;
                    },
                    Ok(_) => {}, // Ignore ping/pong/binary
                    Err(e) => {
                        error!(error = %e, "WebSocket read error");
                        break;
                    },
                }
            }

            connected_reader.store(false, Ordering::SeqCst);
            // Dropping the waiters wakes every in-flight request with a
            // closed-channel error.
            pending_reader
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        });

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match serde_json::to_string(&cmd) {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            error!(error = %e, "failed to send command to sidecar");
                            break;
                        }
                    },
                    Err(e) => {
                        error!(error = %e, "failed to serialize command");
                    },
                }
            }

            connected_writer.store(false, Ordering::SeqCst);
        });

        Ok(Arc::new(Self {
            tx,
            connected,
            listening,
            pending,
        }))
    }

    /// Send a command and wait for its correlated reply.
    async fn request(&self, request_id: String, cmd: SidecarCommand) -> Result<serde_json::Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.clone(), reply_tx);

        if let Err(e) = self.tx.send(cmd).await {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            return Err(anyhow!(e).context("failed to send command to sidecar"));
        }

        let resp = reply_rx.await.context("sidecar connection closed")?;
        if resp.ok {
            Ok(resp.data)
        } else {
            Err(anyhow!(resp.error.unwrap_or_else(|| "sidecar error".into())))
        }
    }
}

#[async_trait]
impl PlatformClient for SidecarClient {
    async fn initialize(&self) -> Result<()> {
        self.tx
            .send(SidecarCommand::Initialize)
            .await
            .context("failed to send initialize to sidecar")
    }

    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media: Option<&MediaPayload>,
    ) -> Result<()> {
        let request_id = Uuid::new_v4().to_string();
        debug!(to, request_id, media = media.is_some(), "sending message");

        let cmd = match media {
            Some(media) => SidecarCommand::SendMedia {
                to: to.to_string(),
                text: text.to_string(),
                mime_type: media.mime_type.clone(),
                data: BASE64.encode(&media.bytes),
                request_id: request_id.clone(),
            },
            None => SidecarCommand::SendText {
                to: to.to_string(),
                text: text.to_string(),
                request_id: request_id.clone(),
            },
        };

        self.request(request_id, cmd).await?;
        Ok(())
    }

    async fn get_state(&self) -> Result<Option<SessionState>> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetState { request_id })
            .await?;
        serde_json::from_value(data).context("malformed state reply")
    }

    async fn get_chats(&self) -> Result<Vec<Chat>> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetChats { request_id })
            .await?;
        serde_json::from_value(data).context("malformed chats reply")
    }

    async fn get_labels(&self) -> Result<Vec<Label>> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetLabels { request_id })
            .await?;
        serde_json::from_value(data).context("malformed labels reply")
    }

    async fn get_label_chats(&self, label_id: &str) -> Result<Vec<Chat>> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetLabelChats {
                label_id: label_id.to_string(),
                request_id,
            })
            .await?;
        serde_json::from_value(data).context("malformed label chats reply")
    }

    async fn get_contact(&self, chat_id: &str) -> Result<Contact> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetContact {
                chat_id: chat_id.to_string(),
                request_id,
            })
            .await?;
        serde_json::from_value(data).context("malformed contact reply")
    }

    async fn get_chat_labels(&self, chat_id: &str) -> Result<Vec<Label>> {
        let request_id = Uuid::new_v4().to_string();
        let data = self
            .request(request_id.clone(), SidecarCommand::GetChatLabels {
                chat_id: chat_id.to_string(),
                request_id,
            })
            .await?;
        serde_json::from_value(data).context("malformed chat labels reply")
    }

    fn remove_all_listeners(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.tx
            .send(SidecarCommand::Close)
            .await
            .context("failed to send close to sidecar")
    }
}

/// Launches sidecar-backed clients against a fixed endpoint.
pub struct SidecarFactory {
    url: String,
}

impl SidecarFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ClientFactory for SidecarFactory {
    async fn launch(&self, on_event: EventCallback) -> Result<Arc<dyn PlatformClient>> {
        let client = SidecarClient::connect(&self.url, on_event).await?;
        Ok(client)
    }
}
