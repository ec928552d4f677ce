//! The client trait the session core drives.

use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

use crate::types::{Chat, ClientEvent, Contact, Label, MediaPayload, SessionState};

/// Callback invoked for every lifecycle event the platform emits.
pub type EventCallback = Arc<dyn Fn(ClientEvent) + Send + Sync>;

/// One connection to the messaging platform.
///
/// Implemented by the sidecar client in this crate and by test doubles in
/// the session core. All methods that touch the platform are fallible and
/// opaque; classification of failures is the caller's concern.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Start the underlying resource (browser launch on the sidecar side).
    async fn initialize(&self) -> Result<()>;

    /// Send a text message, optionally with a media attachment.
    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media: Option<&MediaPayload>,
    ) -> Result<()>;

    /// Ask the platform for its own view of the connection state.
    async fn get_state(&self) -> Result<Option<SessionState>>;

    async fn get_chats(&self) -> Result<Vec<Chat>>;

    async fn get_labels(&self) -> Result<Vec<Label>>;

    /// Chats carrying the given label.
    async fn get_label_chats(&self, label_id: &str) -> Result<Vec<Chat>>;

    async fn get_contact(&self, chat_id: &str) -> Result<Contact>;

    /// Labels attached to the given chat.
    async fn get_chat_labels(&self, chat_id: &str) -> Result<Vec<Label>>;

    /// Stop delivering lifecycle events to the registered callback.
    fn remove_all_listeners(&self);

    /// Whether the underlying resource is still alive.
    fn is_live(&self) -> bool;

    /// Release the underlying resource.
    async fn close(&self) -> Result<()>;
}

/// Launches new platform clients with an event callback attached.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn launch(&self, on_event: EventCallback) -> Result<Arc<dyn PlatformClient>>;
}
