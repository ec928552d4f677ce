//! Messaging-platform collaborator contract for zapbridge.
//!
//! Defines the `PlatformClient` trait the session core drives, the
//! lifecycle events the platform emits, and a WebSocket client for the
//! browser-automation sidecar that actually speaks to WhatsApp Web.

pub mod client;
pub mod sidecar;
pub mod types;

pub use {
    client::{ClientFactory, EventCallback, PlatformClient},
    sidecar::{DEFAULT_SIDECAR_URL, SidecarClient, SidecarFactory},
    types::{Chat, ChatId, ClientEvent, Contact, Label, MediaPayload, SessionState},
};
