//! Wire types shared between the session core and the platform client.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the platform connection.
///
/// The first six variants are driven locally by [`ClientEvent`]s; the rest
/// are terminal states the platform itself can report through `get_state`
/// and are stored as-is when seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Unlaunched,
    Opening,
    Pairing,
    UnpairedIdle,
    Connected,
    Conflict,
    Timeout,
    TosBlock,
    SmbTosBlock,
    Proxyblock,
    DeprecatedVersion,
    Unpaired,
}

/// Lifecycle events emitted by the platform client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    LoadingScreen { percent: u8, message: String },
    Authenticated,
    AuthFailure { message: String },
    Ready,
    Qr {
        qr: String,
    },
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Identifier of a chat on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatId {
    /// The user part of the identifier (the bare phone number for DMs).
    pub user: String,
}

/// A chat as enumerated by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub archived: bool,
    /// Epoch seconds of the newest message in the chat, if any.
    #[serde(default)]
    pub last_message_at: Option<i64>,
}

/// Contact details resolved for a chat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Name the session owner saved for the contact.
    #[serde(default)]
    pub name: Option<String>,
    /// Name the contact set for themselves.
    #[serde(default)]
    pub pushname: Option<String>,
}

/// A platform-side tag used to group chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// A decoded media attachment, sent as-is to every recipient of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
