//! Digest of recent one-on-one chats.

use {chrono::Utc, serde::Serialize, tracing::debug};

use zapbridge_platform::{Chat, Label, SessionState};

use crate::{
    error::SessionError,
    session::{SharedSession, read_session},
};

/// How far back a chat's newest message may be to count as recent.
/// The boundary is inclusive: a message exactly this old is retained.
pub const RECENT_WINDOW_SECS: i64 = 7 * 24 * 3600;

/// Only the first chats in platform-returned order are considered.
pub const CHAT_SCAN_LIMIT: usize = 100;

const UNKNOWN_CONTACT: &str = "Unknown";

/// A surviving chat resolved to a display name and phone number.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    #[serde(rename = "name")]
    pub display_name: String,
    pub phone: String,
    pub labels: Vec<Label>,
}

/// List recent one-on-one chats, optionally through the platform's labels.
///
/// When `labels` is supplied the platform's labels are enumerated and every
/// label's chats are flattened; otherwise all chats are fetched. Group,
/// archived, and stale chats are dropped, keeping platform order. Never
/// mutates the session.
pub async fn recent_chats(
    session: &SharedSession,
    labels: Option<Vec<String>>,
) -> Result<Vec<ChatSummary>, SessionError> {
    let (client, state) = {
        let session = read_session(session);
        (session.client.clone(), session.state)
    };

    let client = match (client, state) {
        (Some(client), SessionState::Connected) => client,
        (client, state) => {
            debug!(has_client = client.is_some(), ?state, "digest refused");
            return Err(SessionError::NotConnected);
        },
    };

    let filtering = labels.is_some();
    let chats: Vec<Chat> = if filtering {
        let platform_labels = client.get_labels().await.map_err(SessionError::Platform)?;
        let mut chats = Vec::new();
        for label in &platform_labels {
            chats.extend(
                client
                    .get_label_chats(&label.id)
                    .await
                    .map_err(SessionError::Platform)?,
            );
        }
        chats
    } else {
        client.get_chats().await.map_err(SessionError::Platform)?
    };

    let now = Utc::now().timestamp();
    let mut summaries = Vec::new();

    for chat in chats.iter().take(CHAT_SCAN_LIMIT) {
        if chat.is_group || chat.archived {
            continue;
        }
        let Some(last_message_at) = chat.last_message_at else {
            continue;
        };
        if !is_recent(last_message_at, now) {
            continue;
        }

        let contact = client
            .get_contact(&chat.id.user)
            .await
            .map_err(SessionError::Platform)?;
        let labels = if filtering {
            client
                .get_chat_labels(&chat.id.user)
                .await
                .map_err(SessionError::Platform)?
        } else {
            Vec::new()
        };

        let display_name = contact
            .name
            .or(contact.pushname)
            .unwrap_or_else(|| UNKNOWN_CONTACT.to_string());

        summaries.push(ChatSummary {
            display_name,
            phone: chat.id.user.clone(),
            labels,
        });
    }

    Ok(summaries)
}

pub(crate) fn is_recent(last_message_at: i64, now: i64) -> bool {
    now - last_message_at <= RECENT_WINDOW_SECS
}
