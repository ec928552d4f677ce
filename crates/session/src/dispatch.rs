//! Rate-limited bulk dispatch of templated messages.

use std::time::Duration;

use {
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    rand::Rng,
    serde::{Deserialize, Serialize},
    tracing::{debug, info},
};

use zapbridge_platform::{MediaPayload, SessionState};

use crate::{
    error::SessionError,
    session::{SharedSession, read_session},
};

/// Country code prefixed to every destination number.
pub const COUNTRY_CODE: &str = "55";
/// Host suffix of platform message addresses.
pub const PLATFORM_DOMAIN: &str = "c.us";
/// Template token replaced with the lead's formatted first name.
pub const NAME_TOKEN: &str = "$[NOME]";

/// Pacing window between sends, in milliseconds. Keeps the batch under the
/// platform's automated-messaging abuse threshold.
const PACING_FLOOR_MS: u64 = 700;
const PACING_CEIL_MS: u64 = 1400;

/// A message recipient supplied with a dispatch request.
#[derive(Debug, Clone, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// An attachment as supplied on the wire, still base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInput {
    pub mime_type: String,
    pub base64_bytes: String,
}

/// One bulk dispatch invocation.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub requesting_user_id: i64,
    pub template: String,
    pub leads: Vec<Lead>,
    pub media: Option<MediaInput>,
}

/// Aggregate batch result. There is no per-lead detail.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub succeeded: bool,
}

/// Send the template to every lead, in list order.
///
/// Leads without a usable phone number are skipped with a log line. A
/// platform-level send failure is not caught: it aborts the batch and the
/// remaining leads stay unprocessed. The loop is deliberately sequential —
/// the pacing sleep after each send is the rate limit.
pub async fn send_bulk(
    session: &SharedSession,
    request: DispatchRequest,
) -> Result<DispatchReport, SessionError> {
    let (client, owner, state) = {
        let session = read_session(session);
        (session.client.clone(), session.owner_user_id, session.state)
    };

    if owner != Some(request.requesting_user_id) {
        return Err(SessionError::Forbidden);
    }

    let client = match (client, state) {
        (Some(client), SessionState::Connected) => client,
        (client, state) => {
            debug!(has_client = client.is_some(), ?state, "dispatch refused");
            return Err(SessionError::NotConnected);
        },
    };

    // Decoded once; the same attachment goes to everyone in the batch.
    let media = decode_media(request.media.as_ref())?;

    for lead in &request.leads {
        let phone = lead.phone.trim();
        if phone.is_empty() {
            info!(lead = %lead.name, "no phone provided, skipping");
            continue;
        }

        let text = substitute_name(&request.template, &lead.name);

        if phone.len() < 8 {
            info!(phone, "invalid phone number, skipping");
            continue;
        }

        let address = format!("{COUNTRY_CODE}{phone}@{PLATFORM_DOMAIN}");

        match &media {
            // With an attachment the template goes out unsubstituted.
            Some(media) => client
                .send_message(&address, &request.template, Some(media))
                .await,
            None => client.send_message(&address, &text, None).await,
        }
        .map_err(SessionError::Platform)?;

        info!(phone, "message dispatched");

        let pause = rand::rng().random_range(PACING_FLOOR_MS..PACING_CEIL_MS);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    Ok(DispatchReport { succeeded: true })
}

fn decode_media(input: Option<&MediaInput>) -> Result<Option<MediaPayload>, SessionError> {
    let Some(input) = input else {
        return Ok(None);
    };
    let bytes = BASE64
        .decode(input.base64_bytes.as_bytes())
        .map_err(|e| SessionError::InvalidMedia(e.to_string()))?;
    Ok(Some(MediaPayload {
        mime_type: input.mime_type.clone(),
        bytes,
    }))
}

/// Substitute the lead's formatted first name into the first occurrence of
/// the name token. Later occurrences stay literal.
pub(crate) fn substitute_name(template: &str, lead_name: &str) -> String {
    template.replacen(NAME_TOKEN, &format_first_name(lead_name), 1)
}

/// First token of the name, lower-cased, with the leading character
/// upper-cased again ("JOHN DOE" becomes "John").
fn format_first_name(name: &str) -> String {
    let first = name.split(' ').next().unwrap_or_default().to_lowercase();
    let mut chars = first.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
