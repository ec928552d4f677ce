//! Error taxonomy for session operations.

use thiserror::Error;

/// Failure kinds surfaced by the session core.
///
/// `Forbidden` and `NotConnected` are raised before any side effect and
/// abort the whole operation. `Platform` is an opaque failure from the
/// underlying client; when it hits mid-batch the remaining leads are left
/// unprocessed. Skippable anomalies (missing or short phone numbers) are
/// logged, never surfaced here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("requesting user does not own the session")]
    Forbidden,

    #[error("no connection")]
    NotConnected,

    #[error("invalid media payload: {0}")]
    InvalidMedia(String),

    #[error("platform error: {0}")]
    Platform(anyhow::Error),
}
