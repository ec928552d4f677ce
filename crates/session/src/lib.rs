//! Session core for zapbridge.
//!
//! Owns the single in-memory record of one WhatsApp Web connection and the
//! three operations driven against it: the pairing/lifecycle state machine,
//! the rate-limited bulk dispatcher, and the recent-chat digest.

pub mod digest;
pub mod dispatch;
pub mod error;
pub mod pairing;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use {
    digest::{ChatSummary, recent_chats},
    dispatch::{DispatchReport, DispatchRequest, Lead, MediaInput, send_bulk},
    error::SessionError,
    session::{CheckReply, ConnectReply, DisconnectReply, Session, SessionService, SharedSession},
    zapbridge_platform::SessionState,
};
