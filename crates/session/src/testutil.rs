//! Test doubles for the platform collaborator.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
};

use zapbridge_platform::{
    Chat, ClientFactory, Contact, EventCallback, Label, MediaPayload, PlatformClient, SessionState,
};

use crate::session::{Session, SharedSession};

/// One recorded `send_message` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
    pub media: Option<MediaPayload>,
}

/// Scriptable in-memory platform client.
#[derive(Default)]
pub struct MockClient {
    pub live: AtomicBool,
    pub initialized: AtomicBool,
    pub listeners_removed: AtomicBool,
    pub closed: AtomicBool,
    platform_state: Mutex<Option<SessionState>>,
    sent: Mutex<Vec<SentMessage>>,
    fail_on_send: Mutex<Option<usize>>,
    chats: Mutex<Vec<Chat>>,
    labels: Mutex<Vec<Label>>,
    label_chats: Mutex<HashMap<String, Vec<Chat>>>,
    contacts: Mutex<HashMap<String, Contact>>,
    chat_labels: Mutex<HashMap<String, Vec<Label>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockClient {
    pub fn new() -> Self {
        let client = Self::default();
        client.live.store(true, Ordering::SeqCst);
        client
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        locked(&self.sent).clone()
    }

    /// Make the send with the given zero-based index fail.
    pub fn fail_on_send(&self, index: usize) {
        *locked(&self.fail_on_send) = Some(index);
    }

    pub fn set_platform_state(&self, state: Option<SessionState>) {
        *locked(&self.platform_state) = state;
    }

    pub fn set_chats(&self, chats: Vec<Chat>) {
        *locked(&self.chats) = chats;
    }

    pub fn set_labels(&self, labels: Vec<Label>) {
        *locked(&self.labels) = labels;
    }

    pub fn set_label_chats(&self, label_id: &str, chats: Vec<Chat>) {
        locked(&self.label_chats).insert(label_id.into(), chats);
    }

    pub fn set_contact(&self, chat_id: &str, contact: Contact) {
        locked(&self.contacts).insert(chat_id.into(), contact);
    }

    pub fn set_chat_labels(&self, chat_id: &str, labels: Vec<Label>) {
        locked(&self.chat_labels).insert(chat_id.into(), labels);
    }
}

#[async_trait]
impl PlatformClient for MockClient {
    async fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media: Option<&MediaPayload>,
    ) -> Result<()> {
        let mut sent = locked(&self.sent);
        if *locked(&self.fail_on_send) == Some(sent.len()) {
            bail!("scripted send failure");
        }
        sent.push(SentMessage {
            to: to.into(),
            text: text.into(),
            media: media.cloned(),
        });
        Ok(())
    }

    async fn get_state(&self) -> Result<Option<SessionState>> {
        Ok(*locked(&self.platform_state))
    }

    async fn get_chats(&self) -> Result<Vec<Chat>> {
        Ok(locked(&self.chats).clone())
    }

    async fn get_labels(&self) -> Result<Vec<Label>> {
        Ok(locked(&self.labels).clone())
    }

    async fn get_label_chats(&self, label_id: &str) -> Result<Vec<Chat>> {
        Ok(locked(&self.label_chats)
            .get(label_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_contact(&self, chat_id: &str) -> Result<Contact> {
        Ok(locked(&self.contacts)
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_chat_labels(&self, chat_id: &str) -> Result<Vec<Label>> {
        Ok(locked(&self.chat_labels)
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    fn remove_all_listeners(&self) {
        self.listeners_removed.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory that hands out one mock client and captures the event callback
/// so tests can replay platform lifecycle events.
pub struct MockFactory {
    pub client: Arc<MockClient>,
    callback: Mutex<Option<EventCallback>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            client: Arc::new(MockClient::new()),
            callback: Mutex::new(None),
        }
    }

    /// Fire a lifecycle event through the captured callback.
    pub fn emit(&self, event: zapbridge_platform::ClientEvent) {
        let callback = locked(&self.callback).clone();
        match callback {
            Some(callback) => callback(event),
            None => panic!("no client launched yet"),
        }
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn launch(&self, on_event: EventCallback) -> Result<Arc<dyn PlatformClient>> {
        *locked(&self.callback) = Some(on_event);
        Ok(Arc::clone(&self.client) as Arc<dyn PlatformClient>)
    }
}

/// A session already in the `Connected` state owned by `user_id`, backed by
/// a fresh mock client.
pub fn connected_session(user_id: i64) -> (SharedSession, Arc<MockClient>) {
    let client = Arc::new(MockClient::new());
    let session = Arc::new(RwLock::new(Session {
        state: SessionState::Connected,
        qr: None,
        owner_user_id: Some(user_id),
        client: Some(Arc::clone(&client) as Arc<dyn PlatformClient>),
    }));
    (session, client)
}
