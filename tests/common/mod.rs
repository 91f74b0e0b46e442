// Common test utilities for integration tests
// This module contains shared fixtures for all integration tests

#![allow(dead_code)]

// Standard library imports
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

// External crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::LevelFilter;
use tokio::sync::broadcast;

// Import the crate functionality
use palaver::models::{
    Chat, Contact, LastMessage, Message, MessageStatus, User,
};
use palaver::store::{
    BlobStore, ChatFlag, Collection, DocumentStore, MemoryBlobStore, MemoryStore,
    NotificationSink, ProfileChanges,
};
use palaver::{Session, SyncClient, SyncError, SyncResult};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

/// Notification sink that records every reported outcome so tests can assert
/// on the exactly-one-outcome contract.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(bool, String)>>,
}

impl RecordingSink {
    pub fn successes(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(ok, _)| *ok)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(ok, _)| !*ok)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn success(&self, message: &str) {
        self.events.lock().unwrap().push((true, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.events.lock().unwrap().push((false, message.to_string()));
    }
}

/// Shared in-memory backend plus collaborators; build one per test and hand
/// out a client per simulated user session.
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub sink: Arc<RecordingSink>,
}

impl TestEnv {
    pub fn new() -> Self {
        setup_logging();
        TestEnv {
            store: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    /// Client for one signed-in user. Clients built from the same env share
    /// the same store, like multiple devices against one backend.
    pub fn client(&self, user_id: &str, display_name: &str) -> SyncClient {
        SyncClient::new(
            Session::new(user_id, display_name),
            self.store.clone(),
            self.blobs.clone(),
            self.sink.clone(),
        )
    }

    /// Seed a user profile document directly into the store.
    pub async fn seed_user(&self, user_id: &str, display_name: &str, phone: Option<&str>) -> User {
        let now = Utc::now();
        let user = User {
            id: user_id.to_string(),
            display_name: display_name.to_string(),
            email: Some(format!("{}@example.com", user_id)),
            phone_number: phone.map(String::from),
            avatar_url: None,
            status_message: None,
            is_online: false,
            last_seen: now,
            created_at: now,
            updated_at: now,
        };
        self.store
            .put_user(user.clone())
            .await
            .expect("seed user");
        user
    }
}

/// Blob store wrapper that fails uploads on demand, for exercising the
/// abort-before-append path of sending attachments.
pub struct FaultyBlobStore {
    inner: Arc<MemoryBlobStore>,
    fail_puts: AtomicBool,
}

impl FaultyBlobStore {
    pub fn new(inner: Arc<MemoryBlobStore>) -> Self {
        FaultyBlobStore {
            inner,
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> SyncResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(SyncError::Transient("blob upload refused".to_string()));
        }
        self.inner.put(path, bytes).await
    }

    async fn get(&self, url: &str) -> SyncResult<Vec<u8>> {
        self.inner.get(url).await
    }

    async fn delete(&self, url: &str) -> SyncResult<()> {
        self.inner.delete(url).await
    }
}

/// Document store wrapper that fails the next N message deletions, for
/// exercising the best-effort deletion cascade. Everything else delegates.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_message_deletes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        FaultyStore {
            inner,
            failing_message_deletes: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` calls to `delete_message` fail with `Transient`.
    pub fn fail_next_message_deletes(&self, n: usize) {
        self.failing_message_deletes.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get_user(&self, user_id: &str) -> SyncResult<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn put_user(&self, user: User) -> SyncResult<()> {
        self.inner.put_user(user).await
    }

    async fn update_user(&self, user_id: &str, changes: ProfileChanges) -> SyncResult<()> {
        self.inner.update_user(user_id, changes).await
    }

    async fn set_user_presence(
        &self,
        user_id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> SyncResult<()> {
        self.inner.set_user_presence(user_id, is_online, last_seen).await
    }

    async fn find_user_by_phone(&self, phone_number: &str) -> SyncResult<Option<User>> {
        self.inner.find_user_by_phone(phone_number).await
    }

    async fn search_users(&self, name_prefix: &str, limit: usize) -> SyncResult<Vec<User>> {
        self.inner.search_users(name_prefix, limit).await
    }

    async fn get_chat(&self, chat_id: &str) -> SyncResult<Option<Chat>> {
        self.inner.get_chat(chat_id).await
    }

    async fn put_chat(&self, chat: Chat) -> SyncResult<()> {
        self.inner.put_chat(chat).await
    }

    async fn delete_chat(&self, chat_id: &str) -> SyncResult<()> {
        self.inner.delete_chat(chat_id).await
    }

    async fn chats_for_user(&self, user_id: &str) -> SyncResult<Vec<Chat>> {
        self.inner.chats_for_user(user_id).await
    }

    async fn apply_chat_summary(
        &self,
        chat_id: &str,
        last: LastMessage,
        recipients: &[String],
    ) -> SyncResult<()> {
        self.inner.apply_chat_summary(chat_id, last, recipients).await
    }

    async fn set_chat_flag(
        &self,
        chat_id: &str,
        user_id: &str,
        flag: ChatFlag,
        value: bool,
    ) -> SyncResult<()> {
        self.inner.set_chat_flag(chat_id, user_id, flag, value).await
    }

    async fn reset_unread(&self, chat_id: &str, user_id: &str) -> SyncResult<()> {
        self.inner.reset_unread(chat_id, user_id).await
    }

    async fn get_message(&self, message_id: &str) -> SyncResult<Option<Message>> {
        self.inner.get_message(message_id).await
    }

    async fn put_message(&self, message: Message) -> SyncResult<()> {
        self.inner.put_message(message).await
    }

    async fn delete_message(&self, message_id: &str) -> SyncResult<()> {
        let owed = self
            .failing_message_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if owed.is_ok() {
            return Err(SyncError::Transient("message delete refused".to_string()));
        }
        self.inner.delete_message(message_id).await
    }

    async fn advance_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> SyncResult<()> {
        self.inner.advance_message_status(message_id, status).await
    }

    async fn messages_for_chat(&self, chat_id: &str, limit: usize) -> SyncResult<Vec<Message>> {
        self.inner.messages_for_chat(chat_id, limit).await
    }

    async fn all_messages_for_chat(&self, chat_id: &str) -> SyncResult<Vec<Message>> {
        self.inner.all_messages_for_chat(chat_id).await
    }

    async fn get_contact(&self, owner_id: &str, user_id: &str) -> SyncResult<Option<Contact>> {
        self.inner.get_contact(owner_id, user_id).await
    }

    async fn put_contact(&self, contact: Contact) -> SyncResult<()> {
        self.inner.put_contact(contact).await
    }

    async fn set_contact_blocked(
        &self,
        owner_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> SyncResult<()> {
        self.inner.set_contact_blocked(owner_id, user_id, blocked).await
    }

    async fn contacts_for_owner(&self, owner_id: &str) -> SyncResult<Vec<Contact>> {
        self.inner.contacts_for_owner(owner_id).await
    }

    fn changes(&self) -> broadcast::Receiver<Collection> {
        self.inner.changes()
    }
}
