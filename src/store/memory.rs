// In-memory document and blob store.
// Non-persistent backend used by the integration tests and ephemeral
// deployments. Each collection sits behind its own RwLock and every trait
// method takes that lock exactly once, which gives the per-document write
// atomicity the merge operations require.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::broadcast;

use crate::error::{SyncError, SyncResult};
use crate::models::{Chat, Contact, LastMessage, Message, MessageStatus, User};
use crate::store::{BlobStore, ChatFlag, Collection, DocumentStore, ProfileChanges};

const CHANGE_FEED_CAPACITY: usize = 64;

pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    chats: RwLock<HashMap<String, Chat>>,
    messages: RwLock<HashMap<String, Message>>,
    contacts: RwLock<HashMap<(String, String), Contact>>,
    changes_tx: broadcast::Sender<Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        MemoryStore {
            users: RwLock::new(HashMap::new()),
            chats: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            contacts: RwLock::new(HashMap::new()),
            changes_tx,
        }
    }

    /// Publish a change event. A send error only means nobody is watching.
    fn publish(&self, collection: Collection) {
        if self.changes_tx.send(collection).is_err() {
            debug!("change event with no subscribers: {:?}", collection);
        }
    }

    fn poisoned(what: &str) -> SyncError {
        SyncError::Transient(format!("{} lock poisoned", what))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> SyncResult<Option<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned("users"))?;
        Ok(users.get(user_id).cloned())
    }

    async fn put_user(&self, user: User) -> SyncResult<()> {
        {
            let mut users = self.users.write().map_err(|_| Self::poisoned("users"))?;
            users.insert(user.id.clone(), user);
        }
        self.publish(Collection::Users);
        Ok(())
    }

    async fn update_user(&self, user_id: &str, changes: ProfileChanges) -> SyncResult<()> {
        {
            let mut users = self.users.write().map_err(|_| Self::poisoned("users"))?;
            let user = users
                .get_mut(user_id)
                .ok_or_else(|| SyncError::NotFound(format!("user {}", user_id)))?;
            if let Some(name) = changes.display_name {
                user.display_name = name;
            }
            if let Some(email) = changes.email {
                user.email = Some(email);
            }
            if let Some(phone) = changes.phone_number {
                user.phone_number = Some(phone);
            }
            if let Some(avatar) = changes.avatar_url {
                user.avatar_url = Some(avatar);
            }
            if let Some(status) = changes.status_message {
                user.status_message = Some(status);
            }
            user.updated_at = Utc::now();
        }
        self.publish(Collection::Users);
        Ok(())
    }

    async fn set_user_presence(
        &self,
        user_id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> SyncResult<()> {
        {
            let mut users = self.users.write().map_err(|_| Self::poisoned("users"))?;
            let user = users
                .get_mut(user_id)
                .ok_or_else(|| SyncError::NotFound(format!("user {}", user_id)))?;
            user.is_online = is_online;
            user.last_seen = last_seen;
            user.updated_at = last_seen;
        }
        self.publish(Collection::Users);
        Ok(())
    }

    async fn find_user_by_phone(&self, phone_number: &str) -> SyncResult<Option<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned("users"))?;
        Ok(users
            .values()
            .find(|u| u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn search_users(&self, name_prefix: &str, limit: usize) -> SyncResult<Vec<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned("users"))?;
        let mut hits: Vec<User> = users
            .values()
            .filter(|u| u.display_name.starts_with(name_prefix))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_chat(&self, chat_id: &str) -> SyncResult<Option<Chat>> {
        let chats = self.chats.read().map_err(|_| Self::poisoned("chats"))?;
        Ok(chats.get(chat_id).cloned())
    }

    async fn put_chat(&self, chat: Chat) -> SyncResult<()> {
        {
            let mut chats = self.chats.write().map_err(|_| Self::poisoned("chats"))?;
            chats.insert(chat.id.clone(), chat);
        }
        self.publish(Collection::Chats);
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> SyncResult<()> {
        let removed = {
            let mut chats = self.chats.write().map_err(|_| Self::poisoned("chats"))?;
            chats.remove(chat_id).is_some()
        };
        if removed {
            self.publish(Collection::Chats);
        }
        Ok(())
    }

    async fn chats_for_user(&self, user_id: &str) -> SyncResult<Vec<Chat>> {
        let chats = self.chats.read().map_err(|_| Self::poisoned("chats"))?;
        let mut hits: Vec<Chat> = chats
            .values()
            .filter(|c| c.participants.iter().any(|p| p == user_id))
            .cloned()
            .collect();
        // Newest activity first; ids break timestamp ties deterministically.
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn apply_chat_summary(
        &self,
        chat_id: &str,
        last: LastMessage,
        recipients: &[String],
    ) -> SyncResult<()> {
        {
            let mut chats = self.chats.write().map_err(|_| Self::poisoned("chats"))?;
            let chat = chats
                .get_mut(chat_id)
                .ok_or_else(|| SyncError::NotFound(format!("chat {}", chat_id)))?;

            // Last-writer-by-timestamp-wins: a stale summary never overwrites
            // a newer one, regardless of arrival order.
            let newer = chat
                .last_message
                .as_ref()
                .map_or(true, |current| last.timestamp >= current.timestamp);
            if newer {
                chat.updated_at = last.timestamp;
                chat.last_message = Some(last);
            }

            // Unread increments are additive even when the summary was stale.
            for user_id in recipients {
                *chat.unread_count.entry(user_id.clone()).or_insert(0) += 1;
            }
        }
        self.publish(Collection::Chats);
        Ok(())
    }

    async fn set_chat_flag(
        &self,
        chat_id: &str,
        user_id: &str,
        flag: ChatFlag,
        value: bool,
    ) -> SyncResult<()> {
        {
            let mut chats = self.chats.write().map_err(|_| Self::poisoned("chats"))?;
            let chat = chats
                .get_mut(chat_id)
                .ok_or_else(|| SyncError::NotFound(format!("chat {}", chat_id)))?;
            let map = match flag {
                ChatFlag::Muted => &mut chat.is_muted,
                ChatFlag::Archived => &mut chat.is_archived,
            };
            map.insert(user_id.to_string(), value);
            chat.updated_at = Utc::now();
        }
        self.publish(Collection::Chats);
        Ok(())
    }

    async fn reset_unread(&self, chat_id: &str, user_id: &str) -> SyncResult<()> {
        {
            let mut chats = self.chats.write().map_err(|_| Self::poisoned("chats"))?;
            let chat = chats
                .get_mut(chat_id)
                .ok_or_else(|| SyncError::NotFound(format!("chat {}", chat_id)))?;
            chat.unread_count.insert(user_id.to_string(), 0);
        }
        self.publish(Collection::Chats);
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> SyncResult<Option<Message>> {
        let messages = self.messages.read().map_err(|_| Self::poisoned("messages"))?;
        Ok(messages.get(message_id).cloned())
    }

    async fn put_message(&self, message: Message) -> SyncResult<()> {
        {
            let mut messages = self.messages.write().map_err(|_| Self::poisoned("messages"))?;
            messages.insert(message.id.clone(), message);
        }
        self.publish(Collection::Messages);
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> SyncResult<()> {
        let removed = {
            let mut messages = self.messages.write().map_err(|_| Self::poisoned("messages"))?;
            messages.remove(message_id).is_some()
        };
        if removed {
            self.publish(Collection::Messages);
        }
        Ok(())
    }

    async fn advance_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> SyncResult<()> {
        {
            let mut messages = self.messages.write().map_err(|_| Self::poisoned("messages"))?;
            let message = messages
                .get_mut(message_id)
                .ok_or_else(|| SyncError::NotFound(format!("message {}", message_id)))?;
            // Checked under the same lock as the write, so a racing writer
            // that read an older status cannot move the message backward.
            if !message.status.is_forward(status) {
                return Err(SyncError::Conflict {
                    from: message.status,
                    to: status,
                });
            }
            message.status = status;
        }
        self.publish(Collection::Messages);
        Ok(())
    }

    async fn messages_for_chat(&self, chat_id: &str, limit: usize) -> SyncResult<Vec<Message>> {
        let mut hits = self.all_messages_for_chat(chat_id).await?;
        // Keep the most recent `limit`, still delivered oldest-first.
        if hits.len() > limit {
            hits.drain(..hits.len() - limit);
        }
        Ok(hits)
    }

    async fn all_messages_for_chat(&self, chat_id: &str) -> SyncResult<Vec<Message>> {
        let messages = self.messages.read().map_err(|_| Self::poisoned("messages"))?;
        let mut hits: Vec<Message> = messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn get_contact(&self, owner_id: &str, user_id: &str) -> SyncResult<Option<Contact>> {
        let contacts = self.contacts.read().map_err(|_| Self::poisoned("contacts"))?;
        Ok(contacts
            .get(&(owner_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn put_contact(&self, contact: Contact) -> SyncResult<()> {
        {
            let mut contacts = self.contacts.write().map_err(|_| Self::poisoned("contacts"))?;
            contacts.insert(
                (contact.owner_id.clone(), contact.user_id.clone()),
                contact,
            );
        }
        self.publish(Collection::Contacts);
        Ok(())
    }

    async fn set_contact_blocked(
        &self,
        owner_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> SyncResult<()> {
        {
            let mut contacts = self.contacts.write().map_err(|_| Self::poisoned("contacts"))?;
            let contact = contacts
                .get_mut(&(owner_id.to_string(), user_id.to_string()))
                .ok_or_else(|| {
                    SyncError::NotFound(format!("contact {} -> {}", owner_id, user_id))
                })?;
            contact.is_blocked = blocked;
        }
        self.publish(Collection::Contacts);
        Ok(())
    }

    async fn contacts_for_owner(&self, owner_id: &str) -> SyncResult<Vec<Contact>> {
        let contacts = self.contacts.read().map_err(|_| Self::poisoned("contacts"))?;
        let mut hits: Vec<Contact> = contacts
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.user_id.cmp(&b.user_id)));
        Ok(hits)
    }

    fn changes(&self) -> broadcast::Receiver<Collection> {
        self.changes_tx.subscribe()
    }
}

/// In-memory attachment storage with `mem://` reference URLs.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        MemoryBlobStore {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> SyncResult<String> {
        let url = format!("mem://{}", path);
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| SyncError::Transient("blobs lock poisoned".to_string()))?;
        blobs.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    async fn get(&self, url: &str) -> SyncResult<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| SyncError::Transient("blobs lock poisoned".to_string()))?;
        blobs
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("blob {}", url)))
    }

    async fn delete(&self, url: &str) -> SyncResult<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| SyncError::Transient("blobs lock poisoned".to_string()))?;
        blobs
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound(format!("blob {}", url)))
    }
}
