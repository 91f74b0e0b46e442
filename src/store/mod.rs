// Collaborator contracts for the synchronization core.
// The document store holds four keyed collections (users, chats, messages,
// contacts) and pushes change notifications; the blob store holds message
// attachments; the notification sink reports operation outcomes to the user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::broadcast;

use crate::error::SyncResult;
use crate::models::{Chat, Contact, LastMessage, Message, MessageStatus, User};

pub mod memory;

pub use memory::{MemoryBlobStore, MemoryStore};

/// Maximum number of messages delivered per message-stream snapshot.
/// Older history is a separate paged backfill, not part of the live page.
pub const MESSAGE_PAGE_SIZE: usize = 50;

/// Result cap for display-name searches.
pub const USER_SEARCH_LIMIT: usize = 10;

/// The store collection touched by a change. Watch notifications carry only
/// this tag; subscribers re-run their query for a fresh full snapshot, they
/// never receive deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Chats,
    Messages,
    Contacts,
}

/// Per-user chat settings map selectable in `set_chat_flag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlag {
    Muted,
    Archived,
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
}

/// The abstract document store.
///
/// Implementations must provide per-document atomicity for the merge
/// operations (`apply_chat_summary`, `set_chat_flag`, `reset_unread`): the
/// read-modify-write of one chat document must not interleave with another
/// writer of the same document. No cross-document atomicity is assumed
/// anywhere in the core.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // -- users ----------------------------------------------------------

    async fn get_user(&self, user_id: &str) -> SyncResult<Option<User>>;

    async fn put_user(&self, user: User) -> SyncResult<()>;

    /// Apply a partial profile update and bump `updated_at`.
    async fn update_user(&self, user_id: &str, changes: ProfileChanges) -> SyncResult<()>;

    /// Write the presence pair (`is_online`, `last_seen`) and bump `updated_at`.
    async fn set_user_presence(
        &self,
        user_id: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> SyncResult<()>;

    /// Point lookup by the unique phone-number secondary key.
    async fn find_user_by_phone(&self, phone_number: &str) -> SyncResult<Option<User>>;

    /// Display-name prefix search, capped at `limit`. Point-in-time, not live.
    async fn search_users(&self, name_prefix: &str, limit: usize) -> SyncResult<Vec<User>>;

    // -- chats ----------------------------------------------------------

    async fn get_chat(&self, chat_id: &str) -> SyncResult<Option<Chat>>;

    async fn put_chat(&self, chat: Chat) -> SyncResult<()>;

    async fn delete_chat(&self, chat_id: &str) -> SyncResult<()>;

    /// Chats whose participant set contains `user_id`, ordered by
    /// `updated_at` descending.
    async fn chats_for_user(&self, user_id: &str) -> SyncResult<Vec<Chat>>;

    /// Merge a freshly sent message into the owning chat document:
    /// `last_message` and `updated_at` are written only if
    /// `last.timestamp` >= the currently recorded `last_message.timestamp`
    /// (last-writer-by-timestamp-wins); the unread counter of every listed
    /// recipient is incremented by one unconditionally (additive, never a
    /// read-modify-overwrite). Both effects happen in one per-document write.
    async fn apply_chat_summary(
        &self,
        chat_id: &str,
        last: LastMessage,
        recipients: &[String],
    ) -> SyncResult<()>;

    /// Set one user's entry in the chat's mute or archive map.
    async fn set_chat_flag(
        &self,
        chat_id: &str,
        user_id: &str,
        flag: ChatFlag,
        value: bool,
    ) -> SyncResult<()>;

    /// Reset one user's unread counter to zero.
    async fn reset_unread(&self, chat_id: &str, user_id: &str) -> SyncResult<()>;

    // -- messages -------------------------------------------------------

    async fn get_message(&self, message_id: &str) -> SyncResult<Option<Message>>;

    async fn put_message(&self, message: Message) -> SyncResult<()>;

    async fn delete_message(&self, message_id: &str) -> SyncResult<()>;

    /// Move a message's status forward. The write is applied only when
    /// `status` is strictly ahead of the stored value in the status order;
    /// a stale or backward write fails with `Conflict` against the status
    /// actually stored. Guarding here, not in the caller, keeps the
    /// invariant under concurrent writers that each read an older status.
    async fn advance_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> SyncResult<()>;

    /// Messages of one chat in ascending timestamp order, capped to the most
    /// recent `limit` entries (the page still reads oldest-first).
    async fn messages_for_chat(&self, chat_id: &str, limit: usize) -> SyncResult<Vec<Message>>;

    /// Every message of one chat, uncapped. Used by the deletion cascade.
    async fn all_messages_for_chat(&self, chat_id: &str) -> SyncResult<Vec<Message>>;

    // -- contacts -------------------------------------------------------

    async fn get_contact(&self, owner_id: &str, user_id: &str) -> SyncResult<Option<Contact>>;

    /// Upsert keyed by (owner, target); re-adding overwrites the snapshot.
    async fn put_contact(&self, contact: Contact) -> SyncResult<()>;

    async fn set_contact_blocked(
        &self,
        owner_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> SyncResult<()>;

    async fn contacts_for_owner(&self, owner_id: &str) -> SyncResult<Vec<Contact>>;

    // -- change feed ----------------------------------------------------

    /// Subscribe to the store's change feed. Every committed write publishes
    /// the touched collection; a lagged receiver may miss intermediate
    /// events, which is harmless because consumers re-query full snapshots.
    fn changes(&self) -> broadcast::Receiver<Collection>;
}

/// Attachment byte storage. Only the put/get/delete contract is relied on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `path`, returning an opaque reference URL.
    async fn put(&self, path: &str, bytes: &[u8]) -> SyncResult<String>;

    async fn get(&self, url: &str) -> SyncResult<Vec<u8>>;

    async fn delete(&self, url: &str) -> SyncResult<()>;
}

/// Fire-and-forget outcome reporting. Every mutating core operation reports
/// exactly one outcome here, success or failure.
pub trait NotificationSink: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notification sink that routes outcomes to the logger.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn success(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        warn!("{}", message);
    }
}
