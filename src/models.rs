// Data model for the palaver synchronization core.
// Documents live in four store collections: users, chats, messages, contacts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Audio,
}

impl MessageKind {
    /// Preview string used in denormalized chat summaries.
    /// Text messages show their content; everything else shows a placeholder.
    pub fn preview(&self, content: &str) -> String {
        match self {
            MessageKind::Text => content.to_string(),
            MessageKind::Image => "image message".to_string(),
            MessageKind::File => "file message".to_string(),
            MessageKind::Audio => "audio message".to_string(),
        }
    }
}

/// Delivery status of a message. The discriminants define a total order;
/// a message's status only ever moves forward through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending = 0,   // Optimistic local copy, not yet acknowledged
    Sent = 1,      // Accepted by the store
    Delivered = 2, // Reached the recipient's device
    Read = 3,      // Read by the recipient (terminal)
}

impl MessageStatus {
    /// Whether the strict transition table allows moving from `self` to `to`.
    ///
    /// sending -> sent; sent -> delivered | read; delivered -> read.
    /// `read` is terminal. The sender-side `sending -> read` reconciliation
    /// shortcut is handled separately (see `SyncClient::reconcile_local_status`),
    /// never here.
    pub fn can_transition(&self, to: MessageStatus) -> bool {
        matches!(
            (self, to),
            (MessageStatus::Sending, MessageStatus::Sent)
                | (MessageStatus::Sent, MessageStatus::Delivered)
                | (MessageStatus::Sent, MessageStatus::Read)
                | (MessageStatus::Delivered, MessageStatus::Read)
        )
    }

    /// Forward move in the status order, regardless of the strict table.
    /// Downgrades are never forward.
    pub fn is_forward(&self, to: MessageStatus) -> bool {
        to > *self
    }
}

/// A message document. Append-only apart from `status` (receivers) and
/// `edited_at`/`content` (the sender).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    /// Denormalized at send time; not re-synced if the sender renames.
    pub sender_name: String,
    pub content: String,
    pub kind: MessageKind,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub reply_to: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: HashMap<String, String>,
}

/// Denormalized copy of the most recent message, stored on the chat document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

/// A chat document. `participants` is fixed at creation; the denormalized
/// `last_message`, the per-user counters and the per-user settings maps are
/// the only fields with multiple concurrent writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub kind: ChatKind,
    pub participants: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub admins: Vec<String>,
    pub created_by: Option<String>,
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: HashMap<String, u32>,
    #[serde(default)]
    pub is_muted: HashMap<String, bool>,
    #[serde(default)]
    pub is_archived: HashMap<String, bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A directed contact relationship, keyed by (owner, target). Stores a
/// snapshot of the target's public profile taken when the contact was added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub owner_id: String,
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub status_message: Option<String>,
    pub is_blocked: bool,
    pub added_at: DateTime<Utc>,
}

/// Display name used when a private chat's peer profile cannot be resolved.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Per-user projection of a chat, optimized for list rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub kind: ChatKind,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub is_muted: bool,
    pub is_archived: bool,
    pub participants: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSummary {
    /// Project a chat for one viewing user. Group chats use their own
    /// name/avatar; private chats use the other participant's profile,
    /// falling back to a sentinel when the side-lookup misses.
    pub fn project(chat: &Chat, viewer_id: &str, peer: Option<&User>) -> ChatSummary {
        let (display_name, avatar_url) = match chat.kind {
            ChatKind::Group => (
                chat.name.clone().unwrap_or_else(|| UNKNOWN_USER.to_string()),
                chat.avatar_url.clone(),
            ),
            ChatKind::Private => match peer {
                Some(user) => (user.display_name.clone(), user.avatar_url.clone()),
                None => (UNKNOWN_USER.to_string(), None),
            },
        };

        ChatSummary {
            chat_id: chat.id.clone(),
            kind: chat.kind,
            display_name,
            avatar_url,
            last_message: chat.last_message.clone(),
            unread_count: chat.unread_count.get(viewer_id).copied().unwrap_or(0),
            is_muted: chat.is_muted.get(viewer_id).copied().unwrap_or(false),
            is_archived: chat.is_archived.get(viewer_id).copied().unwrap_or(false),
            participants: chat.participants.clone(),
            updated_at: chat.updated_at,
        }
    }

    /// The participant on the other side of a private chat, if any.
    pub fn peer_of(chat: &Chat, viewer_id: &str) -> Option<String> {
        if chat.kind != ChatKind::Private {
            return None;
        }
        chat.participants
            .iter()
            .find(|p| p.as_str() != viewer_id)
            .cloned()
    }
}

/// Attachment payload handed to the send-message operation.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
}
