// Chat lifecycle: creation, best-effort deletion cascade, per-user
// archive/mute flags, and the caller-invoked unread reset.

use std::collections::HashSet;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::{Chat, ChatKind};
use crate::store::ChatFlag;
use crate::sync::SyncClient;

impl SyncClient {
    /// Create a chat between the session user and `others`. Private chats
    /// must resolve to exactly two distinct participants; group chats get a
    /// default name and the creator as sole admin. Returns the new chat id.
    pub async fn create_chat(
        &self,
        others: &[String],
        kind: ChatKind,
        name: Option<String>,
        description: Option<String>,
    ) -> SyncResult<String> {
        let creator = self.session().user_id.clone();

        let mut participants = vec![creator.clone()];
        let mut seen: HashSet<String> = participants.iter().cloned().collect();
        for other in others {
            if other.trim().is_empty() {
                self.notifier().error("Failed to create chat");
                return Err(SyncError::ValidationFailed(
                    "participant id is empty".to_string(),
                ));
            }
            if seen.insert(other.clone()) {
                participants.push(other.clone());
            }
        }

        if participants.len() < 2 {
            self.notifier().error("Failed to create chat");
            return Err(SyncError::ValidationFailed(
                "a chat needs at least two participants".to_string(),
            ));
        }
        if kind == ChatKind::Private && participants.len() != 2 {
            self.notifier().error("Failed to create chat");
            return Err(SyncError::ValidationFailed(format!(
                "a private chat has exactly 2 participants, got {}",
                participants.len()
            )));
        }

        let now = Utc::now();
        let chat_id = Uuid::new_v4().to_string();
        let chat = Chat {
            id: chat_id.clone(),
            kind,
            participants,
            name: match kind {
                ChatKind::Group => Some(name.unwrap_or_else(|| "New Group".to_string())),
                ChatKind::Private => None,
            },
            description: match kind {
                ChatKind::Group => Some(description.unwrap_or_default()),
                ChatKind::Private => None,
            },
            avatar_url: None,
            admins: match kind {
                ChatKind::Group => vec![creator.clone()],
                ChatKind::Private => Vec::new(),
            },
            created_by: Some(creator),
            last_message: None,
            unread_count: Default::default(),
            is_muted: Default::default(),
            is_archived: Default::default(),
            created_at: now,
            updated_at: now,
        };

        match self.store().put_chat(chat).await {
            Ok(()) => {
                info!("created {:?} chat {}", kind, chat_id);
                self.notifier().success(match kind {
                    ChatKind::Group => "Group created",
                    ChatKind::Private => "Chat created",
                });
                Ok(chat_id)
            }
            Err(e) => {
                self.notifier().error("Failed to create chat");
                Err(e)
            }
        }
    }

    /// Delete a chat and everything it owns. Best-effort cascade, not a
    /// transaction: every message (and its attachment blob) is attempted,
    /// failures are counted and the remaining deletions still run, and the
    /// chat document itself is deleted last. A partial failure is reported
    /// as one `Transient` error after all deletions have been attempted.
    pub async fn delete_chat(&self, chat_id: &str) -> SyncResult<()> {
        // Confirm the chat exists so deleting a bogus id is a NotFound
        // rather than a silent no-op.
        self.chat(chat_id).await.map_err(|e| {
            self.notifier().error("Failed to delete chat");
            e
        })?;

        let messages = match self.store().all_messages_for_chat(chat_id).await {
            Ok(messages) => messages,
            Err(e) => {
                self.notifier().error("Failed to delete chat");
                return Err(e);
            }
        };

        let total = messages.len();
        let mut failed = 0usize;
        for message in &messages {
            if let Some(url) = &message.file_url {
                if let Err(e) = self.blobs().delete(url).await {
                    warn!("best-effort blob cleanup failed for {}: {}", url, e);
                }
            }
            if let Err(e) = self.store().delete_message(&message.id).await {
                warn!("failed to delete message {}: {}", message.id, e);
                failed += 1;
            }
        }

        // The chat document goes last, and only after every message
        // deletion has been attempted.
        let chat_result = self.store().delete_chat(chat_id).await;

        match (failed, chat_result) {
            (0, Ok(())) => {
                info!("deleted chat {} and its {} messages", chat_id, total);
                self.notifier().success("Chat deleted");
                Ok(())
            }
            (_, Err(e)) => {
                self.notifier().error("Failed to delete chat");
                Err(e)
            }
            (failed, Ok(())) => {
                self.notifier().error("Chat deleted with leftover messages");
                Err(SyncError::Transient(format!(
                    "{} of {} message deletions failed for chat {}",
                    failed, total, chat_id
                )))
            }
        }
    }

    /// Archive or unarchive the chat for the session user only.
    pub async fn set_archived(&self, chat_id: &str, archived: bool) -> SyncResult<()> {
        self.set_flag(chat_id, ChatFlag::Archived, archived).await
    }

    /// Mute or unmute the chat for the session user only.
    pub async fn set_muted(&self, chat_id: &str, muted: bool) -> SyncResult<()> {
        self.set_flag(chat_id, ChatFlag::Muted, muted).await
    }

    async fn set_flag(&self, chat_id: &str, flag: ChatFlag, value: bool) -> SyncResult<()> {
        let user_id = self.session().user_id.clone();
        match self.store().set_chat_flag(chat_id, &user_id, flag, value).await {
            Ok(()) => {
                self.notifier().success(match (flag, value) {
                    (ChatFlag::Archived, true) => "Chat archived",
                    (ChatFlag::Archived, false) => "Chat unarchived",
                    (ChatFlag::Muted, true) => "Chat muted",
                    (ChatFlag::Muted, false) => "Chat unmuted",
                });
                Ok(())
            }
            Err(e) => {
                self.notifier().error("Failed to update chat settings");
                Err(e)
            }
        }
    }

    /// Reset the session user's unread counter for a chat.
    ///
    /// Clearing on chat-open is a caller policy; nothing in the core invokes
    /// this automatically, and marking messages read does not touch it.
    pub async fn clear_unread(&self, chat_id: &str) -> SyncResult<()> {
        let user_id = self.session().user_id.clone();
        match self.store().reset_unread(chat_id, &user_id).await {
            Ok(()) => {
                self.notifier().success("Chat marked as read");
                Ok(())
            }
            Err(e) => {
                self.notifier().error("Failed to clear unread count");
                Err(e)
            }
        }
    }
}
