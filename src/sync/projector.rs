// Chat summary projector: the send-message algorithm.
// Three sequential effects with no cross-step atomicity: attachment upload,
// message append, chat summary merge. The merge is last-writer-by-timestamp
// for `last_message` and purely additive for unread counters, so concurrent
// sends settle correctly regardless of completion order.

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::{Attachment, LastMessage, Message, MessageKind, MessageStatus};
use crate::sync::SyncClient;

impl SyncClient {
    /// Send a message to a chat the session user participates in.
    ///
    /// Steps, in order:
    /// 1. attachment upload (failure aborts with no message created),
    /// 2. message append with status `Sent`,
    /// 3. owning chat's `last_message`/`updated_at` merge plus an unread
    ///    increment for every participant except the sender.
    ///
    /// A reader may observe the message before the summary or vice versa;
    /// the store-side merge rules keep the summary convergent. A transient
    /// failure after step 2 leaves the message in place without a summary
    /// update — re-sending the same logical intent is safe.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
        attachment: Option<Attachment>,
    ) -> SyncResult<String> {
        // Fail fast: no write is attempted for invalid input.
        if content.trim().is_empty() {
            self.notifier().error("Cannot send an empty message");
            return Err(SyncError::ValidationFailed(
                "message content is empty".to_string(),
            ));
        }

        let chat = match self.chat(chat_id).await {
            Ok(chat) => chat,
            Err(e) => {
                self.notifier().error("Failed to send message");
                return Err(e);
            }
        };

        let message_id = Uuid::new_v4().to_string();
        let sender_id = self.session().user_id.clone();
        let sender_name = self.session().display_name.clone();

        // Step 1: upload the attachment first so a failure here leaves no
        // partial message with a dangling reference.
        let mut file_url = None;
        let mut file_name = None;
        let mut file_size = None;
        if let Some(att) = attachment {
            if kind != MessageKind::Text {
                let path = format!("messages/{}/{}_{}", chat_id, message_id, att.file_name);
                match self.blobs().put(&path, &att.bytes).await {
                    Ok(url) => {
                        debug!("uploaded attachment for {} to {}", message_id, url);
                        file_size = Some(att.bytes.len() as u64);
                        file_name = Some(att.file_name);
                        file_url = Some(url);
                    }
                    Err(e) => {
                        self.notifier().error("Failed to upload attachment");
                        return Err(e);
                    }
                }
            }
        }

        let timestamp = Utc::now();
        let message = Message {
            id: message_id.clone(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.clone(),
            sender_name: sender_name.clone(),
            content: content.to_string(),
            kind,
            file_url,
            file_name,
            file_size,
            timestamp,
            status: MessageStatus::Sent,
            reply_to: None,
            edited_at: None,
            reactions: Default::default(),
        };

        // Step 2: append to the message log.
        if let Err(e) = self.store().put_message(message).await {
            self.notifier().error("Failed to send message");
            return Err(e);
        }

        // Step 3: merge the denormalized summary into the chat document.
        // Recipients are every participant except the sender; their unread
        // counters are incremented atomically store-side so concurrent
        // senders never lose updates.
        let recipients: Vec<String> = chat
            .participants
            .iter()
            .filter(|p| *p != &sender_id)
            .cloned()
            .collect();
        let last = LastMessage {
            content: kind.preview(content),
            sender_id,
            sender_name,
            timestamp,
            kind,
        };
        if let Err(e) = self
            .store()
            .apply_chat_summary(chat_id, last, &recipients)
            .await
        {
            // The message exists but the summary lags; callers treat this
            // as resumable, per the consistency contract.
            self.notifier().error("Failed to update chat summary");
            return Err(e);
        }

        info!("sent message {} to chat {}", message_id, chat_id);
        self.notifier().success("Message sent");
        Ok(message_id)
    }
}
