// Message stream: live ordered message page per chat, monotonic status
// transitions, and single-message deletion.

use log::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{Message, MessageStatus};
use crate::store::{Collection, MESSAGE_PAGE_SIZE};
use crate::sync::subscription::{subscribe_query, Subscription};
use crate::sync::SyncClient;

impl SyncClient {
    /// Live view of one chat's messages: ascending timestamp order, capped
    /// to the most recent `MESSAGE_PAGE_SIZE` entries. Older history is a
    /// separate backfill concern, not part of the live page.
    pub fn subscribe_messages(&self, chat_id: &str) -> Subscription<Message> {
        let store = self.store().clone();
        let chat_id = chat_id.to_string();

        subscribe_query(store.changes(), vec![Collection::Messages], move || {
            let store = store.clone();
            let chat_id = chat_id.clone();
            async move { store.messages_for_chat(&chat_id, MESSAGE_PAGE_SIZE).await }
        })
    }

    /// One-shot read of the current message page.
    pub async fn list_messages(&self, chat_id: &str) -> SyncResult<Vec<Message>> {
        self.store()
            .messages_for_chat(chat_id, MESSAGE_PAGE_SIZE)
            .await
    }

    /// Record that a message reached this device.
    pub async fn mark_delivered(&self, message_id: &str) -> SyncResult<()> {
        self.transition(message_id, MessageStatus::Delivered).await
    }

    /// Record that the session user read a message.
    pub async fn mark_read(&self, message_id: &str) -> SyncResult<()> {
        self.transition(message_id, MessageStatus::Read).await
    }

    /// Apply a status transition from the strict table. Illegal moves are
    /// rejected with `Conflict` before any write reaches the store; the
    /// store's forward-only guard then closes the read-to-write window, so
    /// a racing writer that already advanced the status past `to` turns
    /// this into a `Conflict` as well instead of a backward overwrite.
    async fn transition(&self, message_id: &str, to: MessageStatus) -> SyncResult<()> {
        let message = self.message(message_id).await?;
        if !message.status.can_transition(to) {
            debug!(
                "rejecting status transition for {}: {:?} -> {:?}",
                message_id, message.status, to
            );
            self.notifier().error("Failed to update message status");
            return Err(SyncError::Conflict {
                from: message.status,
                to,
            });
        }

        match self.store().advance_message_status(message_id, to).await {
            Ok(()) => {
                info!("message {} status {:?} -> {:?}", message_id, message.status, to);
                self.notifier().success("Message status updated");
                Ok(())
            }
            Err(e) => {
                self.notifier().error("Failed to update message status");
                Err(e)
            }
        }
    }

    /// Reconcile the sender's own optimistic local copy with server state.
    /// Any strictly forward move is accepted (this is the only path that
    /// permits `Sending -> Read` directly); downgrades are still rejected
    /// by the store's forward-only guard.
    ///
    /// Driven by the sync machinery catching a device up, not by a user
    /// action, so unlike the `mark_*` operations it reports through the
    /// logger only and never raises a notification.
    pub async fn reconcile_local_status(
        &self,
        message_id: &str,
        to: MessageStatus,
    ) -> SyncResult<()> {
        self.store()
            .advance_message_status(message_id, to)
            .await
            .map(|()| debug!("reconciled message {} to {:?}", message_id, to))
    }

    /// Delete one message. Its attachment blob, if any, is removed first on
    /// a best-effort basis: a failed blob delete is logged and the document
    /// deletion proceeds anyway.
    pub async fn delete_message(&self, message_id: &str) -> SyncResult<()> {
        let message = self.message(message_id).await?;

        if let Some(url) = &message.file_url {
            if let Err(e) = self.blobs().delete(url).await {
                warn!("best-effort blob cleanup failed for {}: {}", url, e);
            }
        }

        match self.store().delete_message(message_id).await {
            Ok(()) => {
                info!("deleted message {}", message_id);
                self.notifier().success("Message deleted");
                Ok(())
            }
            Err(e) => {
                self.notifier().error("Failed to delete message");
                Err(e)
            }
        }
    }
}
