// Synchronization core entry point.
// SyncClient ties one signed-in session to the store collaborators; the
// per-component operations live in the submodules as impl blocks.

use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::models::{Chat, Message};
use crate::session::Session;
use crate::store::{BlobStore, DocumentStore, NotificationSink};

pub mod chats;
pub mod contacts;
pub mod directory;
pub mod presence;
pub mod profiles;
pub mod projector;
pub mod stream;
pub mod subscription;

pub use subscription::{Subscription, SubscriptionEvent};

/// Client-side synchronization core for one user session.
///
/// Holds the collaborator handles and the session identity; every operation
/// and live view is a method on this type. Cloning is cheap and clones share
/// the same collaborators.
#[derive(Clone)]
pub struct SyncClient {
    session: Session,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl SyncClient {
    pub fn new(
        session: Session,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        SyncClient {
            session,
            store,
            blobs,
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    /// Fetch a chat, turning a missing document into `NotFound`.
    pub async fn chat(&self, chat_id: &str) -> SyncResult<Chat> {
        self.store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("chat {}", chat_id)))
    }

    /// Fetch a message, turning a missing document into `NotFound`.
    pub async fn message(&self, message_id: &str) -> SyncResult<Message> {
        self.store
            .get_message(message_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("message {}", message_id)))
    }
}
