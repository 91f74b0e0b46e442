// Chat directory: live ordered chat summaries for the session user.
// Read-only view layer; all writes to chat documents happen elsewhere.

use std::sync::Arc;

use log::debug;

use crate::error::SyncResult;
use crate::models::{ChatKind, ChatSummary};
use crate::store::{Collection, DocumentStore};
use crate::sync::subscription::{subscribe_query, Subscription};
use crate::sync::SyncClient;

impl SyncClient {
    /// Live view of the session user's chats, ordered by `updated_at`
    /// descending. A fresh snapshot is delivered whenever any watched chat
    /// changes; the `Users` collection is watched too so a peer rename
    /// re-resolves private-chat display names.
    pub fn subscribe_chats(&self) -> Subscription<ChatSummary> {
        let store = self.store().clone();
        let viewer = self.session().user_id.clone();

        subscribe_query(
            store.changes(),
            vec![Collection::Chats, Collection::Users],
            move || {
                let store = store.clone();
                let viewer = viewer.clone();
                async move { directory_snapshot(&store, &viewer).await }
            },
        )
    }

    /// One-shot directory read, same projection as the live view.
    pub async fn list_chats(&self) -> SyncResult<Vec<ChatSummary>> {
        directory_snapshot(self.store(), &self.session().user_id).await
    }
}

async fn directory_snapshot(
    store: &Arc<dyn DocumentStore>,
    viewer: &str,
) -> SyncResult<Vec<ChatSummary>> {
    let chats = store.chats_for_user(viewer).await?;
    debug!("directory snapshot for {}: {} chats", viewer, chats.len());

    let mut summaries = Vec::with_capacity(chats.len());
    for chat in &chats {
        // Private chats borrow the other participant's name and avatar.
        // The side-lookup may miss (profile not yet synced, or revoked);
        // the projection then falls back to the sentinel name.
        let peer = match chat.kind {
            ChatKind::Private => match ChatSummary::peer_of(chat, viewer) {
                Some(peer_id) => store.get_user(&peer_id).await?,
                None => None,
            },
            ChatKind::Group => None,
        };
        summaries.push(ChatSummary::project(chat, viewer, peer.as_ref()));
    }
    Ok(summaries)
}
