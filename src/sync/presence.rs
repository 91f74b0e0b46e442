// Presence tracking for the session user.
// Driven by connection lifecycle and visibility signals, not user actions.
// Writes are best-effort: a failure leaves the stored flag stale until the
// next successful update, and callers must treat `is_online` accordingly.

use chrono::Utc;
use log::{debug, warn};

use crate::sync::SyncClient;

impl SyncClient {
    /// Mark the session user online. Call on successful session
    /// establishment or when the app returns to the foreground.
    pub async fn set_online(&self) {
        self.write_presence(true).await;
    }

    /// Mark the session user offline with `last_seen = now`. Call on
    /// explicit teardown, detected connection loss, or a prolonged
    /// inactivity signal.
    pub async fn set_offline(&self) {
        self.write_presence(false).await;
    }

    async fn write_presence(&self, is_online: bool) {
        let user_id = self.session().user_id.clone();
        let now = Utc::now();
        match self
            .store()
            .set_user_presence(&user_id, is_online, now)
            .await
        {
            Ok(()) => debug!("presence for {}: online={}", user_id, is_online),
            Err(e) => {
                // Queue-and-drop: a missed write is tolerated, never fatal.
                warn!(
                    "best-effort presence write failed for {} (online={}): {}",
                    user_id, is_online, e
                );
            }
        }
    }
}
