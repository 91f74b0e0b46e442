// Profile bookkeeping: sign-in document creation, partial profile updates,
// and display-name search.

use chrono::Utc;
use log::info;

use crate::error::SyncResult;
use crate::models::User;
use crate::store::{ProfileChanges, USER_SEARCH_LIMIT};
use crate::sync::SyncClient;

/// Default status line for freshly created profiles.
const DEFAULT_STATUS: &str = "Hey there! I am using Palaver.";

impl SyncClient {
    /// Create the session user's profile document if it does not exist yet,
    /// returning the stored profile either way. Idempotent: a repeat call
    /// after sign-in leaves the existing document untouched.
    pub async fn ensure_profile(
        &self,
        email: Option<String>,
        phone_number: Option<String>,
        avatar_url: Option<String>,
    ) -> SyncResult<User> {
        let user_id = self.session().user_id.clone();
        if let Some(existing) = self.store().get_user(&user_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let user = User {
            id: user_id.clone(),
            display_name: self.session().display_name.clone(),
            email,
            phone_number,
            avatar_url,
            status_message: Some(DEFAULT_STATUS.to_string()),
            is_online: true,
            last_seen: now,
            created_at: now,
            updated_at: now,
        };
        self.store().put_user(user.clone()).await?;
        info!("created profile for {}", user_id);
        Ok(user)
    }

    /// Apply a partial profile update to the session user's document.
    pub async fn update_profile(&self, changes: ProfileChanges) -> SyncResult<()> {
        let user_id = self.session().user_id.clone();
        match self.store().update_user(&user_id, changes).await {
            Ok(()) => {
                self.notifier().success("Profile updated");
                Ok(())
            }
            Err(e) => {
                self.notifier().error("Failed to update profile");
                Err(e)
            }
        }
    }

    /// Display-name prefix search, capped at ten results. Point-in-time
    /// read, not a live view.
    pub async fn search_users(&self, name_prefix: &str) -> SyncResult<Vec<User>> {
        self.store()
            .search_users(name_prefix, USER_SEARCH_LIMIT)
            .await
    }
}
