// Explicit session state for a signed-in user.
// Created at sign-in, handed to every SyncClient, dropped at sign-out;
// there is no process-wide current-user global.

use crate::models::User;

/// Identity of the signed-in user driving a `SyncClient`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Build a session from a stored profile (the usual sign-in path).
    pub fn for_user(user: &User) -> Self {
        Session {
            user_id: user.id.clone(),
            display_name: user.display_name.clone(),
        }
    }
}
