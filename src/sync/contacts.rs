// Contact registry: directed (owner, target) relationships with a profile
// snapshot taken at add time, plus block/unblock bookkeeping.

use chrono::Utc;
use log::info;

use crate::error::{SyncError, SyncResult};
use crate::models::Contact;
use crate::store::Collection;
use crate::sync::subscription::{subscribe_query, Subscription};
use crate::sync::SyncClient;

impl SyncClient {
    /// Add a contact by the target's phone number.
    ///
    /// The lookup is a point read against the unique phone-number key; zero
    /// matches is `NotFound`. Re-adding an existing contact overwrites the
    /// stored snapshot with the target's current profile (idempotent).
    pub async fn add_contact(&self, phone_number: &str) -> SyncResult<Contact> {
        let target = match self.store().find_user_by_phone(phone_number).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.notifier().error("No user found with this phone number");
                return Err(SyncError::NotFound(format!(
                    "user with phone number {}",
                    phone_number
                )));
            }
            Err(e) => {
                self.notifier().error("Failed to add contact");
                return Err(e);
            }
        };

        let contact = Contact {
            owner_id: self.session().user_id.clone(),
            user_id: target.id.clone(),
            display_name: target.display_name.clone(),
            avatar_url: target.avatar_url.clone(),
            phone_number: target.phone_number.clone(),
            email: target.email.clone(),
            status_message: target.status_message.clone(),
            is_blocked: false,
            added_at: Utc::now(),
        };

        match self.store().put_contact(contact.clone()).await {
            Ok(()) => {
                info!(
                    "added contact {} -> {}",
                    contact.owner_id, contact.user_id
                );
                self.notifier().success("Contact added");
                Ok(contact)
            }
            Err(e) => {
                self.notifier().error("Failed to add contact");
                Err(e)
            }
        }
    }

    /// Block an existing contact. Blocking is a property of the session
    /// user's side of the relationship only; the reverse relationship is
    /// untouched. Blocking someone who is not a contact is `NotFound` —
    /// callers add first, then block.
    pub async fn block_contact(&self, user_id: &str) -> SyncResult<()> {
        self.set_blocked(user_id, true).await
    }

    /// Clear the blocked flag on an existing contact.
    pub async fn unblock_contact(&self, user_id: &str) -> SyncResult<()> {
        self.set_blocked(user_id, false).await
    }

    async fn set_blocked(&self, user_id: &str, blocked: bool) -> SyncResult<()> {
        let owner = self.session().user_id.clone();
        match self
            .store()
            .set_contact_blocked(&owner, user_id, blocked)
            .await
        {
            Ok(()) => {
                info!("contact {} -> {}: blocked={}", owner, user_id, blocked);
                self.notifier()
                    .success(if blocked { "Contact blocked" } else { "Contact unblocked" });
                Ok(())
            }
            Err(e) => {
                self.notifier().error(if blocked {
                    "Failed to block contact"
                } else {
                    "Failed to unblock contact"
                });
                Err(e)
            }
        }
    }

    /// Live view of the session user's contact list.
    pub fn subscribe_contacts(&self) -> Subscription<Contact> {
        let store = self.store().clone();
        let owner = self.session().user_id.clone();

        subscribe_query(store.changes(), vec![Collection::Contacts], move || {
            let store = store.clone();
            let owner = owner.clone();
            async move { store.contacts_for_owner(&owner).await }
        })
    }

    /// One-shot read of the session user's contacts.
    pub async fn list_contacts(&self) -> SyncResult<Vec<Contact>> {
        self.store()
            .contacts_for_owner(&self.session().user_id)
            .await
    }
}
