// Palaver: real-time chat synchronization core.
// Keeps chat directories, message streams, delivery status, presence, and
// contact relationships consistent across clients of an eventually
// consistent, push-notifying document store.

pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod sync;

// Re-export the main types for convenience
pub use error::{SyncError, SyncResult};
pub use models::*;
pub use session::Session;
pub use sync::{Subscription, SubscriptionEvent, SyncClient};
