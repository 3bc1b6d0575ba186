//! Collaborator contracts: the storage, discovery, blob, and dispatch seams
//! this crate composes over.
//!
//! Every method here is blocking; callers run them on the worker runtime via
//! [`crate::service::ConversationService`]. Implementations must be cheap to
//! share across threads.

pub mod stubs;

use std::io::Read;

use thiserror::Error;
use tokio::sync::watch;

use crate::domain::{
    message::{DistributionType, SyncMessageId},
    recipient::{GroupRecord, Recipient, RegistrationClassification},
};

/// Thread bookkeeping needed to place the scroll anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadMetadata {
    pub last_seen_ms: i64,
    pub last_scrolled_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    Missing { entity: &'static str, id: i64 },
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Read and write access to conversation persistence.
///
/// Unknown threads answer zeroed metadata and counts rather than an error; a
/// brand-new conversation has no thread row yet and that is not a failure.
pub trait ConversationStore: Send + Sync {
    fn thread_metadata(&self, thread_id: i64) -> Result<ThreadMetadata, StoreError>;

    fn message_count(&self, thread_id: i64) -> Result<u32, StoreError>;

    /// 1-based position of the first message at or after `timestamp_ms`, or a
    /// value `<= 0` when no such message exists.
    fn position_at_or_after(&self, thread_id: i64, timestamp_ms: i64) -> Result<i32, StoreError>;

    fn is_message_request_accepted(&self, thread_id: i64) -> Result<bool, StoreError>;

    fn is_recipient_hidden(&self, thread_id: i64) -> Result<bool, StoreError>;

    /// Membership record for a group recipient, `None` when the group state
    /// has not materialized yet.
    fn group_record(&self, recipient_id: i64) -> Result<Option<GroupRecord>, StoreError>;

    fn recipient(&self, recipient_id: i64) -> Result<Recipient, StoreError>;

    /// Cached directory classification, read fresh from persistence rather
    /// than from any projection snapshot.
    fn registration_classification(
        &self,
        recipient_id: i64,
    ) -> Result<RegistrationClassification, StoreError>;

    fn can_set_universal_timer(&self, thread_id: i64) -> Result<bool, StoreError>;

    fn thread_recipient(&self, thread_id: i64) -> Result<Option<i64>, StoreError>;

    /// Count of incoming, user-visible messages received strictly after
    /// `after_ms`.
    fn incoming_count_since(&self, thread_id: i64, after_ms: i64) -> Result<u32, StoreError>;

    fn set_muted(&self, recipient_id: i64, until_ms: i64) -> Result<(), StoreError>;

    fn set_distribution_type(
        &self,
        thread_id: i64,
        distribution: DistributionType,
    ) -> Result<(), StoreError>;

    /// Marks the given gift messages revealed and returns sync ids for the
    /// messages whose state actually flipped. Already-revealed messages and
    /// unknown ids contribute nothing.
    fn mark_gifts_revealed(&self, message_ids: &[i64]) -> Result<Vec<SyncMessageId>, StoreError>;
}

/// Callback fired when anything about one conversation changes in the store.
pub type ConversationListener = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// Change notification fan-out for conversation content.
pub trait ChangeNotifier: Send + Sync {
    fn register_conversation_listener(
        &self,
        thread_id: i64,
        listener: ConversationListener,
    ) -> ListenerToken;

    fn unregister(&self, token: ListenerToken);
}

/// Live feed of recipient projections.
pub trait RecipientWatcher: Send + Sync {
    /// Hands out a receiver already holding the current projection; every
    /// later publish for the recipient lands in it.
    fn watch_recipient(&self, recipient_id: i64) -> watch::Receiver<Recipient>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("contact directory unreachable")]
    Unreachable,
    #[error("contact directory rejected the request")]
    Rejected,
}

/// Network-backed contact directory lookup.
pub trait ContactResolver: Send + Sync {
    fn resolve_registration(
        &self,
        recipient_id: i64,
        urgent: bool,
    ) -> Result<RegistrationClassification, ResolveError>;
}

/// Access to externally stored message bodies.
pub trait BlobStore: Send + Sync {
    fn open_stream(&self, blob_ref: &str) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Outbound queue for multi-device sync traffic.
pub trait SyncDispatcher: Send + Sync {
    fn enqueue_viewed_sync(&self, ids: Vec<SyncMessageId>);
}

/// Account-level switches the pipelines consult.
pub trait ClientSettings: Send + Sync {
    /// Global default disappearing-message timer in seconds, 0 when disabled.
    fn universal_expire_timer_secs(&self) -> u32;

    fn is_client_deprecated(&self) -> bool;

    fn is_credentials_rejected(&self) -> bool;

    /// Whether the local account itself is registered on the secure transport.
    fn is_local_account_enabled(&self) -> bool;

    fn supports_detached_conversations(&self) -> bool;
}
