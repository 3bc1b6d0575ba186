//! Service facade: runs the use cases on the worker runtime and hands out the
//! live streams. This is the only layer that touches task spawning; the use
//! cases below it stay synchronous.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::{
    domain::{
        message::{ConversationMessage, DistributionType},
        view_state::ConversationViewState,
    },
    store::{
        BlobStore, ChangeNotifier, ClientSettings, ContactResolver, ConversationStore,
        RecipientWatcher, SyncDispatcher,
    },
    usecases::{
        compose_view_state::{compose_view_state, ComposeError, ComposeQuery},
        detach_capability::can_detach_conversation,
        resolve_edit_source::resolve_edit_source,
    },
    watch::{security::SecurityStatusStream, unread::UnreadCountStream},
};

const MUTE_WRITE_FAILED: &str = "MUTE_WRITE_FAILED";
const DISTRIBUTION_WRITE_FAILED: &str = "DISTRIBUTION_WRITE_FAILED";
const GIFT_REVEAL_WRITE_FAILED: &str = "GIFT_REVEAL_WRITE_FAILED";
const GIFT_REVEAL_SYNCED: &str = "GIFT_REVEAL_SYNCED";
const EDIT_RESOLUTION_LOST: &str = "EDIT_RESOLUTION_LOST";
const DETACH_PROBE_LOST: &str = "DETACH_PROBE_LOST";

/// The collaborator set one conversation surface is wired with.
#[derive(Clone)]
pub struct ConversationDeps {
    pub store: Arc<dyn ConversationStore>,
    pub recipients: Arc<dyn RecipientWatcher>,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub resolver: Arc<dyn ContactResolver>,
    pub blobs: Arc<dyn BlobStore>,
    pub dispatcher: Arc<dyn SyncDispatcher>,
    pub settings: Arc<dyn ClientSettings>,
}

pub struct ConversationService {
    handle: Handle,
    deps: ConversationDeps,
}

impl ConversationService {
    pub fn new(handle: Handle, deps: ConversationDeps) -> Self {
        Self { handle, deps }
    }

    /// Composes the point-in-time snapshot for one screen load.
    pub async fn load_view_state(
        &self,
        query: ComposeQuery,
    ) -> Result<ConversationViewState, ComposeError> {
        let store = Arc::clone(&self.deps.store);
        let settings = Arc::clone(&self.deps.settings);

        match self
            .handle
            .spawn_blocking(move || compose_view_state(&*store, &*settings, query))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ComposeError::Worker),
        }
    }

    /// Live security status for a recipient, starting from its current
    /// projection.
    pub fn watch_security_status(&self, recipient_id: i64) -> SecurityStatusStream {
        SecurityStatusStream::spawn(
            &self.handle,
            &*self.deps.recipients,
            Arc::clone(&self.deps.store),
            Arc::clone(&self.deps.resolver),
            Arc::clone(&self.deps.settings),
            recipient_id,
        )
    }

    /// Live count of incoming messages received after `after_ms`.
    pub fn watch_unread_count(&self, thread_id: i64, after_ms: i64) -> UnreadCountStream {
        UnreadCountStream::spawn(
            &self.handle,
            Arc::clone(&self.deps.store),
            Arc::clone(&self.deps.notifier),
            thread_id,
            after_ms,
        )
    }

    /// Swaps an externally stored long body into the message before editing.
    /// Never fails the caller; at worst the inline body comes back unchanged.
    pub async fn resolve_edit_source(&self, message: ConversationMessage) -> ConversationMessage {
        let blobs = Arc::clone(&self.deps.blobs);
        let fallback = message.clone();

        match self
            .handle
            .spawn_blocking(move || resolve_edit_source(&*blobs, message))
            .await
        {
            Ok(resolved) => resolved,
            Err(_) => {
                tracing::warn!(
                    code = EDIT_RESOLUTION_LOST,
                    message_id = fallback.id,
                    "edit source resolution worker went away"
                );
                fallback
            }
        }
    }

    /// Whether the conversation may pop out into a detached window.
    pub async fn can_detach_conversation(&self, thread_id: i64) -> bool {
        let store = Arc::clone(&self.deps.store);
        let settings = Arc::clone(&self.deps.settings);

        match self
            .handle
            .spawn_blocking(move || can_detach_conversation(&*store, &*settings, thread_id))
            .await
        {
            Ok(allowed) => allowed,
            Err(_) => {
                tracing::warn!(code = DETACH_PROBE_LOST, thread_id, "detach probe went away");
                false
            }
        }
    }

    /// Fire-and-forget: mutes notifications for the recipient until `until_ms`.
    pub fn set_mute_until(&self, recipient_id: i64, until_ms: i64) {
        let store = Arc::clone(&self.deps.store);
        self.handle.spawn_blocking(move || {
            if let Err(error) = store.set_muted(recipient_id, until_ms) {
                tracing::warn!(
                    code = MUTE_WRITE_FAILED,
                    recipient_id,
                    error = %error,
                    "mute write failed"
                );
            }
        });
    }

    /// Fire-and-forget: records how the thread is placed in the conversation
    /// list.
    pub fn set_distribution_type(&self, thread_id: i64, distribution: DistributionType) {
        let store = Arc::clone(&self.deps.store);
        self.handle.spawn_blocking(move || {
            if let Err(error) = store.set_distribution_type(thread_id, distribution) {
                tracing::warn!(
                    code = DISTRIBUTION_WRITE_FAILED,
                    thread_id,
                    error = %error,
                    "distribution type write failed"
                );
            }
        });
    }

    /// Fire-and-forget: marks a gift message revealed and, when that actually
    /// flipped its state, tells linked devices it was viewed.
    pub fn mark_gift_revealed(&self, message_id: i64) {
        let store = Arc::clone(&self.deps.store);
        let dispatcher = Arc::clone(&self.deps.dispatcher);
        self.handle.spawn_blocking(move || {
            match store.mark_gifts_revealed(&[message_id]) {
                Ok(flipped) => {
                    if !flipped.is_empty() {
                        tracing::debug!(
                            code = GIFT_REVEAL_SYNCED,
                            message_id,
                            flipped = flipped.len(),
                            "gift reveal recorded, notifying linked devices"
                        );
                        dispatcher.enqueue_viewed_sync(flipped);
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        code = GIFT_REVEAL_WRITE_FAILED,
                        message_id,
                        error = %error,
                        "gift reveal write failed"
                    );
                }
            }
        });
    }
}
