//! In-memory collaborators: a reference store backend plus small fakes for
//! the remaining seams. Real deployments plug their own adapters in; these
//! keep tests and adapter development off the network and disk.

use std::{
    collections::HashMap,
    io::{self, Cursor, Read},
    sync::{Arc, Mutex},
};

use tokio::sync::watch;

use crate::{
    domain::{
        message::{DistributionType, SyncMessageId},
        recipient::{GroupRecord, Recipient, RegistrationClassification},
    },
    store::{
        BlobStore, ChangeNotifier, ClientSettings, ContactResolver, ConversationListener,
        ConversationStore, ListenerToken, RecipientWatcher, ResolveError, StoreError,
        SyncDispatcher, ThreadMetadata,
    },
};

/// Seed values for one thread row in the memory backend.
#[derive(Debug, Clone)]
pub struct ThreadSeed {
    pub thread_id: i64,
    pub recipient_id: Option<i64>,
    pub last_seen_ms: i64,
    pub last_scrolled_ms: i64,
    pub message_count: u32,
    pub accepted: bool,
    pub hidden: bool,
    pub universal_timer_eligible: bool,
}

impl ThreadSeed {
    pub fn new(thread_id: i64) -> Self {
        Self {
            thread_id,
            recipient_id: None,
            last_seen_ms: 0,
            last_scrolled_ms: 0,
            message_count: 0,
            accepted: true,
            hidden: false,
            universal_timer_eligible: true,
        }
    }
}

struct ThreadRow {
    seed: ThreadSeed,
    /// Receive timestamps of incoming messages appended after seeding.
    incoming: Vec<i64>,
}

struct GiftRow {
    sync_id: SyncMessageId,
    revealed: bool,
}

#[derive(Default)]
struct MemoryState {
    threads: HashMap<i64, ThreadRow>,
    recipients: HashMap<i64, Recipient>,
    groups: HashMap<i64, GroupRecord>,
    positions: HashMap<(i64, i64), i32>,
    gifts: HashMap<i64, GiftRow>,
    muted: HashMap<i64, i64>,
    distributions: HashMap<i64, DistributionType>,
    listeners: HashMap<u64, (i64, Arc<dyn Fn() + Send + Sync>)>,
    next_token: u64,
    feeds: HashMap<i64, watch::Sender<Recipient>>,
    read_failure: Option<String>,
}

/// Store, change notifier, and recipient feed sharing one in-memory state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_thread(&self, seed: ThreadSeed) {
        if let Ok(mut state) = self.state.lock() {
            state.threads.insert(
                seed.thread_id,
                ThreadRow {
                    seed,
                    incoming: Vec::new(),
                },
            );
        }
    }

    pub fn seed_position(&self, thread_id: i64, timestamp_ms: i64, position: i32) {
        if let Ok(mut state) = self.state.lock() {
            state.positions.insert((thread_id, timestamp_ms), position);
        }
    }

    pub fn seed_group(&self, group: GroupRecord) {
        if let Ok(mut state) = self.state.lock() {
            state.groups.insert(group.recipient_id, group);
        }
    }

    pub fn seed_gift(&self, message_id: i64, sync_id: SyncMessageId) {
        if let Ok(mut state) = self.state.lock() {
            state.gifts.insert(
                message_id,
                GiftRow {
                    sync_id,
                    revealed: false,
                },
            );
        }
    }

    /// Inserts or replaces a recipient projection and pushes it to watchers.
    pub fn publish_recipient(&self, recipient: Recipient) {
        if let Ok(mut state) = self.state.lock() {
            state.recipients.insert(recipient.id, recipient.clone());
            if let Some(feed) = state.feeds.get(&recipient.id) {
                let _ = feed.send(recipient);
            }
        }
    }

    /// Appends an incoming message to a thread and wakes its listeners.
    pub fn push_incoming(&self, thread_id: i64, received_ms: i64) {
        let listeners = match self.state.lock() {
            Ok(mut state) => {
                state
                    .threads
                    .entry(thread_id)
                    .or_insert_with(|| ThreadRow {
                        seed: ThreadSeed::new(thread_id),
                        incoming: Vec::new(),
                    })
                    .incoming
                    .push(received_ms);
                state
                    .listeners
                    .values()
                    .filter(|(listener_thread, _)| *listener_thread == thread_id)
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect::<Vec<_>>()
            }
            Err(_) => Vec::new(),
        };

        // Listeners run outside the lock; they are free to call back in.
        for listener in listeners {
            listener();
        }
    }

    /// Makes every subsequent read fail, for exercising failure paths.
    pub fn fail_reads(&self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.read_failure = Some(message.to_owned());
        }
    }

    /// Lifts a previous [`fail_reads`](Self::fail_reads).
    pub fn restore_reads(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.read_failure = None;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.listeners.len())
            .unwrap_or(0)
    }

    pub fn muted_until(&self, recipient_id: i64) -> Option<i64> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.muted.get(&recipient_id).copied())
    }

    pub fn distribution_type(&self, thread_id: i64) -> Option<DistributionType> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.distributions.get(&thread_id).copied())
    }

    fn read<T>(&self, reader: impl FnOnce(&MemoryState) -> T) -> Result<T, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_owned()))?;
        match &state.read_failure {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(reader(&state)),
        }
    }

    fn write<T>(&self, writer: impl FnOnce(&mut MemoryState) -> T) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_owned()))?;
        Ok(writer(&mut state))
    }
}

impl ConversationStore for MemoryBackend {
    fn thread_metadata(&self, thread_id: i64) -> Result<ThreadMetadata, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| ThreadMetadata {
                    last_seen_ms: row.seed.last_seen_ms,
                    last_scrolled_ms: row.seed.last_scrolled_ms,
                })
                .unwrap_or_default()
        })
    }

    fn message_count(&self, thread_id: i64) -> Result<u32, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| row.seed.message_count + row.incoming.len() as u32)
                .unwrap_or(0)
        })
    }

    fn position_at_or_after(&self, thread_id: i64, timestamp_ms: i64) -> Result<i32, StoreError> {
        self.read(|state| {
            state
                .positions
                .get(&(thread_id, timestamp_ms))
                .copied()
                .unwrap_or(0)
        })
    }

    fn is_message_request_accepted(&self, thread_id: i64) -> Result<bool, StoreError> {
        // A conversation without a thread row has no request gate yet.
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| row.seed.accepted)
                .unwrap_or(true)
        })
    }

    fn is_recipient_hidden(&self, thread_id: i64) -> Result<bool, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| row.seed.hidden)
                .unwrap_or(false)
        })
    }

    fn group_record(&self, recipient_id: i64) -> Result<Option<GroupRecord>, StoreError> {
        self.read(|state| state.groups.get(&recipient_id).cloned())
    }

    fn recipient(&self, recipient_id: i64) -> Result<Recipient, StoreError> {
        self.read(|state| state.recipients.get(&recipient_id).cloned())?
            .ok_or(StoreError::Missing {
                entity: "recipient",
                id: recipient_id,
            })
    }

    fn registration_classification(
        &self,
        recipient_id: i64,
    ) -> Result<RegistrationClassification, StoreError> {
        self.read(|state| {
            state
                .recipients
                .get(&recipient_id)
                .map(|recipient| recipient.registration)
        })?
        .ok_or(StoreError::Missing {
            entity: "recipient",
            id: recipient_id,
        })
    }

    fn can_set_universal_timer(&self, thread_id: i64) -> Result<bool, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| row.seed.universal_timer_eligible)
                .unwrap_or(true)
        })
    }

    fn thread_recipient(&self, thread_id: i64) -> Result<Option<i64>, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .and_then(|row| row.seed.recipient_id)
        })
    }

    fn incoming_count_since(&self, thread_id: i64, after_ms: i64) -> Result<u32, StoreError> {
        self.read(|state| {
            state
                .threads
                .get(&thread_id)
                .map(|row| {
                    row.incoming
                        .iter()
                        .filter(|received| **received > after_ms)
                        .count() as u32
                })
                .unwrap_or(0)
        })
    }

    fn set_muted(&self, recipient_id: i64, until_ms: i64) -> Result<(), StoreError> {
        self.write(|state| {
            state.muted.insert(recipient_id, until_ms);
        })
    }

    fn set_distribution_type(
        &self,
        thread_id: i64,
        distribution: DistributionType,
    ) -> Result<(), StoreError> {
        self.write(|state| {
            state.distributions.insert(thread_id, distribution);
        })
    }

    fn mark_gifts_revealed(&self, message_ids: &[i64]) -> Result<Vec<SyncMessageId>, StoreError> {
        self.write(|state| {
            let mut flipped = Vec::new();
            for message_id in message_ids {
                if let Some(gift) = state.gifts.get_mut(message_id) {
                    if !gift.revealed {
                        gift.revealed = true;
                        flipped.push(gift.sync_id);
                    }
                }
            }
            flipped
        })
    }
}

impl ChangeNotifier for MemoryBackend {
    fn register_conversation_listener(
        &self,
        thread_id: i64,
        listener: ConversationListener,
    ) -> ListenerToken {
        match self.state.lock() {
            Ok(mut state) => {
                state.next_token += 1;
                let token = state.next_token;
                state
                    .listeners
                    .insert(token, (thread_id, Arc::from(listener)));
                ListenerToken(token)
            }
            Err(_) => ListenerToken(0),
        }
    }

    fn unregister(&self, token: ListenerToken) {
        if let Ok(mut state) = self.state.lock() {
            state.listeners.remove(&token.0);
        }
    }
}

impl RecipientWatcher for MemoryBackend {
    fn watch_recipient(&self, recipient_id: i64) -> watch::Receiver<Recipient> {
        match self.state.lock() {
            Ok(mut state) => {
                let initial = state
                    .recipients
                    .get(&recipient_id)
                    .cloned()
                    .unwrap_or_else(|| Recipient::unknown(recipient_id));
                state
                    .feeds
                    .entry(recipient_id)
                    .or_insert_with(|| watch::channel(initial).0)
                    .subscribe()
            }
            // Poisoned state: hand out an already-closed receiver.
            Err(_) => watch::channel(Recipient::unknown(recipient_id)).0.subscribe(),
        }
    }
}

/// Fixed [`ClientSettings`] values.
#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub universal_expire_timer_secs: u32,
    pub client_deprecated: bool,
    pub credentials_rejected: bool,
    pub local_account_enabled: bool,
    pub detached_conversations: bool,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            universal_expire_timer_secs: 0,
            client_deprecated: false,
            credentials_rejected: false,
            local_account_enabled: true,
            detached_conversations: true,
        }
    }
}

impl ClientSettings for StaticSettings {
    fn universal_expire_timer_secs(&self) -> u32 {
        self.universal_expire_timer_secs
    }

    fn is_client_deprecated(&self) -> bool {
        self.client_deprecated
    }

    fn is_credentials_rejected(&self) -> bool {
        self.credentials_rejected
    }

    fn is_local_account_enabled(&self) -> bool {
        self.local_account_enabled
    }

    fn supports_detached_conversations(&self) -> bool {
        self.detached_conversations
    }
}

/// Programmable [`ContactResolver`] that records every call.
pub struct StubResolver {
    result: Mutex<Result<RegistrationClassification, ResolveError>>,
    calls: Mutex<Vec<(i64, bool)>>,
}

impl StubResolver {
    pub fn with(result: Result<RegistrationClassification, ResolveError>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(recipient_id, urgent)` pairs in call order.
    pub fn calls(&self) -> Vec<(i64, bool)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl ContactResolver for StubResolver {
    fn resolve_registration(
        &self,
        recipient_id: i64,
        urgent: bool,
    ) -> Result<RegistrationClassification, ResolveError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((recipient_id, urgent));
        }
        self.result
            .lock()
            .map(|result| result.clone())
            .unwrap_or(Err(ResolveError::Unreachable))
    }
}

enum BlobEntry {
    Bytes(Vec<u8>),
    BrokenStream,
}

/// [`BlobStore`] over an in-memory map.
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, BlobEntry>>,
}

impl MemoryBlobs {
    pub fn insert_text(&self, blob_ref: &str, text: &str) {
        self.insert_bytes(blob_ref, text.as_bytes().to_vec());
    }

    pub fn insert_bytes(&self, blob_ref: &str, bytes: Vec<u8>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(blob_ref.to_owned(), BlobEntry::Bytes(bytes));
        }
    }

    /// Registers a blob whose stream opens fine and then fails on read.
    pub fn insert_broken_stream(&self, blob_ref: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(blob_ref.to_owned(), BlobEntry::BrokenStream);
        }
    }
}

impl BlobStore for MemoryBlobs {
    fn open_stream(&self, blob_ref: &str) -> io::Result<Box<dyn Read + Send>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| io::Error::other("blob lock poisoned"))?;
        match blobs.get(blob_ref) {
            Some(BlobEntry::Bytes(bytes)) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Some(BlobEntry::BrokenStream) => Ok(Box::new(BrokenReader)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no blob at {blob_ref}"),
            )),
        }
    }
}

struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream interrupted",
        ))
    }
}

/// [`SyncDispatcher`] that records enqueued batches.
#[derive(Default)]
pub struct RecordingDispatcher {
    batches: Mutex<Vec<Vec<SyncMessageId>>>,
}

impl RecordingDispatcher {
    pub fn batches(&self) -> Vec<Vec<SyncMessageId>> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }
}

impl SyncDispatcher for RecordingDispatcher {
    fn enqueue_viewed_sync(&self, ids: Vec<SyncMessageId>) {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::direct_recipient;

    #[test]
    fn unknown_thread_answers_zeroed_state() {
        let backend = MemoryBackend::new();

        assert_eq!(
            backend.thread_metadata(99).expect("metadata must load"),
            ThreadMetadata::default()
        );
        assert_eq!(backend.message_count(99).expect("count must load"), 0);
        assert_eq!(
            backend.incoming_count_since(99, 0).expect("count must load"),
            0
        );
        assert!(backend
            .is_message_request_accepted(99)
            .expect("request state must load"));
    }

    #[test]
    fn message_count_tracks_pushed_incoming() {
        let backend = MemoryBackend::new();
        let mut seed = ThreadSeed::new(5);
        seed.message_count = 10;
        backend.seed_thread(seed);

        backend.push_incoming(5, 1_000);
        backend.push_incoming(5, 2_000);

        assert_eq!(backend.message_count(5).expect("count must load"), 12);
        assert_eq!(
            backend
                .incoming_count_since(5, 1_000)
                .expect("count must load"),
            1
        );
    }

    #[test]
    fn push_incoming_wakes_only_matching_listeners() {
        let backend = MemoryBackend::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let other_hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let token = backend.register_conversation_listener(
            1,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let other_counter = Arc::clone(&other_hits);
        let _other = backend.register_conversation_listener(
            2,
            Box::new(move || {
                other_counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        backend.push_incoming(1, 500);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);

        backend.unregister(token);
        backend.push_incoming(1, 600);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(backend.listener_count(), 1);
    }

    #[test]
    fn recipient_feed_replays_current_projection() {
        let backend = MemoryBackend::new();
        backend.publish_recipient(direct_recipient(7));

        let mut feed = backend.watch_recipient(7);
        assert_eq!(feed.borrow_and_update().id, 7);

        let mut updated = direct_recipient(7);
        updated.is_profile_sharing = true;
        backend.publish_recipient(updated.clone());

        assert!(feed.has_changed().expect("feed must stay open"));
        assert_eq!(*feed.borrow_and_update(), updated);
    }

    #[test]
    fn gift_reveal_flips_each_message_once() {
        let backend = MemoryBackend::new();
        let sync_id = SyncMessageId {
            recipient_id: 3,
            timestamp_ms: 777,
        };
        backend.seed_gift(21, sync_id);

        let first = backend
            .mark_gifts_revealed(&[21, 999])
            .expect("reveal must succeed");
        assert_eq!(first, vec![sync_id]);

        let second = backend
            .mark_gifts_revealed(&[21])
            .expect("reveal must succeed");
        assert!(second.is_empty());
    }

    #[test]
    fn read_failure_switch_poisons_reads_only() {
        let backend = MemoryBackend::new();
        backend.seed_thread(ThreadSeed::new(1));
        backend.fail_reads("disk detached");

        let err = backend.message_count(1).expect_err("read must fail");
        assert_eq!(err, StoreError::Backend("disk detached".to_owned()));
        assert!(backend.set_muted(4, 1_000).is_ok());
    }
}
