use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_stream::Stream;

use crate::{
    domain::{
        recipient::Recipient,
        security::{SecurityKey, SecurityStatus},
    },
    store::{ClientSettings, ContactResolver, ConversationStore, RecipientWatcher},
    usecases::evaluate_security::evaluate_security,
};

const SECURITY_STREAM_STARTED: &str = "SECURITY_STREAM_STARTED";
const SECURITY_STREAM_STOPPED: &str = "SECURITY_STREAM_STOPPED";
const SECURITY_RECOMPUTE_PANICKED: &str = "SECURITY_RECOMPUTE_PANICKED";

const STATUS_BUFFER: usize = 8;

/// Live security status for one recipient.
///
/// The current projection counts as the first update. Later projections only
/// trigger a recomputation when their [`SecurityKey`] differs from the last
/// one seen, and a recomputation still in flight at that point is superseded:
/// its result is never delivered. The stream ends when the identity feed
/// closes, after draining the recomputation still in flight.
pub struct SecurityStatusStream {
    rx: mpsc::Receiver<SecurityStatus>,
    pipeline: JoinHandle<()>,
}

impl SecurityStatusStream {
    pub fn spawn(
        handle: &Handle,
        recipients: &dyn RecipientWatcher,
        store: Arc<dyn ConversationStore>,
        resolver: Arc<dyn ContactResolver>,
        settings: Arc<dyn ClientSettings>,
        recipient_id: i64,
    ) -> Self {
        let upstream = recipients.watch_recipient(recipient_id);
        let (tx, rx) = mpsc::channel(STATUS_BUFFER);
        let pipeline = handle.spawn(run_pipeline(
            handle.clone(),
            upstream,
            tx,
            store,
            resolver,
            settings,
            recipient_id,
        ));

        Self { rx, pipeline }
    }
}

impl Stream for SecurityStatusStream {
    type Item = SecurityStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SecurityStatus>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for SecurityStatusStream {
    fn drop(&mut self) {
        // A recomputation already running on the blocking pool finishes there;
        // its result has nowhere to go.
        self.pipeline.abort();
    }
}

async fn run_pipeline(
    worker: Handle,
    mut upstream: watch::Receiver<Recipient>,
    tx: mpsc::Sender<SecurityStatus>,
    store: Arc<dyn ConversationStore>,
    resolver: Arc<dyn ContactResolver>,
    settings: Arc<dyn ClientSettings>,
    recipient_id: i64,
) {
    tracing::debug!(
        code = SECURITY_STREAM_STARTED,
        recipient_id,
        "security status stream started"
    );

    let first = upstream.borrow_and_update().clone();
    let mut last_key = SecurityKey::of(&first);
    let mut in_flight = Some(recompute(&worker, &store, &resolver, &settings, first));
    let mut upstream_open = true;

    loop {
        match in_flight.take() {
            Some(mut task) => {
                if !upstream_open {
                    if let Ok(status) = task.await {
                        let _ = tx.send(status).await;
                    }
                    break;
                }

                tokio::select! {
                    joined = &mut task => {
                        match joined {
                            Ok(status) => {
                                if tx.send(status).await.is_err() {
                                    break;
                                }
                            }
                            Err(error) => {
                                if error.is_panic() {
                                    tracing::warn!(
                                        code = SECURITY_RECOMPUTE_PANICKED,
                                        recipient_id,
                                        "security recomputation panicked"
                                    );
                                }
                            }
                        }
                    }
                    changed = upstream.changed() => {
                        match changed {
                            Ok(()) => {
                                let next = upstream.borrow_and_update().clone();
                                let key = SecurityKey::of(&next);
                                if key == last_key {
                                    in_flight = Some(task);
                                } else {
                                    last_key = key;
                                    task.abort();
                                    in_flight =
                                        Some(recompute(&worker, &store, &resolver, &settings, next));
                                }
                            }
                            Err(_) => {
                                upstream_open = false;
                                in_flight = Some(task);
                            }
                        }
                    }
                }
            }
            None => {
                if !upstream_open {
                    break;
                }

                if upstream.changed().await.is_err() {
                    break;
                }
                let next = upstream.borrow_and_update().clone();
                let key = SecurityKey::of(&next);
                if key != last_key {
                    last_key = key;
                    in_flight = Some(recompute(&worker, &store, &resolver, &settings, next));
                }
            }
        }
    }

    tracing::debug!(
        code = SECURITY_STREAM_STOPPED,
        recipient_id,
        "security status stream stopped"
    );
}

fn recompute(
    worker: &Handle,
    store: &Arc<dyn ConversationStore>,
    resolver: &Arc<dyn ContactResolver>,
    settings: &Arc<dyn ClientSettings>,
    recipient: Recipient,
) -> JoinHandle<SecurityStatus> {
    let store = Arc::clone(store);
    let resolver = Arc::clone(resolver);
    let settings = Arc::clone(settings);

    worker.spawn_blocking(move || evaluate_security(&*store, &*resolver, &*settings, &recipient))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc as std_mpsc, Mutex,
        },
        time::Duration,
    };

    use tokio_stream::StreamExt;

    use super::*;
    use crate::{
        domain::recipient::RegistrationClassification,
        store::{
            stubs::{MemoryBackend, StaticSettings, StubResolver},
            ResolveError,
        },
        test_support::{direct_recipient, wait_until},
    };

    fn arcs(backend: &MemoryBackend) -> (Arc<dyn ConversationStore>, Arc<dyn ClientSettings>) {
        (
            Arc::new(backend.clone()) as Arc<dyn ConversationStore>,
            Arc::new(StaticSettings::default()) as Arc<dyn ClientSettings>,
        )
    }

    #[tokio::test]
    async fn emits_status_for_the_current_projection() {
        let backend = MemoryBackend::new();
        backend.publish_recipient(direct_recipient(1));
        let (store, settings) = arcs(&backend);
        let resolver: Arc<dyn ContactResolver> =
            Arc::new(StubResolver::with(Err(ResolveError::Unreachable)));

        let mut stream = SecurityStatusStream::spawn(
            &Handle::current(),
            &backend,
            store,
            resolver,
            settings,
            1,
        );

        let status = stream.next().await.expect("initial status expected");
        assert!(status.secure_channel);
        assert_eq!(status.recipient_id, 1);
    }

    #[tokio::test]
    async fn recomputes_only_on_security_relevant_changes() {
        let backend = MemoryBackend::new();
        backend.publish_recipient(direct_recipient(1));
        let (store, settings) = arcs(&backend);
        let resolver: Arc<dyn ContactResolver> =
            Arc::new(StubResolver::with(Err(ResolveError::Unreachable)));

        let mut stream = SecurityStatusStream::spawn(
            &Handle::current(),
            &backend,
            store,
            resolver,
            settings,
            1,
        );
        assert!(stream.next().await.expect("initial status").secure_channel);

        let mut cosmetic = direct_recipient(1);
        cosmetic.is_profile_sharing = true;
        backend.publish_recipient(cosmetic);
        let silent = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(silent.is_err(), "cosmetic churn must not emit");

        let mut absent = direct_recipient(1);
        absent.registration = RegistrationClassification::NotRegistered;
        backend.publish_recipient(absent);
        let status = stream.next().await.expect("reclassified status");
        assert!(!status.secure_channel);
    }

    /// Blocks inside `resolve_registration` until the test releases it.
    struct GatedResolver {
        gate: Mutex<std_mpsc::Receiver<()>>,
        calls: AtomicUsize,
    }

    impl ContactResolver for GatedResolver {
        fn resolve_registration(
            &self,
            _recipient_id: i64,
            _urgent: bool,
        ) -> Result<RegistrationClassification, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let held = self
                .gate
                .lock()
                .map(|gate| gate.recv().is_ok())
                .unwrap_or(false);
            if held {
                Ok(RegistrationClassification::Registered)
            } else {
                Err(ResolveError::Unreachable)
            }
        }
    }

    #[tokio::test]
    async fn supersedes_an_in_flight_recomputation() {
        let backend = MemoryBackend::new();
        backend.publish_recipient(direct_recipient(1));
        let (store, settings) = arcs(&backend);
        let (release, gate) = std_mpsc::channel();
        let resolver = Arc::new(GatedResolver {
            gate: Mutex::new(gate),
            calls: AtomicUsize::new(0),
        });

        let mut stream = SecurityStatusStream::spawn(
            &Handle::current(),
            &backend,
            store,
            Arc::clone(&resolver) as Arc<dyn ContactResolver>,
            settings,
            1,
        );
        assert!(stream.next().await.expect("initial status").secure_channel);

        // First relevant change parks its recomputation inside the resolver.
        let mut unclassified = direct_recipient(1);
        unclassified.registration = RegistrationClassification::Unknown;
        backend.publish_recipient(unclassified);
        let resolver_probe = Arc::clone(&resolver);
        wait_until(move || resolver_probe.calls.load(Ordering::SeqCst) == 1).await;

        // Second relevant change wins; it resolves without the directory.
        let mut absent = direct_recipient(1);
        absent.registration = RegistrationClassification::NotRegistered;
        backend.publish_recipient(absent);

        let status = stream.next().await.expect("superseding status");
        assert!(!status.secure_channel);

        let silent = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(silent.is_err(), "superseded result must never surface");

        drop(release);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    struct FixedWatcher {
        rx: watch::Receiver<Recipient>,
    }

    impl RecipientWatcher for FixedWatcher {
        fn watch_recipient(&self, _recipient_id: i64) -> watch::Receiver<Recipient> {
            self.rx.clone()
        }
    }

    #[tokio::test]
    async fn ends_when_the_identity_feed_closes() {
        let backend = MemoryBackend::new();
        backend.publish_recipient(direct_recipient(1));
        let (store, settings) = arcs(&backend);
        let resolver: Arc<dyn ContactResolver> =
            Arc::new(StubResolver::with(Err(ResolveError::Unreachable)));
        let (feed, rx) = watch::channel(direct_recipient(1));

        let mut stream = SecurityStatusStream::spawn(
            &Handle::current(),
            &FixedWatcher { rx },
            store,
            resolver,
            settings,
            1,
        );
        assert!(stream.next().await.is_some());

        drop(feed);
        assert!(stream.next().await.is_none(), "stream must end");
    }
}
