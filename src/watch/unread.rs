use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tokio_stream::Stream;

use crate::store::{ChangeNotifier, ConversationStore, ListenerToken};

const UNREAD_WATCH_STARTED: &str = "UNREAD_WATCH_STARTED";
const UNREAD_WATCH_STOPPED: &str = "UNREAD_WATCH_STOPPED";
const UNREAD_RECOUNT_FAILED: &str = "UNREAD_RECOUNT_FAILED";
const UNREAD_RECOUNT_LOST: &str = "UNREAD_RECOUNT_LOST";

/// Threads at or below this id have no persisted conversation to watch.
const NO_THREAD: i64 = -1;

const COUNT_BUFFER: usize = 8;

/// Live count of incoming messages received after a fixed point in time.
///
/// The count is queried once up front and again after every store change
/// notification for the thread, so a subscriber always starts from the
/// current value. A conversation that cannot have unread messages yields a
/// single zero and ends.
pub struct UnreadCountStream {
    rx: mpsc::Receiver<u32>,
    watcher: Option<JoinHandle<()>>,
}

impl UnreadCountStream {
    pub fn spawn(
        handle: &Handle,
        store: Arc<dyn ConversationStore>,
        notifier: Arc<dyn ChangeNotifier>,
        thread_id: i64,
        after_ms: i64,
    ) -> Self {
        if thread_id <= NO_THREAD || after_ms <= 0 {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(0);
            return Self { rx, watcher: None };
        }

        let (tx, rx) = mpsc::channel(COUNT_BUFFER);
        let watcher = handle.spawn(run_watcher(
            handle.clone(),
            store,
            notifier,
            thread_id,
            after_ms,
            tx,
        ));

        Self {
            rx,
            watcher: Some(watcher),
        }
    }
}

impl Stream for UnreadCountStream {
    type Item = u32;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u32>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for UnreadCountStream {
    fn drop(&mut self) {
        if let Some(watcher) = &self.watcher {
            watcher.abort();
        }
    }
}

/// Unregisters the store listener on every exit path, the aborted one
/// included.
struct ListenerGuard {
    notifier: Arc<dyn ChangeNotifier>,
    token: ListenerToken,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.notifier.unregister(self.token);
    }
}

async fn run_watcher(
    worker: Handle,
    store: Arc<dyn ConversationStore>,
    notifier: Arc<dyn ChangeNotifier>,
    thread_id: i64,
    after_ms: i64,
    tx: mpsc::Sender<u32>,
) {
    // Register before the first count so nothing slips between them; a
    // notification arriving mid-query just queues another recount.
    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let token = notifier.register_conversation_listener(
        thread_id,
        Box::new(move || {
            let _ = notify_tx.send(());
        }),
    );
    let _registration = ListenerGuard {
        notifier: Arc::clone(&notifier),
        token,
    };

    tracing::debug!(
        code = UNREAD_WATCH_STARTED,
        thread_id,
        after_ms,
        "unread count watch started"
    );

    loop {
        let query_store = Arc::clone(&store);
        let count = match worker
            .spawn_blocking(move || query_store.incoming_count_since(thread_id, after_ms))
            .await
        {
            Ok(Ok(count)) => Some(count),
            Ok(Err(error)) => {
                tracing::warn!(
                    code = UNREAD_RECOUNT_FAILED,
                    thread_id,
                    error = %error,
                    "unread recount failed, keeping the previous value"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    code = UNREAD_RECOUNT_LOST,
                    thread_id,
                    "unread recount worker went away"
                );
                break;
            }
        };

        if let Some(count) = count {
            if tx.send(count).await.is_err() {
                break;
            }
        }

        if notifications.recv().await.is_none() {
            break;
        }
    }

    tracing::debug!(code = UNREAD_WATCH_STOPPED, thread_id, "unread count watch stopped");
}
