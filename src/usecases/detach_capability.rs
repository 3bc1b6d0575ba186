use crate::store::{ClientSettings, ConversationStore};

const DETACH_PROBE_FAILED: &str = "DETACH_PROBE_FAILED";

/// Whether a conversation may pop out into a detached window.
///
/// Answers false on any doubt: feature unsupported, thread without a
/// recipient, or a store read failure.
pub fn can_detach_conversation(
    store: &dyn ConversationStore,
    settings: &dyn ClientSettings,
    thread_id: i64,
) -> bool {
    if !settings.supports_detached_conversations() {
        return false;
    }

    let recipient_id = match store.thread_recipient(thread_id) {
        Ok(Some(recipient_id)) => recipient_id,
        Ok(None) => return false,
        Err(error) => {
            tracing::warn!(
                code = DETACH_PROBE_FAILED,
                thread_id,
                error = %error,
                "thread recipient lookup failed"
            );
            return false;
        }
    };

    match store.recipient(recipient_id) {
        Ok(recipient) => recipient.allows_detached_window,
        Err(error) => {
            tracing::warn!(
                code = DETACH_PROBE_FAILED,
                thread_id,
                recipient_id,
                error = %error,
                "recipient lookup failed"
            );
            false
        }
    }
}
