use thiserror::Error;

use crate::{
    domain::{
        recipient::{GroupRecord, Recipient},
        view_state::{ConversationViewState, MessageRequestState},
    },
    store::{ClientSettings, ConversationStore, StoreError},
};

/// Thread id of a conversation that has no thread row yet.
const UNMATERIALIZED_THREAD: i64 = -1;

const NO_JUMP: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeQuery {
    pub thread_id: i64,
    pub recipient: Recipient,
    pub jump_to_position: i32,
}

impl ComposeQuery {
    pub fn new(thread_id: i64, recipient: Recipient) -> Self {
        Self {
            thread_id,
            recipient,
            jump_to_position: NO_JUMP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("store read failed while composing conversation state: {0}")]
    Store(#[from] StoreError),
    #[error("worker executing the composition went away")]
    Worker,
}

/// Assembles the point-in-time snapshot for one conversation screen load.
///
/// Every store read is taken fresh; a snapshot never mixes cached and current
/// values. Any read failure fails the whole composition.
pub fn compose_view_state(
    store: &dyn ConversationStore,
    settings: &dyn ClientSettings,
    query: ComposeQuery,
) -> Result<ConversationViewState, ComposeError> {
    let ComposeQuery {
        thread_id,
        recipient,
        jump_to_position,
    } = query;

    let metadata = store.thread_metadata(thread_id)?;
    let thread_size = store.message_count(thread_id)?;

    let mut last_seen_ms = metadata.last_seen_ms;
    let mut last_seen_position = 0;
    let mut last_scrolled_position = 0;

    if last_seen_ms > 0 {
        last_seen_position = store.position_at_or_after(thread_id, last_seen_ms)?;
    }

    // A position the store cannot resolve invalidates the whole anchor.
    if last_seen_position <= 0 {
        last_seen_ms = 0;
        last_seen_position = 0;
    }

    if last_seen_ms == 0 && metadata.last_scrolled_ms > 0 {
        last_scrolled_position = store
            .position_at_or_after(thread_id, metadata.last_scrolled_ms)?
            .max(0);
    }

    let message_request = message_request_state(store, thread_id, &recipient)?;
    let show_universal_timer_prompt =
        universal_timer_prompt(store, settings, thread_id, &recipient)?;

    Ok(ConversationViewState {
        recipient,
        thread_id,
        last_seen_ms,
        last_seen_position,
        last_scrolled_position,
        requested_jump_position: jump_to_position,
        thread_size,
        message_request,
        show_universal_timer_prompt,
    })
}

fn message_request_state(
    store: &dyn ConversationStore,
    thread_id: i64,
    recipient: &Recipient,
) -> Result<MessageRequestState, ComposeError> {
    let hidden = store.is_recipient_hidden(thread_id)?;

    if store.is_message_request_accepted(thread_id)? {
        return Ok(MessageRequestState::Accepted { hidden });
    }

    let (is_group, known_or_has_mutual_groups) = if recipient.is_group {
        let known = match store.group_record(recipient.id)? {
            Some(group) => group_has_known_member(store, &group)?,
            None => false,
        };
        (true, known)
    } else {
        (false, recipient.has_groups_in_common)
    };

    Ok(MessageRequestState::Pending {
        hidden,
        known_or_has_mutual_groups,
        is_group,
    })
}

fn group_has_known_member(
    store: &dyn ConversationStore,
    group: &GroupRecord,
) -> Result<bool, ComposeError> {
    for member_id in &group.members {
        let member = store.recipient(*member_id)?;
        if !member.is_self && (member.is_profile_sharing || member.has_groups_in_common) {
            return Ok(true);
        }
    }

    Ok(false)
}

fn universal_timer_prompt(
    store: &dyn ConversationStore,
    settings: &dyn ClientSettings,
    thread_id: i64,
    recipient: &Recipient,
) -> Result<bool, ComposeError> {
    if settings.universal_expire_timer_secs() == 0
        || recipient.expires_in_secs != 0
        || recipient.is_group
        || !recipient.is_registered()
    {
        return Ok(false);
    }

    if thread_id == UNMATERIALIZED_THREAD {
        return Ok(true);
    }

    Ok(store.can_set_universal_timer(thread_id)?)
}
