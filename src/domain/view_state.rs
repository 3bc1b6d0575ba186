use crate::domain::recipient::Recipient;

/// Message-request gate for a conversation.
///
/// The familiarity fields only exist while the request is pending; an accepted
/// conversation carries nothing beyond the hidden flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRequestState {
    Accepted {
        hidden: bool,
    },
    Pending {
        hidden: bool,
        /// For groups: some non-self member is known. For contacts: mutual
        /// groups exist.
        known_or_has_mutual_groups: bool,
        is_group: bool,
    },
}

impl MessageRequestState {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn hidden(&self) -> bool {
        match self {
            Self::Accepted { hidden } | Self::Pending { hidden, .. } => *hidden,
        }
    }
}

/// Point-in-time snapshot of everything one conversation screen needs to
/// render its first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationViewState {
    pub recipient: Recipient,
    pub thread_id: i64,
    /// Unix millis of the newest message the viewer had seen, 0 when the
    /// anchor is unusable.
    pub last_seen_ms: i64,
    /// 1-based position of the first message at or after `last_seen_ms`;
    /// meaningful only while `last_seen_ms` is non-zero.
    pub last_seen_position: i32,
    /// Fallback anchor from the last recorded scroll, computed only when the
    /// last-seen anchor was discarded.
    pub last_scrolled_position: i32,
    /// Caller-requested jump target, negative when no jump was requested.
    pub requested_jump_position: i32,
    pub thread_size: u32,
    pub message_request: MessageRequestState,
    pub show_universal_timer_prompt: bool,
}

impl ConversationViewState {
    /// Whether the screen should open at an explicitly requested message.
    /// Takes precedence over the last-seen anchor.
    pub fn should_jump_to_message(&self) -> bool {
        self.requested_jump_position >= 0
    }

    pub fn should_scroll_to_last_seen(&self) -> bool {
        self.last_seen_position > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::direct_recipient;

    fn sample_state() -> ConversationViewState {
        ConversationViewState {
            recipient: direct_recipient(1),
            thread_id: 10,
            last_seen_ms: 0,
            last_seen_position: 0,
            last_scrolled_position: 0,
            requested_jump_position: -1,
            thread_size: 0,
            message_request: MessageRequestState::Accepted { hidden: false },
            show_universal_timer_prompt: false,
        }
    }

    #[test]
    fn jump_is_requested_for_non_negative_positions() {
        let mut state = sample_state();

        state.requested_jump_position = 0;
        assert!(state.should_jump_to_message());

        state.requested_jump_position = 17;
        assert!(state.should_jump_to_message());

        state.requested_jump_position = -1;
        assert!(!state.should_jump_to_message());
    }

    #[test]
    fn last_seen_scroll_requires_positive_position() {
        let mut state = sample_state();

        state.last_seen_position = 5;
        assert!(state.should_scroll_to_last_seen());

        state.last_seen_position = 0;
        assert!(!state.should_scroll_to_last_seen());
    }

    #[test]
    fn hidden_flag_is_readable_in_both_request_states() {
        let accepted = MessageRequestState::Accepted { hidden: true };
        let pending = MessageRequestState::Pending {
            hidden: false,
            known_or_has_mutual_groups: true,
            is_group: false,
        };

        assert!(accepted.accepted());
        assert!(accepted.hidden());
        assert!(!pending.accepted());
        assert!(!pending.hidden());
    }
}
