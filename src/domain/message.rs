/// Pointer to the overflow blob of a message body too large to store inline.
/// The attachment row can exist before its blob is written, hence the inner
/// `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongTextAttachment {
    pub blob_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub id: i64,
    pub thread_id: i64,
    /// Inline body; truncated when `long_text` is present.
    pub body: String,
    pub is_outgoing: bool,
    pub long_text: Option<LongTextAttachment>,
}

impl ConversationMessage {
    /// Returns the message with `body` replaced and every other field intact.
    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }
}

/// Identifies one message to linked devices in sync traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessageId {
    pub recipient_id: i64,
    pub timestamp_ms: i64,
}

/// How a thread is placed in the conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionType {
    #[default]
    Default,
    Broadcast,
    Conversation,
    Archive,
}
