use std::io::{self, Read};

use crate::{domain::message::ConversationMessage, infra::redact, store::BlobStore};

const EDIT_SOURCE_READ_FAILED: &str = "EDIT_SOURCE_READ_FAILED";

/// Substitutes an externally stored long body into the message before editing.
///
/// Fails open: a missing attachment, an unassigned blob ref, or any read
/// failure leaves the inline body in place. Editing keeps working even when
/// the blob is gone, at worst over the truncated text.
pub fn resolve_edit_source(
    blobs: &dyn BlobStore,
    message: ConversationMessage,
) -> ConversationMessage {
    let Some(blob_ref) = message
        .long_text
        .as_ref()
        .and_then(|attachment| attachment.blob_ref.as_deref())
    else {
        return message;
    };

    match read_blob_text(blobs, blob_ref) {
        Ok(body) => message.with_body(body),
        Err(error) => {
            tracing::warn!(
                code = EDIT_SOURCE_READ_FAILED,
                message_id = message.id,
                error = %redact::redact_text(&error.to_string()),
                "long-text blob unreadable, editing the inline body"
            );
            message
        }
    }
}

fn read_blob_text(blobs: &dyn BlobStore, blob_ref: &str) -> io::Result<String> {
    let mut stream = blobs.open_stream(blob_ref)?;
    let mut body = String::new();
    stream.read_to_string(&mut body)?;
    Ok(body)
}
