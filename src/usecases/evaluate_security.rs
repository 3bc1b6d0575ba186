use crate::{
    domain::{
        recipient::{Recipient, RegistrationClassification},
        security::SecurityStatus,
    },
    store::{ClientSettings, ContactResolver, ConversationStore},
};

const SECURITY_CLASSIFICATION_READ_FAILED: &str = "SECURITY_CLASSIFICATION_READ_FAILED";
const SECURITY_RESOLUTION_FAILED: &str = "SECURITY_RESOLUTION_FAILED";

/// Recomputes the security status for one recipient identity.
///
/// Push groups are registered by construction. For everyone else the cached
/// classification is read fresh from the store, and only a still-unknown
/// classification goes out to the contact directory. This function never
/// fails: an unreachable directory leaves the classification unknown, which
/// renders as an insecure channel.
pub fn evaluate_security(
    store: &dyn ConversationStore,
    resolver: &dyn ContactResolver,
    settings: &dyn ClientSettings,
    recipient: &Recipient,
) -> SecurityStatus {
    let mut classification = if recipient.is_push_group {
        RegistrationClassification::Registered
    } else {
        match store.registration_classification(recipient.id) {
            Ok(classification) => classification,
            Err(error) => {
                tracing::warn!(
                    code = SECURITY_CLASSIFICATION_READ_FAILED,
                    recipient_id = recipient.id,
                    error = %error,
                    "cached registration unavailable, treating as unknown"
                );
                RegistrationClassification::Unknown
            }
        }
    };

    if classification == RegistrationClassification::Unknown {
        match resolver.resolve_registration(recipient.id, false) {
            Ok(resolved) => classification = resolved,
            Err(error) => {
                tracing::warn!(
                    code = SECURITY_RESOLUTION_FAILED,
                    recipient_id = recipient.id,
                    error = %error,
                    "registration resolution failed, leaving classification unknown"
                );
            }
        }
    }

    tracing::debug!(
        recipient_id = recipient.id,
        classification = classification.as_label(),
        "security status recomputed"
    );

    SecurityStatus {
        recipient_id: recipient.id,
        secure_channel: classification == RegistrationClassification::Registered
            && settings.is_local_account_enabled(),
        // Reserved flag, nothing varies it yet.
        initiated: true,
        client_deprecated: settings.is_client_deprecated(),
        credentials_rejected: settings.is_credentials_rejected(),
    }
}
