use crate::domain::recipient::{Recipient, RegistrationClassification};

/// Derived judgement of whether a conversation partner is reachable over the
/// secure channel. Never persisted; recomputed whenever the identity changes
/// in a security-relevant way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityStatus {
    pub recipient_id: i64,
    /// Remote side registered on the secure transport and the local account
    /// itself enabled.
    pub secure_channel: bool,
    /// Reserved flag, always true in this surface.
    pub initiated: bool,
    pub client_deprecated: bool,
    pub credentials_rejected: bool,
}

/// The only recipient fields whose change justifies recomputing a
/// [`SecurityStatus`]. Cosmetic profile churn must not trigger recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityKey {
    pub is_push_group: bool,
    pub registration: RegistrationClassification,
}

impl SecurityKey {
    pub fn of(recipient: &Recipient) -> Self {
        Self {
            is_push_group: recipient.is_push_group,
            registration: recipient.registration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::direct_recipient;

    #[test]
    fn key_ignores_cosmetic_fields() {
        let mut before = direct_recipient(1);
        before.registration = RegistrationClassification::Registered;

        let mut after = before.clone();
        after.is_profile_sharing = !after.is_profile_sharing;
        after.expires_in_secs = 3600;

        assert_eq!(SecurityKey::of(&before), SecurityKey::of(&after));
    }

    #[test]
    fn key_tracks_registration_and_push_group() {
        let mut before = direct_recipient(1);
        before.registration = RegistrationClassification::Unknown;

        let mut reclassified = before.clone();
        reclassified.registration = RegistrationClassification::Registered;
        assert_ne!(SecurityKey::of(&before), SecurityKey::of(&reclassified));

        let mut promoted = before.clone();
        promoted.is_push_group = true;
        assert_ne!(SecurityKey::of(&before), SecurityKey::of(&promoted));
    }
}
