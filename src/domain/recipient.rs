/// How the contact directory currently classifies a recipient's registration
/// on the secure transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationClassification {
    /// Nothing cached yet; a directory lookup may refine this.
    #[default]
    Unknown,
    Registered,
    NotRegistered,
}

impl RegistrationClassification {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Registered => "registered",
            Self::NotRegistered => "not_registered",
        }
    }
}

/// Point-in-time projection of a recipient as the store sees it right now.
///
/// A recipient is either a single contact or a group; `is_push_group` is only
/// ever true for groups reachable over the secure push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: i64,
    pub is_group: bool,
    pub is_push_group: bool,
    pub registration: RegistrationClassification,
    /// Per-conversation disappearing-message timer in seconds, 0 when unset.
    pub expires_in_secs: u32,
    pub is_self: bool,
    pub is_profile_sharing: bool,
    pub has_groups_in_common: bool,
    pub allows_detached_window: bool,
}

impl Recipient {
    /// Placeholder projection for an id the store has never materialized.
    pub fn unknown(id: i64) -> Self {
        Self {
            id,
            is_group: false,
            is_push_group: false,
            registration: RegistrationClassification::Unknown,
            expires_in_secs: 0,
            is_self: false,
            is_profile_sharing: false,
            has_groups_in_common: false,
            allows_detached_window: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registration == RegistrationClassification::Registered
    }
}

/// Stored membership record for a group recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub recipient_id: i64,
    /// Recipient ids of every member, the local account included.
    pub members: Vec<i64>,
}
