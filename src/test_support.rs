use std::time::Duration;

use crate::domain::recipient::{Recipient, RegistrationClassification};

/// Polls `probe` until it holds, panicking after two seconds.
pub async fn wait_until(probe: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !probe() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold within two seconds");
}

pub fn direct_recipient(id: i64) -> Recipient {
    Recipient {
        id,
        is_group: false,
        is_push_group: false,
        registration: RegistrationClassification::Registered,
        expires_in_secs: 0,
        is_self: false,
        is_profile_sharing: false,
        has_groups_in_common: false,
        allows_detached_window: false,
    }
}

pub fn group_recipient(id: i64) -> Recipient {
    Recipient {
        is_group: true,
        ..direct_recipient(id)
    }
}

pub fn push_group_recipient(id: i64) -> Recipient {
    Recipient {
        is_push_group: true,
        ..group_recipient(id)
    }
}
