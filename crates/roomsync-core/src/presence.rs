//! Online presence from `user_status` frames.

use std::collections::BTreeMap;

use roomsync_proto::{UserId, UserStatus};

/// Set of users the server reports as online.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    online: BTreeMap<UserId, String>,
}

impl Presence {
    /// Nobody online.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status change. Returns whether the set changed.
    pub fn apply(&mut self, status: &UserStatus) -> bool {
        if status.is_online {
            self.online.insert(status.user_id, status.username.clone()).as_ref()
                != Some(&status.username)
        } else {
            self.online.remove(&status.user_id).is_some()
        }
    }

    /// Whether `user` is online.
    pub fn is_online(&self, user: UserId) -> bool {
        self.online.contains_key(&user)
    }

    /// Display names of online users, ordered by user id.
    pub fn online_users(&self) -> Vec<String> {
        self.online.values().cloned().collect()
    }

    /// Forget everyone. Presence is rebuilt after a reconnect.
    pub fn clear(&mut self) {
        self.online.clear();
    }
}
