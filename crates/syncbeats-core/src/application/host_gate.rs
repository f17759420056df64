//! Host authority gate: only the room host may originate playback broadcasts.

use crate::domain::identity::UserId;

#[derive(Debug, Clone)]
pub struct HostGate {
    local_user: UserId,
    host: Option<UserId>,
    connected: bool,
}

impl HostGate {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            host: None,
            connected: false,
        }
    }

    /// Apply an authoritative `host_update`. Returns the new `is_host`.
    pub fn update(&mut self, host: Option<UserId>) -> bool {
        self.host = host;
        self.is_host()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Authority only holds while connected.
    pub fn is_host(&self) -> bool {
        self.connected && self.host.as_ref() == Some(&self.local_user)
    }

    pub fn host(&self) -> Option<&UserId> {
        self.host.as_ref()
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }
}
