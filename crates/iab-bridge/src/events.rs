//! Notifications pushed from the bridge to local listeners.

/// Event broadcast to every subscriber of a [`RequestBridge`](crate::RequestBridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The bound identity (active wallet address) was replaced.
    IdentityChanged(String),
}

impl BridgeEvent {
    /// Event name as exposed to page scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdentityChanged(_) => "accountChanged",
        }
    }
}
