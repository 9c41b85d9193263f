//! Bridge configuration.

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// RPC endpoint of the chain the host wallet is connected to.
    pub rpc_url: String,
    /// Initially bound identity (wallet address), if any.
    pub address: Option<String>,
    /// Events buffered per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("IAB_RPC_URL").unwrap_or_default(),
            address: std::env::var("IAB_ADDRESS").ok().filter(|a| !a.is_empty()),
            event_capacity: parse_capacity(std::env::var("IAB_EVENT_CAPACITY").ok().as_deref()),
        }
    }
}

impl BridgeConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            address: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Broadcast channels reject a zero capacity.
fn parse_capacity(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_EVENT_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_no_identity() {
        let config = BridgeConfig::new("https://api.elastos.io/ela");
        assert_eq!(config.rpc_url, "https://api.elastos.io/ela");
        assert!(config.address.is_none());
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn builder_pattern() {
        let config = BridgeConfig::new("a")
            .with_rpc_url("b")
            .with_address("EaddrX")
            .with_event_capacity(0);
        assert_eq!(config.rpc_url, "b");
        assert_eq!(config.address.as_deref(), Some("EaddrX"));
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn capacity_parsing() {
        assert_eq!(parse_capacity(Some("64")), 64);
        assert_eq!(parse_capacity(Some("0")), DEFAULT_EVENT_CAPACITY);
        assert_eq!(parse_capacity(Some("lots")), DEFAULT_EVENT_CAPACITY);
        assert_eq!(parse_capacity(None), DEFAULT_EVENT_CAPACITY);
    }
}
