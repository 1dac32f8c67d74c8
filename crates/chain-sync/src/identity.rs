//! Wallet/identity check performed before a sync is submitted.

/// Source of the currently connected wallet address.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<String>;

    fn is_connected(&self) -> bool {
        self.current_identity()
            .is_some_and(|identity| !identity.trim().is_empty())
    }
}

/// Fixed identity, e.g. an address read from configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    address: Option<String>,
}

impl StaticIdentity {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<String> {
        self.address.clone()
    }
}
