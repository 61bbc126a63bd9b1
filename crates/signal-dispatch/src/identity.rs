use signaltap_core_types::Identity;

/// Supplies profile and session ids at flush time.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Identity;
}

/// Fixed identity, e.g. taken from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Identity {
        self.identity.clone()
    }
}
