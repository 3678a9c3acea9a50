//! Connection manager configuration.

/// Which gate a [`ConnectionManager`](crate::ConnectionManager) hands to the
/// connections it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateScope {
    /// The single process-wide gate. Operations on every connection in the
    /// process are serialized against each other.
    #[default]
    Process,
    /// A fresh gate per connection.
    Connection,
}

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gate selection for new connections.
    pub gate_scope: GateScope,

    /// Whether opening fails when a schema collection is missing from the
    /// database without a version bump to create it.
    pub verify_collections: bool,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gate scope.
    #[must_use]
    pub const fn gate_scope(mut self, scope: GateScope) -> Self {
        self.gate_scope = scope;
        self
    }

    /// Sets whether to verify schema collections on open.
    #[must_use]
    pub const fn verify_collections(mut self, value: bool) -> Self {
        self.verify_collections = value;
        self
    }
}
