//! Public, transport-agnostic client configuration.
//!
//! This type intentionally contains no conduit-specific concepts (pipe
//! names, socket addresses, ...). Transport layers are responsible for
//! interpreting their own connection settings.

use std::time::Duration;

use crate::PacketCatalog;

/// Client configuration and correlation parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ---
    /// Closed catalog of packet kinds this client speaks.
    ///
    /// Sizes the dense handler table and decides, per request kind,
    /// whether a send expects a correlated callback response.
    pub catalog: PacketCatalog,

    /// How long an unanswered callback registration stays alive before the
    /// sweep may reclaim it.
    ///
    /// Must comfortably exceed the realistic end-to-end round-trip time,
    /// otherwise the sweep could evict an entry whose response is still in
    /// flight.
    ///
    /// Default: 5 minutes
    pub callback_lifetime: Duration,

    /// Minimum wall-clock interval between opportunistic sweeps.
    ///
    /// Sweeps piggy-back on registration calls; this throttles them.
    ///
    /// Default: 1 minute
    pub callback_sweep_interval: Duration,

    /// Default timeout for [`Client::send_and_wait`](crate::Client::send_and_wait)
    /// when the caller does not pass one.
    ///
    /// Default: 30 seconds
    pub default_wait_timeout: Duration,

    /// Identifier for this client instance, used for logging only.
    pub client_id: String,
}

impl ClientConfig {
    /// Create a configuration for the given packet catalog.
    pub fn new(catalog: PacketCatalog) -> Self {
        Self {
            catalog,
            callback_lifetime: Duration::from_secs(5 * 60),
            callback_sweep_interval: Duration::from_secs(60),
            default_wait_timeout: Duration::from_secs(30),
            client_id: "client".to_owned(),
        }
    }

    /// Set the callback entry lifetime.
    pub fn with_callback_lifetime(mut self, lifetime: Duration) -> Self {
        self.callback_lifetime = lifetime;
        self
    }

    /// Set the sweep throttle interval.
    pub fn with_callback_sweep_interval(mut self, interval: Duration) -> Self {
        self.callback_sweep_interval = interval;
        self
    }

    /// Set the default `send_and_wait` timeout.
    pub fn with_default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = timeout;
        self
    }

    /// Set the client identifier used in log output.
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }
}
