use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier used to match a response packet to the request
/// that produced it.
///
/// Correlation IDs are process-local integers carried *in-band* inside
/// packets. They are opaque to the conduit layer. Uniqueness only matters
/// among currently-outstanding callbacks; a 64-bit random draw makes a
/// collision with the handful of in-flight requests vanishingly unlikely,
/// and the client re-draws if it ever does hit an outstanding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Generate a new random correlation ID.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen())
    }

    /// Raw integer value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
