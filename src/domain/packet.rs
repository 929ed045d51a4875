// src/domain/packet.rs

//! Packet domain model.
//!
//! A packet is a decoded protocol message. Two kinds matter to the client
//! core: *plain* packets, routed by type identifier to persistently
//! registered handlers, and *callback* packets, which carry a correlation ID
//! and are routed to the one-shot callback awaiting that ID.
//!
//! The concrete shape of a packet's payload is outside the core's concern;
//! it travels as opaque bytes and is interpreted by the caller's handlers.

use crate::CorrelationId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Packet type identifier.
///
/// Type identifiers index a dense table sized by the configured catalog.
/// The catalog is closed and known at startup, so identifiers are small
/// integers, not arbitrary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketTypeId(pub u16);

impl PacketTypeId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for PacketTypeId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for PacketTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded protocol packet.
///
/// Cheap to clone: the payload is reference-counted `Bytes`.
#[derive(Clone, Debug)]
pub struct Packet {
    // ---
    /// Type identifier, per the configured catalog.
    pub type_id: PacketTypeId,

    /// Correlation identifier. `Some` makes this a callback packet routed
    /// by ID; `None` makes it a plain packet routed by type.
    pub correlation_id: Option<CorrelationId>,

    /// Opaque payload bytes, interpreted by the caller's handlers.
    pub payload: Bytes,
}

impl Packet {
    // ---
    /// Create a plain packet (routed by type).
    pub fn plain(type_id: PacketTypeId, payload: Bytes) -> Self {
        Self {
            type_id,
            correlation_id: None,
            payload,
        }
    }

    /// Create a callback packet (routed by correlation ID).
    pub fn callback(type_id: PacketTypeId, correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            type_id,
            correlation_id: Some(correlation_id),
            payload,
        }
    }
}

/// Persistent handler invoked for every matching inbound packet.
pub type PacketHandler = Arc<dyn Fn(Packet) + Send + Sync>;

/// One declared packet kind in the catalog.
#[derive(Clone, Debug)]
pub struct PacketKind {
    // ---
    /// Type identifier of this kind.
    pub type_id: PacketTypeId,

    /// Human-readable name, used for logging only.
    pub name: Arc<str>,

    /// Whether requests of this kind expect a correlated callback response.
    pub expects_callback: bool,

    /// Declared response kind for requests answered by a *plain* packet
    /// rather than a correlated callback. `None` if the request has no
    /// declared response.
    pub response_type: Option<PacketTypeId>,
}

/// Closed catalog of packet kinds, fixed at configuration time.
///
/// Backed by a dense vector indexed by type identifier so kind lookup and
/// the handler table it sizes are O(1) array accesses.
#[derive(Clone, Debug, Default)]
pub struct PacketCatalog {
    kinds: Vec<Option<PacketKind>>,
}

impl PacketCatalog {
    // ---
    pub fn builder() -> PacketCatalogBuilder {
        PacketCatalogBuilder::default()
    }

    /// Look up a declared kind by type identifier.
    pub fn kind(&self, type_id: PacketTypeId) -> Option<&PacketKind> {
        self.kinds.get(type_id.index()).and_then(Option::as_ref)
    }

    /// Dense table length required to index every declared kind.
    pub fn table_len(&self) -> usize {
        self.kinds.len()
    }

    /// Number of declared kinds.
    pub fn len(&self) -> usize {
        self.kinds.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`PacketCatalog`].
#[derive(Default)]
pub struct PacketCatalogBuilder {
    kinds: Vec<PacketKind>,
}

impl PacketCatalogBuilder {
    // ---
    /// Declare a plain packet kind with no correlated response.
    pub fn plain(self, type_id: PacketTypeId, name: impl Into<Arc<str>>) -> Self {
        self.push(PacketKind {
            type_id,
            name: name.into(),
            expects_callback: false,
            response_type: None,
        })
    }

    /// Declare a request kind whose responses arrive as callback packets
    /// carrying the request's correlation ID.
    pub fn correlated(self, type_id: PacketTypeId, name: impl Into<Arc<str>>) -> Self {
        self.push(PacketKind {
            type_id,
            name: name.into(),
            expects_callback: true,
            response_type: None,
        })
    }

    /// Declare a request kind answered by a plain packet of `response_type`.
    pub fn with_response(
        self,
        type_id: PacketTypeId,
        name: impl Into<Arc<str>>,
        response_type: PacketTypeId,
    ) -> Self {
        self.push(PacketKind {
            type_id,
            name: name.into(),
            expects_callback: false,
            response_type: Some(response_type),
        })
    }

    fn push(mut self, kind: PacketKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn build(self) -> PacketCatalog {
        // ---
        let table_len = self
            .kinds
            .iter()
            .map(|k| k.type_id.index() + 1)
            .max()
            .unwrap_or(0);

        let mut kinds = vec![None; table_len];
        for kind in self.kinds {
            let slot = &mut kinds[kind.type_id.index()];
            debug_assert!(
                slot.is_none(),
                "packet type {} declared twice in the catalog",
                kind.type_id
            );
            *slot = Some(kind);
        }

        PacketCatalog { kinds }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_catalog_dense_lookup() {
        // ---
        let catalog = PacketCatalog::builder()
            .plain(PacketTypeId(0), "Ping")
            .correlated(PacketTypeId(3), "Query")
            .build();

        assert_eq!(catalog.table_len(), 4);
        assert_eq!(catalog.len(), 2);

        let ping = catalog.kind(PacketTypeId(0)).unwrap();
        assert!(!ping.expects_callback);

        let query = catalog.kind(PacketTypeId(3)).unwrap();
        assert!(query.expects_callback);

        // Undeclared gap and out-of-range both miss.
        assert!(catalog.kind(PacketTypeId(1)).is_none());
        assert!(catalog.kind(PacketTypeId(9)).is_none());
    }

    #[test]
    #[should_panic(expected = "declared twice")]
    fn test_duplicate_type_id_is_programming_error() {
        // ---
        let _ = PacketCatalog::builder()
            .plain(PacketTypeId(0), "Ping")
            .correlated(PacketTypeId(0), "Query")
            .build();
    }

    #[test]
    fn test_packet_kinds() {
        // ---
        let plain = Packet::plain(PacketTypeId(0), Bytes::from_static(b"x"));
        assert!(plain.correlation_id.is_none());

        let cid = crate::CorrelationId::from(7);
        let cb = Packet::callback(PacketTypeId(1), cid, Bytes::new());
        assert_eq!(cb.correlation_id, Some(cid));
    }
}
