// src/codec.rs

//! Packet serialization boundary.
//!
//! The client core treats encoding and decoding as total functions that
//! either succeed or fail with an encode/decode error. On decode failure
//! the inbound frame is dropped and never dispatched.
//!
//! [`JsonCodec`] is the reference implementation, kept deliberately simple
//! so the crate is exercisable end to end without an external serializer.
//! Production deployments are expected to supply their own [`PacketCodec`].

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{CorrelationId, Error, Packet, PacketTypeId, Result};

/// Packet codec abstraction.
///
/// Implementations must be pure with respect to the frame: the same bytes
/// always decode to the same packet, and `decode(encode(p))` yields `p`.
pub trait PacketCodec: Send + Sync {
    // ---
    /// Encode an outgoing packet into one byte frame.
    fn encode(&self, packet: &Packet) -> Result<Bytes>;

    /// Decode one inbound byte frame into a packet and its type identifier.
    fn decode(&self, frame: &[u8]) -> Result<(Packet, PacketTypeId)>;
}

/// Shared codec pointer.
pub type CodecPtr = Arc<dyn PacketCodec>;

#[derive(Serialize, Deserialize)]
struct WirePacket {
    // ---
    type_id: u16,
    correlation_id: Option<u64>,
    payload: Bytes,
}

/// JSON reference codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl PacketCodec for JsonCodec {
    // ---
    fn encode(&self, packet: &Packet) -> Result<Bytes> {
        // ---
        let wire = WirePacket {
            type_id: packet.type_id.0,
            correlation_id: packet.correlation_id.map(|id| id.as_u64()),
            payload: packet.payload.clone(),
        };

        let bytes = serde_json::to_vec(&wire).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    fn decode(&self, frame: &[u8]) -> Result<(Packet, PacketTypeId)> {
        // ---
        let wire: WirePacket =
            serde_json::from_slice(frame).map_err(|e| Error::Decode(e.to_string()))?;

        let type_id = PacketTypeId(wire.type_id);
        let packet = Packet {
            type_id,
            correlation_id: wire.correlation_id.map(CorrelationId::from),
            payload: wire.payload,
        };

        Ok((packet, type_id))
    }
}
